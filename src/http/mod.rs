//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs   (Axum setup, request ID, tracing, orchestration)
//!     → request.rs  (request ID, tenant hostname)
//!     → [tenants + routing decide]
//!     → upstream.rs (outbound request, header policy, single attempt)
//!     → response.rs (header filter, body rewrite, exact length)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use request::X_REQUEST_ID;
pub use response::Rewriter;
pub use server::{AppState, GatewayServer};
pub use upstream::Forwarder;

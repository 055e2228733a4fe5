//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: MYSQL_URL, HTTP_PORT, ...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; tenant data lives in the store and
//!   is refreshed separately
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::GatewayConfig;
pub use schema::{
    AdminConfig, ListenerConfig, LogFormat, ObservabilityConfig, RefreshConfig, RewriteConfig,
    RoutingConfig, StoreConfig, StoreKind, TimeoutConfig,
};

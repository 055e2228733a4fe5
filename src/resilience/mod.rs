//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (deadline over round trip + body read)
//!     → on expiry: 504 to the client
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - No retries: each request is forwarded at most once

pub mod timeouts;

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved tenant + request path
//!     → router.rs (prefix table, first match wins)
//!     → RouteTarget { backend, url, host override, rewrite allowed? }
//! ```
//!
//! # Design Decisions
//! - Pure decision: no I/O, no shared state
//! - Fixed precedence: imager, diagnostics, image transform, sitemap,
//!   DNS probe, then the CMS as default
//! - Only the CMS gets its Host header overridden and its responses rewritten

pub mod router;

pub use router::{Backend, RouteTarget, Router};

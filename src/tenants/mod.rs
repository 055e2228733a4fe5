//! Tenant configuration subsystem.
//!
//! # Data Flow
//! ```text
//! Host header
//!     → directory.rs     (alias redirect? → tenant Domain)
//!     → static_files.rs  (per-tenant file override)
//!     → posts.rs         (post slug redirect / takedown)
//!     → routing          (backend selection)
//!
//! snapshots.rs owns the four caches: first load, refresh loops, reload.
//! export.rs renders the tenant list for the edge load balancer.
//! ```
//!
//! # Design Decisions
//! - Every resolver reads through a `SnapshotCache`; none holds state of
//!   its own
//! - Not-found is `None`, never an error

pub mod directory;
pub mod export;
pub mod posts;
pub mod snapshots;
pub mod static_files;
pub mod types;

pub use directory::{AliasCache, DomainCache, TenantDirectory};
pub use posts::{PostCache, PostDecision, PostOverrideResolver};
pub use snapshots::{RefreshOutcome, Reload, SourceReload, TenantSnapshots};
pub use static_files::{FileCache, StaticFileResolver};
pub use types::{Domain, DomainAlias, DomainFile, PostOverride, RedirectPolicy};

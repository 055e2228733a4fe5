//! Tenant store subsystem.
//!
//! # Data Flow
//! ```text
//! snapshot refresh tick
//!     → SnapshotSource<T>::fetch_all()
//!         mysql.rs  (SELECT <columns> FROM <table>)
//!         memory.rs (in-process rows / JSON fixture)
//!     → Vec<T> handed to the snapshot cache
//! ```
//!
//! # Design Decisions
//! - Bulk read only: no filtering pushed down, no transactions
//! - Sources are stateless from the cache's point of view; a failed fetch
//!   leaves the previous snapshot in place

use std::future::Future;

pub mod memory;
pub mod mysql;

pub use memory::{Fixture, MemoryStore};
pub use mysql::MySqlStore;

use crate::tenants::types::{Domain, DomainAlias, DomainFile, PostOverride};

/// Error raised by a bulk read.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("fixture error: {0}")]
    Fixture(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Bulk-read capability for one entity type.
pub trait SnapshotSource<T>: Send + Sync + 'static {
    /// Return every row of `T` currently in the store.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<T>, StoreError>> + Send;
}

/// A store that can feed every tenant snapshot.
pub trait TenantSource:
    SnapshotSource<Domain>
    + SnapshotSource<DomainAlias>
    + SnapshotSource<DomainFile>
    + SnapshotSource<PostOverride>
{
}

impl<S> TenantSource for S where
    S: SnapshotSource<Domain>
        + SnapshotSource<DomainAlias>
        + SnapshotSource<DomainFile>
        + SnapshotSource<PostOverride>
{
}

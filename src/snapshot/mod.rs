//! Periodically refreshed, atomically swapped snapshots of store data.
//!
//! # Data Flow
//! ```text
//! refresh task (one per cache)
//!     → SnapshotSource::fetch_all()      (no lock held)
//!     → Snapshot::from_rows()            (built off to the side)
//!     → ArcSwap::store()                 (single pointer swap)
//!
//! request path
//!     → ArcSwap::load()                  (lock-free guard)
//!     → scan / get on the pinned snapshot
//! ```
//!
//! # Design Decisions
//! - A reader pins one snapshot for the whole scan, so it sees either the
//!   old or the new collection, never a mix
//! - A failed fetch keeps the previous snapshot (stale but available)
//! - The first load is done by the caller before serving traffic

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::{ArcSwap, Guard};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::observability::metrics;
use crate::store::{SnapshotSource, StoreError};

/// A collection that can be rebuilt wholesale from a batch of rows.
pub trait Snapshot: Default + Send + Sync + 'static {
    type Row: Send + 'static;

    fn from_rows(rows: Vec<Self::Row>) -> Self;

    fn row_count(&self) -> usize;
}

impl<T: Send + Sync + 'static> Snapshot for Vec<T> {
    type Row = T;

    fn from_rows(rows: Vec<T>) -> Self {
        rows
    }

    fn row_count(&self) -> usize {
        self.len()
    }
}

/// Point-in-time description of a cache, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStatus {
    pub name: &'static str,
    pub rows: usize,
    pub generation: u64,
    /// Unix seconds of the last successful refresh, 0 if never loaded.
    pub refreshed_at: u64,
}

/// Holds the currently visible snapshot of one entity type.
pub struct SnapshotCache<S> {
    name: &'static str,
    current: ArcSwap<S>,
    generation: AtomicU64,
    refreshed_at: AtomicU64,
}

impl<S: Snapshot> SnapshotCache<S> {
    /// Create an empty cache. Nothing is visible until the first refresh.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: ArcSwap::from_pointee(S::default()),
            generation: AtomicU64::new(0),
            refreshed_at: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Pin the current snapshot for a short scan.
    pub fn load(&self) -> Guard<Arc<S>> {
        self.current.load()
    }

    /// Take an owned handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<S> {
        self.current.load_full()
    }

    /// Swap in a new snapshot built from `rows`.
    pub fn replace(&self, rows: Vec<S::Row>) -> usize {
        let next = S::from_rows(rows);
        let count = next.row_count();
        self.current.store(Arc::new(next));
        self.generation.fetch_add(1, Ordering::SeqCst);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.refreshed_at.store(now, Ordering::Relaxed);
        metrics::record_snapshot_rows(self.name, count);
        count
    }

    /// Fetch from the store and swap the result in.
    ///
    /// On failure the previous snapshot stays visible and the error is
    /// returned to the caller (the refresh loop only logs it).
    pub async fn refresh<Src>(&self, source: &Src) -> Result<usize, StoreError>
    where
        Src: SnapshotSource<S::Row>,
    {
        match source.fetch_all().await {
            Ok(rows) => {
                let count = self.replace(rows);
                metrics::record_snapshot_refresh(self.name, true);
                tracing::debug!(snapshot = self.name, rows = count, "Snapshot refreshed");
                Ok(count)
            }
            Err(e) => {
                metrics::record_snapshot_refresh(self.name, false);
                tracing::error!(
                    snapshot = self.name,
                    error = %e,
                    "Snapshot refresh failed, keeping previous data"
                );
                Err(e)
            }
        }
    }

    /// Start the perpetual refresh loop.
    ///
    /// The first tick is skipped: the caller is expected to have done the
    /// initial load already. The loop exits on the shutdown broadcast.
    pub fn spawn_refresh<Src>(
        self: &Arc<Self>,
        source: Arc<Src>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()>
    where
        Src: SnapshotSource<S::Row>,
    {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            tracing::info!(
                snapshot = cache.name,
                interval_secs = interval.as_secs_f64(),
                "Snapshot refresher started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = cache.refresh(source.as_ref()).await;
                    }
                    _ = shutdown.recv() => {
                        tracing::info!(snapshot = cache.name, "Snapshot refresher stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn status(&self) -> SnapshotStatus {
        SnapshotStatus {
            name: self.name,
            rows: self.current.load().row_count(),
            generation: self.generation.load(Ordering::SeqCst),
            refreshed_at: self.refreshed_at.load(Ordering::Relaxed),
        }
    }
}

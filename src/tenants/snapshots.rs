//! The four tenant snapshots as one unit: initial load, periodic refresh,
//! on-demand reload.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::snapshot::{Snapshot, SnapshotCache, SnapshotStatus};
use crate::store::{SnapshotSource, StoreError, TenantSource};
use crate::tenants::directory::{AliasCache, DomainCache, TenantDirectory};
use crate::tenants::posts::{PostCache, PostOverrideResolver};
use crate::tenants::static_files::{FileCache, StaticFileResolver};

/// Result of refreshing one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub snapshot: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshOutcome {
    fn from_result(snapshot: &'static str, result: Result<usize, StoreError>) -> Self {
        match result {
            Ok(rows) => Self {
                snapshot,
                rows: Some(rows),
                error: None,
            },
            Err(e) => Self {
                snapshot,
                rows: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Shared handles to the domain, alias, file and post snapshots.
#[derive(Clone)]
pub struct TenantSnapshots {
    pub domains: Arc<DomainCache>,
    pub aliases: Arc<AliasCache>,
    pub files: Arc<FileCache>,
    pub posts: Arc<PostCache>,
}

impl TenantSnapshots {
    pub fn new() -> Self {
        Self {
            domains: Arc::new(SnapshotCache::new("domains")),
            aliases: Arc::new(SnapshotCache::new("aliases")),
            files: Arc::new(SnapshotCache::new("files")),
            posts: Arc::new(SnapshotCache::new("posts")),
        }
    }

    pub fn directory(&self) -> TenantDirectory {
        TenantDirectory::new(Arc::clone(&self.domains), Arc::clone(&self.aliases))
    }

    pub fn static_files(&self) -> StaticFileResolver {
        StaticFileResolver::new(Arc::clone(&self.files))
    }

    pub fn post_overrides(&self) -> PostOverrideResolver {
        PostOverrideResolver::new(Arc::clone(&self.posts))
    }

    pub fn statuses(&self) -> Vec<SnapshotStatus> {
        vec![
            self.domains.status(),
            self.aliases.status(),
            self.files.status(),
            self.posts.status(),
        ]
    }

    /// First load before the listener opens.
    ///
    /// Domains and aliases are required: without them no request can be
    /// served. File and post failures are logged and those snapshots start
    /// empty until a later refresh succeeds.
    pub async fn load_initial<Src: TenantSource>(&self, source: &Src) -> Result<(), StoreError> {
        let domains = self.domains.refresh(source).await?;
        let aliases = self.aliases.refresh(source).await?;

        let files = self.files.refresh(source).await;
        let posts = self.posts.refresh(source).await;
        for (name, result) in [("files", &files), ("posts", &posts)] {
            if let Err(e) = result {
                tracing::warn!(snapshot = name, error = %e, "Starting with empty snapshot");
            }
        }

        tracing::info!(
            domains,
            aliases,
            files = files.unwrap_or(0),
            posts = posts.unwrap_or(0),
            "Tenant snapshots loaded"
        );
        Ok(())
    }

    /// Refresh every snapshot once. Each one succeeds or fails on its own.
    pub async fn refresh_all<Src: TenantSource>(&self, source: &Src) -> Vec<RefreshOutcome> {
        vec![
            RefreshOutcome::from_result("domains", self.domains.refresh(source).await),
            RefreshOutcome::from_result("aliases", self.aliases.refresh(source).await),
            RefreshOutcome::from_result("files", self.files.refresh(source).await),
            RefreshOutcome::from_result("posts", self.posts.refresh(source).await),
        ]
    }

    /// One refresh loop per snapshot, all stopped by `shutdown`.
    pub fn spawn_refreshers<Src: TenantSource>(
        &self,
        source: Arc<Src>,
        interval: Duration,
        shutdown: &Shutdown,
    ) -> Vec<JoinHandle<()>> {
        vec![
            spawn_one(&self.domains, &source, interval, shutdown),
            spawn_one(&self.aliases, &source, interval, shutdown),
            spawn_one(&self.files, &source, interval, shutdown),
            spawn_one(&self.posts, &source, interval, shutdown),
        ]
    }
}

impl Default for TenantSnapshots {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_one<S, Src>(
    cache: &Arc<SnapshotCache<S>>,
    source: &Arc<Src>,
    interval: Duration,
    shutdown: &Shutdown,
) -> JoinHandle<()>
where
    S: Snapshot,
    Src: SnapshotSource<S::Row>,
{
    cache.spawn_refresh(Arc::clone(source), interval, shutdown.subscribe())
}

/// Type-erased "refresh everything now", used by the admin API.
pub trait Reload: Send + Sync {
    fn reload(&self) -> Pin<Box<dyn Future<Output = Vec<RefreshOutcome>> + Send + '_>>;
}

/// Binds a snapshot set to the store it refreshes from.
pub struct SourceReload<Src> {
    snapshots: TenantSnapshots,
    source: Arc<Src>,
}

impl<Src: TenantSource> SourceReload<Src> {
    pub fn new(snapshots: TenantSnapshots, source: Arc<Src>) -> Self {
        Self { snapshots, source }
    }
}

impl<Src: TenantSource> Reload for SourceReload<Src> {
    fn reload(&self) -> Pin<Box<dyn Future<Output = Vec<RefreshOutcome>> + Send + '_>> {
        Box::pin(async move { self.snapshots.refresh_all(self.source.as_ref()).await })
    }
}

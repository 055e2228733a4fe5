//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the tenant store selected by configuration
//! - Load the tenant snapshots before accepting traffic
//! - Start background tasks (snapshot refreshers, metrics, admin API)
//! - Bind the gateway listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: a store that cannot be opened, or a failed first load of
//!   domains or aliases, is fatal
//! - Subsystems initialize in order, not concurrently
//! - The gateway listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{GatewayConfig, StoreKind};
use crate::http::GatewayServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store::{MemoryStore, MySqlStore, StoreError, TenantSource};
use crate::tenants::{SourceReload, TenantSnapshots};

/// Fatal startup or serve error.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("tenant store: {0}")]
    Store(#[from] StoreError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::trigger_on_signal(shutdown.clone());

    match config.store.kind {
        StoreKind::Mysql => {
            let store = MySqlStore::connect(&config.store.database_url, config.store.max_connections).await?;
            tracing::info!(max_connections = config.store.max_connections, "Connected to MySQL");
            serve(config, Arc::new(store), shutdown).await
        }
        StoreKind::Fixture => {
            let store = MemoryStore::from_file(Path::new(&config.store.fixture_path))?;
            serve(config, Arc::new(store), shutdown).await
        }
    }
}

/// Load snapshots from `source`, start every listener and block until
/// `shutdown` fires.
pub async fn serve<Src: TenantSource>(
    config: GatewayConfig,
    source: Arc<Src>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let snapshots = TenantSnapshots::new();
    snapshots.load_initial(source.as_ref()).await?;

    let interval = Duration::from_secs(config.refresh.interval_secs);
    let refreshers = snapshots.spawn_refreshers(Arc::clone(&source), interval, &shutdown);

    if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let state = AdminState {
            snapshots: snapshots.clone(),
            reload: Arc::new(SourceReload::new(snapshots.clone(), Arc::clone(&source))),
            api_key: Arc::from(config.admin.api_key.as_str()),
            export_service: Arc::from(config.admin.export_service.as_str()),
            started_at: Instant::now(),
        };
        let router = setup_admin_router(state);
        let stop = shutdown.wait();
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        });
    }

    let server = GatewayServer::new(&config, &snapshots);
    let listener = bind(&config.listener.bind_address).await?;
    let result = server.run(listener, shutdown.subscribe()).await;

    // Refreshers and the admin API stop even when the server exited by itself.
    shutdown.trigger();
    for handle in refreshers {
        let _ = handle.await;
    }
    tracing::info!("Shutdown complete");

    result.map_err(StartupError::Serve)
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_conflict_names_address() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let err = bind(&address).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
        assert!(err.to_string().starts_with(&format!("cannot bind {}", address)));
    }

    #[test]
    fn test_store_error_converts() {
        let err: StartupError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.to_string(), "tenant store: store unavailable: down");
    }
}

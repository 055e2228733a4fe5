//! Admin API.
//!
//! Served on its own listener, behind a bearer key.
//!
//! | Route                 | Purpose                                     |
//! |-----------------------|---------------------------------------------|
//! | `GET /admin/status`   | version and uptime                          |
//! | `GET /admin/snapshots`| rows, generation, last refresh per snapshot |
//! | `POST /admin/reload`  | refresh every snapshot now                  |
//! | `GET /admin/traefik`  | load balancer routing config for all tenants|

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::tenants::{Reload, TenantSnapshots};

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub snapshots: TenantSnapshots,
    pub reload: Arc<dyn Reload>,
    pub api_key: Arc<str>,
    pub export_service: Arc<str>,
    pub started_at: Instant,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/snapshots", get(get_snapshots))
        .route("/admin/reload", post(post_reload))
        .route("/admin/traefik", get(get_traefik))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

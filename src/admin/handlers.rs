use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::snapshot::SnapshotStatus;
use crate::tenants::export::traefik_config;
use crate::tenants::RefreshOutcome;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub domains: usize,
}

#[derive(Serialize)]
pub struct ReloadReport {
    pub ok: bool,
    pub snapshots: Vec<RefreshOutcome>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        domains: state.snapshots.domains.load().len(),
    })
}

pub async fn get_snapshots(State(state): State<AdminState>) -> Json<Vec<SnapshotStatus>> {
    Json(state.snapshots.statuses())
}

pub async fn post_reload(State(state): State<AdminState>) -> Json<ReloadReport> {
    let snapshots = state.reload.reload().await;
    let ok = snapshots.iter().all(RefreshOutcome::is_ok);
    tracing::info!(ok, "Snapshots reloaded from admin API");
    Json(ReloadReport { ok, snapshots })
}

pub async fn get_traefik(State(state): State<AdminState>) -> impl IntoResponse {
    let domains = state.snapshots.directory().all();
    (
        [(header::CONTENT_TYPE, "text/yaml; charset=utf-8")],
        traefik_config(&domains, &state.export_service),
    )
}

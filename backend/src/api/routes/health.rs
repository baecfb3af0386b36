//! GET /api/health

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::server::SharedAppState;
use crate::audit::AuditStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub audit: AuditStats,
}

pub async fn handle_health(State(state): State<SharedAppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "ecotrace-api",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        audit: state.ledger.audit().stats(),
    })
}

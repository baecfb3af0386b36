//! Deposit endpoints
//!
//! - POST /api/deposit - Credit a deposit (rate limited)
//! - GET /api/report - Environmental impact per material

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use std::net::SocketAddr;

use crate::api::error::ApiError;
use crate::api::server::SharedAppState;
use crate::types::{DepositRequest, DepositResponse, ImpactReportRow};

/// POST /api/deposit
///
/// Evidence, weight and material checks belong to the ledger so that
/// rejected deposits still produce an audit entry.
pub async fn handle_deposit(
    State(state): State<SharedAppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    let source = state.proxy.client_address(&headers, connect_info.as_ref());
    let receipt = state.ledger.record_deposit(req, source).await?;

    Ok(Json(DepositResponse {
        message: "Deposit recorded".to_string(),
        receipt,
    }))
}

/// GET /api/report
pub async fn handle_report(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<ImpactReportRow>>, ApiError> {
    Ok(Json(state.ledger.impact_report().await?))
}

//! Account endpoints
//!
//! - POST /api/login - Resolve a user by email
//! - GET /api/user/:id - Current balance for a user
//! - GET /api/materials - Material catalogue

use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::error::ApiError;
use crate::api::middleware::validate_email;
use crate::api::server::SharedAppState;
use crate::common::logging::log_security_event;
use crate::types::{LoginRequest, Material, User};

/// POST /api/login
///
/// Identification only; there is no password.
pub async fn handle_login(
    State(state): State<SharedAppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<User>, ApiError> {
    validate_email(&req.email).into_result()?;

    match state.ledger.login(&req.email).await {
        Ok(user) => {
            log_security_event(
                "login",
                true,
                serde_json::json!({ "user_id": user.id }),
                None,
            );
            Ok(Json(user))
        }
        Err(e) => {
            log_security_event(
                "login",
                false,
                serde_json::json!({ "reason": e.to_string() }),
                None,
            );
            Err(e.into())
        }
    }
}

/// GET /api/user/:id
pub async fn handle_get_user(
    State(state): State<SharedAppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.ledger.user(id).await?))
}

/// GET /api/materials
pub async fn handle_materials(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<Material>>, ApiError> {
    Ok(Json(state.ledger.materials().await?))
}

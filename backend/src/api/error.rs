//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;

/// JSON error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid request")]
    Validation(Vec<String>),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: u64 },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Ledger(e) => match e {
                LedgerError::UnknownEmail(_)
                | LedgerError::UserNotFound(_)
                | LedgerError::MaterialNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::InvalidWeight(_) | LedgerError::InvalidEvidence(_) => {
                    StatusCode::BAD_REQUEST
                }
                LedgerError::DuplicateEvidence(_) => StatusCode::CONFLICT,
                LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Ledger(e) => match e {
                LedgerError::UnknownEmail(_)
                | LedgerError::UserNotFound(_)
                | LedgerError::MaterialNotFound(_) => "NOT_FOUND",
                LedgerError::InvalidWeight(_) | LedgerError::InvalidEvidence(_) => {
                    "VALIDATION_ERROR"
                }
                LedgerError::DuplicateEvidence(_) => "DUPLICATE_EVIDENCE",
                LedgerError::Storage(_) => "SERVER_ERROR",
            },
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let body = match self {
            // Storage details stay in the server log
            ApiError::Ledger(LedgerError::Storage(e)) => {
                tracing::error!(target: "ecotrace::api", error = %e, "Storage failure");
                ErrorBody {
                    error: "Internal server error".to_string(),
                    code,
                    details: vec![],
                    retry_after: None,
                }
            }
            ApiError::Validation(details) => ErrorBody {
                error: "Invalid request".to_string(),
                code,
                details,
                retry_after: None,
            },
            ApiError::RateLimited { retry_after } => ErrorBody {
                error: "Rate limit exceeded".to_string(),
                code,
                details: vec![],
                retry_after: Some(retry_after),
            },
            ApiError::Ledger(e) => ErrorBody {
                error: e.to_string(),
                code,
                details: vec![],
                retry_after: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(LedgerError::UnknownEmail("x@y.z".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LedgerError::InvalidWeight("0".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::DuplicateEvidence("123".to_string())).code(),
            "DUPLICATE_EVIDENCE"
        );
        assert_eq!(
            ApiError::from(LedgerError::Storage(StorageError::Database("locked".to_string())))
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::RateLimited { retry_after: 10 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}

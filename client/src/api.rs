//! EcoTrace API client
//!
//! [`LedgerApi`] is the seam between the deposit workflow and the server;
//! [`HttpLedgerApi`] implements it over reqwest.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::error::ClientError;
use crate::types::{DepositRequest, DepositResponse, ErrorBody, ImpactReportRow, Material, User};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected ({status}, {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<ApiClientError> for ClientError {
    fn from(e: ApiClientError) -> Self {
        match e {
            ApiClientError::NotFound(what) => ClientError::UserNotFound(what),
            other => ClientError::ServerError(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiClientError::Decode(e.to_string())
        } else {
            ApiClientError::Transport(e.to_string())
        }
    }
}

/// Remote ledger operations used by the client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn login(&self, email: &str) -> Result<User, ApiClientError>;

    async fn materials(&self) -> Result<Vec<Material>, ApiClientError>;

    /// Authoritative user record, including the current balance
    async fn user(&self, id: i64) -> Result<User, ApiClientError>;

    async fn deposit(&self, request: &DepositRequest) -> Result<DepositResponse, ApiClientError>;

    async fn report(&self) -> Result<Vec<ImpactReportRow>, ApiClientError>;
}

/// reqwest-backed API client
pub struct HttpLedgerApi {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpLedgerApi {
    pub fn new(base_url: &str) -> Result<Self, ApiClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ApiClientError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text).ok();

        if status == StatusCode::NOT_FOUND {
            let message = body.map(|b| b.error).unwrap_or(text);
            return Err(ApiClientError::NotFound(message));
        }

        Err(match body {
            Some(body) => ApiClientError::Rejected {
                status: status.as_u16(),
                code: body.code,
                message: body.error,
            },
            None => ApiClientError::Rejected {
                status: status.as_u16(),
                code: "UNKNOWN".to_string(),
                message: text,
            },
        })
    }
}

#[async_trait]
impl LedgerApi for HttpLedgerApi {
    async fn login(&self, email: &str) -> Result<User, ApiClientError> {
        let response = self
            .http_client
            .post(self.url("/api/login"))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        Self::read(response).await
    }

    async fn materials(&self) -> Result<Vec<Material>, ApiClientError> {
        let response = self.http_client.get(self.url("/api/materials")).send().await?;
        Self::read(response).await
    }

    async fn user(&self, id: i64) -> Result<User, ApiClientError> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/user/{}", id)))
            .send()
            .await?;
        Self::read(response).await
    }

    async fn deposit(&self, request: &DepositRequest) -> Result<DepositResponse, ApiClientError> {
        let response = self
            .http_client
            .post(self.url("/api/deposit"))
            .json(request)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn report(&self) -> Result<Vec<ImpactReportRow>, ApiClientError> {
        let response = self.http_client.get(self.url("/api/report")).send().await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let api = HttpLedgerApi::new("http://localhost:4000/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:4000");
        assert_eq!(api.url("/api/report"), "http://localhost:4000/api/report");
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ClientError::from(ApiClientError::NotFound("User not found".to_string())),
            ClientError::UserNotFound("User not found".to_string())
        );
        assert!(matches!(
            ClientError::from(ApiClientError::Transport("refused".to_string())),
            ClientError::ServerError(_)
        ));
    }
}

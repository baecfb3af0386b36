//! Audit log entries
//!
//! Append-only event documents written to the secondary store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of audited event. Wire names match the historical log collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    #[serde(rename = "DEPOSITO_EXITOSO")]
    DepositSucceeded,
    #[serde(rename = "ERROR_TRANSACCION")]
    TransactionFailed,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepositSucceeded => "DEPOSITO_EXITOSO",
            Self::TransactionFailed => "ERROR_TRANSACCION",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSITO_EXITOSO" => Ok(Self::DepositSucceeded),
            "ERROR_TRANSACCION" => Ok(Self::TransactionFailed),
            _ => Err(format!("unknown audit event: {}", s)),
        }
    }
}

/// A single audit document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub event: AuditEvent,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<i64>,
    /// Address of the client that made the request
    pub source_address: Option<String>,
    /// Free-form event details
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    pub fn new(event: AuditEvent, user_id: Option<i64>, details: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            user_id,
            source_address: None,
            details,
        }
    }

    pub fn with_source(mut self, source_address: Option<String>) -> Self {
        self.source_address = source_address;
        self
    }
}

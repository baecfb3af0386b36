//! Ledger Service
//!
//! Credits deposits to user balances and reports every attempt to the audit
//! log. The ledger write always completes (or fails) before the audit entry
//! is enqueued, and the audit write can never undo it.

use std::sync::Arc;
use thiserror::Error;

use crate::audit::AuditLogger;
use crate::common::logging::log_deposit_event;
use crate::storage::{LedgerStore, StorageError};
use crate::types::{
    AuditEvent, AuditLogEntry, DepositReceipt, DepositRequest, ImpactReportRow, Material,
    NewDeposit, User,
};

const MAX_BRAND_LEN: usize = 120;
const MAX_BARCODE_LEN: usize = 64;
const MAX_FINGERPRINT_LEN: usize = 255;

/// Deposit validation rules
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Largest weight accepted for one deposit
    pub max_weight_kg: f64,
    /// Reject barcodes or photo fingerprints already present in stored deposits
    pub reject_reused_evidence: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_weight_kg: 50.0,
            reject_reused_evidence: false,
        }
    }
}

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No user registered with email {0}")]
    UnknownEmail(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Material not found: {0}")]
    MaterialNotFound(i64),

    #[error("Invalid weight: {0}")]
    InvalidWeight(String),

    #[error("Invalid evidence: {0}")]
    InvalidEvidence(String),

    #[error("Evidence already used in a previous deposit: {0}")]
    DuplicateEvidence(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for LedgerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UserNotFound(id) => LedgerError::UserNotFound(id),
            StorageError::MaterialNotFound(id) => LedgerError::MaterialNotFound(id),
            other => LedgerError::Storage(other),
        }
    }
}

/// Points ledger
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    audit: AuditLogger,
    config: LedgerConfig,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: AuditLogger, config: LedgerConfig) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Look up a user by login email
    pub async fn login(&self, email: &str) -> Result<User, LedgerError> {
        self.store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| LedgerError::UnknownEmail(email.trim().to_string()))
    }

    pub async fn user(&self, id: i64) -> Result<User, LedgerError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(LedgerError::UserNotFound(id))
    }

    pub async fn materials(&self) -> Result<Vec<Material>, LedgerError> {
        Ok(self.store.list_materials().await?)
    }

    pub async fn impact_report(&self) -> Result<Vec<ImpactReportRow>, LedgerError> {
        Ok(self.store.impact_report().await?)
    }

    /// Credit a deposit and audit the outcome
    ///
    /// On success a `DEPOSITO_EXITOSO` entry is enqueued after the ledger
    /// transaction committed; on any failure an `ERROR_TRANSACCION` entry is
    /// enqueued instead. Neither enqueue can fail the call.
    pub async fn record_deposit(
        &self,
        request: DepositRequest,
        source_address: Option<String>,
    ) -> Result<DepositReceipt, LedgerError> {
        let outcome = self.credit(&request).await;

        let entry = match &outcome {
            Ok(receipt) => {
                log_deposit_event(
                    "deposit_credited",
                    request.user_id,
                    request.material_id,
                    request.weight_kg,
                    Some(receipt.points_awarded),
                    None,
                );

                let details = request.details.clone().unwrap_or_default();
                AuditLogEntry::new(
                    AuditEvent::DepositSucceeded,
                    Some(request.user_id),
                    serde_json::json!({
                        "deposit_id": receipt.deposit_id,
                        "material": request.material_id,
                        "weight_kg": request.weight_kg,
                        "points": receipt.points_awarded,
                        "brand": details.brand,
                        "barcode": details.barcode,
                        "photo_fingerprint": details.photo_fingerprint,
                    }),
                )
            }
            Err(e) => {
                log_deposit_event(
                    "deposit_failed",
                    request.user_id,
                    request.material_id,
                    request.weight_kg,
                    None,
                    Some(&e.to_string()),
                );

                AuditLogEntry::new(
                    AuditEvent::TransactionFailed,
                    Some(request.user_id),
                    serde_json::json!({
                        "error": e.to_string(),
                        "material": request.material_id,
                        "weight_kg": request.weight_kg,
                    }),
                )
            }
        };

        self.audit.record(entry.with_source(source_address));
        outcome
    }

    async fn credit(&self, request: &DepositRequest) -> Result<DepositReceipt, LedgerError> {
        self.validate_weight(request.weight_kg)?;
        if let Some(details) = &request.details {
            validate_evidence(&details.brand, "brand", MAX_BRAND_LEN)?;
            validate_evidence(&details.barcode, "barcode", MAX_BARCODE_LEN)?;
            validate_evidence(
                &details.photo_fingerprint,
                "photo_fingerprint",
                MAX_FINGERPRINT_LEN,
            )?;
        }

        if self.config.reject_reused_evidence
            && self
                .store
                .evidence_used(request.barcode(), request.photo_fingerprint())
                .await?
        {
            let evidence = request
                .barcode()
                .or(request.photo_fingerprint())
                .unwrap_or_default()
                .to_string();
            return Err(LedgerError::DuplicateEvidence(evidence));
        }

        let (record, user) = self
            .store
            .record_deposit(&NewDeposit::from(request.clone()))
            .await?;

        Ok(DepositReceipt {
            deposit_id: record.id,
            user_id: user.id,
            points_awarded: record.points_awarded,
            balance: user.points,
        })
    }

    fn validate_weight(&self, weight_kg: f64) -> Result<(), LedgerError> {
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(LedgerError::InvalidWeight(
                "weight must be greater than 0 kg".to_string(),
            ));
        }

        if weight_kg > self.config.max_weight_kg {
            return Err(LedgerError::InvalidWeight(format!(
                "weight must not exceed {} kg",
                self.config.max_weight_kg
            )));
        }

        Ok(())
    }
}

/// Reject over-long evidence strings and embedded control characters
fn validate_evidence(value: &str, field_name: &str, max_len: usize) -> Result<(), LedgerError> {
    if value.chars().count() > max_len {
        return Err(LedgerError::InvalidEvidence(format!(
            "{} must not exceed {} characters",
            field_name, max_len
        )));
    }

    if value.chars().any(|c| c.is_control()) {
        return Err(LedgerError::InvalidEvidence(format!(
            "{} contains control characters",
            field_name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryAuditStore, MemoryLedgerStore};
    use crate::types::{DepositDetails, NewMaterial, NewUser};

    struct Fixture {
        ledger: LedgerService,
        store: MemoryLedgerStore,
        audit_store: MemoryAuditStore,
        user: User,
        material: Material,
    }

    async fn fixture(config: LedgerConfig) -> Fixture {
        let store = MemoryLedgerStore::new();
        let audit_store = MemoryAuditStore::new();
        let (audit, _worker) = AuditLogger::start(Arc::new(audit_store.clone()));

        let user = store
            .insert_user(&NewUser {
                name: "Ana".to_string(),
                email: "ana@campus.edu".to_string(),
                points: 0,
            })
            .await
            .unwrap();
        let material = store
            .insert_material(&NewMaterial {
                name: "PET".to_string(),
                points_per_kg: 100.0,
            })
            .await
            .unwrap();

        Fixture {
            ledger: LedgerService::new(Arc::new(store.clone()), audit, config),
            store,
            audit_store,
            user,
            material,
        }
    }

    fn request(f: &Fixture, weight_kg: f64) -> DepositRequest {
        DepositRequest {
            user_id: f.user.id,
            material_id: f.material.id,
            weight_kg,
            details: Some(DepositDetails {
                brand: "Acme".to_string(),
                barcode: "7501055300075".to_string(),
                photo_fingerprint: "IMG_0001.jpg-348211".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_successful_deposit_is_audited_once() {
        let f = fixture(LedgerConfig::default()).await;

        let receipt = f
            .ledger
            .record_deposit(request(&f, 0.05), Some("10.0.0.8".to_string()))
            .await
            .unwrap();
        f.ledger.audit().flush().await;

        assert_eq!(receipt.points_awarded, 5);
        assert_eq!(receipt.balance, 5);
        assert_eq!(f.ledger.user(f.user.id).await.unwrap().points, 5);

        let entries = f.audit_store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, AuditEvent::DepositSucceeded);
        assert_eq!(entries[0].source_address.as_deref(), Some("10.0.0.8"));
        assert_eq!(entries[0].details["barcode"], "7501055300075");
    }

    #[tokio::test]
    async fn test_failed_deposit_leaves_balance_and_audits_error() {
        let f = fixture(LedgerConfig::default()).await;
        let mut req = request(&f, 0.5);
        req.material_id = 99;

        let result = f.ledger.record_deposit(req, None).await;
        f.ledger.audit().flush().await;

        assert!(matches!(result, Err(LedgerError::MaterialNotFound(99))));
        assert_eq!(f.ledger.user(f.user.id).await.unwrap().points, 0);
        assert!(f.store.deposits_for_user(f.user.id).await.unwrap().is_empty());

        let entries = f.audit_store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, AuditEvent::TransactionFailed);
        assert!(entries[0].details["error"]
            .as_str()
            .unwrap()
            .contains("Material not found"));
    }

    #[tokio::test]
    async fn test_audit_outage_does_not_fail_deposit() {
        let f = fixture(LedgerConfig::default()).await;
        f.audit_store.set_unavailable(true);

        let receipt = f.ledger.record_deposit(request(&f, 1.0), None).await.unwrap();
        f.ledger.audit().flush().await;

        assert_eq!(receipt.balance, 100);
        assert_eq!(f.ledger.audit().stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_weight_validation() {
        let f = fixture(LedgerConfig::default()).await;

        for weight in [0.0, -1.0, f64::NAN, 50.5] {
            let result = f.ledger.record_deposit(request(&f, weight), None).await;
            assert!(matches!(result, Err(LedgerError::InvalidWeight(_))), "weight {weight}");
        }
        assert!(f.ledger.record_deposit(request(&f, 50.0), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_evidence_is_audited() {
        let f = fixture(LedgerConfig::default()).await;

        let mut long_barcode = request(&f, 0.5);
        if let Some(details) = long_barcode.details.as_mut() {
            details.barcode = "9".repeat(65);
        }
        let mut control_brand = request(&f, 0.5);
        if let Some(details) = control_brand.details.as_mut() {
            details.brand = "Ac\u{0}me".to_string();
        }

        for req in [long_barcode, control_brand] {
            let result = f.ledger.record_deposit(req, Some("10.0.0.8".to_string())).await;
            assert!(matches!(result, Err(LedgerError::InvalidEvidence(_))));
        }
        f.ledger.audit().flush().await;

        assert_eq!(f.ledger.user(f.user.id).await.unwrap().points, 0);
        let entries = f.audit_store.entries().await;
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.event == AuditEvent::TransactionFailed));
        assert!(entries[0].details["error"]
            .as_str()
            .unwrap()
            .contains("barcode must not exceed 64"));
        assert!(entries[1].details["error"]
            .as_str()
            .unwrap()
            .contains("brand contains control characters"));
    }

    #[tokio::test]
    async fn test_reused_evidence_allowed_by_default() {
        let f = fixture(LedgerConfig::default()).await;

        f.ledger.record_deposit(request(&f, 0.1), None).await.unwrap();
        f.ledger.record_deposit(request(&f, 0.1), None).await.unwrap();

        assert_eq!(f.store.deposits_for_user(f.user.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reused_evidence_rejected_when_enabled() {
        let f = fixture(LedgerConfig {
            reject_reused_evidence: true,
            ..LedgerConfig::default()
        })
        .await;

        f.ledger.record_deposit(request(&f, 0.1), None).await.unwrap();
        let second = f.ledger.record_deposit(request(&f, 0.1), None).await;

        assert!(matches!(second, Err(LedgerError::DuplicateEvidence(_))));
        assert_eq!(f.ledger.user(f.user.id).await.unwrap().points, 10);
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let f = fixture(LedgerConfig::default()).await;

        assert_eq!(f.ledger.login("ANA@campus.edu").await.unwrap().id, f.user.id);
        assert!(matches!(
            f.ledger.login("nobody@campus.edu").await,
            Err(LedgerError::UnknownEmail(_))
        ));
    }
}

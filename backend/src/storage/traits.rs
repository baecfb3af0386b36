//! Storage Trait Definitions
//!
//! Abstract interfaces for the two stores the backend writes to:
//! - the ledger (users, materials, deposits) which must be transactional
//! - the audit log, an append-only document store
//!
//! Implementations use SQLite (production) or in-memory maps (testing).

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    AuditLogEntry, DepositRecord, ImpactReportRow, Material, NewDeposit, NewMaterial, NewUser,
    User,
};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Material not found: {0}")]
    MaterialNotFound(i64),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Ledger storage interface
///
/// Implementations:
/// - `SqliteLedgerStore` - Production storage with SQLite
/// - `MemoryLedgerStore` - In-memory storage for testing
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Register a user. Emails are unique, compared case-insensitively.
    async fn insert_user(&self, user: &NewUser) -> StorageResult<User>;

    /// Add a material to the lookup table
    async fn insert_material(&self, material: &NewMaterial) -> StorageResult<Material>;

    /// Look up a user by email (login)
    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    /// Get a user by ID
    async fn get_user(&self, id: i64) -> StorageResult<Option<User>>;

    /// All materials ordered by ID
    async fn list_materials(&self) -> StorageResult<Vec<Material>>;

    /// Whether a stored deposit already carries this barcode or photo fingerprint
    async fn evidence_used(
        &self,
        barcode: Option<&str>,
        photo_fingerprint: Option<&str>,
    ) -> StorageResult<bool>;

    /// Credit a deposit as one atomic unit.
    ///
    /// Validates that user and material exist, computes the points, increments
    /// the balance and inserts the record. On any error neither the balance
    /// nor the deposit table is changed. Returns the record and updated user.
    async fn record_deposit(&self, deposit: &NewDeposit) -> StorageResult<(DepositRecord, User)>;

    /// Deposits made by a user, oldest first
    async fn deposits_for_user(&self, user_id: i64) -> StorageResult<Vec<DepositRecord>>;

    /// Per-material totals, ordered by material ID
    async fn impact_report(&self) -> StorageResult<Vec<ImpactReportRow>>;
}

/// Audit log storage interface
///
/// Implementations:
/// - `SqliteAuditStore` - Production storage with SQLite, details kept as JSON
/// - `MemoryAuditStore` - In-memory storage for testing
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an entry
    async fn append(&self, entry: &AuditLogEntry) -> StorageResult<()>;

    /// Most recent entries, newest first
    async fn recent(&self, limit: usize) -> StorageResult<Vec<AuditLogEntry>>;
}

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

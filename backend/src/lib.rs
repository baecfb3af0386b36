//! EcoTrace Backend
//!
//! Points ledger and audit trail for a recycling-incentive program.
//!
//! ## Components
//!
//! 1. **Ledger** - Users, materials, atomic deposit crediting, impact report
//! 2. **Audit Logger** - Fire-and-forget audit trail, isolated from the ledger
//! 3. **REST API** - Axum server consumed by the scan client
//!
//! The ledger and the audit log live in separate databases; a failure of the
//! audit side never affects a committed deposit.

pub mod api;
pub mod audit;
pub mod common;
pub mod ledger;
pub mod seed;
pub mod storage;
pub mod types;

// Re-exports: infrastructure
pub use common::{ConfigError, EcoTraceConfig, EcoTraceError, Result};

// Re-exports: services
pub use audit::{AuditLogger, AuditStats};
pub use ledger::{LedgerConfig, LedgerError, LedgerService};

// Re-exports: storage
pub use storage::{
    AuditStore, LedgerStore, MemoryAuditStore, MemoryLedgerStore, SqliteAuditStore,
    SqliteLedgerStore, StorageError,
};

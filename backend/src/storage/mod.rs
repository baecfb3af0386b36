//! Storage Layer Module
//!
//! Provides persistence for the ledger and the audit log.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementations for production
//! - In-memory implementations for testing

pub mod memory;
pub mod sqlite;
pub mod sqlite_audit;
pub mod traits;

// Re-exports for convenience
pub use memory::{MemoryAuditStore, MemoryLedgerStore};
pub use sqlite::SqliteLedgerStore;
pub use sqlite_audit::SqliteAuditStore;
pub use traits::{AuditStore, LedgerStore, StorageError, StorageResult};

//! Domain Types
//!
//! - user: users, materials and seed inputs
//! - deposit: deposit request/record/receipt and the impact report
//! - audit: audit log documents

pub mod audit;
pub mod deposit;
pub mod user;

pub use audit::{AuditEvent, AuditLogEntry};
pub use deposit::{
    DepositDetails, DepositReceipt, DepositRecord, DepositRequest, DepositResponse,
    ImpactReportRow, NewDeposit,
};
pub use user::{LoginRequest, Material, NewMaterial, NewUser, User};

//! API Routes Module
//!
//! Route handlers organized by concern:
//! - accounts: login, user lookup, material catalogue
//! - deposits: deposit submission and the impact report
//! - health: liveness and audit pipeline counters

pub mod accounts;
pub mod deposits;
pub mod health;

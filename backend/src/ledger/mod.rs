//! Ledger Module
//!
//! Authoritative store of point balances and deposit history.
//!
//! ```text
//! validate weight → (optional) evidence reuse check → atomic credit → audit entry
//! ```

pub mod service;

pub use service::{LedgerConfig, LedgerError, LedgerService};

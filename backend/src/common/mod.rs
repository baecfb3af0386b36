//! Common Infrastructure Module
//!
//! Shared utilities for the EcoTrace backend:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Root error type

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, CorsOrigins, EcoTraceConfig, Environment};
pub use error::{EcoTraceError, Result};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_api_request, log_api_response,
    log_deposit_event, log_security_event, EventCategory, LogEvent, LogLevel, LoggingError,
};

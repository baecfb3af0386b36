//! Environment-based Configuration for the EcoTrace Backend
//!
//! All settings come from environment variables (optionally loaded from a
//! `.env` file by the binary). Every variable has a development default.
//!
//! # Environment Variables
//!
//! - `ECOTRACE_ENV` - "development" or "production" (default: "development")
//! - `ECOTRACE_API_PORT` - HTTP port (default: 4000)
//! - `ECOTRACE_LEDGER_DB` - SQLite path for users, materials and deposits
//! - `ECOTRACE_AUDIT_DB` - SQLite path for the audit log
//! - `ECOTRACE_MAX_WEIGHT_KG` - Largest weight accepted for a single deposit
//! - `ECOTRACE_REJECT_REUSED_EVIDENCE` - "1" to reject barcodes/photos already stored
//! - `ECOTRACE_CORS_ORIGINS` - Comma-separated origins, or "*"
//! - `ECOTRACE_RATE_LIMIT_PER_MIN` - Deposit requests per client per minute
//! - `ECOTRACE_TRUST_PROXY_HEADERS` - "1" to identify clients by
//!   `x-forwarded-for`/`x-real-ip` (only behind a reverse proxy; default: off)
//! - `ECOTRACE_LOG_LEVEL` - Logging level (debug, info, warn, error)

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::ledger::LedgerConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("wildcard CORS origin not allowed in {0}")]
    WildcardCorsNotAllowed(String),
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(
                "ECOTRACE_ENV".to_string(),
                format!("unknown environment: {}", s),
            )),
        }
    }
}

impl Environment {
    /// Production deployments log JSON for aggregation
    pub fn json_logs(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Allowed CORS origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl FromStr for CorsOrigins {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "*" {
            return Ok(CorsOrigins::Any);
        }

        let origins: Vec<String> = trimmed
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        if origins.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ECOTRACE_CORS_ORIGINS".to_string(),
                "no origins given".to_string(),
            ));
        }

        Ok(CorsOrigins::List(origins))
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct EcoTraceConfig {
    /// Deployment environment
    pub environment: Environment,

    /// HTTP listen port
    pub api_port: u16,

    /// Ledger database path
    pub ledger_db: String,

    /// Audit log database path
    pub audit_db: String,

    /// Deposit validation rules
    pub ledger: LedgerConfig,

    /// CORS origins
    pub cors_origins: CorsOrigins,

    /// Deposit requests allowed per client per minute
    pub rate_limit_per_min: u32,

    /// Identify clients by proxy headers instead of the socket peer
    pub trust_proxy_headers: bool,

    /// Log level
    pub log_level: String,
}

impl Default for EcoTraceConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            api_port: 4000,
            ledger_db: "data/ledger.db".to_string(),
            audit_db: "data/audit.db".to_string(),
            ledger: LedgerConfig::default(),
            cors_origins: CorsOrigins::Any,
            rate_limit_per_min: 30,
            trust_proxy_headers: false,
            log_level: "info".to_string(),
        }
    }
}

impl EcoTraceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let environment: Environment = match env::var("ECOTRACE_ENV") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.environment,
        };

        let api_port = parse_var("ECOTRACE_API_PORT", defaults.api_port)?;
        let ledger_db = env::var("ECOTRACE_LEDGER_DB").unwrap_or(defaults.ledger_db);
        let audit_db = env::var("ECOTRACE_AUDIT_DB").unwrap_or(defaults.audit_db);

        let max_weight_kg: f64 = parse_var("ECOTRACE_MAX_WEIGHT_KG", defaults.ledger.max_weight_kg)?;
        if !max_weight_kg.is_finite() || max_weight_kg <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "ECOTRACE_MAX_WEIGHT_KG".to_string(),
                "must be a positive number".to_string(),
            ));
        }

        let reject_reused_evidence = env::var("ECOTRACE_REJECT_REUSED_EVIDENCE")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.ledger.reject_reused_evidence);

        let cors_origins = match env::var("ECOTRACE_CORS_ORIGINS") {
            Ok(v) => v.parse()?,
            Err(_) if environment == Environment::Production => {
                return Err(ConfigError::MissingEnvVar("ECOTRACE_CORS_ORIGINS".to_string()))
            }
            Err(_) => defaults.cors_origins,
        };

        let rate_limit_per_min = parse_var("ECOTRACE_RATE_LIMIT_PER_MIN", defaults.rate_limit_per_min)?;
        let trust_proxy_headers = env::var("ECOTRACE_TRUST_PROXY_HEADERS")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.trust_proxy_headers);
        let log_level = env::var("ECOTRACE_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            environment,
            api_port,
            ledger_db,
            audit_db,
            ledger: LedgerConfig {
                max_weight_kg,
                reject_reused_evidence,
            },
            cors_origins,
            rate_limit_per_min,
            trust_proxy_headers,
            log_level,
        })
    }

    /// Validate configuration for production readiness
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Production && self.cors_origins == CorsOrigins::Any {
            return Err(ConfigError::WildcardCorsNotAllowed("production".to_string()));
        }

        Ok(())
    }

    /// Log a configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            target: "ecotrace::system",
            environment = ?self.environment,
            port = self.api_port,
            ledger_db = %self.ledger_db,
            audit_db = %self.audit_db,
            max_weight_kg = self.ledger.max_weight_kg,
            reject_reused_evidence = self.ledger.reject_reused_evidence,
            rate_limit_per_min = self.rate_limit_per_min,
            trust_proxy_headers = self.trust_proxy_headers,
            "Configuration loaded"
        );
    }
}

/// "1" or "true" (any case) enables a flag
fn parse_flag(raw: &str) -> bool {
    let raw = raw.trim();
    raw == "1" || raw.eq_ignore_ascii_case("true")
}

/// Parse an optional env var, falling back to `default` when unset
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

//! Client configuration
//!
//! Loaded from environment variables (optionally via `.env`):
//! - `ECOTRACE_API_URL` - API base URL (default `http://localhost:4000`)
//! - `ECOTRACE_PROXIMITY_M` - max distance to the bin in meters (default 20)
//! - `ECOTRACE_PROFILE` - `basic` or `extended` (default extended)
//! - `ECOTRACE_PHOTO_FINGERPRINT` - `name-size` or `content-hash` (default name-size)

use std::env;
use thiserror::Error;

use crate::fingerprint::FingerprintStrategy;
use crate::session::ScanProfile;

pub const DEFAULT_API_URL: &str = "http://localhost:4000";
pub const DEFAULT_PROXIMITY_M: f64 = 20.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings of the deposit workflow itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowConfig {
    pub profile: ScanProfile,
    /// A bin counts as nearby when the measured distance is at most this
    pub proximity_threshold_m: f64,
    pub fingerprint: FingerprintStrategy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            profile: ScanProfile::extended(),
            proximity_threshold_m: DEFAULT_PROXIMITY_M,
            fingerprint: FingerprintStrategy::NameAndSize,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub workflow: WorkflowConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("ECOTRACE_API_URL").unwrap_or(defaults.api_url);

        let proximity_threshold_m = match lookup("ECOTRACE_PROXIMITY_M") {
            Some(v) => parse_threshold(&v)?,
            None => defaults.workflow.proximity_threshold_m,
        };

        let profile = match lookup("ECOTRACE_PROFILE") {
            Some(v) => v
                .parse()
                .map_err(|e| ConfigError::InvalidValue("ECOTRACE_PROFILE".to_string(), e))?,
            None => defaults.workflow.profile,
        };

        let fingerprint = match lookup("ECOTRACE_PHOTO_FINGERPRINT") {
            Some(v) => v.parse().map_err(|e| {
                ConfigError::InvalidValue("ECOTRACE_PHOTO_FINGERPRINT".to_string(), e)
            })?,
            None => defaults.workflow.fingerprint,
        };

        Ok(Self {
            api_url,
            workflow: WorkflowConfig {
                profile,
                proximity_threshold_m,
                fingerprint,
            },
        })
    }
}

/// Parse a proximity threshold in meters
pub fn parse_threshold(value: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: &str| {
        ConfigError::InvalidValue("ECOTRACE_PROXIMITY_M".to_string(), reason.to_string())
    };

    let meters: f64 = value.trim().parse().map_err(|_| invalid("not a number"))?;
    if !meters.is_finite() || meters <= 0.0 {
        return Err(invalid("must be a positive number of meters"));
    }

    Ok(meters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.workflow.proximity_threshold_m, 20.0);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("ECOTRACE_API_URL", "https://eco.campus.edu"),
            ("ECOTRACE_PROXIMITY_M", "10"),
            ("ECOTRACE_PROFILE", "basic"),
            ("ECOTRACE_PHOTO_FINGERPRINT", "content-hash"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://eco.campus.edu");
        assert_eq!(config.workflow.proximity_threshold_m, 10.0);
        assert_eq!(config.workflow.profile, ScanProfile::basic());
        assert_eq!(config.workflow.fingerprint, FingerprintStrategy::ContentHash);
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("ECOTRACE_PROXIMITY_M", "-5"),
            ("ECOTRACE_PROXIMITY_M", "near"),
            ("ECOTRACE_PROXIMITY_M", "NaN"),
            ("ECOTRACE_PROXIMITY_M", "0"),
            ("ECOTRACE_PROFILE", "premium"),
            ("ECOTRACE_PHOTO_FINGERPRINT", "md5"),
        ] {
            assert!(
                ClientConfig::from_lookup(lookup(&[(key, value)])).is_err(),
                "{key}={value}"
            );
        }
    }
}

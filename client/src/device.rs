//! Device collaborators: geolocation and photo capture

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::error::ClientError;
use crate::geo::Coordinates;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeolocationError {
    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied")]
    PermissionDenied,
}

impl From<GeolocationError> for ClientError {
    fn from(e: GeolocationError) -> Self {
        match e {
            GeolocationError::Unavailable(reason) => ClientError::GeolocationUnavailable(reason),
            GeolocationError::PermissionDenied => ClientError::PermissionDenied,
        }
    }
}

/// Single-shot device position
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Geolocator reporting a position given up front (CLI `--lat/--lng`)
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator {
    position: Coordinates,
}

impl FixedGeolocator {
    pub fn new(position: Coordinates) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        if self.position.is_valid() {
            Ok(self.position)
        } else {
            Err(GeolocationError::Unavailable(format!(
                "invalid position {}, {}",
                self.position.lat, self.position.lng
            )))
        }
    }
}

/// A captured evidence photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoEvidence {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PhotoEvidence {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_geolocator() {
        let ok = FixedGeolocator::new(Coordinates::new(10.0, 20.0));
        assert_eq!(ok.current_position().await.unwrap(), Coordinates::new(10.0, 20.0));

        let bad = FixedGeolocator::new(Coordinates::new(120.0, 20.0));
        assert!(matches!(
            bad.current_position().await,
            Err(GeolocationError::Unavailable(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ClientError::from(GeolocationError::PermissionDenied),
            ClientError::PermissionDenied
        );
    }
}

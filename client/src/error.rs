//! Client error taxonomy
//!
//! Every error is surfaced to the user as a single notice; recovery is always
//! to try the failed step again.

use thiserror::Error;

use crate::form::RequiredField;
use crate::session::{ScanEvent, ScanState};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("material not found: {0}")]
    MaterialNotFound(String),

    #[error("invalid bin QR payload: {0}")]
    InvalidBeaconFormat(String),

    #[error("geolocation unavailable: {0}")]
    GeolocationUnavailable(String),

    #[error("geolocation permission denied")]
    PermissionDenied,

    #[error("bin is {distance_m:.1} m away (limit {threshold_m} m)")]
    OutOfRange { distance_m: f64, threshold_m: f64 },

    #[error("barcode already used this session: {0}")]
    DuplicateBarcode(String),

    #[error("photo already used this session: {0}")]
    DuplicatePhoto(String),

    #[error("missing required field: {0}")]
    ValidationIncomplete(RequiredField),

    #[error("invalid weight: {0}")]
    InvalidWeight(String),

    #[error("{event:?} is not allowed while {from:?}")]
    InvalidTransition { from: ScanState, event: ScanEvent },

    #[error("no user logged in")]
    NotLoggedIn,

    #[error("server error: {0}")]
    ServerError(String),
}

impl ClientError {
    /// Text shown to the user for this error
    pub fn user_message(&self) -> String {
        match self {
            ClientError::UserNotFound(_) => "User not found".to_string(),
            ClientError::MaterialNotFound(material) => {
                format!("Unknown material '{}'. Pick one from the list.", material)
            }
            ClientError::InvalidBeaconFormat(_) => "Invalid bin QR code".to_string(),
            ClientError::GeolocationUnavailable(_) => {
                "Location unavailable. Check your GPS.".to_string()
            }
            ClientError::PermissionDenied => {
                "Location permission denied. Enable it and try again.".to_string()
            }
            ClientError::OutOfRange { distance_m, .. } => {
                format!("You are too far from the bin ({} m). Move closer.", distance_m.round())
            }
            ClientError::DuplicateBarcode(_) => "This product was already scanned.".to_string(),
            ClientError::DuplicatePhoto(_) => "Duplicate photo. Take a new one.".to_string(),
            ClientError::ValidationIncomplete(field) => field.prompt().to_string(),
            ClientError::InvalidWeight(_) => "Enter a weight greater than 0 kg.".to_string(),
            ClientError::InvalidTransition { .. } => "That step is not available now.".to_string(),
            ClientError::NotLoggedIn => "Log in first.".to_string(),
            ClientError::ServerError(_) => "Could not save the deposit. Try again.".to_string(),
        }
    }
}

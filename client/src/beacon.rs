//! Bin beacon decoding
//!
//! Each bin carries a QR code whose payload is a JSON object with at least
//! numeric `lat` and `lng` fields. Extra fields are ignored.

use serde_json::Value;

use crate::error::ClientError;
use crate::geo::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinBeacon {
    pub location: Coordinates,
}

impl BinBeacon {
    pub fn parse(payload: &str) -> Result<Self, ClientError> {
        let value: Value = serde_json::from_str(payload.trim())
            .map_err(|e| ClientError::InvalidBeaconFormat(format!("not JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| ClientError::InvalidBeaconFormat("expected a JSON object".to_string()))?;

        let field = |name: &str| -> Result<f64, ClientError> {
            object
                .get(name)
                .and_then(Value::as_f64)
                .ok_or_else(|| ClientError::InvalidBeaconFormat(format!("missing numeric `{}`", name)))
        };

        let location = Coordinates::new(field("lat")?, field("lng")?);
        if !location.is_valid() {
            return Err(ClientError::InvalidBeaconFormat(format!(
                "coordinates out of range: {}, {}",
                location.lat, location.lng
            )));
        }

        Ok(Self { location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_payload() {
        let beacon = BinBeacon::parse(r#"{"lat": 19.4326, "lng": -99.1332, "bin": "B-12"}"#).unwrap();
        assert_eq!(beacon.location, Coordinates::new(19.4326, -99.1332));
    }

    #[test]
    fn test_zero_coordinates_accepted() {
        assert!(BinBeacon::parse(r#"{"lat": 0, "lng": 0}"#).is_ok());
    }

    #[test]
    fn test_rejected_payloads() {
        let payloads = [
            "",
            "B-12",
            "[19.4, -99.1]",
            r#"{"lat": 19.4}"#,
            r#"{"lat": "19.4", "lng": "-99.1"}"#,
            r#"{"lat": 91.0, "lng": 0.0}"#,
            r#"{"lat": 0.0, "lng": -180.5}"#,
        ];

        for payload in payloads {
            assert!(
                matches!(BinBeacon::parse(payload), Err(ClientError::InvalidBeaconFormat(_))),
                "payload {payload:?}"
            );
        }
    }
}

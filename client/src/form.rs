//! Deposit form and its completeness checks

use std::fmt;

use crate::error::ClientError;
use crate::session::{ScanProfile, ScanSession};
use crate::types::{DepositDetails, DepositRequest};

/// Fields checked before a deposit may be sent, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Material,
    Weight,
    Brand,
    Barcode,
    Photo,
}

impl RequiredField {
    pub fn prompt(&self) -> &'static str {
        match self {
            RequiredField::Material => "Select a material.",
            RequiredField::Weight => "Enter the weight.",
            RequiredField::Brand => "Enter the brand.",
            RequiredField::Barcode => "Scan the product barcode.",
            RequiredField::Photo => "Take the evidence photo.",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequiredField::Material => "material",
            RequiredField::Weight => "weight",
            RequiredField::Brand => "brand",
            RequiredField::Barcode => "barcode",
            RequiredField::Photo => "photo",
        };
        write!(f, "{}", name)
    }
}

/// User-entered values of the deposit form
///
/// Weight is kept as typed so a failed submission can be retried without
/// re-entering anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepositForm {
    pub material_id: Option<i64>,
    pub weight_input: String,
    pub brand: String,
}

impl DepositForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Build the request body, or report the first missing field
    ///
    /// Order: material, weight, brand (if required), barcode (if required),
    /// photo (if required).
    pub fn to_request(
        &self,
        user_id: i64,
        session: &ScanSession,
    ) -> Result<DepositRequest, ClientError> {
        let profile: ScanProfile = session.profile();

        let material_id = self
            .material_id
            .ok_or(ClientError::ValidationIncomplete(RequiredField::Material))?;

        let weight_kg = parse_weight(&self.weight_input)?;

        let brand = self.brand.trim();
        if profile.require_brand && brand.is_empty() {
            return Err(ClientError::ValidationIncomplete(RequiredField::Brand));
        }

        let barcode = session.barcode();
        if profile.require_product_scan && barcode.is_none() {
            return Err(ClientError::ValidationIncomplete(RequiredField::Barcode));
        }

        let photo = session.photo_fingerprint();
        if profile.require_photo_evidence && photo.is_none() {
            return Err(ClientError::ValidationIncomplete(RequiredField::Photo));
        }

        let details = if brand.is_empty() && barcode.is_none() && photo.is_none() {
            None
        } else {
            Some(DepositDetails {
                brand: brand.to_string(),
                barcode: barcode.unwrap_or_default().to_string(),
                photo_fingerprint: photo.unwrap_or_default().to_string(),
            })
        };

        Ok(DepositRequest {
            user_id,
            material_id,
            weight_kg,
            details,
        })
    }
}

/// Parse a weight in kilograms; accepts a decimal comma
pub fn parse_weight(input: &str) -> Result<f64, ClientError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ClientError::ValidationIncomplete(RequiredField::Weight));
    }

    let weight: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| ClientError::InvalidWeight(format!("'{}' is not a number", trimmed)))?;

    if !weight.is_finite() || weight <= 0.0 {
        return Err(ClientError::InvalidWeight(format!(
            "{} kg is not a positive weight",
            trimmed
        )));
    }

    Ok(weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ScanEvent;

    fn validated(profile: ScanProfile) -> ScanSession {
        let mut session = ScanSession::new(profile, 20.0);
        session.apply(ScanEvent::OpenBinScanner).unwrap();
        session.apply(ScanEvent::BeaconDecoded).unwrap();
        session.record_distance(2.0).unwrap();
        session
    }

    #[test]
    fn test_check_order() {
        let mut session = validated(ScanProfile::extended());
        let mut form = DepositForm::default();

        let missing = |form: &DepositForm, session: &ScanSession| match form.to_request(1, session) {
            Err(ClientError::ValidationIncomplete(field)) => Some(field),
            _ => None,
        };

        assert_eq!(missing(&form, &session), Some(RequiredField::Material));
        form.material_id = Some(2);
        assert_eq!(missing(&form, &session), Some(RequiredField::Weight));
        form.weight_input = "0.4".to_string();
        assert_eq!(missing(&form, &session), Some(RequiredField::Brand));
        form.brand = "Acme".to_string();
        assert_eq!(missing(&form, &session), Some(RequiredField::Barcode));

        session.apply(ScanEvent::OpenProductScanner).unwrap();
        session.accept_barcode("7501055300075").unwrap();
        assert_eq!(missing(&form, &session), Some(RequiredField::Photo));

        session.accept_photo("IMG_1.jpg-10".to_string()).unwrap();
        let request = form.to_request(1, &session).unwrap();
        assert_eq!(request.weight_kg, 0.4);
        assert_eq!(
            request.details,
            Some(DepositDetails {
                brand: "Acme".to_string(),
                barcode: "7501055300075".to_string(),
                photo_fingerprint: "IMG_1.jpg-10".to_string(),
            })
        );
    }

    #[test]
    fn test_basic_profile_needs_material_and_weight_only() {
        let session = validated(ScanProfile::basic());
        let form = DepositForm {
            material_id: Some(1),
            weight_input: "1,5".to_string(),
            brand: String::new(),
        };

        let request = form.to_request(9, &session).unwrap();

        assert_eq!(request.weight_kg, 1.5);
        assert_eq!(request.details, None);
    }

    #[test]
    fn test_weight_parsing() {
        assert_eq!(parse_weight(" 2.25 "), Ok(2.25));
        assert_eq!(
            parse_weight(""),
            Err(ClientError::ValidationIncomplete(RequiredField::Weight))
        );
        for bad in ["abc", "0", "-1", "inf", "NaN"] {
            assert!(
                matches!(parse_weight(bad), Err(ClientError::InvalidWeight(_))),
                "input {bad}"
            );
        }
    }
}

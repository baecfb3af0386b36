//! Deposit Types
//!
//! Wire request, stored record and receipt for a single recycling deposit,
//! plus the per-material impact report row.

use serde::{Deserialize, Serialize};

/// Evidence captured by clients running the extended profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositDetails {
    pub brand: String,
    pub barcode: String,
    pub photo_fingerprint: String,
}

/// Body of `POST /api/deposit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub user_id: i64,
    pub material_id: i64,
    pub weight_kg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DepositDetails>,
}

impl DepositRequest {
    pub fn barcode(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.barcode.as_str()).filter(|b| !b.is_empty())
    }

    pub fn photo_fingerprint(&self) -> Option<&str> {
        self.details
            .as_ref()
            .map(|d| d.photo_fingerprint.as_str())
            .filter(|p| !p.is_empty())
    }
}

/// A persisted deposit. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub id: i64,
    pub user_id: i64,
    pub material_id: i64,
    pub weight_kg: f64,
    /// Points credited to the user for this deposit
    pub points_awarded: i64,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub photo_fingerprint: Option<String>,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

/// What a deposit insert needs; the store assigns id, points and timestamp
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub user_id: i64,
    pub material_id: i64,
    pub weight_kg: f64,
    pub details: Option<DepositDetails>,
}

impl From<DepositRequest> for NewDeposit {
    fn from(req: DepositRequest) -> Self {
        Self {
            user_id: req.user_id,
            material_id: req.material_id,
            weight_kg: req.weight_kg,
            details: req.details,
        }
    }
}

/// Result of a committed deposit transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub deposit_id: i64,
    pub user_id: i64,
    pub points_awarded: i64,
    /// Balance after the deposit was credited
    pub balance: i64,
}

/// Response of `POST /api/deposit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResponse {
    pub message: String,
    pub receipt: DepositReceipt,
}

/// Environmental impact aggregated per material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReportRow {
    pub material_id: i64,
    pub material: String,
    pub deposits: u64,
    pub total_weight_kg: f64,
    pub total_points: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_details_deserializes() {
        let req: DepositRequest =
            serde_json::from_str(r#"{"user_id":1,"material_id":2,"weight_kg":0.5}"#).unwrap();
        assert!(req.details.is_none());
        assert!(req.barcode().is_none());
        assert!(req.photo_fingerprint().is_none());
    }

    #[test]
    fn test_empty_evidence_is_treated_as_absent() {
        let req = DepositRequest {
            user_id: 1,
            material_id: 1,
            weight_kg: 0.5,
            details: Some(DepositDetails {
                brand: "Acme".to_string(),
                barcode: String::new(),
                photo_fingerprint: "IMG_1.jpg-2048".to_string(),
            }),
        };
        assert!(req.barcode().is_none());
        assert_eq!(req.photo_fingerprint(), Some("IMG_1.jpg-2048"));
    }
}

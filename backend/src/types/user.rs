//! Users and materials
//!
//! Both are reference data created outside the deposit flow: users are
//! pre-registered, materials are an immutable lookup table.

use serde::{Deserialize, Serialize};

/// A registered student and their current point balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Display name
    pub name: String,
    pub email: String,
    /// Current point balance, only changed by the ledger
    pub points: i64,
}

/// A recyclable material and its reward rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub points_per_kg: f64,
}

impl Material {
    /// Points earned for `weight_kg` of this material, rounded to the nearest point
    pub fn points_for(&self, weight_kg: f64) -> i64 {
        (weight_kg * self.points_per_kg).round() as i64
    }
}

/// A user to create, as read from a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub points: i64,
}

/// A material to create, as read from a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    pub points_per_kg: f64,
}

/// Body of `POST /api/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_rounding() {
        let pet = Material {
            id: 1,
            name: "PET".to_string(),
            points_per_kg: 100.0,
        };
        assert_eq!(pet.points_for(0.05), 5);
        assert_eq!(pet.points_for(0.014), 1);
        assert_eq!(pet.points_for(0.004), 0);
    }
}

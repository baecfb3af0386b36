//! Ledger seeding from a TOML file
//!
//! ```toml
//! [[users]]
//! name = "Ana Torres"
//! email = "ana@campus.edu"
//! points = 0
//!
//! [[materials]]
//! name = "PET"
//! points_per_kg = 100.0
//! ```
//!
//! Records that already exist are skipped, so seeding the same file twice is
//! harmless.

use serde::Deserialize;
use std::path::Path;

use crate::common::error::{EcoTraceError, Result};
use crate::storage::{LedgerStore, StorageError};
use crate::types::{NewMaterial, NewUser};

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<NewUser>,
    #[serde(default)]
    pub materials: Vec<NewMaterial>,
}

impl SeedFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| EcoTraceError::seed(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users_created: usize,
    pub materials_created: usize,
    pub skipped: usize,
}

/// Insert every user and material from `seed` into `store`
pub async fn apply(store: &dyn LedgerStore, seed: &SeedFile) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for material in &seed.materials {
        if !material.points_per_kg.is_finite() || material.points_per_kg < 0.0 {
            return Err(EcoTraceError::seed(format!(
                "material {} has invalid points_per_kg {}",
                material.name, material.points_per_kg
            )));
        }

        match store.insert_material(material).await {
            Ok(created) => {
                tracing::info!(target: "ecotrace::seed", id = created.id, name = %created.name, "Material created");
                summary.materials_created += 1;
            }
            Err(StorageError::Duplicate(_)) => summary.skipped += 1,
            Err(e) => return Err(e.into()),
        }
    }

    for user in &seed.users {
        match store.insert_user(user).await {
            Ok(created) => {
                tracing::info!(target: "ecotrace::seed", id = created.id, email = %created.email, "User created");
                summary.users_created += 1;
            }
            Err(StorageError::Duplicate(_)) => summary.skipped += 1,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(summary)
}

//! In-Memory Storage Implementations
//!
//! Provides in-memory ledger and audit stores for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{
    normalize_email, AuditStore, LedgerStore, StorageError, StorageResult,
};
use crate::types::{
    AuditLogEntry, DepositRecord, ImpactReportRow, Material, NewDeposit, NewMaterial, NewUser,
    User,
};

#[derive(Default)]
struct LedgerState {
    users: BTreeMap<i64, User>,
    materials: BTreeMap<i64, Material>,
    deposits: Vec<DepositRecord>,
    next_user_id: i64,
    next_material_id: i64,
}

/// In-memory ledger store
///
/// A single write lock covers validation and mutation of a deposit, so a
/// failed deposit never leaves a partial update behind.
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl MemoryLedgerStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_user(&self, user: &NewUser) -> StorageResult<User> {
        let mut state = self.state.write().await;
        let email = normalize_email(&user.email);

        if state.users.values().any(|u| u.email == email) {
            return Err(StorageError::Duplicate(email));
        }

        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            name: user.name.clone(),
            email,
            points: user.points,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn insert_material(&self, material: &NewMaterial) -> StorageResult<Material> {
        if !material.points_per_kg.is_finite() || material.points_per_kg < 0.0 {
            return Err(StorageError::InvalidData(format!(
                "points_per_kg must be a non-negative number, got {}",
                material.points_per_kg
            )));
        }

        let mut state = self.state.write().await;

        if state.materials.values().any(|m| m.name == material.name) {
            return Err(StorageError::Duplicate(material.name.clone()));
        }

        state.next_material_id += 1;
        let material = Material {
            id: state.next_material_id,
            name: material.name.clone(),
            points_per_kg: material.points_per_kg,
        };
        state.materials.insert(material.id, material.clone());
        Ok(material)
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn list_materials(&self) -> StorageResult<Vec<Material>> {
        Ok(self.state.read().await.materials.values().cloned().collect())
    }

    async fn evidence_used(
        &self,
        barcode: Option<&str>,
        photo_fingerprint: Option<&str>,
    ) -> StorageResult<bool> {
        let state = self.state.read().await;
        Ok(state.deposits.iter().any(|d| {
            (barcode.is_some() && d.barcode.as_deref() == barcode)
                || (photo_fingerprint.is_some() && d.photo_fingerprint.as_deref() == photo_fingerprint)
        }))
    }

    async fn record_deposit(&self, deposit: &NewDeposit) -> StorageResult<(DepositRecord, User)> {
        if !deposit.weight_kg.is_finite() || deposit.weight_kg <= 0.0 {
            return Err(StorageError::InvalidData(format!(
                "weight_kg must be positive, got {}",
                deposit.weight_kg
            )));
        }

        let mut state = self.state.write().await;

        let material = state
            .materials
            .get(&deposit.material_id)
            .cloned()
            .ok_or(StorageError::MaterialNotFound(deposit.material_id))?;
        if !state.users.contains_key(&deposit.user_id) {
            return Err(StorageError::UserNotFound(deposit.user_id));
        }

        let points = material.points_for(deposit.weight_kg);
        let details = deposit.details.as_ref();
        let non_empty = |s: &String| if s.is_empty() { None } else { Some(s.clone()) };

        let record = DepositRecord {
            id: state.deposits.len() as i64 + 1,
            user_id: deposit.user_id,
            material_id: material.id,
            weight_kg: deposit.weight_kg,
            points_awarded: points,
            brand: details.and_then(|d| non_empty(&d.brand)),
            barcode: details.and_then(|d| non_empty(&d.barcode)),
            photo_fingerprint: details.and_then(|d| non_empty(&d.photo_fingerprint)),
            created_at: chrono::Utc::now().timestamp(),
        };

        let user = match state.users.get_mut(&deposit.user_id) {
            Some(user) => {
                user.points += points;
                user.clone()
            }
            None => return Err(StorageError::UserNotFound(deposit.user_id)),
        };
        state.deposits.push(record.clone());

        Ok((record, user))
    }

    async fn deposits_for_user(&self, user_id: i64) -> StorageResult<Vec<DepositRecord>> {
        let state = self.state.read().await;
        Ok(state
            .deposits
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn impact_report(&self) -> StorageResult<Vec<ImpactReportRow>> {
        let state = self.state.read().await;

        Ok(state
            .materials
            .values()
            .map(|m| {
                let mut row = ImpactReportRow {
                    material_id: m.id,
                    material: m.name.clone(),
                    deposits: 0,
                    total_weight_kg: 0.0,
                    total_points: 0,
                };
                for d in state.deposits.iter().filter(|d| d.material_id == m.id) {
                    row.deposits += 1;
                    row.total_weight_kg += d.weight_kg;
                    row.total_points += d.points_awarded;
                }
                row
            })
            .collect())
    }
}

/// In-memory audit store
///
/// `set_unavailable(true)` makes every append fail, simulating an outage of
/// the secondary store.
#[derive(Clone, Default)]
pub struct MemoryAuditStore {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryAuditStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated unavailability
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All entries, oldest first
    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("audit store unavailable".to_string()));
        }
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> StorageResult<Vec<AuditLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

//! SQLite Persistent Storage for the Ledger
//!
//! Durable storage for users, materials and deposits.
//! Uses connection pooling via r2d2 for concurrent access; each deposit is
//! credited inside a single SQLite transaction.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::traits::{normalize_email, LedgerStore, StorageError, StorageResult};
use crate::types::{
    DepositRecord, ImpactReportRow, Material, NewDeposit, NewMaterial, NewUser, User,
};

/// Open a pool on a database file, creating the parent directory if needed
pub(crate) fn file_pool<P: AsRef<Path>>(
    db_path: P,
) -> Result<Pool<SqliteConnectionManager>, StorageError> {
    if let Some(parent) = db_path.as_ref().parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| StorageError::Connection(e.to_string()))
}

/// Open a single-connection pool on a private in-memory database
pub(crate) fn memory_pool() -> Result<Pool<SqliteConnectionManager>, StorageError> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| StorageError::Connection(e.to_string()))
}

pub(crate) fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

/// SQLite-backed ledger store with connection pooling
pub struct SqliteLedgerStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedgerStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        let store = Self {
            pool: file_pool(db_path)?,
        };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            pool: memory_pool()?,
        };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                points INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS materials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                points_per_kg REAL NOT NULL CHECK (points_per_kg >= 0)
            );

            CREATE TABLE IF NOT EXISTS deposits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                material_id INTEGER NOT NULL REFERENCES materials(id),
                weight_kg REAL NOT NULL CHECK (weight_kg > 0),
                points_awarded INTEGER NOT NULL,
                brand TEXT,
                barcode TEXT,
                photo_fingerprint TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_deposits_user ON deposits(user_id);
            CREATE INDEX IF NOT EXISTS idx_deposits_material ON deposits(material_id);
            CREATE INDEX IF NOT EXISTS idx_deposits_barcode ON deposits(barcode);
            CREATE INDEX IF NOT EXISTS idx_deposits_photo ON deposits(photo_fingerprint);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            points: row.get("points")?,
        })
    }

    fn row_to_material(row: &rusqlite::Row) -> rusqlite::Result<Material> {
        Ok(Material {
            id: row.get("id")?,
            name: row.get("name")?,
            points_per_kg: row.get("points_per_kg")?,
        })
    }

    fn row_to_deposit(row: &rusqlite::Row) -> rusqlite::Result<DepositRecord> {
        Ok(DepositRecord {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            material_id: row.get("material_id")?,
            weight_kg: row.get("weight_kg")?,
            points_awarded: row.get("points_awarded")?,
            brand: row.get("brand")?,
            barcode: row.get("barcode")?,
            photo_fingerprint: row.get("photo_fingerprint")?,
            created_at: row.get("created_at")?,
        })
    }

    // Synchronous helper methods for the trait implementations

    fn insert_user_sync(&self, user: &NewUser) -> Result<User, StorageError> {
        let conn = self.conn()?;
        let email = normalize_email(&user.email);

        conn.execute(
            "INSERT INTO users (name, email, points) VALUES (?1, ?2, ?3)",
            params![user.name, email, user.points],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 1555 || err.extended_code == 2067 {
                    return StorageError::Duplicate(email.clone());
                }
            }
            db_err(e)
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            name: user.name.clone(),
            email,
            points: user.points,
        })
    }

    fn insert_material_sync(&self, material: &NewMaterial) -> Result<Material, StorageError> {
        if !material.points_per_kg.is_finite() || material.points_per_kg < 0.0 {
            return Err(StorageError::InvalidData(format!(
                "points_per_kg must be a non-negative number, got {}",
                material.points_per_kg
            )));
        }

        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO materials (name, points_per_kg) VALUES (?1, ?2)",
            params![material.name, material.points_per_kg],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 2067 {
                    return StorageError::Duplicate(material.name.clone());
                }
            }
            db_err(e)
        })?;

        Ok(Material {
            id: conn.last_insert_rowid(),
            name: material.name.clone(),
            points_per_kg: material.points_per_kg,
        })
    }

    fn find_user_by_email_sync(&self, email: &str) -> Result<Option<User>, StorageError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![normalize_email(email)],
            |row| Self::row_to_user(row),
        )
        .optional()
        .map_err(db_err)
    }

    fn get_user_sync(&self, id: i64) -> Result<Option<User>, StorageError> {
        let conn = self.conn()?;

        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], |row| {
            Self::row_to_user(row)
        })
        .optional()
        .map_err(db_err)
    }

    fn list_materials_sync(&self) -> Result<Vec<Material>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT * FROM materials ORDER BY id ASC")
            .map_err(db_err)?;

        let materials = stmt
            .query_map([], |row| Self::row_to_material(row))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(materials)
    }

    fn evidence_used_sync(
        &self,
        barcode: Option<&str>,
        photo_fingerprint: Option<&str>,
    ) -> Result<bool, StorageError> {
        if barcode.is_none() && photo_fingerprint.is_none() {
            return Ok(false);
        }

        let conn = self.conn()?;

        let count: i64 = conn
            .query_row(
                r#"
                SELECT COUNT(*) FROM deposits
                WHERE (?1 IS NOT NULL AND barcode = ?1)
                   OR (?2 IS NOT NULL AND photo_fingerprint = ?2)
                "#,
                params![barcode, photo_fingerprint],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        Ok(count > 0)
    }

    fn record_deposit_sync(&self, deposit: &NewDeposit) -> Result<(DepositRecord, User), StorageError> {
        let mut conn = self.conn()?;
        // Dropping the transaction without commit rolls it back
        let tx = conn.transaction().map_err(db_err)?;

        let user = tx
            .query_row(
                "SELECT * FROM users WHERE id = ?1",
                params![deposit.user_id],
                |row| Self::row_to_user(row),
            )
            .optional()
            .map_err(db_err)?
            .ok_or(StorageError::UserNotFound(deposit.user_id))?;

        let material = tx
            .query_row(
                "SELECT * FROM materials WHERE id = ?1",
                params![deposit.material_id],
                |row| Self::row_to_material(row),
            )
            .optional()
            .map_err(db_err)?
            .ok_or(StorageError::MaterialNotFound(deposit.material_id))?;

        let points = material.points_for(deposit.weight_kg);
        let created_at = chrono::Utc::now().timestamp();
        let details = deposit.details.as_ref();
        let non_empty = |s: &String| if s.is_empty() { None } else { Some(s.clone()) };
        let brand = details.and_then(|d| non_empty(&d.brand));
        let barcode = details.and_then(|d| non_empty(&d.barcode));
        let photo_fingerprint = details.and_then(|d| non_empty(&d.photo_fingerprint));

        tx.execute(
            "UPDATE users SET points = points + ?2 WHERE id = ?1",
            params![user.id, points],
        )
        .map_err(db_err)?;

        tx.execute(
            r#"
            INSERT INTO deposits (
                user_id, material_id, weight_kg, points_awarded,
                brand, barcode, photo_fingerprint, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                user.id,
                material.id,
                deposit.weight_kg,
                points,
                brand,
                barcode,
                photo_fingerprint,
                created_at,
            ],
        )
        .map_err(db_err)?;

        let record = DepositRecord {
            id: tx.last_insert_rowid(),
            user_id: user.id,
            material_id: material.id,
            weight_kg: deposit.weight_kg,
            points_awarded: points,
            brand,
            barcode,
            photo_fingerprint,
            created_at,
        };

        tx.commit().map_err(db_err)?;

        let updated = User {
            points: user.points + points,
            ..user
        };

        Ok((record, updated))
    }

    fn deposits_for_user_sync(&self, user_id: i64) -> Result<Vec<DepositRecord>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT * FROM deposits WHERE user_id = ?1 ORDER BY id ASC")
            .map_err(db_err)?;

        let records = stmt
            .query_map(params![user_id], |row| Self::row_to_deposit(row))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(records)
    }

    fn impact_report_sync(&self) -> Result<Vec<ImpactReportRow>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                r#"
            SELECT m.id, m.name,
                   COUNT(d.id),
                   COALESCE(SUM(d.weight_kg), 0.0),
                   COALESCE(SUM(d.points_awarded), 0)
            FROM materials m
            LEFT JOIN deposits d ON d.material_id = m.id
            GROUP BY m.id, m.name
            ORDER BY m.id ASC
            "#,
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ImpactReportRow {
                    material_id: row.get(0)?,
                    material: row.get(1)?,
                    deposits: row.get::<_, i64>(2)? as u64,
                    total_weight_kg: row.get(3)?,
                    total_points: row.get(4)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(rows)
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert_user(&self, user: &NewUser) -> StorageResult<User> {
        self.insert_user_sync(user)
    }

    async fn insert_material(&self, material: &NewMaterial) -> StorageResult<Material> {
        self.insert_material_sync(material)
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        self.find_user_by_email_sync(email)
    }

    async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        self.get_user_sync(id)
    }

    async fn list_materials(&self) -> StorageResult<Vec<Material>> {
        self.list_materials_sync()
    }

    async fn evidence_used(
        &self,
        barcode: Option<&str>,
        photo_fingerprint: Option<&str>,
    ) -> StorageResult<bool> {
        self.evidence_used_sync(barcode, photo_fingerprint)
    }

    async fn record_deposit(&self, deposit: &NewDeposit) -> StorageResult<(DepositRecord, User)> {
        self.record_deposit_sync(deposit)
    }

    async fn deposits_for_user(&self, user_id: i64) -> StorageResult<Vec<DepositRecord>> {
        self.deposits_for_user_sync(user_id)
    }

    async fn impact_report(&self) -> StorageResult<Vec<ImpactReportRow>> {
        self.impact_report_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DepositDetails;

    async fn seeded_store() -> (SqliteLedgerStore, User, Material) {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let user = store
            .insert_user(&NewUser {
                name: "Ana".to_string(),
                email: "ana@campus.edu".to_string(),
                points: 10,
            })
            .await
            .unwrap();
        let material = store
            .insert_material(&NewMaterial {
                name: "PET".to_string(),
                points_per_kg: 100.0,
            })
            .await
            .unwrap();
        (store, user, material)
    }

    fn deposit(user_id: i64, material_id: i64, weight_kg: f64) -> NewDeposit {
        NewDeposit {
            user_id,
            material_id,
            weight_kg,
            details: None,
        }
    }

    #[tokio::test]
    async fn test_login_lookup_is_case_insensitive() {
        let (store, user, _) = seeded_store().await;

        let found = store
            .find_user_by_email("  ANA@campus.edu ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, user);
        assert!(store.find_user_by_email("bob@campus.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (store, _, _) = seeded_store().await;

        let result = store
            .insert_user(&NewUser {
                name: "Other Ana".to_string(),
                email: "Ana@Campus.edu".to_string(),
                points: 0,
            })
            .await;

        assert!(matches!(result, Err(StorageError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_record_deposit_credits_points() {
        let (store, user, material) = seeded_store().await;

        let (record, updated) = store
            .record_deposit(&deposit(user.id, material.id, 0.25))
            .await
            .unwrap();

        assert_eq!(record.points_awarded, 25);
        assert_eq!(updated.points, 35);
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().points, 35);
        assert_eq!(store.deposits_for_user(user.id).await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_unknown_material_changes_nothing() {
        let (store, user, _) = seeded_store().await;

        let result = store.record_deposit(&deposit(user.id, 999, 1.0)).await;

        assert!(matches!(result, Err(StorageError::MaterialNotFound(999))));
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().points, 10);
        assert!(store.deposits_for_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_balance() {
        let (store, user, material) = seeded_store().await;

        // The balance update runs first; the CHECK on weight_kg then rejects the insert
        let result = store.record_deposit(&deposit(user.id, material.id, -1.0)).await;

        assert!(matches!(result, Err(StorageError::Database(_))));
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().points, 10);
        assert!(store.deposits_for_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evidence_used() {
        let (store, user, material) = seeded_store().await;

        let mut first = deposit(user.id, material.id, 0.1);
        first.details = Some(DepositDetails {
            brand: "Acme".to_string(),
            barcode: "7501055300075".to_string(),
            photo_fingerprint: "IMG_0001.jpg-348211".to_string(),
        });
        store.record_deposit(&first).await.unwrap();

        assert!(store.evidence_used(Some("7501055300075"), None).await.unwrap());
        assert!(store.evidence_used(None, Some("IMG_0001.jpg-348211")).await.unwrap());
        assert!(!store.evidence_used(Some("0000"), Some("other.jpg-1")).await.unwrap());
        assert!(!store.evidence_used(None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_impact_report_includes_unused_materials() {
        let (store, user, pet) = seeded_store().await;
        let glass = store
            .insert_material(&NewMaterial {
                name: "Glass".to_string(),
                points_per_kg: 40.0,
            })
            .await
            .unwrap();

        store.record_deposit(&deposit(user.id, pet.id, 0.5)).await.unwrap();
        store.record_deposit(&deposit(user.id, pet.id, 0.25)).await.unwrap();

        let report = store.impact_report().await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].material_id, pet.id);
        assert_eq!(report[0].deposits, 2);
        assert!((report[0].total_weight_kg - 0.75).abs() < 1e-9);
        assert_eq!(report[0].total_points, 75);
        assert_eq!(report[1].material_id, glass.id);
        assert_eq!(report[1].deposits, 0);
        assert_eq!(report[1].total_points, 0);
    }
}

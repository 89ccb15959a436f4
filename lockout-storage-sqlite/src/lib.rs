//! SQLite storage backend for the lockout policy
//!
//! [`SqliteLockoutStore`] implements [`LockoutStore`] on a single table whose
//! name and lockout columns come from a [`FieldMapping`].
//!
//! ```rust,ignore
//! use lockout_core::{LockoutPolicy, LockoutService};
//! use lockout_storage_sqlite::SqliteLockoutStore;
//!
//! let store = SqliteLockoutStore::connect("sqlite://lockout.db?mode=rwc").await?;
//! store.migrate().await?;
//!
//! let service = LockoutService::new(Arc::new(store), LockoutPolicy::default());
//! ```

pub mod migrations;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockout_core::{
    Clock, Error, FieldMapping, LockoutGateway, LockoutRecord, LockoutStore, RecordId,
    SystemClock,
    error::{StorageError, utilities::DatabaseResultExt},
};
use lockout_migration::MigrationManager;
use sqlx::SqlitePool;

use crate::migrations::SqliteMigrationManager;

/// SQL text rendered once from the field mapping.
#[derive(Debug, Clone)]
struct Queries {
    find: String,
    save: String,
    delete: String,
}

/// Quote an identifier so mapped names that are SQL keywords stay valid.
/// [`FieldMapping`] only admits `[A-Za-z0-9_]`, so no escaping is needed.
pub(crate) fn quoted(ident: &str) -> String {
    format!("\"{ident}\"")
}

impl Queries {
    fn new(mapping: &FieldMapping) -> Self {
        let table = quoted(mapping.table());
        let attempts = quoted(mapping.attempts());
        let lock_until = quoted(mapping.lock_until());
        let returning = format!(
            "id, lockout_key, {attempts} AS attempts, {lock_until} AS lock_until, created_at, updated_at"
        );

        Self {
            find: format!("SELECT {returning} FROM {table} WHERE lockout_key = ?"),
            save: format!(
                r#"
                INSERT INTO {table} (id, lockout_key, {attempts}, {lock_until}, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    {attempts} = excluded.{attempts},
                    {lock_until} = excluded.{lock_until},
                    updated_at = excluded.updated_at
                RETURNING {returning}
                "#
            ),
            delete: format!("DELETE FROM {table} WHERE lockout_key = ?"),
        }
    }
}

/// SQLite repository for lockout records.
pub struct SqliteLockoutStore {
    pool: SqlitePool,
    mapping: FieldMapping,
    queries: Queries,
    clock: Arc<dyn Clock>,
}

impl SqliteLockoutStore {
    /// Create a store on the default `lockout_records` table.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_mapping(pool, FieldMapping::default())
    }

    /// Create a store using custom table and column names.
    pub fn with_mapping(pool: SqlitePool, mapping: FieldMapping) -> Self {
        let queries = Queries::new(&mapping);
        Self {
            pool,
            mapping,
            queries,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp `updated_at` from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Connect to the database at `url`, e.g. `sqlite::memory:` or `sqlite://lockout.db?mode=rwc`.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite");
            StorageError::Connection(e.to_string())
        })?;
        Ok(Self::new(pool))
    }

    /// Create the lockout table if it does not exist yet.
    ///
    /// Migration history is tracked per mapped table, so stores with
    /// different mappings can migrate on the same pool.
    pub async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone(), self.mapping.table());
        manager.initialize().await?;
        manager.up(&migrations::migrations(&self.mapping)).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteLockoutRecord {
    id: String,
    lockout_key: String,
    attempts: i64,
    lock_until: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SqliteLockoutRecord> for LockoutRecord {
    type Error = Error;

    fn try_from(row: SqliteLockoutRecord) -> Result<Self, Self::Error> {
        let attempts = u32::try_from(row.attempts)
            .map_err(|_| StorageError::Database(format!("Invalid attempts: {}", row.attempts)))?;

        Ok(LockoutRecord {
            id: RecordId::from(row.id),
            key: row.lockout_key,
            attempts,
            lock_until: row.lock_until.map(from_millis).transpose()?,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Database(format!("Invalid timestamp: {millis}")).into())
}

#[async_trait]
impl LockoutGateway for SqliteLockoutStore {
    type Entity = LockoutRecord;

    async fn save(&self, entity: LockoutRecord) -> Result<LockoutRecord, Error> {
        let row = sqlx::query_as::<_, SqliteLockoutRecord>(&self.queries.save)
            .bind(entity.id.as_str())
            .bind(&entity.key)
            .bind(i64::from(entity.attempts))
            .bind(entity.lock_until.map(|t| t.timestamp_millis()))
            .bind(entity.created_at.timestamp_millis())
            .bind(self.clock.now().timestamp_millis())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Error::Storage(StorageError::Constraint(format!(
                        "key {} already has a lockout record",
                        entity.key
                    )))
                }
                e => {
                    tracing::error!(error = %e, "Failed to save lockout record");
                    Error::Storage(StorageError::Database(
                        "Failed to save lockout record".to_string(),
                    ))
                }
            })?;

        row.try_into()
    }
}

#[async_trait]
impl LockoutStore for SqliteLockoutStore {
    async fn find(&self, key: &str) -> Result<Option<LockoutRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteLockoutRecord>(&self.queries.find)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_db_err_with_context("Failed to find lockout record")?;

        row.map(LockoutRecord::try_from).transpose()
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let result = sqlx::query(&self.queries.delete)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete lockout record")?;

        Ok(result.rows_affected() > 0)
    }
}

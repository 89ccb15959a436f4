use async_trait::async_trait;
use chrono::Utc;
use lockout_core::FieldMapping;
use lockout_migration::{Migration, MigrationError, MigrationManager, MigrationRecord};
use sqlx::{Database, Sqlite, SqlitePool};

use crate::quoted;

/// Applies migrations for one lockout table.
///
/// Applied versions are recorded per scope (the mapped table name), so stores
/// with different [`FieldMapping`]s can share a database and each gets its own
/// table.
pub struct SqliteMigrationManager {
    pool: SqlitePool,
    scope: String,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool, scope: impl Into<String>) -> Self {
        Self {
            pool,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

#[async_trait]
impl MigrationManager<Sqlite> for SqliteMigrationManager {
    async fn initialize(&self) -> Result<(), MigrationError> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {} (
                scope TEXT NOT NULL,
                version INTEGER NOT NULL,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch()),
                PRIMARY KEY (scope, version)
            );"#,
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn up(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        for migration in migrations {
            if self.is_applied(migration.version()).await? {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            tracing::info!(
                scope = %self.scope,
                version = migration.version(),
                name = migration.name(),
                "Applying migration"
            );

            migration
                .up(&mut *tx as &mut <Sqlite as Database>::Connection)
                .await?;

            sqlx::query(
                format!(
                    "INSERT INTO {} (scope, version, name, applied_at) VALUES (?, ?, ?, ?)",
                    self.get_migration_table_name()
                )
                .as_str(),
            )
            .bind(&self.scope)
            .bind(migration.version())
            .bind(migration.name())
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }
        Ok(())
    }

    async fn down(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        for migration in migrations.iter().rev() {
            if !self.is_applied(migration.version()).await? {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            tracing::info!(
                scope = %self.scope,
                version = migration.version(),
                name = migration.name(),
                "Rolling back migration"
            );

            migration
                .down(&mut *tx as &mut <Sqlite as Database>::Connection)
                .await?;

            sqlx::query(
                format!(
                    "DELETE FROM {} WHERE scope = ? AND version = ?",
                    self.get_migration_table_name()
                )
                .as_str(),
            )
            .bind(&self.scope)
            .bind(migration.version())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }
        Ok(())
    }

    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let records = sqlx::query_as::<_, MigrationRecord>(
            format!(
                "SELECT version, name, applied_at FROM {} WHERE scope = ? ORDER BY version",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .bind(&self.scope)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn is_applied(&self, version: i64) -> Result<bool, MigrationError> {
        let applied: bool = sqlx::query_scalar(
            format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE scope = ? AND version = ?)",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .bind(&self.scope)
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(applied)
    }
}

/// Creates the lockout table using the names from a [`FieldMapping`].
///
/// Timestamps are stored as unix milliseconds so sub-second lock durations
/// survive a round trip.
pub struct CreateLockoutRecordsTable {
    mapping: FieldMapping,
}

impl CreateLockoutRecordsTable {
    pub fn new(mapping: FieldMapping) -> Self {
        Self { mapping }
    }
}

#[async_trait]
impl Migration<Sqlite> for CreateLockoutRecordsTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "CreateLockoutRecordsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                lockout_key TEXT NOT NULL,
                {attempts} INTEGER NOT NULL DEFAULT 0 CHECK ({attempts} >= 0),
                {lock_until} INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(lockout_key)
            );"#,
                table = quoted(self.mapping.table()),
                attempts = quoted(self.mapping.attempts()),
                lock_until = quoted(self.mapping.lock_until()),
            )
            .as_str(),
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(format!("DROP TABLE IF EXISTS {}", quoted(self.mapping.table())).as_str())
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub(crate) fn migrations(mapping: &FieldMapping) -> Vec<Box<dyn Migration<Sqlite>>> {
    vec![Box::new(CreateLockoutRecordsTable::new(mapping.clone()))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    fn setup_test() {
        let _ = tracing_subscriber::fmt().try_init();
    }

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create pool")
    }

    #[tokio::test]
    async fn test_migrations() -> Result<(), MigrationError> {
        setup_test();

        let manager = SqliteMigrationManager::new(pool().await, "lockout_records");
        manager.initialize().await?;

        let migrations = migrations(&FieldMapping::default());
        manager.up(&migrations).await?;

        assert!(manager.is_applied(1).await?, "Migration should be applied");
        let applied = manager.get_applied_migrations().await?;
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].name, "CreateLockoutRecordsTable");

        manager.down(&migrations).await?;
        assert!(
            !manager.is_applied(1).await?,
            "Migration should be rolled back"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_up_is_idempotent() -> Result<(), MigrationError> {
        setup_test();

        let manager = SqliteMigrationManager::new(pool().await, "lockout_records");
        manager.initialize().await?;
        manager.initialize().await?;

        let migrations = migrations(&FieldMapping::default());
        manager.up(&migrations).await?;
        manager.up(&migrations).await?;
        assert_eq!(manager.get_applied_migrations().await?.len(), 1);

        manager.down(&migrations).await?;
        manager.up(&migrations).await?;
        assert!(manager.is_applied(1).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_custom_mapping_creates_named_columns() -> Result<(), MigrationError> {
        setup_test();

        let pool = pool().await;
        let mapping = FieldMapping::new("login_guards", "failed_logins", "locked_until").unwrap();
        let manager = SqliteMigrationManager::new(pool.clone(), mapping.table());
        manager.initialize().await?;
        manager.up(&migrations(&mapping)).await?;

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('login_guards')")
                .fetch_all(&pool)
                .await?;
        assert!(columns.contains(&"failed_logins".to_string()));
        assert!(columns.contains(&"locked_until".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_history_is_kept_per_table() -> Result<(), MigrationError> {
        setup_test();

        let pool = pool().await;
        let custom = FieldMapping::new("login_guards", "failed_logins", "locked_until").unwrap();

        let default_manager = SqliteMigrationManager::new(pool.clone(), "lockout_records");
        default_manager.initialize().await?;
        default_manager
            .up(&migrations(&FieldMapping::default()))
            .await?;

        let custom_manager = SqliteMigrationManager::new(pool.clone(), custom.table());
        assert!(!custom_manager.is_applied(1).await?);
        custom_manager.up(&migrations(&custom)).await?;
        assert!(custom_manager.is_applied(1).await?);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('lockout_records', 'login_guards') ORDER BY name",
        )
        .fetch_all(&pool)
        .await?;
        assert_eq!(tables, vec!["lockout_records", "login_guards"]);

        custom_manager.down(&migrations(&custom)).await?;
        assert!(default_manager.is_applied(1).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_keyword_names_are_quoted() -> Result<(), MigrationError> {
        setup_test();

        let pool = pool().await;
        let mapping = FieldMapping::new("order", "group", "limit").unwrap();
        let manager = SqliteMigrationManager::new(pool.clone(), mapping.table());
        manager.initialize().await?;
        manager.up(&migrations(&mapping)).await?;

        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('order')")
            .fetch_all(&pool)
            .await?;
        assert!(columns.contains(&"group".to_string()));
        assert!(columns.contains(&"limit".to_string()));

        manager.down(&migrations(&mapping)).await?;
        Ok(())
    }
}

//! Migration ledger
//!
//! The durable record of what has been applied, independent of what
//! currently exists on disk. One row per applied migration; rows are hard
//! deleted on rollback, so the table always reflects current applied state,
//! never history.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::{MigrateError, MigrateResult};
use crate::types::{compute_status, AppliedMigration, MigrationStatus, MigrationUnit};

/// Ledger over the applied-migrations table
#[derive(Clone)]
pub struct Ledger {
    pool: PgPool,
    table: String,
}

impl Ledger {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the backing table if absent. Idempotent.
    pub async fn ensure_table(&self) -> MigrateResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::Storage(format!("failed to create ledger table: {}", e)))?;
        Ok(())
    }

    /// Whether a record exists for `version`.
    pub async fn is_applied(&self, version: &str) -> MigrateResult<bool> {
        let row = sqlx::query(&self.check_sql())
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::Storage(format!("failed to check migration {}: {}", version, e)))?;
        Ok(row.is_some())
    }

    /// Insert the applied record for `version`. Runs on the supplied
    /// executor so the caller can place the write inside the migration's own
    /// transaction, committing both atomically.
    pub async fn record_on<'e, E>(&self, executor: E, version: &str, name: &str, execution_time_ms: i64) -> MigrateResult<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(&self.record_sql())
            .bind(version)
            .bind(name)
            .bind(execution_time_ms)
            .execute(executor)
            .await
            .map_err(|e| MigrateError::Storage(format!("failed to record migration {}: {}", version, e)))?;
        Ok(())
    }

    /// Delete the record for `version`. No-op when no row matches.
    pub async fn remove_on<'e, E>(&self, executor: E, version: &str) -> MigrateResult<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(&self.remove_sql())
            .bind(version)
            .execute(executor)
            .await
            .map_err(|e| MigrateError::Storage(format!("failed to remove migration record {}: {}", version, e)))?;
        Ok(())
    }

    /// All applied records, ascending by version.
    pub async fn list_applied(&self) -> MigrateResult<Vec<AppliedMigration>> {
        let rows = sqlx::query(&self.list_sql())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Storage(format!("failed to list applied migrations: {}", e)))?;

        rows.iter().map(map_row).collect()
    }

    /// The single highest-version record, or `None` when nothing is applied.
    pub async fn latest_applied(&self) -> MigrateResult<Option<AppliedMigration>> {
        let row = sqlx::query(&self.latest_sql())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::Storage(format!("failed to query latest migration: {}", e)))?;

        row.as_ref().map(map_row).transpose()
    }

    /// Join the discovered units against the applied records into the
    /// read-only status projection, version ascending.
    ///
    /// A ledger table that does not exist yet reads as "nothing applied";
    /// creating it is left to the mutating operations so this stays pure
    /// read.
    pub async fn status_of(&self, units: &[MigrationUnit]) -> MigrateResult<Vec<MigrationStatus>> {
        let applied = match sqlx::query(&self.list_sql()).fetch_all(&self.pool).await {
            Ok(rows) => rows.iter().map(map_row).collect::<MigrateResult<Vec<_>>>()?,
            Err(e) if is_undefined_table(&e) => Vec::new(),
            Err(e) => {
                return Err(MigrateError::Storage(format!(
                    "failed to list applied migrations: {}",
                    e
                )))
            }
        };
        Ok(compute_status(units, &applied))
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version VARCHAR(14) PRIMARY KEY,\n    \
                name VARCHAR(255) NOT NULL,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
                execution_time_ms BIGINT NOT NULL DEFAULT 0\n\
            )",
            self.table
        )
    }

    fn check_sql(&self) -> String {
        format!("SELECT version FROM {} WHERE version = $1", self.table)
    }

    fn record_sql(&self) -> String {
        format!(
            "INSERT INTO {} (version, name, execution_time_ms) VALUES ($1, $2, $3)",
            self.table
        )
    }

    fn remove_sql(&self) -> String {
        format!("DELETE FROM {} WHERE version = $1", self.table)
    }

    fn list_sql(&self) -> String {
        format!(
            "SELECT version, name, applied_at, execution_time_ms FROM {} ORDER BY version ASC",
            self.table
        )
    }

    fn latest_sql(&self) -> String {
        format!(
            "SELECT version, name, applied_at, execution_time_ms FROM {} ORDER BY version DESC LIMIT 1",
            self.table
        )
    }
}

/// Postgres `undefined_table` (SQLSTATE 42P01).
fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("42P01")
    )
}

fn map_row(row: &PgRow) -> MigrateResult<AppliedMigration> {
    Ok(AppliedMigration {
        version: row
            .try_get("version")
            .map_err(|e| MigrateError::Storage(format!("failed to read version: {}", e)))?,
        name: row
            .try_get("name")
            .map_err(|e| MigrateError::Storage(format!("failed to read name: {}", e)))?,
        applied_at: row
            .try_get("applied_at")
            .map_err(|e| MigrateError::Storage(format!("failed to read applied_at: {}", e)))?,
        execution_time_ms: row
            .try_get("execution_time_ms")
            .map_err(|e| MigrateError::Storage(format!("failed to read execution_time_ms: {}", e)))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        Ledger::new(pool, "_stratum_migrations")
    }

    #[tokio::test]
    async fn table_creation_sql_declares_ledger_columns() {
        let sql = ledger().create_table_sql();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS _stratum_migrations"));
        assert!(sql.contains("version VARCHAR(14) PRIMARY KEY"));
        assert!(sql.contains("applied_at TIMESTAMPTZ NOT NULL DEFAULT now()"));
        assert!(sql.contains("execution_time_ms BIGINT NOT NULL DEFAULT 0"));
    }

    #[tokio::test]
    async fn record_sql_binds_three_parameters() {
        let sql = ledger().record_sql();
        assert!(sql.contains("INSERT INTO _stratum_migrations"));
        assert!(sql.contains("($1, $2, $3)"));
        // applied_at comes from the column default, never from the caller
        assert!(!sql.contains("applied_at"));
    }

    #[tokio::test]
    async fn listing_is_version_ascending_and_latest_is_descending() {
        assert!(ledger().list_sql().contains("ORDER BY version ASC"));
        let latest = ledger().latest_sql();
        assert!(latest.contains("ORDER BY version DESC"));
        assert!(latest.contains("LIMIT 1"));
    }

    #[tokio::test]
    async fn remove_sql_targets_single_version() {
        assert_eq!(
            ledger().remove_sql(),
            "DELETE FROM _stratum_migrations WHERE version = $1"
        );
    }
}

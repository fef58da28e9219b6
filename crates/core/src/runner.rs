//! Migration executor
//!
//! The orchestrator: combines the scanner's discovered units with the
//! ledger's applied state, executes pending units transactionally, and
//! supports rollback, status reporting, and the destructive `fresh` and
//! `reset` composites. This is the only component that opens transactions;
//! every mutating run holds a session advisory lock so concurrent operator
//! invocations serialize instead of racing on the ledger.

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Row};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::config::MigratorConfig;
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::Ledger;
use crate::source::MigrationSource;
use crate::splitter::split_statements;
use crate::types::{
    pending_units, Direction, MigrationStatus, MigrationUnit, RevertSummary, RunSummary,
};

/// Session advisory-lock key guarding migration runs ("STRATUM1").
const ADVISORY_LOCK_KEY: i64 = 0x5354_5241_5455_4d31;

/// Lock held on a dedicated pooled connection for the duration of a run.
struct RunLock {
    conn: PoolConnection<Postgres>,
}

/// Migration executor
pub struct Migrator {
    source: MigrationSource,
    ledger: Ledger,
    pool: PgPool,
}

impl Migrator {
    pub fn new(config: MigratorConfig, pool: PgPool) -> Self {
        let ledger = Ledger::new(pool.clone(), config.ledger_table.clone());
        Self {
            source: MigrationSource::new(config),
            ledger,
            pool,
        }
    }

    pub fn source(&self) -> &MigrationSource {
        &self.source
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply every pending unit in ascending version order. Stops on the
    /// first failing unit; units already committed by this run stay applied.
    pub async fn run_all(&self) -> MigrateResult<RunSummary> {
        let lock = self.acquire_lock().await?;
        let result = self.run_up_inner(None).await;
        self.release_lock(lock).await;
        result
    }

    /// Like [`run_all`](Self::run_all) but stops after `count` applied
    /// units. `count <= 0` behaves as unbounded.
    pub async fn run_up(&self, count: i64) -> MigrateResult<RunSummary> {
        let limit = usize::try_from(count).ok().filter(|n| *n > 0);
        let lock = self.acquire_lock().await?;
        let result = self.run_up_inner(limit).await;
        self.release_lock(lock).await;
        result
    }

    /// Roll back up to `count` of the most recently applied units, newest
    /// first. Units whose source is missing on disk or whose down script is
    /// empty are skipped with a warning and do not count toward `count`.
    /// `count <= 0` reverts nothing; rolling back everything is what
    /// [`reset`](Self::reset) is for, and it passes the applied count
    /// explicitly.
    pub async fn run_down(&self, count: i64) -> MigrateResult<RevertSummary> {
        let lock = self.acquire_lock().await?;
        let result = self.run_down_inner(count).await;
        self.release_lock(lock).await;
        result
    }

    /// Read-only applied/pending projection of every discovered unit. Never
    /// opens a transaction and never writes; a missing ledger table reads as
    /// "nothing applied".
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatus>> {
        let units = self.source.scan()?;
        self.ledger.status_of(&units).await
    }

    /// Drop every table in the `public` schema, then re-run all migrations
    /// from empty. Per-table drop failures are logged and skipped; DROP runs
    /// outside any transaction. Confirmation is the caller's responsibility.
    pub async fn fresh(&self) -> MigrateResult<RunSummary> {
        let lock = self.acquire_lock().await?;
        let result = self.fresh_inner().await;
        self.release_lock(lock).await;
        result
    }

    /// Roll back every applied migration, then re-apply all of them.
    /// Confirmation is the caller's responsibility.
    pub async fn reset(&self) -> MigrateResult<(RevertSummary, RunSummary)> {
        let lock = self.acquire_lock().await?;
        let result = self.reset_inner().await;
        self.release_lock(lock).await;
        result
    }

    async fn run_up_inner(&self, limit: Option<usize>) -> MigrateResult<RunSummary> {
        let start = Instant::now();
        self.ledger.ensure_table().await?;

        let units = self.source.scan()?;
        let applied: HashSet<String> = self
            .ledger
            .list_applied()
            .await?
            .into_iter()
            .map(|r| r.version)
            .collect();
        let pending = pending_units(units, &applied);

        let mut summary = RunSummary::default();
        for unit in &pending {
            if let Some(limit) = limit {
                if summary.applied.len() >= limit {
                    break;
                }
            }
            tracing::info!(version = %unit.version, name = %unit.name, "applying migration");
            self.execute_unit(unit, Direction::Up).await?;
            summary.applied.push(unit.version.clone());
        }

        summary.execution_time_ms = start.elapsed().as_millis();
        Ok(summary)
    }

    async fn run_down_inner(&self, count: i64) -> MigrateResult<RevertSummary> {
        let start = Instant::now();
        self.ledger.ensure_table().await?;

        let mut applied = self.ledger.list_applied().await?;
        applied.reverse();
        let limit = requested_down_count(count);

        let units_by_version: HashMap<String, MigrationUnit> = self
            .source
            .scan()?
            .into_iter()
            .map(|u| (u.version.clone(), u))
            .collect();

        let mut summary = RevertSummary::default();
        for record in &applied {
            if summary.reverted.len() >= limit {
                break;
            }
            match units_by_version.get(&record.version) {
                None => {
                    tracing::warn!(
                        version = %record.version,
                        "applied migration has no source unit on disk, skipping rollback"
                    );
                    summary.skipped.push(record.version.clone());
                }
                Some(unit) if !unit.has_down() => {
                    tracing::warn!(
                        version = %unit.version,
                        name = %unit.name,
                        "migration has no down script, skipping rollback"
                    );
                    summary.skipped.push(unit.version.clone());
                }
                Some(unit) => {
                    tracing::info!(version = %unit.version, name = %unit.name, "reverting migration");
                    self.execute_unit(unit, Direction::Down).await?;
                    summary.reverted.push(unit.version.clone());
                }
            }
        }

        summary.execution_time_ms = start.elapsed().as_millis();
        Ok(summary)
    }

    async fn fresh_inner(&self) -> MigrateResult<RunSummary> {
        let rows = sqlx::query("SELECT tablename FROM pg_tables WHERE schemaname = 'public'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Storage(format!("failed to enumerate tables: {}", e)))?;

        for row in rows {
            let table: String = row
                .try_get("tablename")
                .map_err(|e| MigrateError::Storage(format!("failed to read table name: {}", e)))?;
            let drop_sql = format!("DROP TABLE IF EXISTS \"{}\" CASCADE", table);
            tracing::info!(table = %table, "dropping table");
            if let Err(e) = sqlx::query(&drop_sql).execute(&self.pool).await {
                tracing::warn!(table = %table, "failed to drop table: {}", e);
            }
        }

        self.run_up_inner(None).await
    }

    async fn reset_inner(&self) -> MigrateResult<(RevertSummary, RunSummary)> {
        self.ledger.ensure_table().await?;
        let applied_count = self.ledger.list_applied().await?.len();

        let revert = if applied_count == 0 {
            RevertSummary::default()
        } else {
            self.run_down_inner(applied_count as i64).await?
        };
        let run = self.run_up_inner(None).await?;
        Ok((revert, run))
    }

    /// Execute one unit's script for `direction` inside a single
    /// transaction, writing the ledger insert/delete on that same
    /// transaction so the schema change and its record commit atomically.
    async fn execute_unit(&self, unit: &MigrationUnit, direction: Direction) -> MigrateResult<()> {
        let script = script_for(unit, direction);
        let statements = split_statements(script);
        let started = Instant::now();

        let mut tx = self.pool.begin().await.map_err(|e| {
            MigrateError::Connection(format!(
                "failed to begin transaction for {}: {}",
                unit.version, e
            ))
        })?;

        for (index, statement) in statements.iter().enumerate() {
            if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        version = %unit.version,
                        "rollback after failed statement also failed: {}", rollback_err
                    );
                }
                return Err(MigrateError::execution(&unit.version, index + 1, statement, e));
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as i64;
        match direction {
            Direction::Up => {
                self.ledger
                    .record_on(&mut *tx, &unit.version, &unit.name, elapsed_ms)
                    .await?
            }
            Direction::Down => self.ledger.remove_on(&mut *tx, &unit.version).await?,
        }

        tx.commit().await.map_err(|e| {
            MigrateError::Connection(format!("failed to commit {}: {}", unit.version, e))
        })?;

        tracing::debug!(
            version = %unit.version,
            direction = direction.as_str(),
            elapsed_ms,
            "migration committed"
        );
        Ok(())
    }

    async fn acquire_lock(&self) -> MigrateResult<RunLock> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            MigrateError::Connection(format!("failed to acquire connection for run lock: {}", e))
        })?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(ADVISORY_LOCK_KEY)
            .execute(&mut *conn)
            .await
            .map_err(|e| MigrateError::Connection(format!("failed to take run lock: {}", e)))?;
        Ok(RunLock { conn })
    }

    async fn release_lock(&self, mut lock: RunLock) {
        if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(ADVISORY_LOCK_KEY)
            .execute(&mut *lock.conn)
            .await
        {
            tracing::warn!("failed to release run lock: {}", e);
        }
    }
}

/// Clamp an operator-supplied rollback count. Zero or negative means no
/// units: a bare `down 0` must never wipe the applied set, since that path
/// carries no confirmation prompt.
fn requested_down_count(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}

fn script_for(unit: &MigrationUnit, direction: Direction) -> &str {
    match direction {
        Direction::Up => &unit.up_sql,
        Direction::Down => &unit.down_sql,
    }
}

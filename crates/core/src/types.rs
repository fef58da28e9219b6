//! Core types for the migration engine
//!
//! Defines the transient migration unit loaded from disk, the persisted
//! ledger record, the read-only status projection, and the run summaries
//! returned by the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One discrete, versioned schema change discovered on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationUnit {
    /// 14-digit `YYYYMMDDHHMMSS` version string, the sole ordering key
    pub version: String,
    /// Lowercase slug, alphanumeric + underscore
    pub name: String,
    /// Forward script body
    pub up_sql: String,
    /// Backward script body; empty means rollback is unsupported
    pub down_sql: String,
    /// Source directory, for diagnostics and the `list` report only
    pub path: PathBuf,
}

impl MigrationUnit {
    /// Whether this unit can be rolled back at all.
    pub fn has_down(&self) -> bool {
        !self.down_sql.trim().is_empty()
    }
}

/// Persisted ledger row recording one applied migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Version of the applied unit
    pub version: String,
    /// Name copied from the unit at apply-time
    pub name: String,
    /// Set by the database at insertion
    pub applied_at: DateTime<Utc>,
    /// Wall-clock duration of the transactional apply
    pub execution_time_ms: i64,
}

/// Read-only projection joining discovered units against the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Direction of a unit execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// Result of a forward run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Versions applied by this run, in execution order
    pub applied: Vec<String>,
    /// Total wall-clock time of the run
    pub execution_time_ms: u128,
}

/// Result of a rollback run
#[derive(Debug, Default)]
pub struct RevertSummary {
    /// Versions rolled back by this run, in execution order
    pub reverted: Vec<String>,
    /// Versions skipped because the source unit is gone or has no down script
    pub skipped: Vec<String>,
    /// Total wall-clock time of the run
    pub execution_time_ms: u128,
}

/// Left-join discovered units against applied records, version ascending.
///
/// Units are expected pre-sorted by the scanner; the join preserves their
/// order. Ledger rows with no surviving unit on disk are not reported here
/// (the ledger, not this projection, is the record of what was applied).
pub fn compute_status(units: &[MigrationUnit], applied: &[AppliedMigration]) -> Vec<MigrationStatus> {
    let by_version: HashMap<&str, &AppliedMigration> =
        applied.iter().map(|r| (r.version.as_str(), r)).collect();

    units
        .iter()
        .map(|unit| {
            let record = by_version.get(unit.version.as_str());
            MigrationStatus {
                version: unit.version.clone(),
                name: unit.name.clone(),
                applied: record.is_some(),
                applied_at: record.map(|r| r.applied_at),
            }
        })
        .collect()
}

/// Filter the discovered set down to units with no ledger record, keeping
/// the scanner's ascending version order.
pub fn pending_units(units: Vec<MigrationUnit>, applied_versions: &std::collections::HashSet<String>) -> Vec<MigrationUnit> {
    units
        .into_iter()
        .filter(|u| !applied_versions.contains(&u.version))
        .collect()
}

//! Error types for the migration engine
//!
//! Every public operation returns `MigrateResult`. Errors are fatal to the
//! operation that produced them; the engine never retries on its own.

use thiserror::Error;

/// Result type alias for engine operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Length cap for the statement preview carried by execution errors.
pub const STATEMENT_PREVIEW_LEN: usize = 100;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Discovery or file-creation failure in the migration source
    #[error("migration source error: {0}")]
    Io(String),

    /// Ledger read/write or table-creation failure
    #[error("ledger error: {0}")]
    Storage(String),

    /// A statement of an up/down script failed mid-transaction. The
    /// transaction has already been rolled back when this surfaces.
    #[error("migration {version} failed at statement {statement}: {source}\n  statement: {preview}")]
    Execution {
        /// Version of the failing unit
        version: String,
        /// 1-based index of the failing statement within the script
        statement: usize,
        /// Truncated statement text for diagnostics
        preview: String,
        #[source]
        source: sqlx::Error,
    },

    /// Transaction begin/commit or connection acquisition failure
    #[error("connection error: {0}")]
    Connection(String),
}

impl MigrateError {
    /// Build an `Execution` error with the preview capped at
    /// [`STATEMENT_PREVIEW_LEN`] characters.
    pub fn execution(version: &str, statement: usize, sql: &str, source: sqlx::Error) -> Self {
        let mut preview: String = sql.chars().take(STATEMENT_PREVIEW_LEN).collect();
        if sql.chars().count() > STATEMENT_PREVIEW_LEN {
            preview.push_str("...");
        }
        MigrateError::Execution {
            version: version.to_string(),
            statement,
            preview,
            source,
        }
    }
}

//! Engine configuration
//!
//! The engine has exactly one environment-level setting: the migrations
//! root directory. Database connectivity is supplied by the caller.

use std::path::PathBuf;

/// Environment variable overriding the migrations root directory.
pub const MIGRATIONS_DIR_ENV: &str = "MIGRATIONS_DIR";

/// Configuration for the migration engine
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Directory holding one subdirectory per migration unit
    pub migrations_dir: PathBuf,
    /// Name of the ledger table tracking applied migrations
    pub ledger_table: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: "_stratum_migrations".to_string(),
        }
    }
}

impl MigratorConfig {
    /// Build a configuration from the environment, falling back to the
    /// conventional `./migrations` directory when `MIGRATIONS_DIR` is unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(MIGRATIONS_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.migrations_dir = PathBuf::from(dir);
            }
        }
        config
    }
}

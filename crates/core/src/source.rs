//! Migration source scanner
//!
//! Translates the migrations directory into an ordered list of
//! `MigrationUnit`s and creates new, templated units. On-disk layout is one
//! directory per unit named `<version>_<name>`, containing `up.sql` and an
//! optional `down.sql`.

use chrono::{NaiveDateTime, Utc};
use regex::Regex;
use std::fs;
use std::sync::OnceLock;

use crate::config::MigratorConfig;
use crate::error::{MigrateError, MigrateResult};
use crate::types::MigrationUnit;

/// Format of the 14-digit version string.
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Forward-script filename inside a unit directory.
pub const UP_FILE: &str = "up.sql";
/// Backward-script filename inside a unit directory.
pub const DOWN_FILE: &str = "down.sql";

fn unit_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{14})_(.+)$").expect("valid pattern"))
}

/// Scanner over the migrations directory
pub struct MigrationSource {
    config: MigratorConfig,
}

impl MigrationSource {
    pub fn new(config: MigratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Discover all migration units, sorted ascending by version.
    ///
    /// Entries that do not look like migration directories are ignored.
    /// Entries that match the naming pattern but carry an invalid timestamp,
    /// or lack an `up.sql`, are skipped with a warning. A missing root
    /// directory yields an empty set; a root that exists but cannot be
    /// listed is an error.
    pub fn scan(&self) -> MigrateResult<Vec<MigrationUnit>> {
        let root = &self.config.migrations_dir;
        if !root.exists() {
            tracing::warn!(
                root = %root.display(),
                "migrations directory does not exist, treating as empty"
            );
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(root).map_err(|e| {
            MigrateError::Io(format!("failed to read migrations directory {}: {}", root.display(), e))
        })?;

        let mut units = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| MigrateError::Io(format!("failed to read directory entry: {}", e)))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let dir_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let captures = match unit_dir_pattern().captures(&dir_name) {
                Some(c) => c,
                None => continue,
            };

            let version = captures[1].to_string();
            let name = captures[2].to_string();

            if NaiveDateTime::parse_from_str(&version, VERSION_FORMAT).is_err() {
                tracing::warn!(
                    directory = %dir_name,
                    "skipping migration-like directory with invalid timestamp"
                );
                continue;
            }

            let up_path = path.join(UP_FILE);
            if !up_path.exists() {
                tracing::warn!(
                    directory = %dir_name,
                    "skipping migration directory without {}", UP_FILE
                );
                continue;
            }
            let up_sql = fs::read_to_string(&up_path).map_err(|e| {
                MigrateError::Io(format!("failed to read {}: {}", up_path.display(), e))
            })?;

            let down_path = path.join(DOWN_FILE);
            let down_sql = if down_path.exists() {
                fs::read_to_string(&down_path).map_err(|e| {
                    MigrateError::Io(format!("failed to read {}: {}", down_path.display(), e))
                })?
            } else {
                String::new()
            };

            units.push(MigrationUnit {
                version,
                name,
                up_sql,
                down_sql,
                path,
            });
        }

        // Fixed-width zero-padded timestamps: string order is chronological order
        units.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(units)
    }

    /// Create a new, empty migration unit directory with templated scripts.
    pub fn create(&self, raw_name: &str) -> MigrateResult<MigrationUnit> {
        let root = &self.config.migrations_dir;
        fs::create_dir_all(root).map_err(|e| {
            MigrateError::Io(format!("failed to create migrations directory {}: {}", root.display(), e))
        })?;

        let version = Utc::now().format(VERSION_FORMAT).to_string();
        let name = sanitize_name(raw_name);
        if name.is_empty() {
            return Err(MigrateError::Io(format!(
                "migration name '{}' contains no usable characters",
                raw_name
            )));
        }

        let dir = root.join(format!("{}_{}", version, name));
        // create_dir (not create_dir_all) so a same-second collision fails
        // instead of silently reusing an existing unit
        fs::create_dir(&dir).map_err(|e| {
            MigrateError::Io(format!("failed to create migration directory {}: {}", dir.display(), e))
        })?;

        let header = format!(
            "-- Migration: {}\n-- Created: {}\n",
            name,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        let up_template = format!("{}\n-- Write the forward schema change here.\n", header);
        let down_template = format!("{}\n-- Write the statements that undo up.sql here.\n", header);

        let up_path = dir.join(UP_FILE);
        fs::write(&up_path, up_template)
            .map_err(|e| MigrateError::Io(format!("failed to write {}: {}", up_path.display(), e)))?;
        let down_path = dir.join(DOWN_FILE);
        fs::write(&down_path, down_template)
            .map_err(|e| MigrateError::Io(format!("failed to write {}: {}", down_path.display(), e)))?;

        tracing::info!(version = %version, name = %name, "created migration");

        Ok(MigrationUnit {
            version,
            name,
            up_sql: String::new(),
            down_sql: String::new(),
            path: dir,
        })
    }
}

/// Sanitize a raw migration name into a slug: lowercase, with every run of
/// characters outside `[a-z0-9_]` collapsed to a single underscore.
pub fn sanitize_name(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_was_separator = false;
    for c in raw.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
            last_was_separator = c == '_';
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }
    slug.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_in(dir: &TempDir) -> MigrationSource {
        MigrationSource::new(MigratorConfig {
            migrations_dir: dir.path().to_path_buf(),
            ..MigratorConfig::default()
        })
    }

    fn write_unit(dir: &TempDir, dir_name: &str, up: Option<&str>, down: Option<&str>) {
        let unit_dir = dir.path().join(dir_name);
        fs::create_dir_all(&unit_dir).unwrap();
        if let Some(up) = up {
            fs::write(unit_dir.join(UP_FILE), up).unwrap();
        }
        if let Some(down) = down {
            fs::write(unit_dir.join(DOWN_FILE), down).unwrap();
        }
    }

    #[test]
    fn scan_returns_units_sorted_by_version() {
        let dir = TempDir::new().unwrap();
        write_unit(&dir, "20240301000000_later", Some("SELECT 3;"), None);
        write_unit(&dir, "20240101000000_first", Some("SELECT 1;"), Some("SELECT -1;"));
        write_unit(&dir, "20240201000000_middle", Some("SELECT 2;"), None);

        let units = source_in(&dir).scan().unwrap();

        let versions: Vec<_> = units.iter().map(|u| u.version.as_str()).collect();
        assert_eq!(
            versions,
            vec!["20240101000000", "20240201000000", "20240301000000"]
        );
        assert_eq!(units[0].name, "first");
        assert_eq!(units[0].up_sql, "SELECT 1;");
        assert_eq!(units[0].down_sql, "SELECT -1;");
        assert!(units[1].down_sql.is_empty());
    }

    #[test]
    fn scan_ignores_entries_that_are_not_migrations() {
        let dir = TempDir::new().unwrap();
        write_unit(&dir, "20240101000000_real", Some("SELECT 1;"), None);
        write_unit(&dir, "notes", Some("SELECT 1;"), None);
        write_unit(&dir, "123_short_version", Some("SELECT 1;"), None);
        fs::write(dir.path().join("README.md"), "docs").unwrap();

        let units = source_in(&dir).scan().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "real");
    }

    #[test]
    fn scan_skips_pattern_match_with_invalid_timestamp() {
        let dir = TempDir::new().unwrap();
        // 13th month: matches the 14-digit pattern but is not a calendar date
        write_unit(&dir, "20241301000000_bad_month", Some("SELECT 1;"), None);
        write_unit(&dir, "20240101000000_good", Some("SELECT 1;"), None);

        let units = source_in(&dir).scan().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].version, "20240101000000");
    }

    #[test]
    fn scan_skips_unit_without_up_script() {
        let dir = TempDir::new().unwrap();
        write_unit(&dir, "20240101000000_no_up", None, Some("DROP TABLE t;"));

        let units = source_in(&dir).scan().unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let source = MigrationSource::new(MigratorConfig {
            migrations_dir: dir.path().join("does-not-exist"),
            ..MigratorConfig::default()
        });
        assert!(source.scan().unwrap().is_empty());
    }

    #[test]
    fn create_then_scan_round_trips() {
        let dir = TempDir::new().unwrap();
        let source = source_in(&dir);

        let created = source.create("add users table").unwrap();
        assert_eq!(created.name, "add_users_table");
        assert_eq!(created.version.len(), 14);
        assert!(created.path.join(UP_FILE).exists());
        assert!(created.path.join(DOWN_FILE).exists());

        let units = source.scan().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].version, created.version);
        assert_eq!(units[0].name, "add_users_table");
    }

    #[test]
    fn create_rejects_colliding_directory() {
        let dir = TempDir::new().unwrap();
        let source = source_in(&dir);
        let created = source.create("twice").unwrap();

        // Same version + name already on disk
        fs::remove_dir_all(&created.path).unwrap();
        fs::create_dir_all(&created.path).unwrap();
        let result = source.create("twice");
        // Collision is only guaranteed within the same wall-clock second, so
        // accept either outcome but require the error shape when it happens.
        if created.version == Utc::now().format(VERSION_FORMAT).to_string() {
            assert!(matches!(result, Err(MigrateError::Io(_))));
        }
    }

    #[test]
    fn create_rejects_unusable_names() {
        let dir = TempDir::new().unwrap();
        let source = source_in(&dir);
        assert!(matches!(source.create("!!!"), Err(MigrateError::Io(_))));
    }

    #[test]
    fn sanitize_collapses_and_lowercases() {
        assert_eq!(sanitize_name("Add Users Table!"), "add_users_table");
        assert_eq!(sanitize_name("weird--- name   here"), "weird_name_here");
        assert_eq!(sanitize_name("already_fine_2"), "already_fine_2");
        assert_eq!(sanitize_name("__padded__"), "padded");
    }

    #[test]
    fn sanitized_names_contain_only_slug_characters() {
        for raw in ["Add Users Table!", "héllo wörld", "a  b\tc", "UPPER"] {
            let slug = sanitize_name(raw);
            assert!(
                slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                "bad slug {:?} from {:?}",
                slug,
                raw
            );
        }
    }
}

use stratum_core::{MigrationSource, Migrator, MigratorConfig};

/// Create a new migration unit under the configured migrations directory.
pub fn create(name: &str) -> anyhow::Result<()> {
    let source = MigrationSource::new(MigratorConfig::from_env());
    let unit = source.create(name)?;
    println!("Created migration {}_{}", unit.version, unit.name);
    println!("  {}", unit.path.display());
    Ok(())
}

/// List every discovered unit with its script-file presence flags.
pub fn list() -> anyhow::Result<()> {
    let source = MigrationSource::new(MigratorConfig::from_env());
    let units = source.scan()?;

    if units.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    println!("{:<16} {:<32} {:<4} {:<4}", "Version", "Name", "Up", "Down");
    for unit in &units {
        println!(
            "{:<16} {:<32} {:<4} {:<4}",
            unit.version,
            unit.name,
            "yes",
            if unit.has_down() { "yes" } else { "-" }
        );
    }
    println!("\n{} migration(s)", units.len());
    Ok(())
}

/// Apply all pending migrations.
pub async fn up(migrator: &Migrator) -> anyhow::Result<()> {
    let summary = migrator.run_all().await?;
    print_run(&summary);
    Ok(())
}

/// Apply a single pending migration.
pub async fn up_one(migrator: &Migrator) -> anyhow::Result<()> {
    let summary = migrator.run_up(1).await?;
    print_run(&summary);
    Ok(())
}

/// Roll back up to `count` of the most recently applied migrations.
pub async fn down(migrator: &Migrator, count: i64) -> anyhow::Result<()> {
    let summary = migrator.run_down(count).await?;
    for version in &summary.reverted {
        println!("Rolled back {}", version);
    }
    for version in &summary.skipped {
        println!("Skipped {} (no source unit or no down script)", version);
    }
    if summary.reverted.is_empty() && summary.skipped.is_empty() {
        println!("Nothing to roll back");
    } else {
        println!(
            "Rolled back {} migration(s) in {}ms",
            summary.reverted.len(),
            summary.execution_time_ms
        );
    }
    Ok(())
}

/// Print the applied/pending table with a summary count.
pub async fn status(migrator: &Migrator) -> anyhow::Result<()> {
    let statuses = migrator.status().await?;

    if statuses.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    println!("{:<16} {:<32} {:<10} {}", "Version", "Name", "State", "Applied At");
    for status in &statuses {
        let applied_at = status
            .applied_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default();
        println!(
            "{:<16} {:<32} {:<10} {}",
            status.version,
            status.name,
            if status.applied { "applied" } else { "pending" },
            applied_at
        );
    }

    let applied = statuses.iter().filter(|s| s.applied).count();
    println!("\n{} applied, {} pending", applied, statuses.len() - applied);

    if let Some(latest) = migrator.ledger().latest_applied().await? {
        println!("Latest applied: {}_{}", latest.version, latest.name);
    }
    Ok(())
}

/// Drop all tables and rebuild from empty. Confirmation happens in `main`.
pub async fn fresh(migrator: &Migrator) -> anyhow::Result<()> {
    let summary = migrator.fresh().await?;
    println!("Database rebuilt from empty");
    print_run(&summary);
    Ok(())
}

/// Roll back everything, then reapply. Confirmation happens in `main`.
pub async fn reset(migrator: &Migrator) -> anyhow::Result<()> {
    let (reverted, reapplied) = migrator.reset().await?;
    println!(
        "Rolled back {} migration(s), skipped {}",
        reverted.reverted.len(),
        reverted.skipped.len()
    );
    print_run(&reapplied);
    Ok(())
}

fn print_run(summary: &stratum_core::RunSummary) {
    for version in &summary.applied {
        println!("Applied {}", version);
    }
    if summary.applied.is_empty() {
        println!("Nothing to migrate");
    } else {
        println!(
            "Applied {} migration(s) in {}ms",
            summary.applied.len(),
            summary.execution_time_ms
        );
    }
}

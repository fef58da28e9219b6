mod commands;
mod interactive;

use clap::{Parser, Subcommand};
use sqlx::PgPool;
use stratum_core::{Migrator, MigratorConfig};

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Versioned schema migrations for Postgres", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new migration unit
    Create {
        /// Migration name, sanitized into a lowercase slug
        name: String,
    },

    /// Apply all pending migrations
    Up,

    /// Apply a single pending migration
    #[command(name = "up:one")]
    UpOne,

    /// Roll back the most recently applied migrations
    Down {
        /// How many migrations to roll back
        #[arg(default_value_t = 1)]
        count: i64,
    },

    /// Show applied/pending status for every discovered migration
    Status,

    /// List discovered migration units and their script files
    List,

    /// Drop every table in the schema and reapply all migrations
    Fresh,

    /// Roll back every applied migration, then reapply all of them
    Reset,
}

async fn build_migrator() -> anyhow::Result<Migrator> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = PgPool::connect(&url)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to database: {}", e))?;
    Ok(Migrator::new(MigratorConfig::from_env(), pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create { name } => {
            commands::migrate::create(&name)?;
        }
        Commands::List => {
            commands::migrate::list()?;
        }
        Commands::Up => {
            commands::migrate::up(&build_migrator().await?).await?;
        }
        Commands::UpOne => {
            commands::migrate::up_one(&build_migrator().await?).await?;
        }
        Commands::Down { count } => {
            commands::migrate::down(&build_migrator().await?, count).await?;
        }
        Commands::Status => {
            commands::migrate::status(&build_migrator().await?).await?;
        }
        Commands::Fresh => {
            let confirmed = interactive::Prompt::confirm(
                "This will DROP EVERY TABLE in the schema and reapply all migrations. Continue?",
                false,
            )?;
            if !confirmed {
                println!("Aborted.");
                return Ok(());
            }
            commands::migrate::fresh(&build_migrator().await?).await?;
        }
        Commands::Reset => {
            let confirmed = interactive::Prompt::confirm(
                "This will roll back every applied migration and reapply them. Continue?",
                false,
            )?;
            if !confirmed {
                println!("Aborted.");
                return Ok(());
            }
            commands::migrate::reset(&build_migrator().await?).await?;
        }
    }

    Ok(())
}

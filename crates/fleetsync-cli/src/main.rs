mod status;
mod sync;

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use fleetsync_core::DataKind;
use fleetsync_sync::{DatasetStore, PgStore, RetrievalAudit, TrackingService};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fleetsync-cli")]
#[command(about = "Operator commands for the fleetsync transit mirror")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations.
    Migrate,
    /// Synchronize one dataset from the upstream service.
    Sync {
        #[arg(value_enum)]
        target: SyncTarget,
        /// Run a pass even when the stored data is still fresh.
        #[arg(long)]
        force: bool,
    },
    /// Show retrieval status for each dataset.
    Status {
        /// Number of recent attempts to list.
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncTarget {
    Facilities,
    Vehicles,
}

impl From<SyncTarget> for DataKind {
    fn from(target: SyncTarget) -> Self {
        match target {
            SyncTarget::Facilities => DataKind::Facility,
            SyncTarget::Vehicles => DataKind::Vehicle,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = fleetsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = fleetsync_db::PoolConfig::from_app_config(&config);
    let pool = fleetsync_db::connect_pool(&config.database_url, pool_config).await?;

    match cli.command {
        Commands::Migrate => {
            let applied = fleetsync_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Sync { target, force } => {
            let store = Arc::new(PgStore::new(pool));
            let service = TrackingService::from_config(
                &config,
                Arc::clone(&store) as Arc<dyn DatasetStore>,
                store as Arc<dyn RetrievalAudit>,
            )?;
            sync::run_sync(&service, target.into(), force).await?;
        }
        Commands::Status { limit } => {
            status::run_status(&pool, &config, limit).await?;
        }
    }

    Ok(())
}

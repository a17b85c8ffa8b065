mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use fleetsync_sync::{DatasetStore, PgStore, RetrievalAudit, TrackingService};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = fleetsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting fleetsync server");

    let pool_config = fleetsync_db::PoolConfig::from_app_config(&config);
    let pool = fleetsync_db::connect_pool(&config.database_url, pool_config).await?;
    fleetsync_db::run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let service = Arc::new(TrackingService::from_config(
        &config,
        Arc::clone(&store) as Arc<dyn DatasetStore>,
        store as Arc<dyn RetrievalAudit>,
    )?);

    let _scheduler = match config.refresh_cron.as_deref() {
        Some(cron) => Some(scheduler::build_scheduler(Arc::clone(&service), cron).await?),
        None => None,
    };

    let app = build_app(AppState { service });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}

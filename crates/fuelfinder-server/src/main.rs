mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use fuelfinder_client::FuelFinderClient;
use fuelfinder_core::Retailers;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(fuelfinder_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting fuelfinder-server");

    let pool_config = fuelfinder_db::PoolConfig::from_app_config(&config);
    let pool = fuelfinder_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = fuelfinder_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let retailers = Arc::new(Retailers::embedded()?);
    tracing::info!(retailers = retailers.len(), "loaded retailer table");

    let client = Arc::new(FuelFinderClient::connect(&config).await?);
    fuelfinder_db::ingest::seed_watermarks(&pool, &client).await?;

    let _scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&client), &config).await?;

    let app = build_app(AppState {
        pool,
        client,
        retailers,
        max_bbox_span_meters: config.max_bbox_span_meters,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}

//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring station and price fetch cycles.

use std::sync::Arc;

use fuelfinder_client::FuelFinderClient;
use fuelfinder_core::AppConfig;
use fuelfinder_db::ingest;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression is rejected, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    client: Arc<FuelFinderClient>,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_stations_job(
        &scheduler,
        &config.stations_schedule,
        pool.clone(),
        Arc::clone(&client),
    )
    .await?;
    register_prices_job(&scheduler, &config.prices_schedule, pool, client).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_stations_job(
    scheduler: &JobScheduler,
    schedule: &str,
    pool: PgPool,
    client: Arc<FuelFinderClient>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let pool = pool.clone();
        let client = Arc::clone(&client);

        Box::pin(async move {
            tracing::info!("scheduler: starting station fetch");
            if let Err(e) = ingest::run_stations_cycle(&pool, &client).await {
                tracing::error!(error = %e, "scheduler: station fetch failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(schedule, "scheduler: station fetch registered");
    Ok(())
}

async fn register_prices_job(
    scheduler: &JobScheduler,
    schedule: &str,
    pool: PgPool,
    client: Arc<FuelFinderClient>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let pool = pool.clone();
        let client = Arc::clone(&client);

        Box::pin(async move {
            tracing::info!("scheduler: starting price fetch");
            if let Err(e) = ingest::run_prices_cycle(&pool, &client).await {
                tracing::error!(error = %e, "scheduler: price fetch failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(schedule, "scheduler: price fetch registered");
    Ok(())
}

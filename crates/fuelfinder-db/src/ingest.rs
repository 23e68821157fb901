//! One fetch cycle per resource, persisted through the repository.
//!
//! Shared by the server's scheduled jobs and the CLI's one-shot import.

use fuelfinder_client::{ClientError, FetchSummary, FuelFinderClient, ResourceKind};
use sqlx::PgPool;
use thiserror::Error;

use crate::{insert_prices, insert_stations, list_watermarks, set_watermark};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Load stored watermarks into the client so the first cycle after a
/// restart is incremental.
///
/// # Errors
///
/// Returns [`IngestError::Sqlx`] if the watermarks cannot be read.
pub async fn seed_watermarks(pool: &PgPool, client: &FuelFinderClient) -> Result<(), IngestError> {
    for row in list_watermarks(pool).await? {
        let kind = match row.resource.as_str() {
            "stations" => ResourceKind::Stations,
            "prices" => ResourceKind::Prices,
            other => {
                tracing::warn!(resource = other, "ignoring watermark for unknown resource");
                continue;
            }
        };
        client.seed_watermark(kind, row.watermark).await;
        tracing::info!(resource = %kind, watermark = %row.watermark, "seeded fetch watermark");
    }
    Ok(())
}

/// Fetch changed stations into the repository and persist the new watermark.
///
/// # Errors
///
/// Returns [`IngestError::Client`] if the fetch cycle fails (the sink's
/// database errors surface as [`ClientError::Sink`]), or
/// [`IngestError::Sqlx`] if the watermark cannot be stored.
pub async fn run_stations_cycle(
    pool: &PgPool,
    client: &FuelFinderClient,
) -> Result<FetchSummary, IngestError> {
    let summary = client
        .fetch_stations(|batch| {
            let pool = pool.clone();
            async move { insert_stations(&pool, &batch).await }
        })
        .await?;
    persist(pool, ResourceKind::Stations, &summary).await?;
    Ok(summary)
}

/// Fetch changed prices into the repository and persist the new watermark.
///
/// # Errors
///
/// Same as [`run_stations_cycle`].
pub async fn run_prices_cycle(
    pool: &PgPool,
    client: &FuelFinderClient,
) -> Result<FetchSummary, IngestError> {
    let summary = client
        .fetch_prices(|batch| {
            let pool = pool.clone();
            async move { insert_prices(&pool, &batch).await.map(|_| batch.len()) }
        })
        .await?;
    persist(pool, ResourceKind::Prices, &summary).await?;
    Ok(summary)
}

async fn persist(
    pool: &PgPool,
    kind: ResourceKind,
    summary: &FetchSummary,
) -> Result<(), sqlx::Error> {
    set_watermark(pool, kind.as_str(), summary.started_at).await?;
    tracing::info!(
        resource = %kind,
        watermark = %summary.started_at,
        "watermark persisted"
    );
    Ok(())
}

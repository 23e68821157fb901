//! One-shot import: authenticate, then run the requested fetch cycles.

use fuelfinder_client::{FetchSummary, FuelFinderClient, ResourceKind};
use fuelfinder_core::AppConfig;
use fuelfinder_db::ingest::{self, IngestError};
use sqlx::PgPool;

/// Which resources an import run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resources {
    pub stations: bool,
    pub prices: bool,
}

impl Resources {
    /// No flag means both. Stations run first so prices can be joined to them.
    pub(crate) fn from_flags(stations: bool, prices: bool) -> Self {
        if stations || prices {
            Self { stations, prices }
        } else {
            Self {
                stations: true,
                prices: true,
            }
        }
    }
}

/// Connect to upstream, seed stored watermarks, then run the requested
/// cycles in order.
///
/// # Errors
///
/// Returns an error if authentication, a fetch cycle, or watermark
/// persistence fails.
pub(crate) async fn run_import(
    pool: &PgPool,
    config: &AppConfig,
    resources: Resources,
) -> anyhow::Result<()> {
    let client = FuelFinderClient::connect(config).await?;
    ingest::seed_watermarks(pool, &client).await?;

    for (kind, summary) in import(pool, &client, resources).await? {
        tracing::info!(
            resource = %kind,
            batches = summary.batches,
            processed = summary.processed,
            skipped = summary.skipped,
            "import complete"
        );
        println!(
            "{kind}: {} record(s) in {} batch(es), {} skipped",
            summary.processed, summary.batches, summary.skipped
        );
    }
    Ok(())
}

/// Stations run before prices and the first failure stops the run.
async fn import(
    pool: &PgPool,
    client: &FuelFinderClient,
    resources: Resources,
) -> Result<Vec<(ResourceKind, FetchSummary)>, IngestError> {
    let mut completed = Vec::new();
    if resources.stations {
        let summary = ingest::run_stations_cycle(pool, client).await?;
        completed.push((ResourceKind::Stations, summary));
    }
    if resources.prices {
        let summary = ingest::run_prices_cycle(pool, client).await?;
        completed.push((ResourceKind::Prices, summary));
    }
    Ok(completed)
}

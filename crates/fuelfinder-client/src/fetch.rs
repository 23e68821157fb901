//! Paginated, watermarked batch retrieval.
//!
//! Each cycle walks `batch-number = 1, 2, ...` sequentially, handing every
//! decoded batch to a caller-supplied sink before requesting the next. The
//! loop ends when upstream answers 400 or serves an empty batch, when the
//! sink reports zero records processed and none were skipped, or when the
//! counter passes the declared total. A batch whose records all fail to
//! decode does not end the cycle. Only a cycle that completes without error
//! advances the resource's watermark, and it advances to the cycle's *start*
//! time so the next window has no gap.

use std::future::Future;

use chrono::{DateTime, Utc};
use fuelfinder_core::{Station, StationPrices};
use serde::de::DeserializeOwned;

use crate::client::FuelFinderClient;
use crate::error::ClientError;
use crate::types::{decode_batch, ResourceKind};

/// Hard ceiling on batches per cycle.
pub const MAX_BATCHES: u32 = 10_000;

/// A record type served by one paginated endpoint.
pub trait BatchResource: DeserializeOwned {
    const KIND: ResourceKind;
}

impl BatchResource for Station {
    const KIND: ResourceKind = ResourceKind::Stations;
}

impl BatchResource for StationPrices {
    const KIND: ResourceKind = ResourceKind::Prices;
}

/// Outcome of one completed fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    /// Batches handed to the sink.
    pub batches: u32,
    /// Sum of the counts the sink reported.
    pub processed: usize,
    /// Records dropped because they failed to decode.
    pub skipped: usize,
    /// The new watermark for the resource.
    pub started_at: DateTime<Utc>,
}

impl FuelFinderClient {
    /// Fetch every station batch changed since the stations watermark.
    ///
    /// # Errors
    ///
    /// See [`FuelFinderClient::fetch_batches`].
    pub async fn fetch_stations<F, Fut, E>(&self, sink: F) -> Result<FetchSummary, ClientError>
    where
        F: FnMut(Vec<Station>) -> Fut,
        Fut: Future<Output = Result<usize, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.fetch_batches::<Station, F, Fut, E>(sink).await
    }

    /// Fetch every price batch changed since the prices watermark.
    ///
    /// # Errors
    ///
    /// See [`FuelFinderClient::fetch_batches`].
    pub async fn fetch_prices<F, Fut, E>(&self, sink: F) -> Result<FetchSummary, ClientError>
    where
        F: FnMut(Vec<StationPrices>) -> Fut,
        Fut: Future<Output = Result<usize, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.fetch_batches::<StationPrices, F, Fut, E>(sink).await
    }

    /// Run one fetch cycle for `T`, streaming each batch into `sink`.
    ///
    /// Records that fail to decode individually are logged and skipped; the
    /// rest of the batch is still delivered. No batch is retried.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`], [`ClientError::UnexpectedStatus`] or
    ///   [`ClientError::Deserialize`] for the failing batch request.
    /// - [`ClientError::ApiError`] if an envelope reports failure.
    /// - [`ClientError::Authentication`] if a token exchange fails.
    /// - [`ClientError::Sink`] wrapping the sink's own error.
    /// - [`ClientError::PaginationLimit`] after [`MAX_BATCHES`] batches.
    pub async fn fetch_batches<T, F, Fut, E>(&self, mut sink: F) -> Result<FetchSummary, ClientError>
    where
        T: BatchResource,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<usize, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let kind = T::KIND;
        let started_at = Utc::now();
        let since = self.watermark(kind).await;

        tracing::info!(
            resource = %kind,
            since = ?since,
            "starting fetch cycle"
        );

        let mut summary = FetchSummary {
            batches: 0,
            processed: 0,
            skipped: 0,
            started_at,
        };
        let mut batch_number: u32 = 1;

        loop {
            if batch_number > MAX_BATCHES {
                return Err(ClientError::PaginationLimit {
                    resource: kind.as_str(),
                    max_batches: MAX_BATCHES,
                });
            }

            let url = self.batch_url(kind, batch_number, since)?;
            let Some(body) = self.get_batch(&url).await? else {
                tracing::info!(
                    resource = %kind,
                    batch = batch_number,
                    "no more batches available"
                );
                break;
            };

            let context = format!("{kind} batch {batch_number} ({url})");
            let batch = decode_batch(kind, &body, batch_number, &context)?;
            let received = batch.records.len();
            let (records, skipped) = decode_records::<T>(batch.records, kind, batch_number);
            summary.skipped += skipped;

            let processed = sink(records)
                .await
                .map_err(|e| ClientError::Sink {
                    batch: batch_number,
                    source: e.into(),
                })?;
            summary.batches += 1;
            summary.processed += processed;

            tracing::debug!(
                resource = %kind,
                batch = batch_number,
                processed,
                skipped,
                "batch stored"
            );

            if received == 0 || (processed == 0 && skipped == 0) {
                break;
            }

            batch_number += 1;
            if batch.total_batches.is_some_and(|total| batch_number > total) {
                break;
            }
        }

        self.advance_watermark(kind, started_at).await;
        tracing::info!(
            resource = %kind,
            batches = summary.batches,
            processed = summary.processed,
            skipped = summary.skipped,
            watermark = %started_at,
            "fetch cycle complete"
        );
        Ok(summary)
    }
}

/// Decode each raw record on its own so one malformed entry cannot sink the
/// batch. Returns the decoded records and the number skipped.
fn decode_records<T: DeserializeOwned>(
    raw: Vec<serde_json::Value>,
    kind: ResourceKind,
    batch_number: u32,
) -> (Vec<T>, usize) {
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                tracing::warn!(
                    resource = %kind,
                    batch = batch_number,
                    index,
                    error = %e,
                    "skipping malformed record"
                );
            }
        }
    }
    (records, skipped)
}

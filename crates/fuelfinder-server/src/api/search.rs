use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use fuelfinder_core::{derive_statistics, BoundingBox, SearchResult, SearchStatistics};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, AppState};

const DEFAULT_HISTORY_LIMIT: i64 = 1;

/// Histogram bucket width, in pence, for the statistics block.
const STATISTICS_BUCKET_WIDTH: u32 = fuelfinder_core::DEFAULT_BUCKET_WIDTH;

pub(super) const ATTRIBUTION: &[&str] = &[
    "Contains public sector information licensed under the Open Government Licence v3.0.",
    "Fuel price data provided by the UK Fuel Finder service.",
];

/// Both parameters arrive as raw strings so malformed values produce our own
/// messages rather than the extractor's.
#[derive(Debug, Deserialize)]
pub(super) struct SearchQuery {
    pub bbox: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchResponse {
    results: Vec<SearchResult>,
    attribution: &'static [&'static str],
    statistics: SearchStatistics,
    last_updated: Option<DateTime<Utc>>,
}

pub(super) async fn search_fuel_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let bbox = BoundingBox::parse(
        query.bbox.as_deref().unwrap_or_default(),
        state.max_bbox_span_meters,
    )
    .map_err(|e| ApiError::new(req_id.0.clone(), "bad_request", e.to_string()))?;

    let limit = parse_limit(query.limit.as_deref()).ok_or_else(|| {
        ApiError::new(req_id.0.clone(), "bad_request", "invalid limit parameter")
    })?;

    let results = fuelfinder_db::search(&state.pool, &bbox, limit, &state.retailers)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::debug!(
        request_id = %req_id.0,
        results = results.len(),
        limit,
        "search served"
    );

    let statistics = derive_statistics(&results, STATISTICS_BUCKET_WIDTH);
    Ok(Json(SearchResponse {
        results,
        attribution: ATTRIBUTION,
        statistics,
        last_updated: state.client.last_updated().await,
    }))
}

/// Missing means the default; anything that is not a non-negative integer
/// is rejected.
fn parse_limit(raw: Option<&str>) -> Option<i64> {
    match raw {
        None => Some(DEFAULT_HISTORY_LIMIT),
        Some(value) => value.trim().parse::<u32>().ok().map(i64::from),
    }
}

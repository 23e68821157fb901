//! Bounded-box search: stations plus their recent, change-only price history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fuelfinder_core::{BoundingBox, PricePoint, Retailers, SearchResult};
use sqlx::PgPool;

use crate::stations::search_stations;

/// One deduplicated price-history entry for a station in the search box.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub node_id: String,
    pub fuel_type: String,
    pub price: f64,
    pub price_last_updated: DateTime<Utc>,
    pub price_change_effective_timestamp: Option<DateTime<Utc>>,
}

impl From<PriceHistoryRow> for PricePoint {
    fn from(row: PriceHistoryRow) -> Self {
        PricePoint {
            price: row.price,
            updated_on: row.price_last_updated,
            effective_from: row.price_change_effective_timestamp,
        }
    }
}

/// Price history for every station inside `bbox`, newest first per
/// `(node_id, fuel_type)`.
///
/// A row is dropped when the next older observation carries the same price,
/// so a run of identical prices occupies one slot and keeps the timestamp at
/// which that price first appeared. At most `limit` entries survive per pair;
/// a non-positive `limit` yields no rows.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn search_price_history(
    pool: &PgPool,
    bbox: &BoundingBox,
    limit: i64,
) -> Result<Vec<PriceHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, PriceHistoryRow>(
        "WITH in_box AS ( \
             SELECT fp.node_id, fp.fuel_type, fp.price, fp.price_last_updated, \
                    fp.price_change_effective_timestamp, \
                    LEAD(fp.price) OVER ( \
                        PARTITION BY fp.node_id, fp.fuel_type \
                        ORDER BY fp.price_last_updated DESC \
                    ) AS older_price \
             FROM fuel_prices fp \
             JOIN stations s ON s.node_id = fp.node_id \
             WHERE s.latitude BETWEEN $1 AND $2 \
               AND s.longitude BETWEEN $3 AND $4 \
         ), \
         changes AS ( \
             SELECT node_id, fuel_type, price, price_last_updated, \
                    price_change_effective_timestamp, \
                    ROW_NUMBER() OVER ( \
                        PARTITION BY node_id, fuel_type \
                        ORDER BY price_last_updated DESC \
                    ) AS depth \
             FROM in_box \
             WHERE older_price IS NULL OR older_price <> price \
         ) \
         SELECT node_id, fuel_type, price::float8 AS price, price_last_updated, \
                price_change_effective_timestamp \
         FROM changes \
         WHERE depth <= $5 \
         ORDER BY node_id, fuel_type, price_last_updated DESC",
    )
    .bind(bbox.south)
    .bind(bbox.north)
    .bind(bbox.west)
    .bind(bbox.east)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Stations inside `bbox` joined with their price history and resolved
/// retailer.
///
/// The station and history queries run concurrently; the first failure
/// aborts the search. Stations with no history keep an empty price map.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if either query fails.
pub async fn search(
    pool: &PgPool,
    bbox: &BoundingBox,
    limit: i64,
    retailers: &Retailers,
) -> Result<Vec<SearchResult>, sqlx::Error> {
    let (stations, history) = tokio::try_join!(
        search_stations(pool, bbox),
        search_price_history(pool, bbox, limit),
    )?;

    let mut by_node: HashMap<String, Vec<PriceHistoryRow>> = HashMap::new();
    for row in history {
        by_node.entry(row.node_id.clone()).or_default().push(row);
    }

    let results = stations
        .into_iter()
        .map(|station| {
            let retailer = retailers.match_brand_name(station.display_brand()).cloned();
            let rows = by_node.remove(&station.node_id).unwrap_or_default();
            let mut result = SearchResult::new(station);
            result.retailer = retailer;
            // Rows arrive newest first within each fuel type.
            for row in rows {
                result
                    .fuel_prices
                    .entry(row.fuel_type.clone())
                    .or_default()
                    .push(PricePoint::from(row));
            }
            result
        })
        .collect();

    Ok(results)
}

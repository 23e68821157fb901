use fuelfinder_core::{normalize_price, FuelPrice, StationPrices};
use sqlx::{PgPool, Postgres, Transaction};

const UPSERT_PRICE_SQL: &str = "\
    INSERT INTO fuel_prices \
        (node_id, fuel_type, price, price_last_updated, price_change_effective_timestamp) \
    VALUES ($1, $2, $3::numeric(10,2), $4, $5) \
    ON CONFLICT (node_id, fuel_type, price_last_updated) DO UPDATE SET \
        price                            = EXCLUDED.price, \
        price_change_effective_timestamp = EXCLUDED.price_change_effective_timestamp";

/// Insert one row per (station, fuel price) in a single transaction.
///
/// Prices are normalized to pence before storage. Re-delivering an
/// observation with the same `(node_id, fuel_type, price_last_updated)`
/// overwrites it rather than duplicating. Any failing row rolls back the
/// whole batch. Returns the number of price rows written.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the transaction cannot begin or commit, or if
/// any row fails to write.
pub async fn insert_prices(pool: &PgPool, stations: &[StationPrices]) -> Result<u64, sqlx::Error> {
    let total: usize = stations.iter().map(|s| s.fuel_prices.len()).sum();
    if total == 0 {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut written = 0u64;
    for station in stations {
        for price in &station.fuel_prices {
            if let Err(e) = upsert_price(&mut tx, &station.node_id, price).await {
                tracing::warn!(
                    node_id = %station.node_id,
                    fuel_type = %price.fuel_type,
                    batch_size = total,
                    error = %e,
                    "price insert failed; rolling back batch"
                );
                tx.rollback().await?;
                return Err(e);
            }
            written += 1;
        }
    }
    tx.commit().await?;

    Ok(written)
}

async fn upsert_price(
    tx: &mut Transaction<'_, Postgres>,
    node_id: &str,
    price: &FuelPrice,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_PRICE_SQL)
        .bind(node_id)
        .bind(&price.fuel_type)
        .bind(normalize_price(price.price))
        .bind(price.price_last_updated)
        .bind(price.price_change_effective_timestamp)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

//! Durable fetch watermarks, one row per upstream resource.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WatermarkRow {
    pub resource: String,
    pub watermark: DateTime<Utc>,
}

/// Stored watermark for `resource`, if a cycle has ever completed.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn get_watermark(
    pool: &PgPool,
    resource: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT watermark FROM fetch_watermarks WHERE resource = $1",
    )
    .bind(resource)
    .fetch_optional(pool)
    .await
}

/// Record `watermark` as the start of the last successful cycle for `resource`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the upsert fails.
pub async fn set_watermark(
    pool: &PgPool,
    resource: &str,
    watermark: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO fetch_watermarks (resource, watermark) \
         VALUES ($1, $2) \
         ON CONFLICT (resource) DO UPDATE SET \
             watermark  = EXCLUDED.watermark, \
             updated_at = NOW()",
    )
    .bind(resource)
    .bind(watermark)
    .execute(pool)
    .await?;
    Ok(())
}

/// All stored watermarks, ordered by resource name.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn list_watermarks(pool: &PgPool) -> Result<Vec<WatermarkRow>, sqlx::Error> {
    sqlx::query_as::<_, WatermarkRow>(
        "SELECT resource, watermark FROM fetch_watermarks ORDER BY resource",
    )
    .fetch_all(pool)
    .await
}

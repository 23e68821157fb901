//! Persistence and bbox lookup for the `stations` table.

use chrono::{DateTime, Utc};
use fuelfinder_core::{cleanse_address_line1, BoundingBox, Location, OpeningTimes, Station};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

const UPSERT_STATION_SQL: &str = "\
    INSERT INTO stations \
        (node_id, mft_organisation_name, public_phone_number, trading_name, \
         is_same_trading_and_brand_name, brand_name, temporary_closure, permanent_closure, \
         permanent_closure_date, is_motorway_service_station, is_supermarket_service_station, \
         address_line_1, address_line_2, city, country, county, postcode, latitude, longitude, \
         opening_times, amenities, fuel_types) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
            $18, $19, $20, $21, $22) \
    ON CONFLICT (node_id) DO UPDATE SET \
        mft_organisation_name          = EXCLUDED.mft_organisation_name, \
        public_phone_number            = EXCLUDED.public_phone_number, \
        trading_name                   = EXCLUDED.trading_name, \
        is_same_trading_and_brand_name = EXCLUDED.is_same_trading_and_brand_name, \
        brand_name                     = EXCLUDED.brand_name, \
        temporary_closure              = EXCLUDED.temporary_closure, \
        permanent_closure              = EXCLUDED.permanent_closure, \
        permanent_closure_date         = EXCLUDED.permanent_closure_date, \
        is_motorway_service_station    = EXCLUDED.is_motorway_service_station, \
        is_supermarket_service_station = EXCLUDED.is_supermarket_service_station, \
        address_line_1                 = EXCLUDED.address_line_1, \
        address_line_2                 = EXCLUDED.address_line_2, \
        city                           = EXCLUDED.city, \
        country                        = EXCLUDED.country, \
        county                         = EXCLUDED.county, \
        postcode                       = EXCLUDED.postcode, \
        latitude                       = EXCLUDED.latitude, \
        longitude                      = EXCLUDED.longitude, \
        opening_times                  = EXCLUDED.opening_times, \
        amenities                      = EXCLUDED.amenities, \
        fuel_types                     = EXCLUDED.fuel_types, \
        updated_at                     = NOW()";

/// A row from the `stations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StationRow {
    pub node_id: String,
    pub mft_organisation_name: String,
    pub public_phone_number: String,
    pub trading_name: String,
    pub is_same_trading_and_brand_name: bool,
    pub brand_name: String,
    pub temporary_closure: bool,
    pub permanent_closure: bool,
    pub permanent_closure_date: Option<DateTime<Utc>>,
    pub is_motorway_service_station: bool,
    pub is_supermarket_service_station: bool,
    pub address_line_1: String,
    pub address_line_2: String,
    pub city: String,
    pub country: String,
    pub county: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub opening_times: Json<OpeningTimes>,
    pub amenities: Json<Vec<String>>,
    pub fuel_types: Json<Vec<String>>,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station {
            node_id: row.node_id,
            mft_organisation_name: row.mft_organisation_name,
            public_phone_number: row.public_phone_number,
            trading_name: row.trading_name,
            is_same_trading_and_brand_name: row.is_same_trading_and_brand_name,
            brand_name: row.brand_name,
            temporary_closure: row.temporary_closure,
            permanent_closure: row.permanent_closure,
            permanent_closure_date: row.permanent_closure_date,
            is_motorway_service_station: row.is_motorway_service_station,
            is_supermarket_service_station: row.is_supermarket_service_station,
            location: Location {
                address_line_1: row.address_line_1,
                address_line_2: row.address_line_2,
                city: row.city,
                country: row.country,
                county: row.county,
                postcode: row.postcode,
                latitude: row.latitude,
                longitude: row.longitude,
            },
            amenities: row.amenities.0,
            opening_times: row.opening_times.0,
            fuel_types: row.fuel_types.0,
        }
    }
}

/// Upsert a batch of stations in one transaction.
///
/// The first address line is cleansed of duplicated city/postcode suffixes
/// before storage. Any failing row rolls back the whole batch. Returns the
/// number of stations written; an empty batch is a no-op returning zero.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the transaction cannot begin or commit, or if
/// any row fails to write.
pub async fn insert_stations(pool: &PgPool, stations: &[Station]) -> Result<usize, sqlx::Error> {
    if stations.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for station in stations {
        if let Err(e) = upsert_station(&mut tx, station).await {
            tracing::warn!(
                node_id = %station.node_id,
                batch_size = stations.len(),
                error = %e,
                "station upsert failed; rolling back batch"
            );
            tx.rollback().await?;
            return Err(e);
        }
    }
    tx.commit().await?;

    Ok(stations.len())
}

async fn upsert_station(
    tx: &mut Transaction<'_, Postgres>,
    station: &Station,
) -> Result<(), sqlx::Error> {
    let location = &station.location;
    let address_line_1 =
        cleanse_address_line1(&location.address_line_1, &location.city, &location.postcode);

    sqlx::query(UPSERT_STATION_SQL)
        .bind(&station.node_id)
        .bind(&station.mft_organisation_name)
        .bind(&station.public_phone_number)
        .bind(&station.trading_name)
        .bind(station.is_same_trading_and_brand_name)
        .bind(&station.brand_name)
        .bind(station.temporary_closure)
        .bind(station.permanent_closure)
        .bind(station.permanent_closure_date)
        .bind(station.is_motorway_service_station)
        .bind(station.is_supermarket_service_station)
        .bind(address_line_1)
        .bind(&location.address_line_2)
        .bind(&location.city)
        .bind(&location.country)
        .bind(&location.county)
        .bind(&location.postcode)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(Json(&station.opening_times))
        .bind(Json(&station.amenities))
        .bind(Json(&station.fuel_types))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// All stations whose location lies inside `bbox` (edges inclusive),
/// ordered by node id.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn search_stations(pool: &PgPool, bbox: &BoundingBox) -> Result<Vec<Station>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StationRow>(
        "SELECT node_id, mft_organisation_name, public_phone_number, trading_name, \
                is_same_trading_and_brand_name, brand_name, temporary_closure, \
                permanent_closure, permanent_closure_date, is_motorway_service_station, \
                is_supermarket_service_station, address_line_1, address_line_2, city, \
                country, county, postcode, latitude, longitude, opening_times, amenities, \
                fuel_types \
         FROM stations \
         WHERE latitude BETWEEN $1 AND $2 \
           AND longitude BETWEEN $3 AND $4 \
         ORDER BY node_id",
    )
    .bind(bbox.south)
    .bind(bbox.north)
    .bind(bbox.west)
    .bind(bbox.east)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Station::from).collect())
}

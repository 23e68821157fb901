use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A petrol filling station as published by the upstream `/pfs` endpoint.
///
/// `node_id` is the natural key: re-ingesting a station with the same id
/// replaces the stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub node_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mft_organisation_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub public_phone_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trading_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_same_trading_and_brand_name: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub brand_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temporary_closure: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permanent_closure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent_closure_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_motorway_service_station: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_supermarket_service_station: bool,
    pub location: Location,
    #[serde(default, deserialize_with = "null_as_default")]
    pub amenities: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub opening_times: OpeningTimes,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fuel_types: Vec<String>,
}

impl Station {
    /// The name used to resolve a retailer: the brand name, or the trading
    /// name when the brand is blank.
    #[must_use]
    pub fn display_brand(&self) -> &str {
        if self.brand_name.trim().is_empty() {
            &self.trading_name
        } else {
            &self.brand_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address_line_1: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub address_line_2: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub county: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpeningTimes {
    /// Keyed by lowercase weekday name, e.g. `"monday"`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub usual_days: BTreeMap<String, DailyOpeningTimes>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bank_holiday: BankHolidayHours,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyOpeningTimes {
    #[serde(default, deserialize_with = "null_as_default")]
    pub open: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub close: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_24_hours: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankHolidayHours {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub open_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub close_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_24_hours: bool,
}

/// One station's current prices, as published by `/pfs/fuel-prices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationPrices {
    pub node_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mft_organisation_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub public_phone_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trading_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fuel_prices: Vec<FuelPrice>,
}

/// A raw price observation. `price` is whatever unit upstream reported;
/// see [`crate::normalize_price`] for the conversion applied before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelPrice {
    pub fuel_type: String,
    pub price: f64,
    pub price_last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_effective_timestamp: Option<DateTime<Utc>>,
}

/// Upstream sends explicit `null` for absent strings, flags and lists.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

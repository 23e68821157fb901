use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::retailers::Retailer;
use crate::stations::Station;

/// Meters per degree of latitude used by the flat-earth span check.
pub const METERS_PER_DEGREE: f64 = 111_132.0;

/// Default maximum bbox extent along either axis.
pub const DEFAULT_MAX_SPAN_METERS: f64 = 50_000.0;

/// Validation failures for a `bbox` query value. The messages are returned to
/// API callers verbatim.
#[derive(Debug, Error, PartialEq)]
pub enum BoundingBoxError {
    #[error("bbox must have 4 comma-separated values")]
    WrongArity,

    #[error("invalid bbox value '{0}': not a valid float")]
    InvalidValue(String),

    #[error("bbox must be ordered west,south,east,north")]
    Inverted,

    #[error("bbox must define a valid area (no more than {max_km} KM in either dimension)")]
    TooLarge { max_km: f64 },
}

/// A geographic box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Parse `west,south,east,north` and reject boxes wider or taller than
    /// `max_span_meters`.
    ///
    /// Spans are approximated on a flat earth: latitude degrees are
    /// [`METERS_PER_DEGREE`] long, longitude degrees are scaled by the cosine
    /// of the box's mean latitude.
    ///
    /// # Errors
    ///
    /// Returns [`BoundingBoxError`] when the value is malformed, non-finite,
    /// inverted, or too large.
    pub fn parse(raw: &str, max_span_meters: f64) -> Result<Self, BoundingBoxError> {
        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() != 4 {
            return Err(BoundingBoxError::WrongArity);
        }

        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            let value = part
                .trim()
                .parse::<f64>()
                .map_err(|_| BoundingBoxError::InvalidValue((*part).to_string()))?;
            if !value.is_finite() {
                return Err(BoundingBoxError::InvalidValue((*part).to_string()));
            }
            *slot = value;
        }

        let [west, south, east, north] = values;
        let bbox = Self {
            west,
            south,
            east,
            north,
        };

        if west > east || south > north {
            return Err(BoundingBoxError::Inverted);
        }

        let (height, width) = bbox.span_meters();
        if height > max_span_meters || width > max_span_meters {
            return Err(BoundingBoxError::TooLarge {
                max_km: max_span_meters / 1000.0,
            });
        }

        Ok(bbox)
    }

    /// Approximate `(north-south, east-west)` extent in meters.
    #[must_use]
    pub fn span_meters(&self) -> (f64, f64) {
        let mean_lat = ((self.south + self.north) / 2.0).to_radians();
        let height = (self.north - self.south).abs() * METERS_PER_DEGREE;
        let width = (self.east - self.west).abs() * METERS_PER_DEGREE * mean_lat.cos();
        (height, width)
    }

    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.south..=self.north).contains(&latitude)
            && (self.west..=self.east).contains(&longitude)
    }
}

/// One entry of a station's price history for a single fuel type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    /// Pence.
    pub price: f64,
    pub updated_on: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
}

/// A station joined with its recent price history.
///
/// Each history is newest first, has consecutive equal prices collapsed, and
/// holds at most the requested number of entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub station: Station,
    pub fuel_prices: BTreeMap<String, Vec<PricePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retailer: Option<Retailer>,
}

impl SearchResult {
    #[must_use]
    pub fn new(station: Station) -> Self {
        Self {
            station,
            fuel_prices: BTreeMap::new(),
            retailer: None,
        }
    }

    /// Most recent price for `fuel_type`, if any history exists.
    #[must_use]
    pub fn latest_price(&self, fuel_type: &str) -> Option<f64> {
        self.fuel_prices
            .get(fuel_type)
            .and_then(|history| history.first())
            .map(|point| point.price)
    }
}

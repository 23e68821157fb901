use std::collections::BTreeMap;

use serde::Serialize;

use crate::search::SearchResult;

/// Histogram bucket width, in pence, used by the search endpoint.
pub const DEFAULT_BUCKET_WIDTH: u32 = 3;

/// Per-fuel-type descriptive statistics over a search result set.
///
/// Every statistic samples each station's most recent price only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStatistics {
    /// Node ids of every station sharing the lowest price.
    #[serde(rename = "cheapest_stations", skip_serializing_if = "BTreeMap::is_empty")]
    pub cheapest_stations: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub lowest_price: BTreeMap<String, f64>,
    /// Rounded to one decimal place.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub average_price: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub highest_price: BTreeMap<String, f64>,
    /// Population standard deviation; absent for fuel types with one sample.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub standard_deviation: BTreeMap<String, f64>,
    /// Fuel type to `"start-end"` bucket label to station count.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub price_distribution: BTreeMap<String, BTreeMap<String, u32>>,
    /// Retailer name to station count. Stations without a retailer are omitted.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub brand_distribution: BTreeMap<String, u32>,
}

/// Derive statistics from joined search results.
///
/// `bucket_width` is the histogram width in whole pence; zero falls back to
/// [`DEFAULT_BUCKET_WIDTH`].
#[must_use]
#[allow(clippy::float_cmp)] // ties are exact copies of the same stored value
pub fn derive_statistics(results: &[SearchResult], bucket_width: u32) -> SearchStatistics {
    let bucket_width = if bucket_width == 0 {
        DEFAULT_BUCKET_WIDTH
    } else {
        bucket_width
    };

    // fuel type -> (node id, latest price), one sample per station
    let mut samples: BTreeMap<&str, Vec<(&str, f64)>> = BTreeMap::new();
    for result in results {
        for (fuel_type, history) in &result.fuel_prices {
            if let Some(latest) = history.first() {
                samples
                    .entry(fuel_type.as_str())
                    .or_default()
                    .push((result.station.node_id.as_str(), latest.price));
            }
        }
    }

    let mut stats = SearchStatistics::default();

    for (fuel_type, points) in samples {
        let prices: Vec<f64> = points.iter().map(|(_, price)| *price).collect();
        let lowest = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let highest = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = mean(&prices);

        stats
            .cheapest_stations
            .insert(fuel_type.to_string(), cheapest(&points, lowest));
        stats.lowest_price.insert(fuel_type.to_string(), lowest);
        stats.highest_price.insert(fuel_type.to_string(), highest);
        stats
            .average_price
            .insert(fuel_type.to_string(), (mean * 10.0).round() / 10.0);

        if prices.len() > 1 {
            stats
                .standard_deviation
                .insert(fuel_type.to_string(), population_std_dev(&prices, mean));
        }

        let histogram = stats
            .price_distribution
            .entry(fuel_type.to_string())
            .or_default();
        for price in &prices {
            *histogram.entry(bucket_label(*price, bucket_width)).or_insert(0) += 1;
        }
    }

    for result in results {
        if let Some(retailer) = &result.retailer {
            *stats
                .brand_distribution
                .entry(retailer.name.clone())
                .or_insert(0) += 1;
        }
    }

    stats
}

#[allow(clippy::float_cmp)]
fn cheapest(points: &[(&str, f64)], lowest: f64) -> Vec<String> {
    points
        .iter()
        .filter(|(_, price)| *price == lowest)
        .map(|(node_id, _)| (*node_id).to_string())
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(prices: &[f64]) -> f64 {
    prices.iter().sum::<f64>() / prices.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn population_std_dev(prices: &[f64], mean: f64) -> f64 {
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64;
    variance.sqrt()
}

/// `"start-end"` label for the inclusive bucket holding `price`, where
/// `start` is the truncated price floor-divided by `width`, times `width`.
#[allow(clippy::cast_possible_truncation)]
fn bucket_label(price: f64, width: u32) -> String {
    let width = i64::from(width);
    let start = (price.trunc() as i64).div_euclid(width) * width;
    format!("{}-{}", start, start + width - 1)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::retailers::Retailer;
    use crate::search::PricePoint;
    use crate::stations::{Location, OpeningTimes, Station};

    fn station(node_id: &str) -> Station {
        Station {
            node_id: node_id.to_string(),
            mft_organisation_name: String::new(),
            public_phone_number: String::new(),
            trading_name: String::new(),
            is_same_trading_and_brand_name: false,
            brand_name: String::new(),
            temporary_closure: false,
            permanent_closure: false,
            permanent_closure_date: None,
            is_motorway_service_station: false,
            is_supermarket_service_station: false,
            location: Location {
                address_line_1: String::new(),
                address_line_2: String::new(),
                city: String::new(),
                country: String::new(),
                county: String::new(),
                postcode: String::new(),
                latitude: 51.5,
                longitude: -0.1,
            },
            amenities: Vec::new(),
            opening_times: OpeningTimes::default(),
            fuel_types: Vec::new(),
        }
    }

    fn result(node_id: &str, fuel: &[(&str, &[f64])], retailer: Option<&str>) -> SearchResult {
        let now = Utc::now();
        let mut result = SearchResult::new(station(node_id));
        for (fuel_type, history) in fuel {
            let points = history
                .iter()
                .enumerate()
                .map(|(i, price)| PricePoint {
                    price: *price,
                    updated_on: now - Duration::hours(i64::try_from(i).expect("small index")),
                    effective_from: None,
                })
                .collect();
            result.fuel_prices.insert((*fuel_type).to_string(), points);
        }
        result.retailer = retailer.map(|name| Retailer {
            name: name.to_string(),
            website_url: "https://example.com".to_string(),
            logo_url: None,
        });
        result
    }

    #[test]
    fn empty_results_produce_empty_statistics() {
        let stats = derive_statistics(&[], DEFAULT_BUCKET_WIDTH);
        assert_eq!(stats, SearchStatistics::default());
        let json = serde_json::to_value(&stats).expect("serializes");
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn uses_only_most_recent_price_per_station() {
        let results = vec![
            result("a", &[("E10", &[140.0, 100.0])], None),
            result("b", &[("E10", &[150.0])], None),
        ];
        let stats = derive_statistics(&results, DEFAULT_BUCKET_WIDTH);
        assert_eq!(stats.lowest_price["E10"], 140.0);
        assert_eq!(stats.highest_price["E10"], 150.0);
        assert_eq!(stats.average_price["E10"], 145.0);
        assert_eq!(stats.standard_deviation["E10"], 5.0);
    }

    #[test]
    fn mean_is_rounded_to_one_decimal_place() {
        let results = vec![
            result("a", &[("B7", &[150.9])], None),
            result("b", &[("B7", &[151.9])], None),
            result("c", &[("B7", &[151.9])], None),
        ];
        let stats = derive_statistics(&results, DEFAULT_BUCKET_WIDTH);
        assert_eq!(stats.average_price["B7"], 151.6);
    }

    #[test]
    fn single_sample_has_no_standard_deviation() {
        let results = vec![result("a", &[("E10", &[140.0])], None)];
        let stats = derive_statistics(&results, DEFAULT_BUCKET_WIDTH);
        assert!(!stats.standard_deviation.contains_key("E10"));
        assert_eq!(stats.average_price["E10"], 140.0);
    }

    #[test]
    fn cheapest_stations_include_ties() {
        let results = vec![
            result("a", &[("E10", &[139.9])], None),
            result("b", &[("E10", &[141.9])], None),
            result("c", &[("E10", &[139.9])], None),
        ];
        let stats = derive_statistics(&results, DEFAULT_BUCKET_WIDTH);
        assert_eq!(stats.cheapest_stations["E10"], vec!["a", "c"]);
    }

    #[test]
    fn histogram_buckets_use_floor_division() {
        let results = vec![
            result("a", &[("E10", &[138.9])], None),
            result("b", &[("E10", &[139.0])], None),
            result("c", &[("E10", &[140.5])], None),
            result("d", &[("E10", &[141.0])], None),
        ];
        let stats = derive_statistics(&results, 3);
        let histogram = &stats.price_distribution["E10"];
        assert_eq!(histogram.get("138-140"), Some(&3));
        assert_eq!(histogram.get("141-143"), Some(&1));
        assert_eq!(histogram.len(), 2);
    }

    #[test]
    fn zero_bucket_width_falls_back_to_default() {
        let results = vec![result("a", &[("E10", &[140.0])], None)];
        let stats = derive_statistics(&results, 0);
        assert_eq!(stats.price_distribution["E10"].get("138-140"), Some(&1));
    }

    #[test]
    fn fuel_types_with_empty_history_are_skipped() {
        let results = vec![result("a", &[("E10", &[]), ("B7", &[150.0])], None)];
        let stats = derive_statistics(&results, DEFAULT_BUCKET_WIDTH);
        assert!(!stats.lowest_price.contains_key("E10"));
        assert!(stats.lowest_price.contains_key("B7"));
    }

    #[test]
    fn brand_distribution_skips_unresolved_retailers() {
        let results = vec![
            result("a", &[], Some("SHELL")),
            result("b", &[], Some("SHELL")),
            result("c", &[], Some("ESSO")),
            result("d", &[], None),
        ];
        let stats = derive_statistics(&results, DEFAULT_BUCKET_WIDTH);
        assert_eq!(stats.brand_distribution.len(), 2);
        assert_eq!(stats.brand_distribution["SHELL"], 2);
        assert_eq!(stats.brand_distribution["ESSO"], 1);
    }
}

pub mod app_config;
pub mod config;
pub mod normalize;
pub mod retailers;
pub mod search;
pub mod stations;
pub mod stats;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use normalize::{cleanse_address_line1, normalize_price};
pub use retailers::{Retailer, RetailerError, Retailers};
pub use search::{BoundingBox, BoundingBoxError, PricePoint, SearchResult};
pub use stations::{
    BankHolidayHours, DailyOpeningTimes, FuelPrice, Location, OpeningTimes, Station, StationPrices,
};
pub use stats::{derive_statistics, SearchStatistics, DEFAULT_BUCKET_WIDTH};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

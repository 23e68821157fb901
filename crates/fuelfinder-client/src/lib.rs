pub mod client;
pub mod error;
pub mod fetch;
mod token;
pub mod types;

pub use client::FuelFinderClient;
pub use error::ClientError;
pub use fetch::{BatchResource, FetchSummary, MAX_BATCHES};
pub use token::REFRESH_MARGIN_SECS;
pub use types::{Credentials, ResourceKind};

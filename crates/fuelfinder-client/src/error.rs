use thiserror::Error;

/// Errors returned by the Fuel Finder API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying `reqwest::Client` could not be constructed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Network or TLS failure while talking to `url`.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A non-2xx status other than the end-of-pagination 400.
    #[error("unexpected HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Credential or refresh-token exchange was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A batch envelope reported `"success": false`.
    #[error("Fuel Finder API error: {0}")]
    ApiError(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The caller's sink rejected a batch.
    #[error("sink failed on batch {batch}: {source}")]
    Sink {
        batch: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{resource} fetch exceeded {max_batches} batches")]
    PaginationLimit {
        resource: &'static str,
        max_batches: u32,
    },
}

//! HTTP client for the UK Fuel Finder API.
//!
//! Wraps `reqwest` with OAuth token management, proactive refresh, and the
//! per-resource watermarks that drive incremental fetches. Pagination lives in
//! [`crate::fetch`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fuelfinder_core::config::DEFAULT_API_BASE_URL;
use fuelfinder_core::AppConfig;
use reqwest::{header, Client, StatusCode, Url};
use tokio::sync::RwLock;

use crate::error::ClientError;
use crate::token::{TokenState, TokenStore};
use crate::types::{
    AuthRequest, AuthResponse, Credentials, RefreshRequest, ResourceKind, TokenData,
};

const DEFAULT_USER_AGENT: &str = "fuelfinder/0.1 (price-ingestion)";

/// Client for the Fuel Finder REST API.
///
/// Use [`FuelFinderClient::connect`] in binaries (builds from config and
/// authenticates) or [`FuelFinderClient::with_base_url`] to point at a mock
/// server in tests. Requests made before [`FuelFinderClient::authenticate`]
/// authenticate lazily.
pub struct FuelFinderClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    tokens: TokenStore,
    watermarks: RwLock<HashMap<ResourceKind, DateTime<Utc>>>,
}

impl FuelFinderClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(credentials: Credentials, timeout_secs: u64) -> Result<Self, ClientError> {
        Self::with_base_url(credentials, timeout_secs, DEFAULT_USER_AGENT, DEFAULT_API_BASE_URL)
    }

    /// Creates a client with a custom base URL and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        credentials: Credentials,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so `Url::join` appends to the `/api/v1`
        // path instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            tokens: TokenStore::default(),
            watermarks: RwLock::new(HashMap::new()),
        })
    }

    /// Builds a client from application config without authenticating.
    ///
    /// # Errors
    ///
    /// See [`FuelFinderClient::with_base_url`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        Self::with_base_url(
            Credentials::new(config.client_id.clone(), config.client_secret.clone()),
            config.request_timeout_secs,
            &config.user_agent,
            &config.api_base_url,
        )
    }

    /// Builds a client from config and performs the initial credential exchange.
    ///
    /// # Errors
    ///
    /// Returns any construction error, or [`ClientError::Authentication`] /
    /// [`ClientError::Transport`] if the exchange fails.
    pub async fn connect(config: &AppConfig) -> Result<Self, ClientError> {
        let client = Self::from_config(config)?;
        client.authenticate().await?;
        Ok(client)
    }

    /// Exchanges the client id and secret for a fresh token pair.
    ///
    /// Not retried: a failure here is fatal to the calling operation.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] on network failure.
    /// - [`ClientError::Authentication`] on a non-200 status, `success: false`,
    ///   or a response without token data.
    pub async fn authenticate(&self) -> Result<(), ClientError> {
        let mut guard = self.tokens.lock().await;
        let state = self.exchange_credentials().await?;
        *guard = Some(state);
        Ok(())
    }

    /// Exchanges the refresh token for a new access token, falling back to a
    /// full credential exchange when no refresh token is held.
    ///
    /// # Errors
    ///
    /// Same as [`FuelFinderClient::authenticate`].
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let mut guard = self.tokens.lock().await;
        let next = match guard.take() {
            Some(current) if current.refresh_token().is_some() => {
                self.exchange_refresh_token(current).await?
            }
            _ => self.exchange_credentials().await?,
        };
        *guard = Some(next);
        Ok(())
    }

    /// When the current access token expires, if one is held.
    pub async fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.expires_at().await
    }

    /// Start time of the last fully successful fetch cycle for `kind`.
    pub async fn watermark(&self, kind: ResourceKind) -> Option<DateTime<Utc>> {
        self.watermarks.read().await.get(&kind).copied()
    }

    /// Seed a watermark, e.g. from durable storage at startup.
    pub async fn seed_watermark(&self, kind: ResourceKind, at: DateTime<Utc>) {
        self.watermarks.write().await.insert(kind, at);
    }

    pub(crate) async fn advance_watermark(&self, kind: ResourceKind, at: DateTime<Utc>) {
        self.watermarks.write().await.insert(kind, at);
    }

    /// Timestamp of the most recent successful price fetch cycle.
    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.watermark(ResourceKind::Prices).await
    }

    /// Builds the batch URL for `kind` with properly encoded query parameters.
    pub(crate) fn batch_url(
        &self,
        kind: ResourceKind,
        batch_number: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Url, ClientError> {
        let mut url = self.endpoint(kind.path())?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("batch-number", &batch_number.to_string());
            if let Some(since) = since {
                // Upstream expects a naive timestamp, not RFC 3339.
                pairs.append_pair(
                    "effective-start-timestamp",
                    &since.format("%Y-%m-%d %H:%M:%S").to_string(),
                );
            }
        }
        Ok(url)
    }

    /// Sends an authorized GET for one batch.
    ///
    /// Returns `Ok(None)` on HTTP 400, which upstream uses to signal that no
    /// more batches exist.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] on network failure.
    /// - [`ClientError::UnexpectedStatus`] on any other non-2xx status.
    pub(crate) async fn get_batch(&self, url: &Url) -> Result<Option<Vec<u8>>, ClientError> {
        let authorization = self.authorization().await?;

        tracing::debug!(method = "GET", %url, "requesting batch");
        let response = self
            .http
            .get(url.clone())
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        Ok(Some(body.to_vec()))
    }

    /// Returns the `Authorization` header value, authenticating or refreshing
    /// first if the held token is missing or inside the refresh margin.
    async fn authorization(&self) -> Result<String, ClientError> {
        let mut guard = self.tokens.lock().await;
        let now = Utc::now();

        let state = match guard.take() {
            None => self.exchange_credentials().await?,
            Some(current) if current.needs_refresh(now) => {
                tracing::info!(
                    expires_at = %current.expires_at(),
                    "access token inside refresh margin; refreshing"
                );
                if current.refresh_token().is_some() {
                    self.exchange_refresh_token(current).await?
                } else {
                    self.exchange_credentials().await?
                }
            }
            Some(current) => current,
        };

        let header = state.authorization();
        *guard = Some(state);
        Ok(header)
    }

    async fn exchange_credentials(&self) -> Result<TokenState, ClientError> {
        let body = AuthRequest {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
        };
        let data = self.post_auth("oauth/generate_access_token", &body).await?;
        let state = TokenState::from_token_data(data, Utc::now());
        tracing::info!(
            token_type = state.token_type(),
            expires_at = %state.expires_at(),
            "authenticated with Fuel Finder API"
        );
        Ok(state)
    }

    async fn exchange_refresh_token(&self, current: TokenState) -> Result<TokenState, ClientError> {
        let refresh_token = current.refresh_token().unwrap_or_default().to_string();
        let body = RefreshRequest {
            client_id: &self.credentials.client_id,
            refresh_token: &refresh_token,
        };
        let data = self
            .post_auth("oauth/regenerate_access_token", &body)
            .await?;
        let state = current.refreshed(data, Utc::now());
        tracing::info!(expires_at = %state.expires_at(), "refreshed access token");
        Ok(state)
    }

    async fn post_auth<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<TokenData, ClientError> {
        let url = self.endpoint(path)?;
        tracing::debug!(method = "POST", %url, "requesting token");

        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Authentication(format!(
                "unexpected HTTP {} from {url}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        let parsed: AuthResponse =
            serde_json::from_slice(&bytes).map_err(|source| ClientError::Deserialize {
                context: url.to_string(),
                source,
            })?;

        if !parsed.success {
            return Err(ClientError::Authentication(
                parsed
                    .message
                    .unwrap_or_else(|| "credential exchange rejected".to_string()),
            ));
        }

        parsed
            .data
            .ok_or_else(|| ClientError::Authentication("response missing token data".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("cannot join '{path}': {e}")))
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

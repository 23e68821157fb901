//! OAuth token state shared by every request a client makes.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, MutexGuard};

use crate::types::TokenData;

/// Tokens are refreshed when less than this many seconds of lifetime remain.
pub const REFRESH_MARGIN_SECS: i64 = 300;

// One year; larger upstream values are clamped.
const MAX_EXPIRES_IN_SECS: i64 = 31_536_000;

/// Credentials captured at the moment of (re)authentication.
pub(crate) struct TokenState {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_in: TimeDelta,
    captured_at: DateTime<Utc>,
}

impl TokenState {
    pub(crate) fn from_token_data(data: TokenData, captured_at: DateTime<Utc>) -> Self {
        Self {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            token_type: data.token_type,
            expires_in: TimeDelta::seconds(data.expires_in.clamp(0, MAX_EXPIRES_IN_SECS)),
            captured_at,
        }
    }

    /// Apply a refresh response. Upstream may omit the refresh token on
    /// regeneration, in which case the previous one stays valid.
    pub(crate) fn refreshed(self, data: TokenData, captured_at: DateTime<Utc>) -> Self {
        let mut next = Self::from_token_data(data, captured_at);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token;
        }
        next
    }

    pub(crate) fn expires_at(&self) -> DateTime<Utc> {
        self.captured_at + self.expires_in
    }

    pub(crate) fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() - now < TimeDelta::seconds(REFRESH_MARGIN_SECS)
    }

    pub(crate) fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub(crate) fn token_type(&self) -> &str {
        &self.token_type
    }

    pub(crate) fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Internally synchronized holder for the current [`TokenState`].
///
/// The lock is held across a refresh so concurrent callers wait for the new
/// token instead of each starting their own exchange.
#[derive(Default)]
pub(crate) struct TokenStore {
    state: Mutex<Option<TokenState>>,
}

impl TokenStore {
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<TokenState>> {
        self.state.lock().await
    }

    pub(crate) async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.as_ref().map(TokenState::expires_at)
    }
}

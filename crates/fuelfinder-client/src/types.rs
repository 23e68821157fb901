//! Fuel Finder wire types.
//!
//! Batch endpoints answer either with the documented envelope or, for the
//! prices endpoint in practice, a bare JSON array. [`decode_batch`] resolves
//! the shape once and hands the fetch loop a single [`Batch`] representation.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// The two paginated upstream resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Stations,
    Prices,
}

impl ResourceKind {
    /// Stable key used for logging and watermark persistence.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Stations => "stations",
            ResourceKind::Prices => "prices",
        }
    }

    pub(crate) fn path(self) -> &'static str {
        match self {
            ResourceKind::Stations => "pfs",
            ResourceKind::Prices => "pfs/fuel-prices",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth client credentials.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// oauth
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub client_id: &'a str,
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<TokenData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenData {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

// ---------------------------------------------------------------------------
// batches
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BatchMetadata {
    #[serde(default)]
    pub batch_number: u32,
    #[serde(default)]
    pub batch_size: u32,
    #[serde(default)]
    pub total_batches: Option<u32>,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    /// Treated as successful when absent; only an explicit `false` fails.
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub metadata: Option<BatchMetadata>,
}

fn default_success() -> bool {
    true
}

/// The two top-level shapes a batch response can take.
#[derive(Debug)]
pub(crate) enum BatchShape {
    Envelope(Envelope),
    BareArray(Vec<serde_json::Value>),
}

impl BatchShape {
    /// Pick the shape from the first significant byte of the body.
    pub(crate) fn parse(body: &[u8], context: &str) -> Result<Self, ClientError> {
        let first = body.iter().copied().find(|b| !b.is_ascii_whitespace());
        let deserialize_err = |source| ClientError::Deserialize {
            context: context.to_string(),
            source,
        };

        if first == Some(b'[') {
            serde_json::from_slice(body)
                .map(BatchShape::BareArray)
                .map_err(deserialize_err)
        } else {
            serde_json::from_slice(body)
                .map(BatchShape::Envelope)
                .map_err(deserialize_err)
        }
    }
}

/// One page of raw records, independent of its wire shape.
#[derive(Debug)]
pub(crate) struct Batch {
    pub records: Vec<serde_json::Value>,
    /// Declared (or synthesized) batch count, when the response carries one.
    pub total_batches: Option<u32>,
}

/// Decode a batch body and normalize it to a [`Batch`].
///
/// A bare array is the documented shape for stations. For prices it is an
/// upstream quirk: the batch is treated as one page with
/// `total_batches = batch_number + 2`, which keeps pagination going until an
/// empty batch or a 400 ends it. That total is a guess, not an upstream
/// guarantee.
pub(crate) fn decode_batch(
    kind: ResourceKind,
    body: &[u8],
    batch_number: u32,
    context: &str,
) -> Result<Batch, ClientError> {
    match BatchShape::parse(body, context)? {
        BatchShape::Envelope(envelope) => {
            if !envelope.success {
                return Err(ClientError::ApiError(
                    envelope
                        .message
                        .unwrap_or_else(|| format!("{kind} batch {batch_number} failed")),
                ));
            }
            if let Some(meta) = &envelope.metadata {
                tracing::debug!(
                    resource = %kind,
                    batch = meta.batch_number,
                    batch_size = meta.batch_size,
                    total_batches = ?meta.total_batches,
                    cached = meta.cached,
                    "batch metadata"
                );
            }
            Ok(Batch {
                records: envelope.data.unwrap_or_default(),
                total_batches: envelope.metadata.and_then(|meta| meta.total_batches),
            })
        }
        BatchShape::BareArray(records) => {
            let total_batches = match kind {
                ResourceKind::Stations => None,
                ResourceKind::Prices => {
                    tracing::warn!(
                        resource = %kind,
                        batch = batch_number,
                        records = records.len(),
                        "received bare array instead of envelope; assuming more batches follow"
                    );
                    Some(batch_number + 2)
                }
            };
            Ok(Batch {
                records,
                total_batches,
            })
        }
    }
}

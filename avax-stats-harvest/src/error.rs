//! Typed failures of a single external request.

use alloy::transports::{RpcError, TransportError, TransportErrorKind};

/// Why one JSON-RPC call or HTTP request failed.
///
/// Only [`FetchError::RateLimited`] and [`FetchError::Transient`] are worth
/// retrying; everything else is returned to the caller on first sight.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The endpoint asked us to slow down (HTTP 429 or an RPC limit error).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The requested resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection, timeout or server-side (5xx) failure.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Any other non-2xx HTTP response.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message returned by the node.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// JSON-RPC error code public Avalanche nodes use for exceeded limits.
const RPC_LIMIT_EXCEEDED: i64 = -32005;

impl FetchError {
    /// Classify a non-2xx HTTP response.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited(body),
            404 => Self::NotFound(body),
            500..=599 => Self::Transient(format!("HTTP {status}: {body}")),
            _ => Self::Status { status, body },
        }
    }

    /// Whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Decode(e.to_string());
        }
        match e.status() {
            Some(status) => Self::from_status(status.as_u16(), e.to_string()),
            None => Self::Transient(e.to_string()),
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match &e {
            RpcError::Transport(TransportErrorKind::HttpError(http)) => {
                Self::from_status(http.status, http.body.clone())
            }
            RpcError::ErrorResp(payload) if payload.code == RPC_LIMIT_EXCEEDED => {
                Self::RateLimited(payload.message.to_string())
            }
            RpcError::ErrorResp(payload) => Self::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
            },
            RpcError::SerError(_) | RpcError::DeserError { .. } | RpcError::NullResp => {
                Self::Decode(e.to_string())
            }
            _ => Self::Transient(e.to_string()),
        }
    }
}

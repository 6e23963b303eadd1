//! Transport-level error types.

use thiserror::Error;

use crate::health::EndpointSnapshot;
use crate::policy::classify;
use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
///
/// The enum is `Clone` so a single settled failure can be handed to every
/// caller coalesced onto the same in-flight read.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// HTTP request failed. `status` is present when the server answered
    /// with a non-success status, absent for connection-level failures
    /// (refused, reset, DNS).
    #[error("HTTP error{}: {message}", fmt_status(.status))]
    Http {
        status: Option<u16>,
        message: String,
    },

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// A read exhausted its retries on every eligible endpoint.
    ///
    /// Carries the last error observed and a health snapshot of every
    /// configured endpoint for diagnosis.
    #[error("all endpoints unhealthy (last error: {last_error})")]
    AllEndpointsUnhealthy {
        last_error: Box<TransportError>,
        endpoints: Vec<EndpointSnapshot>,
    },

    /// The transport was destroyed while this invocation was pending.
    #[error("transport destroyed")]
    Destroyed,

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" {code}"),
        None => String::new(),
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}

impl TransportError {
    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }

    /// Message text used for substring classification.
    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            Self::Rpc(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns `true` if this error is worth retrying in place.
    pub fn is_retryable(&self) -> bool {
        classify::is_retryable_error(self)
    }

    /// Returns `true` if the endpoint itself looks unreachable, as opposed
    /// to the request being rejected on its content.
    pub fn is_connection_level(&self) -> bool {
        classify::is_connection_level_error(self)
    }
}

//! Error classification — retryable, connection-level, write methods.
//!
//! Pure predicates over [`TransportError`]. The ordering matters:
//! non-retryable patterns are checked first and win outright, so an error
//! that is a deterministic outcome of the request content is never retried
//! no matter what other signals it carries. Anything unrecognized defaults
//! to non-retryable — don't retry what you don't recognize.

use crate::error::TransportError;

/// Deterministic request-level failures. Retrying these wastes attempts and,
/// for submissions, risks duplicating a side-effecting operation.
const NON_RETRYABLE_PATTERNS: &[&str] = &[
    "account does not exist",
    "could not find",
    "custom program error",
    "insufficient funds",
    "signature verification",
    "transaction simulation failed",
];

/// Transient degradation — retry in place before failing over.
const RETRYABLE_PATTERNS: &[&str] = &[
    "etimedout",
    "econnrefused",
    "econnreset",
    "enotfound",
    "socket hang up",
    "blockhash not found",
    "node is behind",
    "node is unhealthy",
    "too many requests",
];

/// Endpoint unreachable. Narrower than [`RETRYABLE_PATTERNS`]: excludes
/// rate-limit and staleness errors, which mean the endpoint is reachable but
/// degraded — a write must not be blindly replayed elsewhere on those.
const CONNECTION_PATTERNS: &[&str] = &[
    "etimedout",
    "econnrefused",
    "econnreset",
    "enotfound",
    "socket hang up",
];

const RETRYABLE_STATUSES: &[u16] = &[429, 502, 503, 504];
const CONNECTION_STATUSES: &[u16] = &[502, 503, 504];

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    let lower = message.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

/// Returns `true` if the error is transient and worth retrying.
pub fn is_retryable_error(err: &TransportError) -> bool {
    let message = err.message();
    if matches_any(&message, NON_RETRYABLE_PATTERNS) {
        return false;
    }
    if let Some(status) = err.status() {
        if RETRYABLE_STATUSES.contains(&status) {
            return true;
        }
    }
    if matches!(err, TransportError::Timeout { .. }) {
        return true;
    }
    matches_any(&message, RETRYABLE_PATTERNS)
}

/// Returns `true` if the endpoint itself looks unreachable.
///
/// Only this class of error justifies failing a write over to a second
/// endpoint: the original submission cannot have been observed by the node.
pub fn is_connection_level_error(err: &TransportError) -> bool {
    if let Some(status) = err.status() {
        if CONNECTION_STATUSES.contains(&status) {
            return true;
        }
    }
    if matches!(err, TransportError::Timeout { .. }) {
        return true;
    }
    matches_any(&err.message(), CONNECTION_PATTERNS)
}

/// Returns `true` for non-idempotent submission methods.
///
/// `simulateTransaction` is deliberately absent: simulation is idempotent
/// and follows the read path.
pub fn is_write_method(method: &str) -> bool {
    matches!(
        method,
        "sendTransaction" | "sendEncodedTransaction" | "requestAirdrop"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: Option<u16>, message: &str) -> TransportError {
        TransportError::Http {
            status,
            message: message.into(),
        }
    }

    #[test]
    fn retryable_statuses() {
        for status in [429, 502, 503, 504] {
            assert!(is_retryable_error(&http(Some(status), "")), "status {status}");
        }
        assert!(!is_retryable_error(&http(Some(400), "bad request")));
        assert!(!is_retryable_error(&http(Some(500), "internal")));
    }

    #[test]
    fn retryable_messages() {
        assert!(is_retryable_error(&http(None, "connect ECONNREFUSED 127.0.0.1:8899")));
        assert!(is_retryable_error(&http(None, "Blockhash not found")));
        assert!(is_retryable_error(&http(None, "Node is behind by 150 slots")));
    }

    #[test]
    fn non_retryable_wins_over_everything() {
        // Message carries both a non-retryable and a retryable pattern, plus
        // a retryable status — non-retryable must still win.
        let err = http(
            Some(429),
            "Transaction simulation failed: blockhash not found",
        );
        assert!(!is_retryable_error(&err));

        let err = http(None, "custom program error: 0x1 (ECONNRESET)");
        assert!(!is_retryable_error(&err));
    }

    #[test]
    fn unknown_defaults_to_non_retryable() {
        assert!(!is_retryable_error(&http(None, "something novel happened")));
        assert!(!is_retryable_error(&TransportError::Other("mystery".into())));
    }

    #[test]
    fn connection_level_excludes_rate_limit_and_staleness() {
        assert!(is_connection_level_error(&http(Some(503), "")));
        assert!(is_connection_level_error(&http(None, "socket hang up")));
        assert!(is_connection_level_error(&TransportError::Timeout { ms: 30_000 }));
        assert!(!is_connection_level_error(&http(Some(429), "too many requests")));
        assert!(!is_connection_level_error(&http(None, "blockhash not found")));
    }

    #[test]
    fn write_methods() {
        assert!(is_write_method("sendTransaction"));
        assert!(is_write_method("sendEncodedTransaction"));
        assert!(is_write_method("requestAirdrop"));
        assert!(!is_write_method("simulateTransaction"));
        assert!(!is_write_method("getAccountInfo"));
        assert!(!is_write_method("getLatestBlockhash"));
    }

    #[test]
    fn rpc_error_message_is_classified() {
        let err = TransportError::Rpc(crate::request::JsonRpcError {
            code: -32002,
            message: "Transaction simulation failed: Attempt to debit an account".into(),
            data: None,
        });
        assert!(!is_retryable_error(&err));
    }
}

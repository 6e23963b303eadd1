//! Policy layer — pure decision functions for the resilient transport.
//!
//! The orchestrator consults these in order:
//! ```text
//! error → [classify: retryable? connection-level?] → [backoff delay] → retry/failover
//! ```
//! Everything here is stateless; state lives in [`crate::health`] and
//! [`crate::resilient`].

pub mod backoff;
pub mod classify;

pub use backoff::{compute_backoff, RetryConfig};
pub use classify::{is_connection_level_error, is_retryable_error, is_write_method};

//! steadyrpc-http — `reqwest`-backed endpoint client for SteadyRPC.
//!
//! [`HttpRpcClient`] performs exactly one network attempt per `send`; all
//! retry, failover and coalescing live in
//! [`steadyrpc_core::ResilientTransport`]. [`resilient_from_urls`] wires the
//! two together.

pub mod client;

pub use client::{resilient_from_urls, HttpClientConfig, HttpRpcClient};

//! steadyrpc-core — resilient multi-endpoint JSON-RPC transport.
//!
//! # Overview
//!
//! SteadyRPC makes a single logical "send request" survive transient network
//! failures, endpoint outages and request storms, without changing anything
//! for the callers above it. The core crate defines:
//!
//! - [`RpcTransport`] — the async trait every endpoint client implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types
//! - [`TransportError`] — structured error type
//! - [`policy`] module — error classification and jittered backoff
//! - [`coalesce_key`] — canonical key for deduplicating concurrent reads
//! - [`EndpointHealth`] — per-endpoint health state machine
//! - [`ResilientTransport`] — the orchestrator: retry, failover, coalescing

pub mod coalesce;
pub mod error;
pub mod health;
pub mod metrics;
pub mod policy;
pub mod request;
pub mod resilient;
pub mod transport;

pub use coalesce::coalesce_key;
pub use error::TransportError;
pub use health::{Endpoint, EndpointHealth, EndpointSnapshot, HealthCheckConfig};
pub use metrics::{MetricsFacade, NoopMetrics, TransportMetrics};
pub use policy::{compute_backoff, RetryConfig};
pub use request::{bigint_param, bytes_param, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use resilient::{ResilientConfig, ResilientTransport, TransportStats};
pub use transport::RpcTransport;

//! Pluggable transport metrics.
//!
//! [`TransportMetrics`] is the sink the orchestrator reports into. All
//! methods default to no-ops, so implementors only override what they
//! collect. [`NoopMetrics`] is the default when nothing is configured;
//! [`MetricsFacade`] forwards to the [`metrics`](https://docs.rs/metrics)
//! crate facade, picking up whatever recorder is installed in the process
//! (Prometheus, StatsD, ...).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Sink for transport-level telemetry. Shared across all in-flight calls,
/// so implementations must be `Send + Sync`.
pub trait TransportMetrics: Send + Sync + fmt::Debug {
    /// A top-level invocation settled. Called once per `invoke`, after any
    /// retries and failovers resolve.
    fn record_request(&self, method: &str, duration: Duration, success: bool) {
        let _ = (method, duration, success);
    }

    /// A retry is about to be scheduled. `attempt` is 0-indexed.
    fn record_retry(&self, method: &str, attempt: u32, error_type: &str) {
        let _ = (method, attempt, error_type);
    }

    /// The active endpoint moved after a failure.
    fn record_failover(&self, method: &str, from: &str, to: &str) {
        let _ = (method, from, to);
    }

    /// A read was merged onto an identical in-flight call.
    fn record_coalesced(&self, method: &str) {
        let _ = method;
    }
}

/// Discards all metrics. Zero overhead.
#[derive(Debug, Clone, Copy)]
pub struct NoopMetrics;

impl TransportMetrics for NoopMetrics {}

/// Forwards to the `metrics` crate facade.
#[derive(Debug, Clone, Copy)]
pub struct MetricsFacade;

mod names {
    pub const REQUESTS_TOTAL: &str = "steadyrpc_requests_total";
    pub const REQUEST_DURATION: &str = "steadyrpc_request_duration_seconds";
    pub const RETRIES_TOTAL: &str = "steadyrpc_retries_total";
    pub const FAILOVERS_TOTAL: &str = "steadyrpc_failovers_total";
    pub const COALESCED_TOTAL: &str = "steadyrpc_coalesced_total";
}

impl TransportMetrics for MetricsFacade {
    fn record_request(&self, method: &str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        metrics::counter!(names::REQUESTS_TOTAL, "method" => method.to_owned(), "status" => status)
            .increment(1);
        metrics::histogram!(names::REQUEST_DURATION, "method" => method.to_owned())
            .record(duration.as_secs_f64());
    }

    fn record_retry(&self, method: &str, attempt: u32, error_type: &str) {
        metrics::counter!(
            names::RETRIES_TOTAL,
            "method" => method.to_owned(),
            "attempt" => attempt.to_string(),
            "error_type" => error_type.to_owned(),
        )
        .increment(1);
    }

    fn record_failover(&self, method: &str, from: &str, to: &str) {
        metrics::counter!(
            names::FAILOVERS_TOTAL,
            "method" => method.to_owned(),
            "from" => from.to_owned(),
            "to" => to.to_owned(),
        )
        .increment(1);
    }

    fn record_coalesced(&self, method: &str) {
        metrics::counter!(names::COALESCED_TOTAL, "method" => method.to_owned()).increment(1);
    }
}

pub(crate) fn default_metrics() -> Arc<dyn TransportMetrics> {
    Arc::new(NoopMetrics)
}

//! The resilient orchestrator — retry, failover, coalescing, shutdown.
//!
//! [`ResilientTransport`] owns the endpoint list, the per-endpoint health
//! records, the in-flight coalescing table and the shutdown signal. Callers
//! use a single [`ResilientTransport::invoke`] entry point; it splits into:
//!
//! - **write path** (non-idempotent submissions): exactly one attempt, plus
//!   at most one failover attempt when the error is connection-level. Never
//!   retried in place — replaying a submission risks duplicating it.
//! - **read path**: retry loop with jittered backoff on the active
//!   endpoint, then rotation through healthy or cooldown-eligible
//!   endpoints. Identical concurrent reads are merged onto one call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::coalesce::coalesce_key;
use crate::error::TransportError;
use crate::health::{Endpoint, EndpointHealth, EndpointSnapshot, HealthCheckConfig};
use crate::metrics::{default_metrics, TransportMetrics};
use crate::policy::classify::is_write_method;
use crate::policy::{compute_backoff, RetryConfig};
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Settled-or-pending handle shared by every caller coalesced onto one read.
type InFlight = Shared<BoxFuture<'static, Result<Value, TransportError>>>;

/// Construction options for [`ResilientTransport`].
#[derive(Debug, Clone)]
pub struct ResilientConfig {
    pub retry: RetryConfig,
    pub health: HealthCheckConfig,
    /// Merge identical concurrent reads onto a single network call.
    pub coalesce: bool,
    pub metrics: Arc<dyn TransportMetrics>,
}

impl Default for ResilientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            health: HealthCheckConfig::default(),
            coalesce: true,
            metrics: default_metrics(),
        }
    }
}

/// Aggregate transport counters plus a per-endpoint health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TransportStats {
    pub total_requests: u64,
    pub total_retries: u64,
    pub total_failovers: u64,
    pub total_coalesced: u64,
    pub endpoints: Vec<EndpointSnapshot>,
}

struct Slot {
    endpoint: Endpoint,
    transport: Arc<dyn RpcTransport>,
}

/// Shared routing state: one lock covers the health records and the active
/// pointer, so a failure update and the failover it triggers are a single
/// transition.
struct Routing {
    healths: Vec<EndpointHealth>,
    active: usize,
}

struct Inner {
    slots: Vec<Slot>,
    routing: Mutex<Routing>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    retry: RetryConfig,
    health: HealthCheckConfig,
    coalesce_reads: bool,
    metrics: Arc<dyn TransportMetrics>,
    cancel: CancellationToken,
    request_id: AtomicU64,
    total_requests: AtomicU64,
    total_retries: AtomicU64,
    total_failovers: AtomicU64,
    total_coalesced: AtomicU64,
}

/// Drop-in resilient front for a set of JSON-RPC endpoints.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct ResilientTransport {
    inner: Arc<Inner>,
}

impl ResilientTransport {
    /// Build a transport over the given `(endpoint, raw client)` pairs.
    ///
    /// Fails on an empty endpoint list or an invalid retry config.
    pub fn new(
        slots: Vec<(Endpoint, Arc<dyn RpcTransport>)>,
        config: ResilientConfig,
    ) -> Result<Self, TransportError> {
        if slots.is_empty() {
            return Err(TransportError::Other(
                "at least one endpoint is required".into(),
            ));
        }
        config.retry.validate()?;

        let healths = slots
            .iter()
            .map(|(endpoint, _)| EndpointHealth::new(endpoint.clone()))
            .collect();
        let slots = slots
            .into_iter()
            .map(|(endpoint, transport)| Slot { endpoint, transport })
            .collect();

        Ok(Self {
            inner: Arc::new(Inner {
                slots,
                routing: Mutex::new(Routing { healths, active: 0 }),
                in_flight: Mutex::new(HashMap::new()),
                retry: config.retry,
                health: config.health,
                coalesce_reads: config.coalesce,
                metrics: config.metrics,
                cancel: CancellationToken::new(),
                request_id: AtomicU64::new(1),
                total_requests: AtomicU64::new(0),
                total_retries: AtomicU64::new(0),
                total_failovers: AtomicU64::new(0),
                total_coalesced: AtomicU64::new(0),
            }),
        })
    }

    /// Send `method` with `params`, surviving transient failures.
    ///
    /// Returns the underlying error verbatim, or
    /// [`TransportError::AllEndpointsUnhealthy`] when a read exhausted every
    /// endpoint, or [`TransportError::Destroyed`] after [`destroy`].
    ///
    /// [`destroy`]: ResilientTransport::destroy
    pub async fn invoke(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        if self.inner.cancel.is_cancelled() {
            return Err(TransportError::Destroyed);
        }
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let result = if is_write_method(method) {
            self.inner.dispatch_write(method, params).await
        } else if self.inner.coalesce_reads {
            self.coalesced_read(method, params).await
        } else {
            self.inner.dispatch_read(method, params).await
        };

        self.inner
            .metrics
            .record_request(method, started.elapsed(), result.is_ok());
        result
    }

    /// Counters and per-endpoint health, machine-readable.
    pub fn get_stats(&self) -> TransportStats {
        TransportStats {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            total_retries: self.inner.total_retries.load(Ordering::Relaxed),
            total_failovers: self.inner.total_failovers.load(Ordering::Relaxed),
            total_coalesced: self.inner.total_coalesced.load(Ordering::Relaxed),
            endpoints: self.inner.snapshot_endpoints(),
        }
    }

    /// Signal shutdown. Idempotent and non-blocking.
    ///
    /// Pending backoff sleeps resolve immediately and their calls fail with
    /// [`TransportError::Destroyed`]; already-dispatched network requests
    /// are not cancelled. New invocations fail fast.
    pub fn destroy(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.in_flight.lock().unwrap().clear();
        tracing::info!("transport destroyed");
    }

    /// Read with coalescing: join an identical in-flight read if one
    /// exists, otherwise become the leader and register one.
    async fn coalesced_read(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let key = coalesce_key(method, &params);
        let handle = {
            let mut table = self.inner.in_flight.lock().unwrap();
            if let Some(existing) = table.get(&key) {
                self.inner.total_coalesced.fetch_add(1, Ordering::Relaxed);
                self.inner.metrics.record_coalesced(method);
                tracing::debug!(method, "coalescing onto in-flight read");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let task_key = key.clone();
                let method = method.to_owned();
                // The dispatch runs in its own task so the table entry is
                // removed on settlement even if every waiting caller is
                // gone by then.
                let task = tokio::spawn(async move {
                    let result = inner.dispatch_read(&method, params).await;
                    inner.in_flight.lock().unwrap().remove(&task_key);
                    result
                });
                let shared: InFlight = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => Err(TransportError::Other(format!("read task failed: {e}"))),
                    }
                }
                .boxed()
                .shared();
                table.insert(key, shared.clone());
                shared
            }
        };
        handle.await
    }
}

impl Inner {
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn snapshot_endpoints(&self) -> Vec<EndpointSnapshot> {
        let routing = self.routing.lock().unwrap();
        routing.healths.iter().map(EndpointHealth::snapshot).collect()
    }

    /// One network attempt against slot `idx`, with health bookkeeping.
    /// A JSON-RPC error object from the node counts as a failure.
    async fn attempt(
        &self,
        idx: usize,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let slot = &self.slots[idx];
        let started = Instant::now();
        let req = JsonRpcRequest::new(self.next_request_id(), method, params);
        let outcome = match slot.transport.send(req).await {
            Ok(resp) => resp.into_result().map_err(TransportError::Rpc),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(value) => {
                self.routing.lock().unwrap().healths[idx]
                    .record_success(started.elapsed(), &self.health);
                Ok(value)
            }
            Err(err) => {
                self.routing.lock().unwrap().healths[idx].record_failure(
                    &err.to_string(),
                    Instant::now(),
                    &self.health,
                );
                Err(err)
            }
        }
    }

    /// First endpoint after `after` (round-robin) that is healthy or past
    /// its cooldown. The failed endpoint itself is not a candidate.
    fn next_candidate(&self, after: usize) -> Option<usize> {
        let now = Instant::now();
        let routing = self.routing.lock().unwrap();
        let n = self.slots.len();
        (1..n)
            .map(|step| (after + step) % n)
            .find(|&idx| routing.healths[idx].is_eligible(now, &self.health))
    }

    fn note_failover(&self, method: &str, from: usize, to: usize) {
        self.total_failovers.fetch_add(1, Ordering::Relaxed);
        let from_url = &self.slots[from].endpoint.url;
        let to_url = &self.slots[to].endpoint.url;
        self.metrics.record_failover(method, from_url, to_url);
        tracing::info!(method, from = %from_url, to = %to_url, "failing over");
    }

    /// Write path: one attempt, then at most one failover attempt, and only
    /// for connection-level errors (the node cannot have observed the
    /// submission). The active pointer moves only if the failover succeeds.
    async fn dispatch_write(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let start_idx = self.routing.lock().unwrap().active;
        let err = match self.attempt(start_idx, method, params.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_connection_level() {
            return Err(err);
        }
        let Some(next_idx) = self.next_candidate(start_idx) else {
            return Err(err);
        };
        self.note_failover(method, start_idx, next_idx);
        match self.attempt(next_idx, method, params).await {
            Ok(value) => {
                self.routing.lock().unwrap().active = next_idx;
                Ok(value)
            }
            // One-shot: the second outcome is final, no further chaining.
            Err(second) => Err(second),
        }
    }

    /// Read path: retry on the active endpoint with backoff, then rotate.
    /// Visits each endpoint at most once per call; non-retryable errors
    /// terminate the whole call with no failover.
    async fn dispatch_read(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let mut idx = self.routing.lock().unwrap().active;
        let mut last_error: Option<TransportError> = None;

        for visit in 0..self.slots.len() {
            for attempt in 0..=self.retry.max_retries {
                if self.cancel.is_cancelled() {
                    return Err(TransportError::Destroyed);
                }
                match self.attempt(idx, method, params.clone()).await {
                    Ok(value) => return Ok(value),
                    Err(err) => {
                        if !err.is_retryable() {
                            // Request-level fault: another endpoint would
                            // reject it the same way.
                            return Err(err);
                        }
                        tracing::warn!(
                            attempt,
                            url = %self.slots[idx].endpoint.url,
                            error = %err,
                            "read attempt failed"
                        );
                        if attempt < self.retry.max_retries {
                            self.total_retries.fetch_add(1, Ordering::Relaxed);
                            self.metrics.record_retry(method, attempt, error_type(&err));
                            last_error = Some(err);
                            self.backoff_sleep(attempt).await?;
                        } else {
                            last_error = Some(err);
                        }
                    }
                }
            }
            if visit + 1 == self.slots.len() {
                break;
            }
            match self.next_candidate(idx) {
                Some(next) => {
                    self.note_failover(method, idx, next);
                    self.routing.lock().unwrap().active = next;
                    idx = next;
                }
                None => break,
            }
        }

        let last = last_error
            .unwrap_or_else(|| TransportError::Other("no attempt was made".into()));
        Err(TransportError::AllEndpointsUnhealthy {
            last_error: Box::new(last),
            endpoints: self.snapshot_endpoints(),
        })
    }

    /// Inter-retry sleep, abortable by `destroy()`.
    async fn backoff_sleep(&self, attempt: u32) -> Result<(), TransportError> {
        let delay = compute_backoff(attempt, &self.retry);
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.cancel.cancelled() => Err(TransportError::Destroyed),
        }
    }
}

fn error_type(err: &TransportError) -> &'static str {
    match err {
        TransportError::Http { .. } => "http",
        TransportError::Rpc(_) => "rpc",
        TransportError::Timeout { .. } => "timeout",
        TransportError::AllEndpointsUnhealthy { .. } => "all_endpoints_unhealthy",
        TransportError::Destroyed => "destroyed",
        TransportError::Deserialization(_) => "deserialization",
        TransportError::Other(_) => "other",
    }
}

/// Drop-in replacement for a single raw endpoint client: `send` routes
/// through the resilient `invoke` and re-wraps the result, preserving the
/// caller's request id.
#[async_trait]
impl RpcTransport for ResilientTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let value = self.invoke(&req.method, req.params).await?;
        Ok(JsonRpcResponse::success(req.id, value))
    }

    fn url(&self) -> &str {
        "resilient"
    }
}

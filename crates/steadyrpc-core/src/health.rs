//! Per-endpoint health tracking with hysteresis and cooldown recovery.
//!
//! Transitions:
//! - `Healthy` → `Unhealthy`: `consecutive_failures` reaches `unhealthy_threshold`
//! - `Unhealthy` → `Healthy`: `consecutive_successes` reaches `healthy_threshold`
//! - An `Unhealthy` endpoint becomes *eligible* again (without flipping state)
//!   once `unhealthy_cooldown` has elapsed since its last error.
//!
//! There is no terminal state: an endpoint can cycle indefinitely.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Smoothing factor for the latency moving average.
const LATENCY_EMA_ALPHA: f64 = 0.1;

/// An RPC endpoint identity. Immutable after construction; `url` is the
/// unique key.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub label: String,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            label: url.clone(),
            url,
        }
    }

    pub fn with_label(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

/// Thresholds governing health transitions and cooldown recovery.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Consecutive failures before an endpoint is marked unhealthy.
    pub unhealthy_threshold: u32,
    /// Consecutive successes before an unhealthy endpoint recovers.
    pub healthy_threshold: u32,
    /// How long an unhealthy endpoint sits out before it may be probed
    /// again as a failover target.
    pub unhealthy_cooldown: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            unhealthy_threshold: 3,
            healthy_threshold: 2,
            unhealthy_cooldown: Duration::from_secs(30),
        }
    }
}

/// Mutable health record for one endpoint.
#[derive(Debug)]
pub struct EndpointHealth {
    endpoint: Endpoint,
    healthy: bool,
    consecutive_failures: u32,
    consecutive_successes: u32,
    total_requests: u64,
    total_errors: u64,
    latency_ema_ms: Option<f64>,
    last_error_at: Option<Instant>,
    last_error_unix_ms: Option<u64>,
    last_error: Option<String>,
}

impl EndpointHealth {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            healthy: true,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_requests: 0,
            total_errors: 0,
            latency_ema_ms: None,
            last_error_at: None,
            last_error_unix_ms: None,
            last_error: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Record a successful request with its observed latency.
    pub fn record_success(&mut self, latency: Duration, config: &HealthCheckConfig) {
        self.total_requests += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;

        let sample = latency.as_micros() as f64 / 1_000.0;
        self.latency_ema_ms = Some(match self.latency_ema_ms {
            // First sample seeds the average directly.
            None => sample,
            Some(ema) => ema * (1.0 - LATENCY_EMA_ALPHA) + sample * LATENCY_EMA_ALPHA,
        });

        if !self.healthy && self.consecutive_successes >= config.healthy_threshold {
            self.healthy = true;
            tracing::info!(
                url = %self.endpoint.url,
                successes = self.consecutive_successes,
                "endpoint recovered"
            );
        }
    }

    /// Record a failed request.
    pub fn record_failure(&mut self, error: &str, now: Instant, config: &HealthCheckConfig) {
        self.total_requests += 1;
        self.total_errors += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_error_at = Some(now);
        self.last_error_unix_ms = unix_millis();
        self.last_error = Some(error.to_string());

        if self.healthy && self.consecutive_failures >= config.unhealthy_threshold {
            self.healthy = false;
            tracing::warn!(
                url = %self.endpoint.url,
                failures = self.consecutive_failures,
                error,
                "endpoint marked unhealthy"
            );
        }
    }

    /// Whether this endpoint may be handed a request right now: healthy, or
    /// unhealthy but past its cooldown (opportunistic recovery — no external
    /// probe required).
    pub fn is_eligible(&self, now: Instant, config: &HealthCheckConfig) -> bool {
        if self.healthy {
            return true;
        }
        match self.last_error_at {
            Some(at) => now.duration_since(at) >= config.unhealthy_cooldown,
            None => true,
        }
    }

    /// Machine-readable snapshot for stats and aggregate errors.
    pub fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot {
            url: self.endpoint.url.clone(),
            label: self.endpoint.label.clone(),
            healthy: self.healthy,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            total_requests: self.total_requests,
            total_errors: self.total_errors,
            avg_latency_ms: self.latency_ema_ms,
            last_error_time: self.last_error_unix_ms,
            last_error: self.last_error.clone(),
        }
    }
}

fn unix_millis() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

/// Point-in-time view of one endpoint's health.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub url: String,
    pub label: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_requests: u64,
    pub total_errors: u64,
    pub avg_latency_ms: Option<f64>,
    pub last_error_time: Option<u64>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> HealthCheckConfig {
        HealthCheckConfig {
            unhealthy_threshold: 3,
            healthy_threshold: 2,
            unhealthy_cooldown: Duration::from_millis(100),
        }
    }

    fn health() -> EndpointHealth {
        EndpointHealth::new(Endpoint::new("https://rpc.example.com"))
    }

    #[test]
    fn label_defaults_to_url() {
        let e = Endpoint::new("https://rpc.example.com");
        assert_eq!(e.label, "https://rpc.example.com");
        let e = Endpoint::with_label("https://rpc.example.com", "primary");
        assert_eq!(e.label, "primary");
    }

    #[test]
    fn unhealthy_only_at_threshold() {
        let c = cfg();
        let mut h = health();
        let now = Instant::now();
        h.record_failure("ECONNRESET", now, &c);
        h.record_failure("ECONNRESET", now, &c);
        assert!(h.is_healthy());
        h.record_failure("ECONNRESET", now, &c);
        assert!(!h.is_healthy());
    }

    #[test]
    fn success_resets_failure_streak() {
        let c = cfg();
        let mut h = health();
        let now = Instant::now();
        h.record_failure("ETIMEDOUT", now, &c);
        h.record_failure("ETIMEDOUT", now, &c);
        h.record_success(Duration::from_millis(20), &c);
        h.record_failure("ETIMEDOUT", now, &c);
        h.record_failure("ETIMEDOUT", now, &c);
        // Only 2 failures since the reset.
        assert!(h.is_healthy());
    }

    #[test]
    fn recovery_needs_healthy_threshold_successes() {
        let c = cfg();
        let mut h = health();
        let now = Instant::now();
        for _ in 0..3 {
            h.record_failure("ECONNREFUSED", now, &c);
        }
        assert!(!h.is_healthy());
        h.record_success(Duration::from_millis(15), &c);
        assert!(!h.is_healthy());
        h.record_success(Duration::from_millis(15), &c);
        assert!(h.is_healthy());
    }

    #[test]
    fn failure_resets_success_streak_during_recovery() {
        let c = cfg();
        let mut h = health();
        let now = Instant::now();
        for _ in 0..3 {
            h.record_failure("ECONNREFUSED", now, &c);
        }
        h.record_success(Duration::from_millis(15), &c);
        h.record_failure("ECONNREFUSED", now, &c);
        h.record_success(Duration::from_millis(15), &c);
        // Streak restarted — still one short of the threshold.
        assert!(!h.is_healthy());
    }

    #[test]
    fn cooldown_restores_eligibility() {
        let c = cfg();
        let mut h = health();
        let t0 = Instant::now();
        for _ in 0..3 {
            h.record_failure("ECONNREFUSED", t0, &c);
        }
        assert!(!h.is_eligible(t0, &c));
        assert!(!h.is_eligible(t0 + Duration::from_millis(50), &c));
        // Past the cooldown, still unhealthy but eligible again.
        assert!(h.is_eligible(t0 + Duration::from_millis(100), &c));
        assert!(!h.is_healthy());
    }

    #[test]
    fn latency_ema_seeds_then_smooths() {
        let c = cfg();
        let mut h = health();
        h.record_success(Duration::from_millis(100), &c);
        assert_eq!(h.snapshot().avg_latency_ms, Some(100.0));
        h.record_success(Duration::from_millis(200), &c);
        // 100*0.9 + 200*0.1
        let ema = h.snapshot().avg_latency_ms.unwrap();
        assert!((ema - 110.0).abs() < 1e-9, "ema={ema}");
    }

    #[test]
    fn snapshot_carries_counters_and_last_error() {
        let c = cfg();
        let mut h = health();
        h.record_success(Duration::from_millis(10), &c);
        h.record_failure("socket hang up", Instant::now(), &c);
        let snap = h.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.total_errors, 1);
        assert_eq!(snap.last_error.as_deref(), Some("socket hang up"));
        assert!(snap.last_error_time.is_some());
    }
}

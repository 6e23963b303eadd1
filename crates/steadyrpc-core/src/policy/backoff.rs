//! Exponential backoff with additive jitter.

use std::time::Duration;

use rand::Rng;

use crate::error::TransportError;

/// Configuration for the read-path retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries per endpoint (not counting the first try).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Cap on the exponential growth.
    pub max_delay_ms: u64,
    /// Additive jitter as a fraction of the computed delay (0.0 = none).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 10_000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(TransportError::Other(format!(
                "retry config: base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        if self.jitter_factor < 0.0 {
            return Err(TransportError::Other(format!(
                "retry config: jitter_factor ({}) must be >= 0",
                self.jitter_factor
            )));
        }
        Ok(())
    }
}

/// Delay before the retry numbered `attempt` (0-indexed: the first retry
/// uses `attempt = 0`).
///
/// `base = min(base_delay_ms * 2^attempt, max_delay_ms)`, then up to
/// `jitter_factor * base` is added on top. The jitter is additive-only so
/// the delay never drops below the exponential floor — clients hammering
/// the same degraded endpoint spread out instead of re-synchronizing.
pub fn compute_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let base = config
        .base_delay_ms
        .saturating_mul(factor)
        .min(config.max_delay_ms) as f64;
    let jitter = rand::thread_rng().gen_range(0.0..1.0) * config.jitter_factor;
    Duration::from_millis((base * (1.0 + jitter)).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(base: u64, max: u64, jitter: f64) -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: base,
            max_delay_ms: max,
            jitter_factor: jitter,
        }
    }

    #[test]
    fn doubles_without_jitter() {
        let c = cfg(100, 30_000, 0.0);
        assert_eq!(compute_backoff(0, &c), Duration::from_millis(100));
        assert_eq!(compute_backoff(1, &c), Duration::from_millis(200));
        assert_eq!(compute_backoff(2, &c), Duration::from_millis(400));
        assert_eq!(compute_backoff(3, &c), Duration::from_millis(800));
    }

    #[test]
    fn capped_at_max_delay() {
        let c = cfg(100, 500, 0.0);
        assert_eq!(compute_backoff(10, &c), Duration::from_millis(500));
        // Shift overflow saturates rather than wrapping.
        assert_eq!(compute_backoff(200, &c), Duration::from_millis(500));
    }

    #[test]
    fn jitter_is_additive_and_bounded() {
        let c = cfg(100, 10_000, 0.2);
        for attempt in 0..8 {
            let floor = 100u64.checked_shl(attempt).unwrap().min(10_000);
            let ceiling = (10_000.0 * 1.2) as u64;
            for _ in 0..50 {
                let d = compute_backoff(attempt, &c).as_millis() as u64;
                assert!(d >= floor, "attempt {attempt}: {d} < floor {floor}");
                assert!(d <= ceiling, "attempt {attempt}: {d} > ceiling {ceiling}");
            }
        }
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        assert!(cfg(1_000, 100, 0.0).validate().is_err());
        assert!(cfg(100, 1_000, -0.1).validate().is_err());
        assert!(cfg(100, 1_000, 0.2).validate().is_ok());
        assert!(RetryConfig::default().validate().is_ok());
    }
}

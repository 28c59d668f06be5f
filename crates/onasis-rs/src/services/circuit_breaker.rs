//! Circuit breaker for upstream service protection.
//!
//! Each adapter client owns one breaker. Consecutive failures open the
//! circuit; while open, calls short-circuit without touching the network.
//! After a cooldown the circuit goes half-open and admits a single probe.

use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed = 0,   // Normal operation
    Open = 1,     // Failing fast
    HalfOpen = 2, // Probing recovery
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Thresholds and timeouts controlling state transitions.
///
/// Defaults: 5 consecutive failures open the circuit, 60 s cooldown before
/// half-open. A single success in half-open closes the circuit.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u64,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60) }
    }
}

/// Per-service breaker state.
///
/// Atomic state and counters on the hot path; the failure timestamp sits
/// behind an async lock since it is only touched on transitions.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU64,
    last_failure_time: RwLock<Option<Instant>>,
    name: String,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU64::new(0),
            last_failure_time: RwLock::new(None),
            name,
        })
    }

    /// Whether a call may proceed right now.
    ///
    /// An open circuit whose cooldown has elapsed transitions to half-open
    /// here and admits the caller as the probe.
    pub async fn can_execute(&self) -> bool {
        match CircuitState::from(self.state.load(Ordering::Relaxed)) {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if let Some(last_failure) = *self.last_failure_time.read().await {
                    if last_failure.elapsed() >= self.config.reset_timeout {
                        self.transition_to_half_open().await;
                        return true;
                    }
                }
                debug!("Circuit breaker {} is open, failing fast", self.name);
                false
            }
        }
    }

    /// Records a successful call. Closes the circuit from half-open on a
    /// single success; resets the failure streak while closed.
    pub async fn record_success(&self) {
        match CircuitState::from(self.state.load(Ordering::Relaxed)) {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::HalfOpen => {
                self.transition_to_closed().await;
            }
            CircuitState::Open => {
                debug!("Unexpected success while circuit {} is open", self.name);
            }
        }
    }

    /// Records a failed call. Opens the circuit once the consecutive
    /// failure threshold is reached, or immediately from half-open.
    pub async fn record_failure(&self) {
        match CircuitState::from(self.state.load(Ordering::Relaxed)) {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
                *self.last_failure_time.write().await = Some(Instant::now());
                if failures >= self.config.failure_threshold {
                    self.transition_to_open().await;
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to_open().await;
            }
            CircuitState::Open => {
                *self.last_failure_time.write().await = Some(Instant::now());
            }
        }
    }

    /// Runs an operation under the breaker, recording the outcome.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        if !self.can_execute().await {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(error) => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(error))
            }
        }
    }

    async fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Relaxed);
        *self.last_failure_time.write().await = Some(Instant::now());
        warn!("Circuit breaker {} opened due to failures", self.name);
    }

    async fn transition_to_half_open(&self) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Relaxed);
        info!("Circuit breaker {} transitioned to half-open", self.name);
    }

    async fn transition_to_closed(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        info!("Circuit breaker {} closed - service recovered", self.name);
    }

    pub fn get_state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Relaxed))
    }

    pub fn get_failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    CircuitOpen,
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn quick_config(threshold: u64, reset_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: Duration::from_millis(reset_ms),
        }
    }

    #[tokio::test]
    async fn starts_closed_and_stays_closed_on_success() {
        let cb = CircuitBreaker::new("test".to_string(), quick_config(3, 1000));
        assert_eq!(cb.get_state(), CircuitState::Closed);

        let result = cb.call(async { Ok::<i32, &str>(42) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new("test".to_string(), quick_config(2, 1000));

        let _ = cb.call(async { Err::<i32, &str>("error") }).await;
        assert_eq!(cb.get_state(), CircuitState::Closed);

        let _ = cb.call(async { Err::<i32, &str>("error") }).await;
        assert_eq!(cb.get_state(), CircuitState::Open);

        // Next call short-circuits.
        let result = cb.call(async { Ok::<i32, &str>(42) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn success_resets_the_failure_streak() {
        let cb = CircuitBreaker::new("test".to_string(), quick_config(3, 1000));

        let _ = cb.call(async { Err::<i32, &str>("e") }).await;
        let _ = cb.call(async { Err::<i32, &str>("e") }).await;
        let _ = cb.call(async { Ok::<i32, &str>(1) }).await;
        assert_eq!(cb.get_failure_count(), 0);

        // Streak starts over; two more failures are not enough.
        let _ = cb.call(async { Err::<i32, &str>("e") }).await;
        let _ = cb.call(async { Err::<i32, &str>("e") }).await;
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn single_success_closes_from_half_open() {
        let cb = CircuitBreaker::new("test".to_string(), quick_config(1, 100));

        let _ = cb.call(async { Err::<i32, &str>("error") }).await;
        assert_eq!(cb.get_state(), CircuitState::Open);

        sleep(Duration::from_millis(150)).await;

        // Probe is admitted and its success closes the circuit.
        let result = cb.call(async { Ok::<i32, &str>(42) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn failure_in_half_open_reopens() {
        let cb = CircuitBreaker::new("test".to_string(), quick_config(1, 100));

        let _ = cb.call(async { Err::<i32, &str>("error") }).await;
        sleep(Duration::from_millis(150)).await;

        let _ = cb.call(async { Err::<i32, &str>("still down") }).await;
        assert_eq!(cb.get_state(), CircuitState::Open);
    }
}

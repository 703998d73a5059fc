//! Failure-counting circuit breaker.
//!
//! CLOSED lets calls through and counts consecutive failures. Reaching the
//! threshold trips the circuit OPEN, where calls fail fast with
//! [`CircuitOpenError`] until `reset_timeout` has elapsed since the last
//! failure. The first call after that runs as a HALF_OPEN trial: success
//! closes the circuit, failure re-opens it. Only one trial runs at a time.
//!
//! The counters sit behind a single mutex that is never held across the
//! wrapped operation, so racing failures cannot both observe "below
//! threshold".

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use errors::CircuitOpenError;
use parking_lot::Mutex;
use report_core::{Clock, SystemClock};
use serde::Serialize;

use crate::telemetry::GatewayTelemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN"
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60)
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>
}

#[derive(Debug)]
struct Counters {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    trial_in_flight: bool
}

impl Counters {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            trial_in_flight: false
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    reset_window: chrono::Duration,
    counters: Mutex<Counters>,
    clock: Arc<dyn Clock>
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("counters", &*self.counters.lock())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>
    ) -> Self {
        let reset_ms = config.reset_timeout.as_millis().min(i64::MAX as u128) as i64;
        let reset_window = chrono::Duration::milliseconds(reset_ms);
        Self {
            name: name.into(),
            config,
            reset_window,
            counters: Mutex::new(Counters::closed()),
            clock
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `operation` unless the circuit is open.
    ///
    /// The operation's own error is returned unchanged; the circuit-open
    /// rejection is converted into `E` without invoking the operation.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>
    {
        let mut admission = self.admit().map_err(E::from)?;
        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(admission.trial),
            Err(_) => self.record_failure(admission.trial)
        }
        admission.settled = true;
        result
    }

    /// Forces the circuit closed and clears the failure history.
    pub fn reset(&self) {
        let mut counters = self.counters.lock();
        let previous = counters.state;
        *counters = Counters::closed();
        drop(counters);
        if previous != CircuitState::Closed {
            GatewayTelemetry::record_transition(&self.name, CircuitState::Closed);
        }
        tracing::info!(circuit = %self.name, "Circuit breaker manually reset");
    }

    pub fn state(&self) -> CircuitState {
        self.counters.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.counters.lock().failure_count
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        let counters = self.counters.lock();
        let next_retry_at = match counters.state {
            CircuitState::Closed => None,
            _ => counters.last_failure_at.map(|at| at + self.reset_window)
        };
        CircuitBreakerState {
            name: self.name.clone(),
            state: counters.state,
            failure_count: counters.failure_count,
            failure_threshold: self.config.failure_threshold,
            reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
            last_failure_at: counters.last_failure_at,
            next_retry_at
        }
    }

    fn admit(&self) -> Result<Admission<'_>, CircuitOpenError> {
        let now = self.clock.now();
        let mut counters = self.counters.lock();
        let next_retry_at = counters
            .last_failure_at
            .map(|at| at + self.reset_window)
            .unwrap_or(now);

        let state = counters.state;
        let trial = match state {
            CircuitState::Closed => false,
            CircuitState::Open if now >= next_retry_at => {
                counters.state = CircuitState::HalfOpen;
                counters.trial_in_flight = true;
                GatewayTelemetry::record_transition(&self.name, CircuitState::HalfOpen);
                tracing::info!(circuit = %self.name, "Circuit breaker HALF-OPEN, admitting trial call");
                true
            }
            CircuitState::HalfOpen if !counters.trial_in_flight => {
                counters.trial_in_flight = true;
                true
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                drop(counters);
                GatewayTelemetry::record_rejection(&self.name);
                return Err(CircuitOpenError {
                    circuit: self.name.clone(),
                    next_retry_at
                });
            }
        };

        Ok(Admission {
            breaker: self,
            trial,
            settled: false
        })
    }

    fn record_success(&self, trial: bool) {
        let mut counters = self.counters.lock();
        let state = counters.state;
        match state {
            CircuitState::Closed => counters.failure_count = 0,
            CircuitState::HalfOpen if trial => {
                *counters = Counters::closed();
                drop(counters);
                GatewayTelemetry::record_transition(&self.name, CircuitState::Closed);
                tracing::info!(circuit = %self.name, "Circuit breaker CLOSED after successful trial");
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn record_failure(&self, trial: bool) {
        let now = self.clock.now();
        let mut counters = self.counters.lock();
        counters.failure_count = counters.failure_count.saturating_add(1);
        counters.last_failure_at = Some(now);

        let state = counters.state;
        match state {
            CircuitState::HalfOpen if trial => {
                counters.state = CircuitState::Open;
                counters.trial_in_flight = false;
                drop(counters);
                GatewayTelemetry::record_transition(&self.name, CircuitState::Open);
                tracing::warn!(circuit = %self.name, "Circuit breaker re-OPENED after failed trial");
            }
            CircuitState::Closed if counters.failure_count >= self.config.failure_threshold => {
                counters.state = CircuitState::Open;
                let failures = counters.failure_count;
                drop(counters);
                GatewayTelemetry::record_transition(&self.name, CircuitState::Open);
                tracing::warn!(
                    circuit = %self.name,
                    failures,
                    "Circuit breaker OPENED - failure threshold reached"
                );
            }
            _ => {}
        }
    }

    fn release_abandoned_trial(&self) {
        let mut counters = self.counters.lock();
        if counters.state == CircuitState::HalfOpen {
            counters.trial_in_flight = false;
        }
    }
}

/// Ticket for one admitted call. A trial whose future is dropped before it
/// settles frees the trial slot so the next caller can try again.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_abandoned_trial();
        }
    }
}

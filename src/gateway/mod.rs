//! # Upstream Gateway
//!
//! Every call to the streaming API passes through one [`Gateway`] per authenticated
//! session. The gateway composes four pieces of state around a single upstream call:
//!
//! ```text
//! execute(call)
//!   ├── ResponseCache      hit → return, no rate limiting paid
//!   ├── CircuitBreaker     open → fail fast with RateLimited, no network I/O
//!   ├── WindowLimiter      soft throttle once the window passes its soft cap
//!   ├── BackoffController  exponential spacing between calls
//!   └── Upstream::send     → record outcome, write-through cache
//! ```
//!
//! ## Retry policy
//!
//! `RateLimited` and `Transient` failures get exactly one bounded retry after
//! `min(retry_base * 2^consecutive_errors, retry_max)`. A rate-limit retry additionally
//! waits out the circuit cooldown; if that cooldown is longer than `retry_max` the retry
//! is forgone. `Forbidden`, `Unauthorized` and `Fatal` propagate immediately.
//!
//! ## Concurrency
//!
//! Backoff, window and circuit state share one critical section. The lock is never
//! held across a sleep or the network call, and state is only mutated at admission
//! (right before the request leaves) and when the outcome is recorded, so a caller
//! that is cancelled mid-wait leaves no partial update behind.

pub mod backoff;
pub mod cache;
pub mod circuit;
pub mod window;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{
    sync::Mutex,
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use backoff::{BackoffConfig, BackoffController};
pub use cache::ResponseCache;
pub use circuit::CircuitBreaker;
pub use window::{WindowConfig, WindowLimiter};

use crate::{
    config::GatewayConfig,
    error::{ErrorSignal, GatewayError, TransportError},
};

/// Raw answer of the upstream API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, if any.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam between the gateway and the network.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, path: &str) -> Result<ApiResponse, TransportError>;
}

/// An idempotent GET against the upstream API, optionally cached.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    path: String,
    cache_ttl: Option<Duration>,
}

impl UpstreamCall {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cache_ttl: None,
        }
    }

    /// Caches successful responses under the request path for `ttl`.
    pub fn cached(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

struct GatewayState {
    backoff: BackoffController,
    window: WindowLimiter,
    circuit: CircuitBreaker,
}

/// Point-in-time view of the gateway state.
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySnapshot {
    pub consecutive_errors: u32,
    pub error_budget: u32,
    pub base_interval_ms: u64,
    pub requests_this_window: u32,
    pub circuit_open: bool,
    pub cached_responses: usize,
}

pub struct Gateway {
    upstream: Arc<dyn Upstream>,
    cache: ResponseCache<String, Value>,
    state: Mutex<GatewayState>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(upstream: Arc<dyn Upstream>, config: GatewayConfig) -> Self {
        let state = GatewayState {
            backoff: BackoffController::new(config.backoff.clone()),
            window: WindowLimiter::new(config.window.clone()),
            circuit: CircuitBreaker::new(config.circuit_cooldown),
        };

        Self {
            upstream,
            cache: ResponseCache::new(config.cache_capacity),
            state: Mutex::new(state),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Runs `call` through cache, circuit breaker, rate limiting and the bounded retry.
    pub async fn execute<T>(
        &self,
        call: &UpstreamCall,
        cancel: &CancellationToken,
    ) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        if call.cache_ttl.is_some() {
            if let Some(value) = self.cache.get(call.path()) {
                debug!(path = call.path(), "served from cache");
                return decode(value);
            }
        }

        let value = match self.attempt(call, cancel).await {
            Ok(value) => value,
            Err(err) => {
                let Some(delay) = self.retry_delay(&err).await else {
                    return Err(err);
                };

                warn!(
                    path = call.path(),
                    signal = ?err.signal(),
                    delay_ms = delay.as_millis() as u64,
                    "retrying upstream call once"
                );
                self.pause(delay, cancel).await?;
                self.attempt(call, cancel).await?
            }
        };

        let typed = decode(value.clone())?;
        if let Some(ttl) = call.cache_ttl {
            self.cache.set(call.path.clone(), value, ttl);
        }

        Ok(typed)
    }

    pub async fn snapshot(&self) -> GatewaySnapshot {
        let mut state = self.state.lock().await;
        let circuit_open = state.circuit.is_open(Instant::now());

        GatewaySnapshot {
            consecutive_errors: state.backoff.consecutive_errors(),
            error_budget: state.backoff.error_budget(),
            base_interval_ms: state.backoff.base_interval().as_millis() as u64,
            requests_this_window: state.window.requests_this_window(),
            circuit_open,
            cached_responses: self.cache.len(),
        }
    }

    async fn attempt(
        &self,
        call: &UpstreamCall,
        cancel: &CancellationToken,
    ) -> Result<Value, GatewayError> {
        self.admit(cancel).await?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            outcome = self.upstream.send(call.path()) => outcome,
        };

        let now = Instant::now();
        let mut state = self.state.lock().await;
        match outcome {
            Ok(response) if response.is_success() => {
                state.backoff.record_success();
                drop(state);
                parse_body(&response.body)
            }
            Ok(response) => {
                let err = GatewayError::from_status(response.status, &response.body);
                self.record_failure(&mut state, &err, response.retry_after, now);
                Err(err)
            }
            Err(transport) => {
                let err = GatewayError::from(transport);
                self.record_failure(&mut state, &err, None, now);
                Err(err)
            }
        }
    }

    /// Waits for the soft throttle and the backoff interval, then claims the call slot.
    ///
    /// Circuit, window and backoff are checked again on every pass under the state lock,
    /// and the request is only counted in the pass that lets it through.
    async fn admit(&self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        let mut penalty_paid = false;

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                if let Some(retry_in) = state.circuit.remaining(now) {
                    debug!("circuit open, failing fast");
                    return Err(GatewayError::CircuitOpen { retry_in });
                }

                match state.window.soft_penalty(now) {
                    Some(penalty) if !penalty_paid => {
                        debug!(
                            penalty_ms = penalty.as_millis() as u64,
                            "request window past soft cap"
                        );
                        penalty_paid = true;
                        penalty
                    }
                    _ => {
                        let wait = state
                            .backoff
                            .delay_before_call(now)
                            .max(state.window.penalty_spacing(now));
                        if wait.is_zero() {
                            state.window.record_request(now);
                            state.backoff.mark_call(now);
                        }
                        wait
                    }
                }
            };

            if wait.is_zero() {
                return Ok(());
            }
            self.pause(wait, cancel).await?;
        }
    }

    fn record_failure(
        &self,
        state: &mut GatewayState,
        err: &GatewayError,
        retry_after: Option<Duration>,
        now: Instant,
    ) {
        let signal = err.signal();
        state.backoff.record_error(signal);

        match signal {
            ErrorSignal::RateLimited => {
                if let Some(hint) = retry_after.filter(|hint| *hint > self.config.retry_max_delay) {
                    warn!(
                        retry_after_secs = hint.as_secs(),
                        "upstream asked for an abnormally long pause"
                    );
                }
                state.circuit.record_rate_limit_signal(now, retry_after);
            }
            ErrorSignal::Forbidden | ErrorSignal::Fatal => debug!(error = %err, "upstream call rejected"),
            _ => warn!(error = %err, "upstream call failed"),
        }
    }

    async fn retry_delay(&self, err: &GatewayError) -> Option<Duration> {
        if matches!(err, GatewayError::Cancelled) || !err.signal().is_retryable() {
            return None;
        }

        let mut state = self.state.lock().await;
        let exponent = state.backoff.consecutive_errors().min(16);
        let mut delay = self
            .config
            .retry_base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.config.retry_max_delay);

        if err.signal() == ErrorSignal::RateLimited {
            if let Some(remaining) = state.circuit.remaining(Instant::now()) {
                if remaining > self.config.retry_max_delay {
                    warn!(
                        cooldown_ms = remaining.as_millis() as u64,
                        "cooldown exceeds the retry budget, giving up"
                    );
                    return None;
                }
                delay = delay.max(remaining + Duration::from_millis(1));
            }
        }

        Some(delay)
    }

    async fn pause(&self, wait: Duration, cancel: &CancellationToken) -> Result<(), GatewayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            _ = sleep(wait) => Ok(()),
        }
    }
}

fn parse_body(body: &str) -> Result<Value, GatewayError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| GatewayError::malformed(format!("response is not valid JSON: {e}")))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value)
        .map_err(|e| GatewayError::malformed(format!("unexpected response shape: {e}")))
}

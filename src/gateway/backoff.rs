//! Adaptive spacing between upstream calls.
//!
//! The controller keeps a base interval that stretches when the upstream signals
//! rate limiting and relaxes again, step by step, while calls succeed. The interval
//! actually enforced before a call grows exponentially with the current streak of
//! consecutive errors.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::ErrorSignal;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Interval the controller starts from.
    pub base_interval: Duration,
    /// Floor the interval decays towards while calls succeed.
    pub min_interval: Duration,
    /// Ceiling for the base interval.
    pub max_interval: Duration,
    /// Upper bound for the `2^consecutive_errors` multiplier.
    pub cap_multiplier: u32,
    pub max_consecutive_errors: u32,
    pub error_budget_cap: u32,
    /// Errors above this budget additionally stretch the interval.
    pub error_budget_threshold: u32,
    pub rate_limit_multiplier: f64,
    pub budget_penalty_multiplier: f64,
    /// Multiplicative relaxation applied on success while the error budget is non-zero.
    pub success_decay: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(30),
            cap_multiplier: 8,
            max_consecutive_errors: 10,
            error_budget_cap: 50,
            error_budget_threshold: 5,
            rate_limit_multiplier: 3.0,
            budget_penalty_multiplier: 1.5,
            success_decay: 0.9,
        }
    }
}

#[derive(Debug)]
pub struct BackoffController {
    config: BackoffConfig,
    consecutive_errors: u32,
    error_budget: u32,
    base_interval_ms: f64,
    last_call_at: Option<Instant>,
}

impl BackoffController {
    pub fn new(config: BackoffConfig) -> Self {
        let base_interval_ms = config.base_interval.as_secs_f64() * 1000.0;
        Self {
            config,
            consecutive_errors: 0,
            error_budget: 0,
            base_interval_ms,
            last_call_at: None,
        }
    }

    /// How long a caller has to wait at `now` before it may issue the next call.
    ///
    /// `base * min(2^consecutive_errors, cap) - elapsed since the last call`, never negative.
    pub fn delay_before_call(&self, now: Instant) -> Duration {
        let Some(last_call_at) = self.last_call_at else {
            return Duration::ZERO;
        };

        let multiplier = 2f64
            .powi(self.consecutive_errors as i32)
            .min(self.config.cap_multiplier as f64);
        let required = from_millis_f64(self.base_interval_ms * multiplier);
        let elapsed = now.saturating_duration_since(last_call_at);

        required.saturating_sub(elapsed)
    }

    pub fn mark_call(&mut self, at: Instant) {
        self.last_call_at = Some(at);
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        if self.error_budget > 0 {
            self.error_budget -= 1;
            let floor = self.config.min_interval.as_secs_f64() * 1000.0;
            self.base_interval_ms = (self.base_interval_ms * self.config.success_decay).max(floor);
        }
    }

    pub fn record_error(&mut self, signal: ErrorSignal) {
        self.consecutive_errors = (self.consecutive_errors + 1).min(self.config.max_consecutive_errors);
        self.error_budget = (self.error_budget + 1).min(self.config.error_budget_cap);

        let ceiling = self.config.max_interval.as_secs_f64() * 1000.0;
        if signal == ErrorSignal::RateLimited {
            self.base_interval_ms = (self.base_interval_ms * self.config.rate_limit_multiplier).min(ceiling);
        }
        if self.error_budget > self.config.error_budget_threshold {
            self.base_interval_ms =
                (self.base_interval_ms * self.config.budget_penalty_multiplier).min(ceiling);
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn error_budget(&self) -> u32 {
        self.error_budget
    }

    pub fn base_interval(&self) -> Duration {
        from_millis_f64(self.base_interval_ms)
    }
}

fn from_millis_f64(ms: f64) -> Duration {
    Duration::from_micros((ms * 1000.0).round() as u64)
}

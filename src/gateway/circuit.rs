//! Fail-fast guard that trips on rate limiting.
//!
//! ```text
//! Closed → Open: rate-limit signal
//! Open → Closed: now > reopen_at (checked lazily, no manual reset)
//! ```

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct CircuitBreaker {
    cooldown: Duration,
    open: bool,
    reopen_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            open: false,
            reopen_at: None,
        }
    }

    /// Opens the circuit for the configured cooldown, or for `hint` when the upstream asked
    /// for a longer pause. An already later `reopen_at` is kept.
    pub fn record_rate_limit_signal(&mut self, now: Instant, hint: Option<Duration>) {
        let cooldown = hint.map_or(self.cooldown, |hint| hint.max(self.cooldown));
        let reopen_at = now + cooldown;

        if self.is_open(now) && self.reopen_at.is_some_and(|current| current >= reopen_at) {
            return;
        }

        tracing::warn!(cooldown_ms = cooldown.as_millis() as u64, "circuit opened");
        self.open = true;
        self.reopen_at = Some(reopen_at);
    }

    pub fn is_open(&mut self, now: Instant) -> bool {
        if self.open && self.reopen_at.is_none_or(|reopen_at| now > reopen_at) {
            tracing::debug!("circuit closed");
            self.open = false;
            self.reopen_at = None;
        }
        self.open
    }

    /// Time left until the circuit closes, `None` while closed.
    pub fn remaining(&mut self, now: Instant) -> Option<Duration> {
        if !self.is_open(now) {
            return None;
        }
        self.reopen_at
            .map(|reopen_at| reopen_at.saturating_duration_since(now))
    }
}

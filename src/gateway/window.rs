//! Fixed-window request counter with a soft throttle.
//!
//! Once the window is filled past its soft cap every further admission pays a fixed
//! penalty, independent of the exponential backoff. Past the soft cap consecutive
//! requests are also kept at least one penalty apart, so callers that sat out their
//! penalty side by side still leave one at a time.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub window: Duration,
    pub max_requests: u32,
    /// Fraction of `max_requests` after which the penalty applies.
    pub soft_cap_fraction: f64,
    pub penalty: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
            soft_cap_fraction: 0.7,
            penalty: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct WindowLimiter {
    config: WindowConfig,
    window_start: Instant,
    requests_this_window: u32,
    last_request_at: Option<Instant>,
}

impl WindowLimiter {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            window_start: Instant::now(),
            requests_this_window: 0,
            last_request_at: None,
        }
    }

    /// Penalty the next admission has to sit out, if the window is past its soft cap.
    pub fn soft_penalty(&mut self, now: Instant) -> Option<Duration> {
        self.roll(now);
        self.past_soft_cap().then_some(self.config.penalty)
    }

    /// Time left until the next request may leave while the window is past its soft cap.
    pub fn penalty_spacing(&mut self, now: Instant) -> Duration {
        self.roll(now);
        match self.last_request_at {
            Some(last) if self.past_soft_cap() => {
                (last + self.config.penalty).saturating_duration_since(now)
            }
            _ => Duration::ZERO,
        }
    }

    /// Counts a request that is about to hit the network.
    pub fn record_request(&mut self, now: Instant) {
        self.roll(now);
        self.requests_this_window += 1;
        self.last_request_at = Some(now);
    }

    pub fn requests_this_window(&self) -> u32 {
        self.requests_this_window
    }

    fn past_soft_cap(&self) -> bool {
        self.requests_this_window as f64
            > self.config.max_requests as f64 * self.config.soft_cap_fraction
    }

    fn roll(&mut self, now: Instant) {
        if now > self.window_start + self.config.window {
            tracing::debug!(
                requests = self.requests_this_window,
                "request window rolled over"
            );
            self.window_start = now;
            self.requests_this_window = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> WindowLimiter {
        WindowLimiter::new(WindowConfig {
            max_requests,
            ..WindowConfig::default()
        })
    }

    #[test]
    fn soft_throttle_engages_after_seventy_percent() {
        let mut window = limiter(50);
        let now = window.window_start;

        let mut first_throttled = None;
        for request in 1..=120u32 {
            let throttled = window.soft_penalty(now).is_some();
            window.record_request(now);
            if throttled && first_throttled.is_none() {
                first_throttled = Some(request);
            }
        }

        assert_eq!(first_throttled, Some(37));
        assert_eq!(window.requests_this_window(), 120);
    }

    #[test]
    fn penalty_is_the_configured_one() {
        let mut window = limiter(1);
        let now = window.window_start;
        assert_eq!(window.soft_penalty(now), None);
        window.record_request(now);
        window.record_request(now);
        assert_eq!(window.soft_penalty(now), Some(Duration::from_secs(1)));
    }

    #[test]
    fn fractional_soft_cap_is_not_rounded() {
        let mut window = WindowLimiter::new(WindowConfig {
            max_requests: 10,
            soft_cap_fraction: 0.75,
            ..WindowConfig::default()
        });
        let now = window.window_start;

        let mut first_throttled = None;
        for request in 1..=10u32 {
            if window.soft_penalty(now).is_some() && first_throttled.is_none() {
                first_throttled = Some(request);
            }
            window.record_request(now);
        }

        // a count of 8 is already past 7.5
        assert_eq!(first_throttled, Some(9));
    }

    #[test]
    fn spacing_only_applies_past_the_soft_cap() {
        let mut window = limiter(2);
        let start = window.window_start;

        window.record_request(start);
        assert_eq!(window.penalty_spacing(start), Duration::ZERO);

        window.record_request(start);
        let later = start + Duration::from_millis(300);
        assert_eq!(window.penalty_spacing(later), Duration::from_millis(700));
        assert_eq!(window.penalty_spacing(start + Duration::from_secs(2)), Duration::ZERO);
    }

    #[test]
    fn counter_resets_once_per_rollover() {
        let mut window = limiter(50);
        let start = window.window_start;
        for _ in 0..10 {
            window.record_request(start);
        }

        // still inside the window at exactly its end
        window.record_request(start + Duration::from_secs(60));
        assert_eq!(window.requests_this_window(), 11);

        let later = start + Duration::from_secs(61);
        window.record_request(later);
        assert_eq!(window.requests_this_window(), 1);
        window.record_request(later + Duration::from_secs(1));
        assert_eq!(window.requests_this_window(), 2);
    }

    #[test]
    fn rollover_clears_the_soft_throttle() {
        let mut window = limiter(10);
        let start = window.window_start;
        for _ in 0..10 {
            window.record_request(start);
        }
        assert!(window.soft_penalty(start).is_some());
        assert!(window.soft_penalty(start + Duration::from_secs(61)).is_none());
    }
}

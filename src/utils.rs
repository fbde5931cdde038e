use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

/// Child of `parent` that additionally cancels itself after `within`.
///
/// The timer task ends as soon as the token is cancelled, so callers should hold a
/// `drop_guard` for the lifetime of the guarded operation.
pub fn deadline_token(parent: &CancellationToken, within: Duration) -> CancellationToken {
    let token = parent.child_token();
    let timer = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(within) => {
                tracing::debug!(deadline_ms = within.as_millis() as u64, "deadline reached");
                timer.cancel();
            }
        }
    });

    token
}

/// Fractional days between `earlier` and `now`, never negative.
pub fn days_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - earlier).num_seconds().max(0);
    seconds as f64 / 86_400.0
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}

pub fn format_score(score: f64) -> String {
    format!("{score:.1}")
}

pub fn format_percentage(percentage: f64) -> String {
    format!("{percentage:.1}%")
}

/// Shortens `value` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut short: String = value.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

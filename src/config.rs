//! Configuration management for sporlytics.
//!
//! Values are resolved in this order:
//! 1. Process environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Built-in defaults
//!
//! Upstream endpoints and session keys are plain accessor functions. Gateway and analytics
//! tunables are collected into [`GatewayConfig`] and [`AnalyticsConfig`], both of which can be
//! built from any key lookup so they stay testable without touching the process environment.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{
    error::ConfigError,
    gateway::{BackoffConfig, WindowConfig},
};

/// Name of the application directory below the platform data directory.
pub const APP_DIR: &str = "sporlytics";

/// Loads environment variables from `<data_local_dir>/sporlytics/.env`.
///
/// A missing file is not an error, the process environment and the built-in defaults
/// still apply. Variables already present in the environment are never overwritten.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file exists but
/// cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let path = app_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if !path.is_file() {
        return Ok(());
    }
    dotenv::from_path(&path).map_err(|e| format!("Failed to load {}: {e}", path.display()))
}

/// Platform specific application directory, e.g. `~/.local/share/sporlytics` on Linux.
pub fn app_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

/// Address the HTTP analytics server binds to.
pub fn server_addr() -> String {
    env_or_default("SERVER_ADDRESS", "127.0.0.1:8080")
}

/// Base URL of the Spotify Web API, without trailing slash.
pub fn spotify_apiurl() -> String {
    env_or_default("SPOTIFY_API_URL", "https://api.spotify.com/v1")
        .trim_end_matches('/')
        .to_string()
}

/// Token endpoint used for the refresh-token grant.
pub fn spotify_apitoken_url() -> String {
    env_or_default(
        "SPOTIFY_API_TOKEN_URL",
        "https://accounts.spotify.com/api/token",
    )
}

/// Client id of the registered application, needed to refresh tokens.
pub fn spotify_client_id() -> Option<String> {
    non_empty(env::var("SPOTIFY_API_AUTH_CLIENT_ID").ok())
}

/// Static bearer token, bypassing the stored OAuth token.
pub fn spotify_access_token() -> Option<String> {
    non_empty(env::var("SPOTIFY_ACCESS_TOKEN").ok())
}

/// Log level for the `sporlytics` tracing target when `RUST_LOG` is not set.
pub fn log_level(default: &str) -> String {
    env_or_default("LOG_LEVEL", default)
}

/// Tunables of the upstream gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub backoff: BackoffConfig,
    pub window: WindowConfig,
    /// Minimum time the circuit stays open after a rate-limit signal.
    pub circuit_cooldown: Duration,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// TTL for cacheable upstream responses.
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            window: WindowConfig::default(),
            circuit_cooldown: Duration::from_secs(5),
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 512,
        }
    }
}

impl GatewayConfig {
    /// Reads `GATEWAY_*` variables from the process environment and validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup; absent keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Lookup(&lookup);

        let backoff = BackoffConfig {
            base_interval: env.millis("GATEWAY_BASE_INTERVAL_MS", defaults.backoff.base_interval)?,
            min_interval: env.millis("GATEWAY_MIN_INTERVAL_MS", defaults.backoff.min_interval)?,
            max_interval: env.millis("GATEWAY_MAX_INTERVAL_MS", defaults.backoff.max_interval)?,
            cap_multiplier: env.parse("GATEWAY_BACKOFF_CAP", defaults.backoff.cap_multiplier)?,
            ..defaults.backoff
        };
        let window = WindowConfig {
            window: env.millis("GATEWAY_WINDOW_MS", defaults.window.window)?,
            max_requests: env.parse("GATEWAY_WINDOW_MAX_REQUESTS", defaults.window.max_requests)?,
            soft_cap_fraction: env.parse("GATEWAY_WINDOW_SOFT_CAP", defaults.window.soft_cap_fraction)?,
            penalty: env.millis("GATEWAY_WINDOW_PENALTY_MS", defaults.window.penalty)?,
        };

        let config = Self {
            backoff,
            window,
            circuit_cooldown: env.millis("GATEWAY_CIRCUIT_COOLDOWN_MS", defaults.circuit_cooldown)?,
            retry_base_delay: env.millis("GATEWAY_RETRY_BASE_MS", defaults.retry_base_delay)?,
            retry_max_delay: env.millis("GATEWAY_RETRY_MAX_MS", defaults.retry_max_delay)?,
            cache_ttl: env.millis("GATEWAY_CACHE_TTL_MS", defaults.cache_ttl)?,
            cache_capacity: env.parse("GATEWAY_CACHE_CAPACITY", defaults.cache_capacity)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let backoff = &self.backoff;
        if backoff.min_interval > backoff.base_interval || backoff.base_interval > backoff.max_interval {
            return Err(ConfigError::Inconsistent(format!(
                "backoff intervals must satisfy min <= base <= max, got {:?} / {:?} / {:?}",
                backoff.min_interval, backoff.base_interval, backoff.max_interval
            )));
        }
        if backoff.cap_multiplier == 0 {
            return Err(ConfigError::Inconsistent("backoff cap must be at least 1".into()));
        }
        if !(backoff.success_decay > 0.0 && backoff.success_decay < 1.0) {
            return Err(ConfigError::Inconsistent(format!(
                "success decay must lie in (0, 1), got {}",
                backoff.success_decay
            )));
        }
        if backoff.rate_limit_multiplier < 1.0 || backoff.budget_penalty_multiplier < 1.0 {
            return Err(ConfigError::Inconsistent(
                "backoff multipliers must not shrink the interval".into(),
            ));
        }

        let window = &self.window;
        if window.window.is_zero() || window.max_requests == 0 {
            return Err(ConfigError::Inconsistent(
                "request window needs a duration and a request limit".into(),
            ));
        }
        if !(window.soft_cap_fraction > 0.0 && window.soft_cap_fraction <= 1.0) {
            return Err(ConfigError::Inconsistent(format!(
                "soft cap fraction must lie in (0, 1], got {}",
                window.soft_cap_fraction
            )));
        }
        if window.penalty < backoff.base_interval {
            return Err(ConfigError::Inconsistent(format!(
                "window penalty {:?} is below the base interval {:?}",
                window.penalty, backoff.base_interval
            )));
        }

        if self.retry_base_delay > self.retry_max_delay {
            return Err(ConfigError::Inconsistent(
                "retry base delay exceeds the maximum retry delay".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Inconsistent("cache capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Tunables of the analytics layer.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub page_size: usize,
    pub max_playlists: usize,
    pub max_tracks_per_playlist: usize,
    /// How many playlists, in listing order, are scanned for followers, creation date and
    /// listening overlap. The rest are scored from the listing alone, which is a bounded
    /// approximation and does not mark the payload as a fallback.
    pub playlist_scan_limit: usize,
    pub top_items: usize,
    /// Consecutive page failures tolerated before pagination gives up.
    pub failure_budget: u32,
    pub deadline: Duration,
    /// How long a last known good payload may stand in for a failed computation.
    pub last_good_ttl: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_playlists: 500,
            max_tracks_per_playlist: 200,
            playlist_scan_limit: 50,
            top_items: 50,
            failure_budget: 3,
            deadline: Duration::from_secs(60),
            last_good_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Lookup(&lookup);

        let config = Self {
            page_size: env.parse("ANALYTICS_PAGE_SIZE", defaults.page_size)?,
            max_playlists: env.parse("ANALYTICS_MAX_PLAYLISTS", defaults.max_playlists)?,
            max_tracks_per_playlist: env.parse(
                "ANALYTICS_MAX_TRACKS_PER_PLAYLIST",
                defaults.max_tracks_per_playlist,
            )?,
            playlist_scan_limit: env.parse("ANALYTICS_PLAYLIST_SCAN_LIMIT", defaults.playlist_scan_limit)?,
            top_items: env.parse("ANALYTICS_TOP_ITEMS", defaults.top_items)?,
            failure_budget: env.parse("ANALYTICS_FAILURE_BUDGET", defaults.failure_budget)?,
            deadline: env.millis("ANALYTICS_DEADLINE_MS", defaults.deadline)?,
            ..defaults
        };

        // the upstream rejects pages above 50 items
        if config.page_size == 0 || config.page_size > 50 {
            return Err(ConfigError::InvalidValue {
                key: "ANALYTICS_PAGE_SIZE",
                value: config.page_size.to_string(),
            });
        }
        Ok(config)
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match (self.0)(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
            _ => Ok(default),
        }
    }

    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_millis() as u64)
            .map(Duration::from_millis)
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    non_empty(env::var(key).ok()).unwrap_or_else(|| default.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

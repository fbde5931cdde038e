//! # CLI Module
//!
//! Terminal front-end for the analytics surface. Every command builds one session
//! (token provider, gateway, Spotify client, analytics service), runs a single
//! analytics operation and renders the payload as a table.
//!
//! ```text
//! CLI command
//!     ↓
//! AnalyticsService   (best effort payloads)
//!     ↓
//! SpotifyClient → Gateway → HttpUpstream
//! ```
//!
//! Degraded payloads are still printed, preceded by a warning. An invalid session ends
//! the process with a request to sign in again.
//!
//! ## Usage
//!
//! ```bash
//! sporlytics overview
//! sporlytics genres
//! sporlytics moods
//! sporlytics playlists --limit 5
//! sporlytics tracks --time-range short
//! sporlytics serve
//! ```

mod histograms;
mod overview;
mod playlists;
mod serve;
mod tracks;

pub use histograms::{genres, moods};
pub use overview::overview;
pub use playlists::playlists;
pub use serve::serve;
pub use tracks::tracks;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    Res,
    analytics::{AnalyticsPayload, AnalyticsService},
    config::{self, AnalyticsConfig, GatewayConfig},
    error,
    error::AnalyticsError,
    gateway::Gateway,
    management::TokenManager,
    spotify::{HttpUpstream, SpotifyClient, StaticToken, TokenProvider},
    warning,
};

/// Builds the analytics service for the current session.
///
/// A static `SPOTIFY_ACCESS_TOKEN` takes precedence over the stored OAuth token.
pub async fn session(shutdown: CancellationToken) -> Res<AnalyticsService> {
    let tokens: Arc<dyn TokenProvider> = match config::spotify_access_token() {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => {
            let manager = TokenManager::load()
                .await
                .map_err(|e| format!("no stored Spotify session ({e})"))?;
            Arc::new(manager)
        }
    };

    let upstream = HttpUpstream::new(config::spotify_apiurl(), tokens)?;
    let gateway = Gateway::new(Arc::new(upstream), GatewayConfig::from_env()?);
    let spotify = SpotifyClient::new(Arc::new(gateway));

    Ok(AnalyticsService::new(
        spotify,
        AnalyticsConfig::from_env()?,
        shutdown,
    ))
}

/// Unwraps a payload for display, exiting when the session has to be renewed.
fn settle<T>(result: Result<AnalyticsPayload<T>, AnalyticsError>) -> T {
    match result {
        Ok(payload) => {
            if payload.fallback {
                warning!("Spotify did not answer every request, results are approximated.");
            }
            payload.data
        }
        Err(AnalyticsError::ReauthenticationRequired) => {
            error!("Your Spotify session is no longer valid. Please sign in again.")
        }
    }
}

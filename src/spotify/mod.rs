//! # Spotify Integration Module
//!
//! Typed access to the Spotify Web API endpoints the analytics need. Every request is an
//! idempotent GET that goes through the session's [`Gateway`], so rate limiting, the
//! circuit breaker, the bounded retry and the response cache apply uniformly:
//!
//! ```text
//! AnalyticsService
//!      ↓
//! SpotifyClient  (playlists, tracks, artists)
//!      ↓
//! Gateway        (cache, circuit, window, backoff, retry)
//!      ↓
//! HttpUpstream   (reqwest, bearer token from the TokenProvider)
//!      ↓
//! Spotify Web API
//! ```
//!
//! The list endpoints are exposed page by page; materializing whole collections is left
//! to the [`Paginator`](crate::paginator::Paginator).

use std::{sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    error::GatewayError,
    gateway::{Gateway, UpstreamCall},
};

pub mod artists;
pub mod http;
pub mod playlists;
pub mod tracks;

pub use http::{HttpUpstream, StaticToken, TokenProvider};

/// Largest page the list endpoints accept.
pub const MAX_PAGE_SIZE: usize = 50;

#[derive(Clone)]
pub struct SpotifyClient {
    gateway: Arc<Gateway>,
}

impl SpotifyClient {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    fn cache_ttl(&self) -> Duration {
        self.gateway.config().cache_ttl
    }

    async fn get_cached<T>(&self, path: String, cancel: &CancellationToken) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let call = UpstreamCall::get(path).cached(self.cache_ttl());
        self.gateway.execute(&call, cancel).await
    }
}

fn page_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE_SIZE)
}

//! # API Module
//!
//! HTTP endpoints of the `serve` command, built on [Axum](https://docs.rs/axum).
//!
//! ## Endpoints
//!
//! - `GET /health` - liveness plus a snapshot of the gateway state
//! - `GET /analytics/overview`
//! - `GET /analytics/genres`
//! - `GET /analytics/moods`
//! - `GET /analytics/playlists?limit=N`
//! - `GET /analytics/tracks?time_range=short_term|medium_term|long_term`
//!
//! Analytics answers are `{ "data": ..., "fallback": bool }`. A session that has to be
//! renewed is answered with `401` and
//! `{ "error": "unauthorized", "message": "Please sign in again" }`.
//!
//! The [`AnalyticsService`](crate::analytics::AnalyticsService) is shared through an
//! `Extension` layer.

mod analytics;
mod health;

pub use analytics::{PlaylistsQuery, TracksQuery, genres, moods, overview, playlists, tracks};
pub use health::health;

use std::sync::Arc;

use axum::{
    Extension,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    analytics::{AnalyticsPayload, AnalyticsService},
    error::AnalyticsError,
    types::TimeRange,
};

const DEFAULT_PLAYLIST_LIMIT: usize = 10;
const MAX_PLAYLIST_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct PlaylistsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TracksQuery {
    pub time_range: Option<TimeRange>,
}

pub async fn overview(Extension(service): Extension<Arc<AnalyticsService>>) -> Response {
    respond(service.get_overview().await)
}

pub async fn genres(Extension(service): Extension<Arc<AnalyticsService>>) -> Response {
    respond(service.get_top_genres().await)
}

pub async fn moods(Extension(service): Extension<Arc<AnalyticsService>>) -> Response {
    respond(service.get_mood_profile().await)
}

pub async fn playlists(
    Extension(service): Extension<Arc<AnalyticsService>>,
    Query(query): Query<PlaylistsQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PLAYLIST_LIMIT)
        .clamp(1, MAX_PLAYLIST_LIMIT);
    respond(service.get_most_active_playlists(limit).await)
}

pub async fn tracks(
    Extension(service): Extension<Arc<AnalyticsService>>,
    Query(query): Query<TracksQuery>,
) -> Response {
    respond(service.get_top_tracks(query.time_range.unwrap_or_default()).await)
}

fn respond<T: Serialize>(result: Result<AnalyticsPayload<T>, AnalyticsError>) -> Response {
    match result {
        Ok(payload) => Json(payload).into_response(),
        Err(AnalyticsError::ReauthenticationRequired) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "unauthorized",
                "message": "Please sign in again",
            })),
        )
            .into_response(),
    }
}

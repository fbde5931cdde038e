use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{SpotifyClient, page_limit};
use crate::{
    error::GatewayError,
    gateway::UpstreamCall,
    types::{AudioFeatures, AudioFeaturesResponse, Page, PlayHistory, RecentlyPlayedResponse, Track, TimeRange},
};

/// Listening history changes with every played song, it is only cached briefly.
const RECENTLY_PLAYED_TTL: Duration = Duration::from_secs(60);

/// Ids per audio features request.
const AUDIO_FEATURES_BATCH: usize = 100;

impl SpotifyClient {
    pub async fn get_top_tracks_page(
        &self,
        time_range: TimeRange,
        offset: usize,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Track>, GatewayError> {
        let path = format!(
            "/me/top/tracks?time_range={range}&limit={limit}&offset={offset}",
            range = time_range.as_str(),
            limit = page_limit(limit)
        );
        let page: Page<Track> = self.get_cached(path, cancel).await?;
        Ok(page.items)
    }

    /// The last 50 played tracks, newest first.
    pub async fn get_recently_played(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PlayHistory>, GatewayError> {
        let ttl = RECENTLY_PLAYED_TTL.min(self.cache_ttl());
        let call = UpstreamCall::get("/me/player/recently-played?limit=50").cached(ttl);
        let response: RecentlyPlayedResponse = self.gateway.execute(&call, cancel).await?;
        Ok(response.items)
    }

    /// Audio features for `track_ids`, in batches. Tracks without an analysis are left out.
    pub async fn get_audio_features(
        &self,
        track_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<AudioFeatures>, GatewayError> {
        let mut features = Vec::with_capacity(track_ids.len());

        for batch in track_ids.chunks(AUDIO_FEATURES_BATCH) {
            let ids: Vec<_> = batch.iter().map(|id| urlencoding::encode(id)).collect();
            let path = format!("/audio-features?ids={}", ids.join(","));
            let response: AudioFeaturesResponse = self.get_cached(path, cancel).await?;
            features.extend(response.audio_features.into_iter().flatten());
        }

        Ok(features)
    }
}

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::analytics::histogram::HistogramBucket;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

/// Offset paged envelope used by most list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// `null` for playlists whose visibility the owner never set.
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    #[serde(default)]
    pub tracks: PlaylistTracksRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistTracksRef {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistFollowers {
    pub id: String,
    #[serde(default)]
    pub followers: Followers,
}

/// Entry of a playlist, holding the track only by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
    /// Missing for removed tracks and local files.
    #[serde(default)]
    pub track: Option<TrackRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Empty for local files.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

impl Track {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHistory {
    pub track: Track,
    pub played_at: DateTime<Utc>,
}

/// Cursor paged envelope of the recently played endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentlyPlayedResponse {
    pub items: Vec<PlayHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeaturesResponse {
    /// `null` entries for ids the upstream has no analysis for.
    pub audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
pub enum TimeRange {
    /// Roughly the last four weeks
    #[serde(rename = "short_term")]
    Short,
    /// Roughly the last six months
    #[default]
    #[serde(rename = "medium_term")]
    Medium,
    /// Several years of listening
    #[serde(rename = "long_term")]
    Long,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Short => "short_term",
            TimeRange::Medium => "medium_term",
            TimeRange::Long => "long_term",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overview {
    pub playlist_count: usize,
    pub total_playlist_tracks: u64,
    pub public_playlists: usize,
    pub collaborative_playlists: usize,
    pub recently_played: usize,
    pub top_genre: Option<String>,
    pub top_track: Option<String>,
    pub most_active_playlist: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPlaylist {
    pub id: String,
    pub name: String,
    pub rank: u32,
    pub score: f64,
    pub track_count: u64,
    pub followers: u64,
    pub collaborative: bool,
    pub public: bool,
    pub recently_played_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedTrack {
    pub id: String,
    pub name: String,
    pub artists: String,
    pub rank: u32,
    pub score: f64,
    pub recent_plays: u32,
    pub popularity: u32,
    pub top_position: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodProfile {
    pub moods: Vec<HistogramBucket>,
    pub energy: Vec<HistogramBucket>,
    /// Tracks audio features were available for.
    pub analyzed_tracks: usize,
}

#[derive(Tabled)]
pub struct OverviewTableRow {
    pub metric: String,
    pub value: String,
}

#[derive(Tabled)]
pub struct HistogramTableRow {
    pub label: String,
    pub count: usize,
    pub share: String,
}

#[derive(Tabled)]
pub struct PlaylistTableRow {
    pub rank: u32,
    pub name: String,
    pub score: String,
    pub tracks: u64,
    pub followers: u64,
}

#[derive(Tabled)]
pub struct TrackTableRow {
    pub rank: u32,
    pub name: String,
    pub artists: String,
    pub score: String,
    pub plays: u32,
}

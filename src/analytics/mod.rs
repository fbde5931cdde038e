//! # Analytics
//!
//! Turns raw, paginated upstream collections into ranked and aggregated insights.
//!
//! Every public operation is best effort: it returns an [`AnalyticsPayload`] whose
//! `fallback` flag is set when some contributing data could not be fetched. A failed
//! computation is replaced by the last payload that was computed in full, or by an empty
//! one. Only an invalid session escapes as an error, because nothing but a new sign in
//! can fix it.
//!
//! Each operation runs under its own deadline, derived from the service's shutdown token.

pub mod histogram;
pub mod scoring;

use std::{
    collections::{HashMap, HashSet},
    future::Future,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::AnalyticsConfig,
    error::{AnalyticsError, ErrorSignal, GatewayError},
    gateway::ResponseCache,
    paginator::{Collected, Paginator},
    spotify::SpotifyClient,
    types::{
        Artist, MoodProfile, Overview, Playlist, RankedPlaylist, RankedTrack, TimeRange, Track,
    },
    utils,
};

use histogram::{HistogramBucket, classify_energy, classify_mood, histogram};
use scoring::{PlaylistSignals, PlaylistWeights, TrackSignals, TrackWeights};

/// Result of an analytics operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsPayload<T> {
    pub data: T,
    /// The data is approximated or stale because the upstream did not fully cooperate.
    pub fallback: bool,
}

struct Computed<T> {
    data: T,
    degraded: bool,
}

struct PlaylistActivity {
    playlists: Vec<Playlist>,
    ranked: Vec<RankedPlaylist>,
    recently_played: usize,
}

struct PlaylistDetails {
    followers: u64,
    days_since_creation: Option<f64>,
    overlap: usize,
    degraded: bool,
}

/// Best-effort analytics over one [`SpotifyClient`].
///
/// Playlist rankings only look into the first `playlist_scan_limit` playlists. Playlists
/// past that limit keep their listing signals (size, collaborative, public) and score
/// zero for followers, recency and listening overlap. That cut is part of the ranking,
/// not a failure, so it leaves `fallback` unset.
pub struct AnalyticsService {
    spotify: SpotifyClient,
    config: AnalyticsConfig,
    playlist_weights: PlaylistWeights,
    track_weights: TrackWeights,
    shutdown: CancellationToken,
    last_good: ResponseCache<String, Value>,
}

impl AnalyticsService {
    /// `shutdown` cancels every running operation, which then returns what it has.
    pub fn new(spotify: SpotifyClient, config: AnalyticsConfig, shutdown: CancellationToken) -> Self {
        Self {
            spotify,
            config,
            playlist_weights: PlaylistWeights::DEFAULT,
            track_weights: TrackWeights::DEFAULT,
            shutdown,
            last_good: ResponseCache::new(64),
        }
    }

    pub fn with_weights(mut self, playlist_weights: PlaylistWeights, track_weights: TrackWeights) -> Self {
        self.playlist_weights = playlist_weights;
        self.track_weights = track_weights;
        self
    }

    pub fn spotify(&self) -> &SpotifyClient {
        &self.spotify
    }

    pub async fn get_overview(&self) -> Result<AnalyticsPayload<Overview>, AnalyticsError> {
        self.best_effort("overview".to_string(), |cancel| async move {
            self.overview(&cancel).await
        })
        .await
    }

    /// Genre distribution over the primary genre of the user's top artists.
    pub async fn get_top_genres(&self) -> Result<AnalyticsPayload<Vec<HistogramBucket>>, AnalyticsError> {
        self.best_effort("genres".to_string(), |cancel| async move {
            self.top_genres(&cancel).await
        })
        .await
    }

    /// Mood and energy distribution over the audio features of the user's top tracks.
    pub async fn get_mood_profile(&self) -> Result<AnalyticsPayload<MoodProfile>, AnalyticsError> {
        self.best_effort("moods".to_string(), |cancel| async move {
            self.mood_profile(&cancel).await
        })
        .await
    }

    pub async fn get_most_active_playlists(
        &self,
        limit: usize,
    ) -> Result<AnalyticsPayload<Vec<RankedPlaylist>>, AnalyticsError> {
        self.best_effort(format!("playlists:{limit}"), |cancel| async move {
            self.most_active_playlists(limit, &cancel).await
        })
        .await
    }

    /// Tracks ranked by activity, drawn from the top tracks of `time_range` and the
    /// listening history.
    pub async fn get_top_tracks(
        &self,
        time_range: TimeRange,
    ) -> Result<AnalyticsPayload<Vec<RankedTrack>>, AnalyticsError> {
        self.best_effort(format!("tracks:{}", time_range.as_str()), |cancel| async move {
            self.top_tracks(time_range, &cancel).await
        })
        .await
    }

    async fn best_effort<T, F, Fut>(
        &self,
        key: String,
        compute: F,
    ) -> Result<AnalyticsPayload<T>, AnalyticsError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<Computed<T>, GatewayError>>,
    {
        let cancel = utils::deadline_token(&self.shutdown, self.config.deadline);
        let _deadline = cancel.clone().drop_guard();

        match compute(cancel).await {
            Ok(Computed {
                data,
                degraded: false,
            }) => {
                if let Ok(value) = serde_json::to_value(&data) {
                    self.last_good.set(key, value, self.config.last_good_ttl);
                }
                Ok(AnalyticsPayload {
                    data,
                    fallback: false,
                })
            }
            Ok(Computed {
                data,
                degraded: true,
            }) => {
                warn!(payload = %key, "serving degraded payload");
                Ok(AnalyticsPayload {
                    data,
                    fallback: true,
                })
            }
            Err(err) if err.is_unauthorized() => Err(AnalyticsError::ReauthenticationRequired),
            Err(err) => {
                warn!(payload = %key, error = %err, "computation failed, serving fallback");
                Ok(self.fallback(&key))
            }
        }
    }

    fn fallback<T>(&self, key: &str) -> AnalyticsPayload<T>
    where
        T: DeserializeOwned + Default,
    {
        let data = self
            .last_good
            .get(key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        AnalyticsPayload {
            data,
            fallback: true,
        }
    }

    fn paginator(&self, max_items: usize) -> Paginator {
        Paginator::new(self.config.page_size, max_items).with_failure_budget(self.config.failure_budget)
    }

    async fn overview(&self, cancel: &CancellationToken) -> Result<Computed<Overview>, GatewayError> {
        let activity = self.playlist_activity(cancel).await?;
        let mut degraded = activity.degraded;

        let genres = absorb(self.top_genres(cancel).await, &mut degraded, "top genres")?;
        let tracks = absorb(
            self.top_tracks(TimeRange::Medium, cancel).await,
            &mut degraded,
            "top tracks",
        )?;
        degraded |= genres.as_ref().is_some_and(|g| g.degraded);
        degraded |= tracks.as_ref().is_some_and(|t| t.degraded);

        let playlists = &activity.data.playlists;
        let overview = Overview {
            playlist_count: playlists.len(),
            total_playlist_tracks: playlists.iter().map(|p| p.tracks.total).sum(),
            public_playlists: playlists.iter().filter(|p| p.public == Some(true)).count(),
            collaborative_playlists: playlists.iter().filter(|p| p.collaborative).count(),
            recently_played: activity.data.recently_played,
            top_genre: genres
                .and_then(|g| g.data.into_iter().next())
                .map(|bucket| bucket.label),
            top_track: tracks
                .and_then(|t| t.data.into_iter().next())
                .map(|track| format!("{} - {}", track.name, track.artists)),
            most_active_playlist: activity.data.ranked.first().map(|p| p.name.clone()),
        };

        Ok(Computed {
            data: overview,
            degraded,
        })
    }

    async fn top_genres(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Computed<Vec<HistogramBucket>>, GatewayError> {
        let artists = self
            .paginator(self.config.top_items)
            .fetch_all(
                |offset, limit| {
                    self.spotify
                        .get_top_artists_page(TimeRange::Medium, offset, limit, cancel)
                },
                cancel,
            )
            .await
            .and_then(|artists| require(artists, "top artists"))?;

        let buckets = histogram(&artists.items, |artist: &Artist| artist.genres.first().cloned());
        Ok(Computed {
            data: buckets,
            degraded: artists.is_degraded(),
        })
    }

    async fn mood_profile(&self, cancel: &CancellationToken) -> Result<Computed<MoodProfile>, GatewayError> {
        let top = self
            .paginator(self.config.top_items)
            .fetch_all(
                |offset, limit| {
                    self.spotify
                        .get_top_tracks_page(TimeRange::Medium, offset, limit, cancel)
                },
                cancel,
            )
            .await
            .and_then(|top| require(top, "top tracks"))?;
        let mut degraded = top.is_degraded();

        let ids: Vec<String> = top
            .items
            .iter()
            .filter(|track| !track.id.is_empty())
            .map(|track| track.id.clone())
            .collect();
        let features = if ids.is_empty() {
            Vec::new()
        } else {
            absorb(
                self.spotify.get_audio_features(&ids, cancel).await,
                &mut degraded,
                "audio features",
            )?
            .unwrap_or_default()
        };

        let profile = MoodProfile {
            moods: histogram(&features, classify_mood),
            energy: histogram(&features, classify_energy),
            analyzed_tracks: features.len(),
        };
        Ok(Computed {
            data: profile,
            degraded,
        })
    }

    async fn most_active_playlists(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Computed<Vec<RankedPlaylist>>, GatewayError> {
        let activity = self.playlist_activity(cancel).await?;
        let mut ranked = activity.data.ranked;
        ranked.truncate(limit);

        Ok(Computed {
            data: ranked,
            degraded: activity.degraded,
        })
    }

    async fn top_tracks(
        &self,
        time_range: TimeRange,
        cancel: &CancellationToken,
    ) -> Result<Computed<Vec<RankedTrack>>, GatewayError> {
        let top = self
            .paginator(self.config.top_items)
            .fetch_all(
                |offset, limit| {
                    self.spotify
                        .get_top_tracks_page(time_range, offset, limit, cancel)
                },
                cancel,
            )
            .await
            .and_then(|top| require(top, "top tracks"))?;
        let mut degraded = top.is_degraded();

        let recent = absorb(
            self.spotify.get_recently_played(cancel).await,
            &mut degraded,
            "recently played",
        )?
        .unwrap_or_default();

        let top_list_len = top.items.len();
        let mut tracks: HashMap<String, (Track, TrackSignals)> = HashMap::new();

        for (position, track) in top.items.into_iter().enumerate() {
            if track.id.is_empty() {
                continue;
            }
            let signals = TrackSignals {
                id: track.id.clone(),
                recent_plays: 0,
                popularity: track.popularity,
                top_position: Some(position),
                top_list_len,
            };
            tracks.entry(track.id.clone()).or_insert((track, signals));
        }

        for play in recent {
            if play.track.id.is_empty() {
                continue;
            }
            let entry = tracks.entry(play.track.id.clone()).or_insert_with(|| {
                let signals = TrackSignals {
                    id: play.track.id.clone(),
                    recent_plays: 0,
                    popularity: play.track.popularity,
                    top_position: None,
                    top_list_len,
                };
                (play.track.clone(), signals)
            });
            entry.1.recent_plays += 1;
        }

        let signals: Vec<TrackSignals> = tracks.values().map(|(_, s)| s.clone()).collect();
        let ranked = scoring::rank_tracks(&signals, &self.track_weights)
            .into_iter()
            .take(self.config.top_items)
            .filter_map(|score| {
                let (track, signals) = tracks.get(&score.entity_id)?;
                Some(RankedTrack {
                    id: track.id.clone(),
                    name: track.name.clone(),
                    artists: track.artist_names(),
                    rank: score.rank,
                    score: score.raw_score,
                    recent_plays: signals.recent_plays,
                    popularity: signals.popularity,
                    top_position: signals.top_position,
                })
            })
            .collect();

        Ok(Computed {
            data: ranked,
            degraded,
        })
    }

    async fn playlist_activity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Computed<PlaylistActivity>, GatewayError> {
        let mut listed = self
            .paginator(self.config.max_playlists)
            .fetch_all(
                |offset, limit| self.spotify.get_playlists_page(offset, limit, cancel),
                cancel,
            )
            .await
            .and_then(|listed| require(listed, "playlists"))?;
        let mut degraded = listed.is_degraded();

        // offsets shift when playlists change between pages
        let mut seen = HashSet::new();
        listed.items.retain(|playlist| seen.insert(playlist.id.clone()));

        let plays = absorb(
            self.spotify.get_recently_played(cancel).await,
            &mut degraded,
            "recently played",
        )?
        .unwrap_or_default();
        let recently_played = plays.len();
        let recent: HashSet<String> = plays
            .into_iter()
            .map(|play| play.track.id)
            .filter(|id| !id.is_empty())
            .collect();

        let now = Utc::now();
        let mut signals = Vec::with_capacity(listed.items.len());
        for (index, playlist) in listed.items.iter().enumerate() {
            let mut entry = PlaylistSignals {
                id: playlist.id.clone(),
                track_count: playlist.tracks.total,
                days_since_creation: None,
                collaborative: playlist.collaborative,
                public: playlist.public.unwrap_or(false),
                recently_played_overlap: 0,
                followers: 0,
            };

            if index < self.config.playlist_scan_limit {
                if cancel.is_cancelled() {
                    degraded = true;
                } else {
                    match self.playlist_details(playlist, &recent, now, cancel).await {
                        Ok(Some(details)) => {
                            entry.followers = details.followers;
                            entry.days_since_creation = details.days_since_creation;
                            entry.recently_played_overlap = details.overlap;
                            degraded |= details.degraded;
                        }
                        Ok(None) => continue,
                        Err(err) if err.is_unauthorized() => return Err(err),
                        Err(err) => {
                            warn!(playlist = %playlist.id, error = %err, "scoring playlist from listing only");
                            degraded = true;
                        }
                    }
                }
            }

            signals.push(entry);
        }

        let names: HashMap<&str, &str> = listed
            .items
            .iter()
            .map(|playlist| (playlist.id.as_str(), playlist.name.as_str()))
            .collect();
        let by_id: HashMap<&str, &PlaylistSignals> =
            signals.iter().map(|s| (s.id.as_str(), s)).collect();

        let ranked = scoring::rank_playlists(&signals, &self.playlist_weights)
            .into_iter()
            .filter_map(|score| {
                let signals = by_id.get(score.entity_id.as_str())?;
                Some(RankedPlaylist {
                    id: score.entity_id.clone(),
                    name: names.get(score.entity_id.as_str())?.to_string(),
                    rank: score.rank,
                    score: score.raw_score,
                    track_count: signals.track_count,
                    followers: signals.followers,
                    collaborative: signals.collaborative,
                    public: signals.public,
                    recently_played_overlap: signals.recently_played_overlap,
                })
            })
            .collect();

        Ok(Computed {
            data: PlaylistActivity {
                playlists: listed.items,
                ranked,
                recently_played,
            },
            degraded,
        })
    }

    /// Followers, creation estimate and listening overlap of one playlist.
    ///
    /// `None` when the playlist is not accessible and has to be skipped.
    async fn playlist_details(
        &self,
        playlist: &Playlist,
        recent: &HashSet<String>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Option<PlaylistDetails>, GatewayError> {
        let followers = match self.spotify.get_playlist_followers(&playlist.id, cancel).await {
            Ok(followers) => followers,
            Err(err) if err.signal() == ErrorSignal::Forbidden => {
                warn!(playlist = %playlist.id, "playlist not accessible, skipping");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let items = self
            .paginator(self.config.max_tracks_per_playlist)
            .fetch_all(
                |offset, limit| {
                    self.spotify
                        .get_playlist_items_page(&playlist.id, offset, limit, cancel)
                },
                cancel,
            )
            .await?;

        // the earliest addition is the best available estimate of the creation date
        let created = items.items.iter().filter_map(|item| item.added_at).min();
        let track_ids: HashSet<&str> = items
            .items
            .iter()
            .filter_map(|item| item.track.as_ref()?.id.as_deref())
            .collect();
        let overlap = track_ids.into_iter().filter(|id| recent.contains(*id)).count();

        debug!(playlist = %playlist.id, followers, overlap, "playlist scanned");
        Ok(Some(PlaylistDetails {
            followers,
            days_since_creation: created.map(|created| utils::days_between(created, now)),
            overlap,
            degraded: items.is_degraded(),
        }))
    }
}

/// Turns the failure of a contributing call into a degraded result. Only an invalid
/// session keeps propagating.
fn absorb<T>(
    result: Result<T, GatewayError>,
    degraded: &mut bool,
    what: &str,
) -> Result<Option<T>, GatewayError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_unauthorized() => Err(err),
        Err(err) => {
            warn!(what, error = %err, "contributing call failed");
            *degraded = true;
            Ok(None)
        }
    }
}

/// A primary collection that broke off before yielding a single item counts as a failed
/// computation, so the caller falls back to the last good payload.
fn require<T>(collected: Collected<T>, what: &str) -> Result<Collected<T>, GatewayError> {
    if !(collected.partial && collected.items.is_empty()) {
        return Ok(collected);
    }

    Err(match collected.last_error {
        Some(signal) => GatewayError::upstream(signal, None, format!("no {what} collected")),
        None => GatewayError::Cancelled,
    })
}

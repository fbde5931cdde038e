//! Activity scoring for playlists and tracks.
//!
//! Everything here is a pure function of its inputs. The weights are heuristic; what
//! matters is the relative order they produce, so they live in named constants that can
//! be tuned and tested on their own.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Weights of the playlist activity formula
///
/// ```text
/// score = track_count * n_tracks
///       + recency * max(0, recency_window_days - days_since_creation)
///       + collaborative * is_collaborative
///       + public * is_public
///       + recently_played_overlap * overlap
///       + followers * min(n_followers, follower_cap)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaylistWeights {
    pub track_count: f64,
    pub recency: f64,
    pub recency_window_days: f64,
    pub collaborative: f64,
    pub public: f64,
    pub recently_played_overlap: f64,
    pub followers: f64,
    pub follower_cap: u64,
}

impl PlaylistWeights {
    pub const DEFAULT: Self = Self {
        track_count: 0.1,
        recency: 1.0,
        recency_window_days: 30.0,
        collaborative: 5.0,
        public: 2.0,
        recently_played_overlap: 3.0,
        followers: 0.05,
        follower_cap: 1000,
    };
}

impl Default for PlaylistWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Weights of the track activity formula
///
/// ```text
/// score = recent_plays * n_plays + popularity * popularity
///       + top_position * (top_list_len - position)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackWeights {
    pub recent_plays: f64,
    pub popularity: f64,
    pub top_position: f64,
}

impl TrackWeights {
    pub const DEFAULT: Self = Self {
        recent_plays: 4.0,
        popularity: 0.2,
        top_position: 1.0,
    };
}

impl Default for TrackWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSignals {
    pub id: String,
    pub track_count: u64,
    /// `None` when the creation date could not be estimated.
    pub days_since_creation: Option<f64>,
    pub collaborative: bool,
    pub public: bool,
    pub recently_played_overlap: usize,
    pub followers: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSignals {
    pub id: String,
    pub recent_plays: u32,
    /// Upstream popularity, 0 to 100.
    pub popularity: u32,
    /// 0-based position in the user's top list.
    pub top_position: Option<usize>,
    pub top_list_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityScore {
    pub entity_id: String,
    pub raw_score: f64,
    /// 1-based.
    pub rank: u32,
}

pub fn playlist_score(signals: &PlaylistSignals, weights: &PlaylistWeights) -> f64 {
    let recency = signals
        .days_since_creation
        .map(|days| (weights.recency_window_days - days.max(0.0)).max(0.0))
        .unwrap_or(0.0);

    weights.track_count * signals.track_count as f64
        + weights.recency * recency
        + weights.collaborative * flag(signals.collaborative)
        + weights.public * flag(signals.public)
        + weights.recently_played_overlap * signals.recently_played_overlap as f64
        + weights.followers * signals.followers.min(weights.follower_cap) as f64
}

pub fn track_score(signals: &TrackSignals, weights: &TrackWeights) -> f64 {
    let position = signals
        .top_position
        .map(|position| signals.top_list_len.saturating_sub(position))
        .unwrap_or(0);

    weights.recent_plays * signals.recent_plays as f64
        + weights.popularity * signals.popularity.min(100) as f64
        + weights.top_position * position as f64
}

pub fn rank_playlists(signals: &[PlaylistSignals], weights: &PlaylistWeights) -> Vec<ActivityScore> {
    rank(
        signals
            .iter()
            .map(|s| (s.id.clone(), playlist_score(s, weights))),
    )
}

pub fn rank_tracks(signals: &[TrackSignals], weights: &TrackWeights) -> Vec<ActivityScore> {
    rank(
        signals
            .iter()
            .map(|s| (s.id.clone(), track_score(s, weights))),
    )
}

/// Orders by descending score, ties by ascending id, and assigns 1-based ranks.
pub fn rank<I>(scored: I) -> Vec<ActivityScore>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut scored: Vec<(String, f64)> = scored.into_iter().collect();
    scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });

    scored
        .into_iter()
        .zip(1u32..)
        .map(|((entity_id, raw_score), rank)| ActivityScore {
            entity_id,
            raw_score,
            rank,
        })
        .collect()
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(id: &str) -> PlaylistSignals {
        PlaylistSignals {
            id: id.to_string(),
            track_count: 0,
            days_since_creation: None,
            collaborative: false,
            public: false,
            recently_played_overlap: 0,
            followers: 0,
        }
    }

    #[test]
    fn empty_playlist_scores_zero() {
        assert_eq!(playlist_score(&playlist("p"), &PlaylistWeights::DEFAULT), 0.0);
    }

    #[test]
    fn every_term_contributes() {
        let signals = PlaylistSignals {
            track_count: 20,
            days_since_creation: Some(10.0),
            collaborative: true,
            public: true,
            recently_played_overlap: 2,
            followers: 40,
            ..playlist("p")
        };
        // 2 + 20 + 5 + 2 + 6 + 2
        let score = playlist_score(&signals, &PlaylistWeights::DEFAULT);
        assert!((score - 37.0).abs() < 1e-9);
    }

    #[test]
    fn old_playlists_get_no_recency_bonus() {
        let signals = PlaylistSignals {
            days_since_creation: Some(400.0),
            ..playlist("p")
        };
        assert_eq!(playlist_score(&signals, &PlaylistWeights::DEFAULT), 0.0);
    }

    #[test]
    fn followers_are_capped() {
        let signals = PlaylistSignals {
            followers: 1_000_000,
            ..playlist("p")
        };
        let score = playlist_score(&signals, &PlaylistWeights::DEFAULT);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn top_position_counts_from_the_end_of_the_list() {
        let signals = TrackSignals {
            id: "t".into(),
            recent_plays: 2,
            popularity: 50,
            top_position: Some(0),
            top_list_len: 10,
        };
        // 8 + 10 + 10
        assert!((track_score(&signals, &TrackWeights::DEFAULT) - 28.0).abs() < 1e-9);

        let unranked = TrackSignals {
            top_position: None,
            ..signals
        };
        assert!((track_score(&unranked, &TrackWeights::DEFAULT) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn ranks_are_one_based_and_dense() {
        let ranked = rank(vec![("a".to_string(), 1.0), ("b".to_string(), 3.0), ("c".to_string(), 2.0)]);
        let order: Vec<(&str, u32)> = ranked
            .iter()
            .map(|s| (s.entity_id.as_str(), s.rank))
            .collect();
        assert_eq!(order, vec![("b", 1), ("c", 2), ("a", 3)]);
    }
}

use sporlytics::{
    analytics::{
        histogram::{HistogramBucket, classify_energy, classify_mood, histogram},
        scoring::{
            PlaylistSignals, PlaylistWeights, TrackSignals, TrackWeights, rank, rank_playlists,
            rank_tracks,
        },
    },
    types::AudioFeatures,
};

fn playlist(id: &str, track_count: u64) -> PlaylistSignals {
    PlaylistSignals {
        id: id.to_string(),
        track_count,
        days_since_creation: None,
        collaborative: false,
        public: false,
        recently_played_overlap: 0,
        followers: 0,
    }
}

fn track(id: &str, recent_plays: u32, popularity: u32, top_position: Option<usize>) -> TrackSignals {
    TrackSignals {
        id: id.to_string(),
        recent_plays,
        popularity,
        top_position,
        top_list_len: 3,
    }
}

fn features(id: &str, valence: f64, energy: f64) -> AudioFeatures {
    AudioFeatures {
        id: id.to_string(),
        valence: Some(valence),
        energy: Some(energy),
    }
}

#[test]
fn equal_scores_are_ordered_by_ascending_id() {
    let signals = vec![playlist("zeta", 10), playlist("alpha", 10), playlist("mid", 10)];

    let ranked = rank_playlists(&signals, &PlaylistWeights::DEFAULT);

    let ids: Vec<&str> = ranked.iter().map(|s| s.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    assert_eq!(ranked[0].raw_score, ranked[2].raw_score);
    assert_eq!(
        ranked.iter().map(|s| s.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn ranking_is_deterministic_regardless_of_input_order() {
    let forward = vec![playlist("b", 5), playlist("a", 5), playlist("c", 40)];
    let mut backward = forward.clone();
    backward.reverse();

    assert_eq!(
        rank_playlists(&forward, &PlaylistWeights::DEFAULT),
        rank_playlists(&backward, &PlaylistWeights::DEFAULT)
    );
}

#[test]
fn recent_listening_outweighs_size() {
    let big = playlist("big", 100);
    let listened = PlaylistSignals {
        recently_played_overlap: 4,
        days_since_creation: Some(1.0),
        ..playlist("listened", 5)
    };

    let ranked = rank_playlists(&[big, listened], &PlaylistWeights::DEFAULT);

    // 10.0 for the big playlist against 0.5 + 29 + 12
    assert_eq!(ranked[0].entity_id, "listened");
    assert!((ranked[0].raw_score - 41.5).abs() < 1e-9);
    assert!((ranked[1].raw_score - 10.0).abs() < 1e-9);
}

#[test]
fn custom_weights_change_the_ranking() {
    let signals = vec![
        PlaylistSignals {
            collaborative: true,
            ..playlist("shared", 1)
        },
        playlist("large", 60),
    ];
    let collaboration_first = PlaylistWeights {
        collaborative: 100.0,
        ..PlaylistWeights::DEFAULT
    };

    assert_eq!(rank_playlists(&signals, &PlaylistWeights::DEFAULT)[0].entity_id, "large");
    assert_eq!(rank_playlists(&signals, &collaboration_first)[0].entity_id, "shared");
}

#[test]
fn plays_dominate_track_ranking() {
    let signals = vec![
        track("popular", 0, 100, None),
        track("played", 6, 10, None),
        track("charting", 0, 50, Some(0)),
    ];

    let ranked = rank_tracks(&signals, &TrackWeights::DEFAULT);

    // 24 + 2, 20, 10 + 3
    let ids: Vec<&str> = ranked.iter().map(|s| s.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["played", "popular", "charting"]);
}

#[test]
fn rank_of_nothing_is_empty() {
    assert!(rank(Vec::<(String, f64)>::new()).is_empty());
}

#[test]
fn genre_histogram_percentages() {
    let genres = vec!["rock", "rock", "jazz"];

    let buckets = histogram(&genres, |genre| Some(genre.to_string()));

    assert_eq!(
        buckets,
        vec![
            HistogramBucket {
                label: "rock".into(),
                count: 2,
                percentage: 66.7,
            },
            HistogramBucket {
                label: "jazz".into(),
                count: 1,
                percentage: 33.3,
            },
        ]
    );
}

#[test]
fn unclassifiable_items_are_excluded_from_the_total() {
    let genres: Vec<Option<&str>> = vec![Some("pop"), None, None, Some("pop")];

    let buckets = histogram(&genres, |genre| genre.map(str::to_string));

    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].count, 2);
    assert_eq!(buckets[0].percentage, 100.0);
}

#[test]
fn nothing_classified_yields_no_nan() {
    let buckets = histogram(&[1, 2, 3], |_: &i32| None);
    assert!(buckets.is_empty());

    let unanalyzed = vec![AudioFeatures {
        id: "t".into(),
        valence: None,
        energy: None,
    }];
    assert!(histogram(&unanalyzed, classify_mood).is_empty());
    assert!(histogram(&unanalyzed, classify_energy).is_empty());
}

#[test]
fn mood_and_energy_profiles() {
    let tracks = vec![
        features("a", 0.8, 0.9),
        features("b", 0.7, 0.8),
        features("c", 0.2, 0.1),
        features("d", 0.9, 0.2),
    ];

    let moods = histogram(&tracks, classify_mood);
    assert_eq!(moods[0].label, "energetic");
    assert_eq!(moods[0].percentage, 50.0);
    // equal counts fall back to label order
    assert_eq!(moods[1].label, "chill");
    assert_eq!(moods[2].label, "melancholic");

    let energy = histogram(&tracks, classify_energy);
    assert_eq!(energy[0].label, "high");
    assert_eq!(energy[1].label, "low");
    assert_eq!(energy[1].count, 2);
    assert_eq!(energy.len(), 2);
}

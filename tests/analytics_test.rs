use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use sporlytics::{
    analytics::AnalyticsService,
    config::{AnalyticsConfig, GatewayConfig},
    error::{AnalyticsError, TransportError},
    gateway::{ApiResponse, Gateway, Upstream},
    spotify::SpotifyClient,
    types::TimeRange,
};
use tokio_util::sync::CancellationToken;

const PLAYLISTS: &str = r#"{"items":[
    {"id":"p1","name":"Road Trip","public":true,"collaborative":true,"tracks":{"total":10}},
    {"id":"p2","name":"Focus","public":false,"collaborative":false,"tracks":{"total":30}},
    {"id":"p3","name":"Locked","public":null,"tracks":{"total":5}}
],"total":3,"next":null}"#;

const P1_ITEMS: &str = r#"{"items":[
    {"added_at":"2020-01-01T00:00:00Z","track":{"id":"t1"}},
    {"added_at":"2020-02-01T00:00:00Z","track":{"id":"t2"}},
    {"added_at":"2020-03-01T00:00:00Z","track":null}
],"total":3}"#;

const P2_ITEMS: &str = r#"{"items":[{"added_at":"2021-01-01T00:00:00Z","track":{"id":"t3"}}],"total":1}"#;

const RECENTLY_PLAYED: &str = r#"{"items":[
    {"track":{"id":"t1","name":"One","popularity":50,"artists":[{"name":"Artist A"}]},"played_at":"2024-05-01T10:00:00Z"},
    {"track":{"id":"t3","name":"Three","popularity":10,"artists":[{"name":"Artist C"}]},"played_at":"2024-05-01T09:55:00Z"},
    {"track":{"id":"t1","name":"One","popularity":50,"artists":[{"name":"Artist A"}]},"played_at":"2024-05-01T09:50:00Z"}
]}"#;

const TOP_TRACKS: &str = r#"{"items":[
    {"id":"t1","name":"One","popularity":50,"artists":[{"name":"Artist A"}]},
    {"id":"t4","name":"Four","popularity":90,"artists":[{"name":"Artist D"},{"name":"Artist E"}]}
],"total":2}"#;

const TOP_ARTISTS: &str = r#"{"items":[
    {"id":"a1","name":"A1","genres":["rock","indie"]},
    {"id":"a2","name":"A2","genres":["rock"]},
    {"id":"a3","name":"A3","genres":["jazz"]},
    {"id":"a4","name":"A4","genres":[]}
],"total":4}"#;

const AUDIO_FEATURES: &str = r#"{"audio_features":[
    {"id":"t1","valence":0.9,"energy":0.8},
    null
]}"#;

/// Upstream serving canned bodies by path prefix; the first matching route wins.
struct Routed {
    routes: Vec<(&'static str, u16, &'static str)>,
    failing: AtomicBool,
    requests: Mutex<Vec<String>>,
}

impl Routed {
    fn new(overrides: &[(&'static str, u16, &'static str)]) -> Arc<Self> {
        let mut routes = overrides.to_vec();
        routes.extend([
            ("/playlists/p1/tracks", 200, P1_ITEMS),
            ("/playlists/p1?", 200, r#"{"id":"p1","followers":{"total":100}}"#),
            ("/playlists/p2/tracks", 200, P2_ITEMS),
            ("/playlists/p2?", 200, r#"{"id":"p2","followers":{"total":0}}"#),
            ("/playlists/p3", 403, r#"{"error":{"status":403,"message":"Forbidden"}}"#),
            ("/me/playlists", 200, PLAYLISTS),
            ("/me/player/recently-played", 200, RECENTLY_PLAYED),
            ("/me/top/tracks", 200, TOP_TRACKS),
            ("/me/top/artists", 200, TOP_ARTISTS),
            ("/audio-features", 200, AUDIO_FEATURES),
        ]);

        Arc::new(Self {
            routes,
            failing: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn fail_from_now_on(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for Routed {
    async fn send(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(path.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Ok(ApiResponse::new(500, "upstream down"));
        }

        let response = self
            .routes
            .iter()
            .find(|(prefix, _, _)| path.starts_with(prefix))
            .map(|(_, status, body)| ApiResponse::new(*status, *body))
            .unwrap_or_else(|| ApiResponse::new(404, "not found"));
        Ok(response)
    }
}

fn service(upstream: Arc<Routed>, shutdown: CancellationToken) -> AnalyticsService {
    let gateway = Gateway::new(upstream, GatewayConfig::default());
    let config = AnalyticsConfig {
        deadline: Duration::from_secs(600),
        ..AnalyticsConfig::default()
    };
    AnalyticsService::new(SpotifyClient::new(Arc::new(gateway)), config, shutdown)
}

#[tokio::test(start_paused = true)]
async fn top_genres_use_the_primary_genre_of_each_artist() {
    let service = service(Routed::new(&[]), CancellationToken::new());

    let payload = service.get_top_genres().await.unwrap();

    assert!(!payload.fallback);
    let genres: Vec<(&str, f64)> = payload
        .data
        .iter()
        .map(|bucket| (bucket.label.as_str(), bucket.percentage))
        .collect();
    assert_eq!(genres, vec![("rock", 66.7), ("jazz", 33.3)]);
}

#[tokio::test(start_paused = true)]
async fn inaccessible_playlists_are_skipped_when_ranking() {
    let upstream = Routed::new(&[]);
    let service = service(upstream.clone(), CancellationToken::new());

    let payload = service.get_most_active_playlists(10).await.unwrap();

    assert!(!payload.fallback);
    let ranked = payload.data;
    assert_eq!(ranked.len(), 2);

    // 1 + 5 + 2 + 3 + 5 against 3 + 3
    assert_eq!(ranked[0].id, "p1");
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked[0].followers, 100);
    assert_eq!(ranked[0].recently_played_overlap, 1);
    assert!((ranked[0].score - 16.0).abs() < 1e-9);
    assert_eq!(ranked[1].id, "p2");
    assert!((ranked[1].score - 6.0).abs() < 1e-9);

    // no retry for the forbidden playlist, no attempt to read its tracks
    let requests = upstream.requests();
    assert_eq!(requests.iter().filter(|p| p.starts_with("/playlists/p3")).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn playlist_limit_truncates_the_ranking() {
    let service = service(Routed::new(&[]), CancellationToken::new());

    let payload = service.get_most_active_playlists(1).await.unwrap();

    assert_eq!(payload.data.len(), 1);
    assert_eq!(payload.data[0].name, "Road Trip");
}

#[tokio::test(start_paused = true)]
async fn top_tracks_combine_top_list_and_history() {
    let service = service(Routed::new(&[]), CancellationToken::new());

    let payload = service.get_top_tracks(TimeRange::Short).await.unwrap();

    assert!(!payload.fallback);
    let ids: Vec<&str> = payload.data.iter().map(|t| t.id.as_str()).collect();
    // 8 + 10 + 2, 18 + 1, 4 + 2
    assert_eq!(ids, vec!["t1", "t4", "t3"]);
    assert_eq!(payload.data[0].recent_plays, 2);
    assert_eq!(payload.data[1].artists, "Artist D, Artist E");
    assert_eq!(payload.data[2].top_position, None);
}

#[tokio::test(start_paused = true)]
async fn mood_profile_ignores_tracks_without_analysis() {
    let service = service(Routed::new(&[]), CancellationToken::new());

    let payload = service.get_mood_profile().await.unwrap();

    assert!(!payload.fallback);
    assert_eq!(payload.data.analyzed_tracks, 1);
    assert_eq!(payload.data.moods[0].label, "energetic");
    assert_eq!(payload.data.moods[0].percentage, 100.0);
    assert_eq!(payload.data.energy[0].label, "high");
}

#[tokio::test(start_paused = true)]
async fn overview_summarizes_every_source() {
    let service = service(Routed::new(&[]), CancellationToken::new());

    let payload = service.get_overview().await.unwrap();

    assert!(!payload.fallback);
    let overview = payload.data;
    assert_eq!(overview.playlist_count, 3);
    assert_eq!(overview.total_playlist_tracks, 45);
    assert_eq!(overview.public_playlists, 1);
    assert_eq!(overview.collaborative_playlists, 1);
    assert_eq!(overview.recently_played, 3);
    assert_eq!(overview.top_genre.as_deref(), Some("rock"));
    assert_eq!(overview.top_track.as_deref(), Some("One - Artist A"));
    assert_eq!(overview.most_active_playlist.as_deref(), Some("Road Trip"));
}

#[tokio::test(start_paused = true)]
async fn failed_contributing_call_marks_the_payload_as_fallback() {
    let upstream = Routed::new(&[("/audio-features", 503, "unavailable")]);
    let service = service(upstream, CancellationToken::new());

    let payload = service.get_mood_profile().await.unwrap();

    assert!(payload.fallback);
    assert_eq!(payload.data.analyzed_tracks, 0);
    assert!(payload.data.moods.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unauthorized_requires_a_new_sign_in() {
    let upstream = Routed::new(&[("/me/top/artists", 401, "token expired")]);
    let service = service(upstream, CancellationToken::new());

    let err = service.get_top_genres().await.unwrap_err();
    assert!(matches!(err, AnalyticsError::ReauthenticationRequired));
}

#[tokio::test(start_paused = true)]
async fn unauthorized_history_fails_the_overview() {
    let upstream = Routed::new(&[("/me/player/recently-played", 401, "token expired")]);
    let service = service(upstream, CancellationToken::new());

    let result = service.get_overview().await;
    assert!(matches!(result, Err(AnalyticsError::ReauthenticationRequired)));
}

#[tokio::test(start_paused = true)]
async fn outage_serves_the_last_good_payload() {
    let upstream = Routed::new(&[]);
    let service = service(upstream.clone(), CancellationToken::new());

    let fresh = service.get_top_genres().await.unwrap();
    assert!(!fresh.fallback);

    upstream.fail_from_now_on();
    // let the gateway cache run dry
    tokio::time::advance(Duration::from_secs(301)).await;

    let stale = service.get_top_genres().await.unwrap();
    assert!(stale.fallback);
    assert_eq!(stale.data, fresh.data);
}

#[tokio::test(start_paused = true)]
async fn outage_without_history_serves_an_empty_payload() {
    let upstream = Routed::new(&[]);
    upstream.fail_from_now_on();
    let service = service(upstream, CancellationToken::new());

    let payload = service.get_most_active_playlists(5).await.unwrap();

    assert!(payload.fallback);
    assert!(payload.data.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_work_before_any_request() {
    let upstream = Routed::new(&[]);
    let shutdown = CancellationToken::new();
    let service = service(upstream.clone(), shutdown.clone());
    shutdown.cancel();

    let payload = service.get_top_tracks(TimeRange::Long).await.unwrap();

    assert!(payload.fallback);
    assert!(payload.data.is_empty());
    assert!(upstream.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn playlists_past_the_scan_limit_are_scored_from_the_listing() {
    let upstream = Routed::new(&[]);
    let gateway = Gateway::new(upstream.clone(), GatewayConfig::default());
    let config = AnalyticsConfig {
        deadline: Duration::from_secs(600),
        playlist_scan_limit: 1,
        ..AnalyticsConfig::default()
    };
    let service = AnalyticsService::new(
        SpotifyClient::new(Arc::new(gateway)),
        config,
        CancellationToken::new(),
    );

    let payload = service.get_most_active_playlists(10).await.unwrap();

    assert!(!payload.fallback);
    let ranked = payload.data;
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].id, "p1");
    // size only: 30 and 5 tracks at 0.1 each
    assert_eq!(ranked[1].id, "p2");
    assert_eq!(ranked[1].followers, 0);
    assert_eq!(ranked[1].recently_played_overlap, 0);
    assert!((ranked[1].score - 3.0).abs() < 1e-9);
    assert_eq!(ranked[2].id, "p3");
    assert!((ranked[2].score - 0.5).abs() < 1e-9);

    let requests = upstream.requests();
    assert!(!requests.iter().any(|p| p.starts_with("/playlists/p2")));
    assert!(!requests.iter().any(|p| p.starts_with("/playlists/p3")));
}

#[tokio::test(start_paused = true)]
async fn playlist_ids_are_escaped_in_request_paths() {
    let upstream = Routed::new(&[]);
    let service = service(upstream.clone(), CancellationToken::new());
    let cancel = CancellationToken::new();

    let _ = service.spotify().get_playlist_followers("odd id/1", &cancel).await;
    let _ = service
        .spotify()
        .get_playlist_items_page("odd id/1", 0, 50, &cancel)
        .await;

    let requests = upstream.requests();
    assert!(requests[0].starts_with("/playlists/odd%20id%2F1?"));
    assert!(requests[1].starts_with("/playlists/odd%20id%2F1/tracks?"));
}

use tabled::Table;

use super::settle;
use crate::{analytics::AnalyticsService, info, types::OverviewTableRow, utils};

pub async fn overview(service: &AnalyticsService) {
    let pb = utils::spinner("Collecting playlists and listening history...");
    let result = service.get_overview().await;
    pb.finish_and_clear();

    let overview = settle(result);
    let none = || "-".to_string();

    let rows = vec![
        row("Playlists", overview.playlist_count.to_string()),
        row("Tracks in playlists", overview.total_playlist_tracks.to_string()),
        row("Public playlists", overview.public_playlists.to_string()),
        row("Collaborative playlists", overview.collaborative_playlists.to_string()),
        row("Recently played", overview.recently_played.to_string()),
        row("Top genre", overview.top_genre.unwrap_or_else(none)),
        row("Top track", overview.top_track.unwrap_or_else(none)),
        row(
            "Most active playlist",
            overview.most_active_playlist.unwrap_or_else(none),
        ),
    ];

    info!("Listening overview");
    println!("{}", Table::new(rows));
}

fn row(metric: &str, value: String) -> OverviewTableRow {
    OverviewTableRow {
        metric: metric.to_string(),
        value,
    }
}

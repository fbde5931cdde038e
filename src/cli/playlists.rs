use tabled::Table;

use super::settle;
use crate::{analytics::AnalyticsService, info, types::PlaylistTableRow, utils, warning};

pub async fn playlists(service: &AnalyticsService, limit: usize) {
    let pb = utils::spinner("Scoring playlists...");
    let result = service.get_most_active_playlists(limit).await;
    pb.finish_and_clear();

    let ranked = settle(result);
    if ranked.is_empty() {
        warning!("No playlists found.");
        return;
    }

    let rows: Vec<PlaylistTableRow> = ranked
        .into_iter()
        .map(|p| PlaylistTableRow {
            rank: p.rank,
            name: utils::truncate(&p.name, 40),
            score: utils::format_score(p.score),
            tracks: p.track_count,
            followers: p.followers,
        })
        .collect();

    info!("Most active playlists");
    println!("{}", Table::new(rows));
}

use tabled::Table;

use super::settle;
use crate::{
    analytics::AnalyticsService,
    info,
    types::{TimeRange, TrackTableRow},
    utils, warning,
};

pub async fn tracks(service: &AnalyticsService, time_range: TimeRange) {
    let pb = utils::spinner("Ranking tracks...");
    let result = service.get_top_tracks(time_range).await;
    pb.finish_and_clear();

    let ranked = settle(result);
    if ranked.is_empty() {
        warning!("No listening data for this time range.");
        return;
    }

    let rows: Vec<TrackTableRow> = ranked
        .into_iter()
        .map(|t| TrackTableRow {
            rank: t.rank,
            name: utils::truncate(&t.name, 40),
            artists: utils::truncate(&t.artists, 30),
            score: utils::format_score(t.score),
            plays: t.recent_plays,
        })
        .collect();

    info!("Top tracks ({})", time_range.as_str());
    println!("{}", Table::new(rows));
}

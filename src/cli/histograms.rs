use tabled::Table;

use super::settle;
use crate::{
    analytics::{AnalyticsService, histogram::HistogramBucket},
    info,
    types::HistogramTableRow,
    utils, warning,
};

pub async fn genres(service: &AnalyticsService) {
    let pb = utils::spinner("Collecting top artists...");
    let result = service.get_top_genres().await;
    pb.finish_and_clear();

    let buckets = settle(result);
    if buckets.is_empty() {
        warning!("None of your top artists carries a genre.");
        return;
    }

    info!("Top genres");
    print_buckets(buckets);
}

pub async fn moods(service: &AnalyticsService) {
    let pb = utils::spinner("Analyzing top tracks...");
    let result = service.get_mood_profile().await;
    pb.finish_and_clear();

    let profile = settle(result);
    if profile.analyzed_tracks == 0 {
        warning!("No audio features available for your top tracks.");
        return;
    }

    info!("Mood of {} tracks", profile.analyzed_tracks);
    print_buckets(profile.moods);
    info!("Energy");
    print_buckets(profile.energy);
}

fn print_buckets(buckets: Vec<HistogramBucket>) {
    let rows: Vec<HistogramTableRow> = buckets
        .into_iter()
        .map(|bucket| HistogramTableRow {
            label: bucket.label,
            count: bucket.count,
            share: utils::format_percentage(bucket.percentage),
        })
        .collect();

    println!("{}", Table::new(rows));
}

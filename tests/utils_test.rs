use std::time::Duration;

use chrono::{TimeZone, Utc};
use sporlytics::utils::*;
use tokio_util::sync::CancellationToken;

#[test]
fn test_days_between() {
    let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2024, 1, 11, 12, 0, 0).unwrap();

    assert!((days_between(earlier, later) - 10.5).abs() < 1e-9);

    // Never negative, even for dates in the future
    assert_eq!(days_between(later, earlier), 0.0);
}

#[test]
fn test_format_score() {
    assert_eq!(format_score(16.0), "16.0");
    assert_eq!(format_score(41.26), "41.3");
    assert_eq!(format_score(0.04), "0.0");
}

#[test]
fn test_format_percentage() {
    assert_eq!(format_percentage(66.7), "66.7%");
    assert_eq!(format_percentage(100.0), "100.0%");
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("Road Trip", 20), "Road Trip");
    assert_eq!(truncate("Road Trip", 9), "Road Trip");
    assert_eq!(truncate("Road Trip", 5), "Road…");

    // Counts characters, not bytes
    assert_eq!(truncate("Björk – Jóga", 6), "Björk…");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_token_fires_after_the_deadline() {
    let parent = CancellationToken::new();
    let token = deadline_token(&parent, Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!token.is_cancelled());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(token.is_cancelled());
    assert!(!parent.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_token_follows_its_parent() {
    let parent = CancellationToken::new();
    let token = deadline_token(&parent, Duration::from_secs(60));

    parent.cancel();
    assert!(token.is_cancelled());
}

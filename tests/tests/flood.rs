mod utils;
#[allow(unused)]
use utils::*;

use mock_users::MockConfig;
use spate::prelude::*;
use std::collections::HashSet;
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::time::Duration;

#[tokio::test]
async fn flood_creates_every_user_exactly_once() {
    init();
    let server = mock_users::serve(MockConfig::default()).await.unwrap();

    let summary = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(25).unwrap())
        .concurrency(NonZeroUsize::new(4).unwrap())
        .batch_size(NonZeroU64::new(10).unwrap())
        .await
        .unwrap();

    assert_eq!(summary.total_requested, 25);
    assert_eq!(summary.processed, 25);
    assert_eq!(summary.success, 25);
    assert_eq!(summary.error, 0);
    assert_eq!(summary.success_ratio, 1.0);
    assert!(!summary.stopped);
    assert!(summary.http_errors.is_empty());
    assert!(summary.transport_errors.is_empty());
    assert!(summary.rate > 0.0);
    assert!(summary.latency.p50 > Duration::ZERO);
    assert_eq!(server.state.user_count(), 25);

    // The server's own view of the data confirms every body was unique.
    let body: serde_json::Value = reqwest::get(format!("{}/users", server.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 25);
    let emails: HashSet<&str> = users
        .iter()
        .map(|user| user["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails.len(), 25);
    assert!(emails
        .iter()
        .all(|email| email.starts_with("test") && email.ends_with("@example.com")));
}

#[tokio::test]
async fn scripted_conflicts_show_up_as_409_counts() {
    init();
    let server = mock_users::serve(MockConfig {
        conflict_on: HashSet::from([2, 4, 6]),
        ..MockConfig::default()
    })
    .await
    .unwrap();

    // Serial dispatch keeps the mock's arrival ordinals aligned with the
    // request indices, so exactly three requests hit a scripted conflict.
    let summary = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(10).unwrap())
        .concurrency(NonZeroUsize::new(1).unwrap())
        .await
        .unwrap();

    assert_eq!(summary.processed, 10);
    assert_eq!(summary.success, 7);
    assert_eq!(summary.error, 3);
    assert_eq!(summary.http_errors.get(&409), Some(&3));
    assert!(summary.transport_errors.is_empty());
    assert!((summary.success_ratio - 0.7).abs() < 1e-9);
    assert_eq!(server.state.user_count(), 7);
}

#[tokio::test]
async fn overloaded_target_answers_500_and_the_run_still_completes() {
    init();
    let server = mock_users::serve(MockConfig {
        max_rps: NonZeroU32::new(1),
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let summary = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(12).unwrap())
        .concurrency(NonZeroUsize::new(6).unwrap())
        .await
        .unwrap();

    assert_eq!(summary.processed, 12);
    assert!(summary.success >= 1);
    assert!(summary.error >= 1);
    assert!(summary.http_errors.get(&500).copied().unwrap_or(0) >= 1);
    assert_eq!(summary.success + summary.error, 12);
}

#[tokio::test]
async fn summary_serializes_for_the_json_export() {
    init();
    let server = mock_users::serve(MockConfig::default()).await.unwrap();

    let summary = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(5).unwrap())
        .concurrency(NonZeroUsize::new(2).unwrap())
        .await
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["target"], server.base_url());
    assert_eq!(json["processed"], 5);
    assert_eq!(json["success"], 5);
    assert_eq!(json["stopped"], false);
    assert!(json["latency"].is_object());
}

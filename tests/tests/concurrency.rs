mod utils;
#[allow(unused)]
use utils::*;

use mock_users::MockConfig;
use spate::prelude::*;
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;

#[tokio::test]
#[ntest::timeout(30_000)]
async fn target_never_sees_more_than_the_admission_limit() {
    init();
    // The artificial delay holds requests open long enough for the mock's
    // in-flight gauge to observe the client's concurrency.
    let server = mock_users::serve(MockConfig {
        delay: Duration::from_millis(25),
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let summary = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(40).unwrap())
        .concurrency(NonZeroUsize::new(8).unwrap())
        .await
        .unwrap();

    assert_eq!(summary.processed, 40);
    assert_eq!(summary.success, 40);
    let high_water = server.state.high_water();
    assert!(high_water <= 8, "saw {high_water} requests in flight");
    assert!(high_water >= 4, "saw only {high_water} requests in flight");
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn slow_target_is_bounded_by_the_request_deadline() {
    init();
    let server = mock_users::serve(MockConfig {
        delay: Duration::from_secs(2),
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let started = std::time::Instant::now();
    let summary = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(4).unwrap())
        .concurrency(NonZeroUsize::new(2).unwrap())
        .request_timeout(Duration::from_millis(150))
        .await
        .unwrap();

    // Each timed-out call frees its slot at the deadline, so the run takes
    // about total / concurrency deadlines, nowhere near the server delay.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.error, 4);
    assert_eq!(summary.transport_errors.get("timeout"), Some(&4));
    assert!(summary.http_errors.is_empty());
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn stop_halts_generation_and_drains_whats_in_flight() {
    init();
    let server = mock_users::serve(MockConfig {
        delay: Duration::from_millis(50),
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let load = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(1000).unwrap())
        .concurrency(NonZeroUsize::new(4).unwrap());
    let stop = load.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.stop();
    });

    let summary = load.await.unwrap();

    assert!(summary.stopped);
    assert!(summary.processed > 0);
    assert!(summary.processed < 1000);
    assert_eq!(summary.success, summary.processed);
    // Drained means every request the client counted reached the server,
    // and nothing was abandoned mid-flight.
    assert_eq!(server.state.user_count() as u64, summary.processed);
}

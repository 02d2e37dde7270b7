mod utils;
#[allow(unused)]
use utils::*;

use mock_users::MockConfig;
use spate::prelude::*;
use spate::Faster;
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;

async fn seed_users(base_url: &str, count: u32) {
    let client = reqwest::Client::new();
    for index in 0..count {
        let response = client
            .post(format!("{base_url}/users"))
            .json(&serde_json::json!({
                "name": format!("Seed User {index}"),
                "email": format!("seed{index}@example.com"),
                "age": 30 + index,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    }
}

#[tokio::test]
async fn timed_read_sustains_the_window() {
    init();
    let server = mock_users::serve(MockConfig::default()).await.unwrap();
    seed_users(&server.base_url(), 3).await;

    let summary = TimedLoad::new(server.base_url(), "/users")
        .connections(NonZeroUsize::new(4).unwrap())
        .duration(Duration::from_millis(300))
        .await
        .unwrap();

    assert_eq!(summary.path, "/users");
    assert_eq!(summary.connections, 4);
    assert!(summary.duration >= Duration::from_millis(300));
    assert!(summary.requests > 0);
    assert_eq!(summary.success, summary.requests);
    assert_eq!(summary.error, 0);
    assert!(summary.rate > 0.0);
    assert!(summary.throughput_bytes > 0.0);
    assert!(summary.latency.p50 > Duration::ZERO);
}

#[tokio::test]
async fn non_2xx_reads_count_as_errors() {
    init();
    let server = mock_users::serve(MockConfig::default()).await.unwrap();

    let summary = TimedLoad::new(server.base_url(), "/users/999")
        .connections(NonZeroUsize::new(2).unwrap())
        .duration(Duration::from_millis(200))
        .await
        .unwrap();

    assert!(summary.requests > 0);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.error, summary.requests);
}

#[tokio::test]
async fn suite_runs_reads_around_the_flood() {
    init();
    let server = mock_users::serve(MockConfig::default()).await.unwrap();

    let mut run = RunConfig::new(server.base_url());
    run.total_requests = NonZeroU64::new(10).unwrap();
    run.concurrency = NonZeroUsize::new(2).unwrap();

    let summary = Suite::from_config(run)
        .read_connections(NonZeroUsize::new(2).unwrap())
        .read_duration(Duration::from_millis(200))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.target, server.base_url());
    assert_eq!(summary.flood.processed, 10);
    assert_eq!(summary.flood.success, 10);
    // The first read phase hits an empty store and still succeeds; the
    // second one reads a user the flood just created.
    assert!(summary.list_read.requests > 0);
    assert_eq!(summary.list_read.error, 0);
    assert!(summary.item_read.requests > 0);
    assert_eq!(summary.item_read.error, 0);
    assert_eq!(server.state.user_count(), 10);
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn comparison_calls_the_faster_target() {
    init();
    let baseline = mock_users::serve(MockConfig::default()).await.unwrap();
    let candidate = mock_users::serve(MockConfig {
        delay: Duration::from_millis(30),
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let mut run = RunConfig::new(baseline.base_url());
    run.total_requests = NonZeroU64::new(6).unwrap();
    run.concurrency = NonZeroUsize::new(2).unwrap();

    let report = Comparison::new(baseline.base_url(), candidate.base_url())
        .run_config(run)
        .read_connections(NonZeroUsize::new(2).unwrap())
        .read_duration(Duration::from_millis(200))
        .run()
        .await
        .unwrap();

    assert_eq!(report.baseline.target, baseline.base_url());
    assert_eq!(report.candidate.target, candidate.base_url());

    let phases: Vec<&str> = report
        .phases
        .iter()
        .map(|phase| phase.phase.as_str())
        .collect();
    assert_eq!(phases, ["GET /users", "POST /users", "GET /users/1"]);

    // A 30ms handicap dwarfs the comparison band on every phase.
    for phase in &report.phases {
        assert!(phase.baseline_rate > 0.0);
        assert!(phase.candidate_rate > 0.0);
        assert_eq!(phase.faster, Faster::Baseline, "phase {}", phase.phase);
        assert!(phase.rate_delta_pct < 0.0);
    }
}

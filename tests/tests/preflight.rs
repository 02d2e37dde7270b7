mod utils;
#[allow(unused)]
use utils::*;

use mock_users::MockConfig;
use spate::prelude::*;
use spate::TransportErrorKind;
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;

/// A loopback URL that nothing is listening on. Binding and immediately
/// dropping a listener reserves a port the kernel will refuse.
async fn dead_target() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn dead_target_fails_the_probe_before_any_load() {
    init();
    let target = dead_target().await;

    let err = LoadTest::new(target.clone())
        .total_requests(NonZeroU64::new(50).unwrap())
        .concurrency(NonZeroUsize::new(4).unwrap())
        .await
        .unwrap_err();

    match err {
        Error::TargetUnreachable { url, kind, detail } => {
            assert_eq!(url, target);
            assert_eq!(kind, TransportErrorKind::Refused);
            assert!(!detail.is_empty());
        }
        other => panic!("expected TargetUnreachable, got {other}"),
    }
}

#[tokio::test]
async fn unhealthy_target_fails_with_the_probe_status() {
    init();
    let server = mock_users::serve(MockConfig {
        unhealthy: true,
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let err = LoadTest::new(server.base_url())
        .total_requests(NonZeroU64::new(50).unwrap())
        .await
        .unwrap_err();

    match err {
        Error::TargetUnhealthy { url, status } => {
            assert_eq!(url, server.base_url());
            assert_eq!(status, 503);
        }
        other => panic!("expected TargetUnhealthy, got {other}"),
    }
    // The rest of the server kept working, but not one request reached it.
    assert_eq!(server.state.user_count(), 0);
}

#[tokio::test]
async fn timed_read_shares_the_same_pre_flight() {
    init();
    let target = dead_target().await;

    let err = TimedLoad::new(target.clone(), "/users")
        .connections(NonZeroUsize::new(2).unwrap())
        .duration(Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TargetUnreachable { .. }));
}

#[tokio::test]
async fn suite_aborts_on_the_first_failed_probe() {
    init();
    let server = mock_users::serve(MockConfig {
        unhealthy: true,
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let err = Suite::new(server.base_url())
        .read_connections(NonZeroUsize::new(2).unwrap())
        .read_duration(Duration::from_millis(100))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TargetUnhealthy { .. }));
    assert_eq!(server.state.user_count(), 0);
}

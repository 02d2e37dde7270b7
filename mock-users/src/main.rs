use mock_users::{rps_measure_task, AppState, MockConfig};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_users=debug,tower_http=warn")
        .init();

    let port = env_u64("PORT").unwrap_or(3000) as u16;
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let config = MockConfig {
        delay: Duration::from_millis(env_u64("MOCK_DELAY_MS").unwrap_or(0)),
        jitter: Duration::from_millis(env_u64("MOCK_JITTER_MS").unwrap_or(0)),
        max_rps: env_u64("MOCK_MAX_RPS").and_then(|rps| NonZeroU32::new(rps as u32)),
        ..MockConfig::default()
    };

    let state = AppState::new(config);
    tokio::task::spawn(rps_measure_task(state.clone()));

    mock_users::run(addr, state).await
}

use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Shared test bootstrap. Every test serves its own mock on an ephemeral
/// port, so the only process-wide setup is logging and a panic hook that
/// surfaces panics from background server tasks.
#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("spate=debug,mock_users=debug,axum::rejection=trace")
            .init();
    });
}

use crate::transport::Transport;
use spate_core::{Error, TransportErrorKind, PROBE_TIMEOUT};
use tokio::time::timeout;
use tracing::{error, info};

/// One lightweight GET against the liveness path before any load is
/// generated. Failure is fatal for the whole run: an unreachable target
/// must not receive a single synthetic request.
pub(crate) async fn check_target<T>(
    transport: &T,
    base_url: &str,
    health_url: &str,
) -> Result<(), Error>
where
    T: Transport + Sync,
{
    info!("Probing {health_url} before generating load");
    match timeout(PROBE_TIMEOUT, transport.probe()).await {
        Ok(Ok(response)) if response.status == 200 => {
            info!("Target {base_url} is healthy (HTTP {})", response.status);
            Ok(())
        }
        Ok(Ok(response)) => {
            error!("Health probe of {health_url} returned HTTP {}", response.status);
            Err(Error::TargetUnhealthy {
                url: base_url.to_string(),
                status: response.status,
            })
        }
        Ok(Err(err)) => {
            error!("Health probe of {health_url} failed: {err}");
            Err(Error::TargetUnreachable {
                url: base_url.to_string(),
                kind: err.kind,
                detail: err.message,
            })
        }
        Err(_) => {
            error!(
                "Health probe of {health_url} got no response within {}",
                humantime::format_duration(PROBE_TIMEOUT)
            );
            Err(Error::TargetUnreachable {
                url: base_url.to_string(),
                kind: TransportErrorKind::Timeout,
                detail: format!(
                    "no response within {}",
                    humantime::format_duration(PROBE_TIMEOUT)
                ),
            })
        }
    }
}

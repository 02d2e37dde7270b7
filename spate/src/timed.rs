//! Duration-based read-path load
use crate::probe;
use crate::transport::{HttpTransport, Transport};
use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use serde::Serialize;
use spate_core::{Error, LatencyQuantiles, TimedConfig};
use std::fmt;
use std::{
    future::Future,
    num::NonZeroUsize,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Fixed-width read load: a set of worker connections loops GETs against
/// one path for the configured window.
///
/// Counterpart of [`LoadTest`](crate::LoadTest) for the read endpoints.
/// Each worker runs one request at a time, so the in-flight bound equals
/// the connection count by construction.
///
/// # Example
/// ```no_run
/// use spate::TimedLoad;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), spate::Error> {
///     let summary = TimedLoad::new("http://localhost:3000", "/users")
///         .duration(Duration::from_secs(30))
///         .await?;
///     println!("{summary}");
///     Ok(())
/// }
/// ```
#[pin_project::pin_project]
pub struct TimedLoad {
    pub(crate) config: TimedConfig,
    runner_fut: Option<Pin<Box<dyn Future<Output = Result<TimedSummary, Error>> + Send>>>,
}

impl TimedLoad {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::from_config(TimedConfig::new(base_url, path))
    }

    pub fn from_config(config: TimedConfig) -> Self {
        Self {
            config,
            runner_fut: None,
        }
    }

    /// Number of looping worker connections.
    pub fn connections(mut self, connections: NonZeroUsize) -> Self {
        self.config.connections = connections;
        self
    }

    /// Length of the load window.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// Per-request deadline within the window.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.config.request_timeout = request_timeout;
        self
    }
}

impl Future for TimedLoad {
    type Output = Result<TimedSummary, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let config = self.config.clone();
            self.runner_fut = Some(Box::pin(async move { run_timed(config).await }));
        }

        if let Some(runner) = &mut self.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}

/// End-of-window totals for one timed read load.
#[derive(Debug, Clone, Serialize)]
pub struct TimedSummary {
    pub target: String,
    pub path: String,
    pub connections: usize,
    pub duration: Duration,
    pub requests: u64,
    pub success: u64,
    pub error: u64,
    /// Completed requests per second over the window.
    pub rate: f64,
    /// Response-body volume per second, in bytes.
    pub throughput_bytes: f64,
    pub latency: LatencyQuantiles,
}

impl fmt::Display for TimedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GET {} x{} for {}: {} requests ({} ok, {} err) at {:.2} req/s, {:.0} B/s, p50={:?} p90={:?} p99={:?}",
            self.path,
            self.connections,
            humantime::format_duration(self.duration),
            self.requests,
            self.success,
            self.error,
            self.rate,
            self.throughput_bytes,
            self.latency.p50,
            self.latency.p90,
            self.latency.p99,
        )
    }
}

#[instrument(name = "timed_load", skip_all, fields(target = config.base_url, path = config.path))]
async fn run_timed(config: TimedConfig) -> Result<TimedSummary, Error> {
    config.validate()?;
    let transport = HttpTransport::for_timed(&config)?;
    run_timed_with_transport(Arc::new(transport), config).await
}

/// Runner shared by the HTTP path and the instrumented fakes in tests.
pub(crate) async fn run_timed_with_transport<T>(
    transport: Arc<T>,
    config: TimedConfig,
) -> Result<TimedSummary, Error>
where
    T: Transport + Send + Sync + 'static,
{
    probe::check_target(transport.as_ref(), &config.base_url, &config.health_url()).await?;

    info!(
        "Reading {} with {} connections for {}",
        config.target_url(),
        config.connections,
        humantime::format_duration(config.duration),
    );

    let atomics = WorkerAtomics::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(config.connections.get());
    let started = Instant::now();

    for _ in 0..config.connections.get() {
        let transport = Arc::clone(&transport);
        let path = config.path.clone();
        let data = atomics.clone_to_worker_data();

        tasks.push(tokio::spawn(async move {
            loop {
                let call_started = Instant::now();
                match transport.fetch(&path).await {
                    Ok(response) if (200..300).contains(&response.status) => {
                        data.success.fetch_add(1, Ordering::Relaxed);
                        data.bytes
                            .fetch_add(response.body.len() as u64, Ordering::Relaxed);
                    }
                    Ok(_) | Err(_) => {
                        data.error.fetch_add(1, Ordering::Relaxed);
                    }
                }
                data.latency.push(call_started.elapsed());
            }
        }));
    }

    tokio::time::sleep(config.duration).await;
    for handle in tasks.drain(..) {
        handle.abort();
    }
    let elapsed = started.elapsed();

    let summary = atomics.into_summary(&config, elapsed);
    info!("{summary}");
    Ok(summary)
}

struct WorkerAtomics {
    success: Arc<AtomicU64>,
    error: Arc<AtomicU64>,
    bytes: Arc<AtomicU64>,
    latency: Arc<AtomicBucket<Duration>>,
}

struct WorkerData {
    success: Arc<AtomicU64>,
    error: Arc<AtomicU64>,
    bytes: Arc<AtomicU64>,
    latency: Arc<AtomicBucket<Duration>>,
}

impl WorkerAtomics {
    fn new() -> Self {
        Self {
            success: Arc::new(AtomicU64::new(0)),
            error: Arc::new(AtomicU64::new(0)),
            bytes: Arc::new(AtomicU64::new(0)),
            latency: Arc::new(AtomicBucket::new()),
        }
    }

    fn clone_to_worker_data(&self) -> WorkerData {
        WorkerData {
            success: self.success.clone(),
            error: self.error.clone(),
            bytes: self.bytes.clone(),
            latency: self.latency.clone(),
        }
    }

    fn into_summary(self, config: &TimedConfig, elapsed: Duration) -> TimedSummary {
        let success = self.success.load(Ordering::Relaxed);
        let error = self.error.load(Ordering::Relaxed);
        let bytes = self.bytes.load(Ordering::Relaxed);
        let requests = success + error;

        let mut digest = default_tdigest();
        self.latency.clear_with(|durations| {
            for duration in durations {
                digest.insert(duration.as_secs_f64());
            }
        });

        let secs = elapsed.as_secs_f64();
        TimedSummary {
            target: config.base_url.clone(),
            path: config.path.clone(),
            connections: config.connections.get(),
            duration: elapsed,
            requests,
            success,
            error,
            rate: requests as f64 / secs,
            throughput_bytes: bytes as f64 / secs,
            latency: LatencyQuantiles {
                p50: quantile(&digest, 0.5),
                p90: quantile(&digest, 0.90),
                p99: quantile(&digest, 0.99),
            },
        }
    }
}

fn quantile(digest: &TDigest<K1>, quantile: f64) -> Duration {
    let secs = digest.quantile(quantile);

    // TDigest returns NaN before the first insert.
    if secs.is_finite() {
        Duration::from_secs_f64(secs.max(0.))
    } else {
        Duration::ZERO
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

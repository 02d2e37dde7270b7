//! Sequential read/write benchmarking pass for one target
use crate::dispatcher::StopHandle;
use crate::load_test::LoadTest;
use crate::timed::{TimedLoad, TimedSummary};
use serde::Serialize;
use spate_core::{
    Error, RunConfig, RunSummary, TimedConfig, DEFAULT_READ_CONNECTIONS, DEFAULT_READ_DURATION,
    USERS_PATH,
};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;
#[allow(unused_imports)]
use tracing::{debug, info, warn};

/// The full benchmarking pass against one target: a timed read of the
/// listing path, the write-path flood, then a timed read of a single
/// record.
///
/// Phases run one after another so no phase pollutes another's numbers,
/// and each re-checks target health before generating load.
pub struct Suite {
    run: RunConfig,
    read_connections: NonZeroUsize,
    read_duration: Duration,
    stop: StopHandle,
}

impl Suite {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(RunConfig::new(base_url))
    }

    /// Use an existing flood configuration; the read phases inherit its
    /// base URL and request timeout.
    pub fn from_config(run: RunConfig) -> Self {
        Self {
            run,
            read_connections: DEFAULT_READ_CONNECTIONS,
            read_duration: DEFAULT_READ_DURATION,
            stop: StopHandle::new(),
        }
    }

    /// Worker connections for the read phases.
    pub fn read_connections(mut self, connections: NonZeroUsize) -> Self {
        self.read_connections = connections;
        self
    }

    /// Window length for each read phase.
    pub fn read_duration(mut self, duration: Duration) -> Self {
        self.read_duration = duration;
        self
    }

    /// Stops the flood phase early; the read phases are window-bounded
    /// already. A flood that starts after the stop completes immediately.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn run(self) -> Result<SuiteSummary, Error> {
        self.run.validate()?;
        info!("Starting the full suite against {}", self.run.base_url);

        let list_read = self.read_phase(USERS_PATH.to_string()).await?;
        let flood = LoadTest::from_config(self.run.clone())
            .with_stop_handle(self.stop.clone())
            .await?;
        let item_read = self.read_phase(format!("{USERS_PATH}/1")).await?;

        let summary = SuiteSummary {
            target: self.run.base_url.clone(),
            list_read,
            flood,
            item_read,
        };
        info!("Suite against {} finished", summary.target);
        Ok(summary)
    }

    fn read_phase(&self, path: String) -> TimedLoad {
        let mut config = TimedConfig::new(self.run.base_url.clone(), path);
        config.connections = self.read_connections;
        config.duration = self.read_duration;
        config.request_timeout = self.run.request_timeout;
        TimedLoad::from_config(config)
    }
}

/// Per-phase results of one suite pass.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    pub target: String,
    pub list_read: TimedSummary,
    pub flood: RunSummary,
    pub item_read: TimedSummary,
}

impl SuiteSummary {
    /// Phase label, rate and p99 latency in suite order.
    pub(crate) fn phases(&self) -> [(String, f64, Duration); 3] {
        [
            (
                format!("GET {USERS_PATH}"),
                self.list_read.rate,
                self.list_read.latency.p99,
            ),
            (
                format!("POST {USERS_PATH}"),
                self.flood.rate,
                self.flood.latency.p99,
            ),
            (
                format!("GET {USERS_PATH}/1"),
                self.item_read.rate,
                self.item_read.latency.p99,
            ),
        ]
    }
}

impl fmt::Display for SuiteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "suite for {}:", self.target)?;
        writeln!(f, "  {}", self.list_read)?;
        writeln!(f, "  POST {USERS_PATH}: {}", self.flood)?;
        write!(f, "  {}", self.item_read)
    }
}

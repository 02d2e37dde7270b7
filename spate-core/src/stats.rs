use crate::data::{Classification, ProgressSnapshot};
use crate::error::TransportErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU64;
use std::time::{Duration, Instant};

/// Process-wide accumulator for one run.
///
/// Owned by the single control flow that also performs admission, so the
/// counters need no locking and are trivially monotonic: they only move
/// forward, one completion at a time.
#[derive(Debug)]
pub struct RunStatistics {
    total: u64,
    success: u64,
    error: u64,
    http_errors: BTreeMap<u16, u64>,
    transport_errors: BTreeMap<TransportErrorKind, u64>,
    started: Instant,
    last_checkpoint_at: Instant,
    last_checkpoint_count: u64,
}

impl RunStatistics {
    pub fn new(total: u64) -> Self {
        let now = Instant::now();
        Self {
            total,
            success: 0,
            error: 0,
            http_errors: BTreeMap::new(),
            transport_errors: BTreeMap::new(),
            started: now,
            last_checkpoint_at: now,
            last_checkpoint_count: 0,
        }
    }

    /// Fold one completion into the counters.
    pub fn record(&mut self, classification: &Classification) {
        match classification {
            Classification::Success(_) => self.success += 1,
            Classification::Http(status) => {
                self.error += 1;
                *self.http_errors.entry(*status).or_insert(0) += 1;
            }
            Classification::Transport(kind) => {
                self.error += 1;
                *self.transport_errors.entry(*kind).or_insert(0) += 1;
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.success + self.error
    }

    pub fn success(&self) -> u64 {
        self.success
    }

    pub fn error(&self) -> u64 {
        self.error
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Count recorded for one HTTP status.
    pub fn http_error_count(&self, status: u16) -> u64 {
        self.http_errors.get(&status).copied().unwrap_or(0)
    }

    /// Count recorded for one transport cause tag.
    pub fn transport_error_count(&self, kind: TransportErrorKind) -> u64 {
        self.transport_errors.get(&kind).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed(),
            total: self.total,
            success: self.success,
            error: self.error,
            elapsed: self.started.elapsed(),
        }
    }

    /// Fire a checkpoint if the processed count just crossed a multiple of
    /// `batch_size`. Counters advance one completion at a time in a single
    /// control flow, so each multiple fires exactly once.
    pub fn checkpoint(&mut self, batch_size: NonZeroU64) -> Option<Checkpoint> {
        let processed = self.processed();
        if processed == 0 || processed % batch_size.get() != 0 {
            return None;
        }
        let checkpoint = Checkpoint {
            number: processed / batch_size.get(),
            count: processed - self.last_checkpoint_count,
            elapsed: self.last_checkpoint_at.elapsed(),
            snapshot: self.snapshot(),
        };
        self.last_checkpoint_at = Instant::now();
        self.last_checkpoint_count = processed;
        Some(checkpoint)
    }

    /// Freeze the accumulator into the end-of-run view. Latency quantiles
    /// are supplied by the reporter, which owns the digest.
    pub fn into_summary(self, target: String, latency: LatencyQuantiles, stopped: bool) -> RunSummary {
        let processed = self.processed();
        let duration = self.started.elapsed();
        let secs = duration.as_secs_f64();
        RunSummary {
            target,
            total_requested: self.total,
            processed,
            success: self.success,
            error: self.error,
            success_ratio: if processed > 0 {
                self.success as f64 / processed as f64
            } else {
                0.0
            },
            duration,
            rate: if secs > 0.0 { processed as f64 / secs } else { 0.0 },
            http_errors: self.http_errors,
            transport_errors: self
                .transport_errors
                .into_iter()
                .map(|(kind, count)| (kind.as_str().to_string(), count))
                .collect(),
            latency,
            stopped,
        }
    }
}

/// One batch-boundary progress record.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    /// 1-based batch ordinal (processed / batch size).
    pub number: u64,
    /// Completions since the previous checkpoint.
    pub count: u64,
    /// Wall-clock time since the previous checkpoint.
    pub elapsed: Duration,
    pub snapshot: ProgressSnapshot,
}

impl Checkpoint {
    /// Batch-local completion rate, per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.count as f64 / secs
        } else {
            0.0
        }
    }
}

/// Latency quantiles extracted from the reporter's digest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyQuantiles {
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
}

impl LatencyQuantiles {
    pub const ZERO: LatencyQuantiles = LatencyQuantiles {
        p50: Duration::ZERO,
        p90: Duration::ZERO,
        p99: Duration::ZERO,
    };
}

/// End-of-run view of one write-path flood. Never persisted by the run
/// itself; serializable for the optional summary export.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub target: String,
    pub total_requested: u64,
    pub processed: u64,
    pub success: u64,
    pub error: u64,
    /// success / processed, in 0.0..=1.0.
    pub success_ratio: f64,
    pub duration: Duration,
    /// Average throughput over the whole run, per second.
    pub rate: f64,
    pub http_errors: BTreeMap<u16, u64>,
    pub transport_errors: BTreeMap<String, u64>,
    pub latency: LatencyQuantiles,
    /// True when the run ended through the cooperative stop signal.
    pub stopped: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} processed ({} ok, {} err, {:.2}% success) in {} at {:.2} req/s, p50={:?} p99={:?}",
            self.processed,
            self.total_requested,
            self.success,
            self.error,
            self.success_ratio * 100.0,
            humantime::format_duration(Duration::from_secs(self.duration.as_secs())),
            self.rate,
            self.latency.p50,
            self.latency.p99,
        )
    }
}

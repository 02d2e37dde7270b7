use crate::dispatcher::Completion;
use pdatastructs::tdigest::{TDigest, K1};
use spate_core::{
    Checkpoint, Classification, LatencyQuantiles, RequestOutcome, RunConfig, RunStatistics,
    RunSummary, CONFLICT_WARN_RATIO, SUCCESS_LOG_INTERVAL,
};
use std::num::NonZeroU64;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Folds completion events into run statistics, one `record` per outcome in
/// completion order, inline in the dispatch control flow.
///
/// Log volume stays sublinear in the run size: full lines only for
/// failures, for every [`SUCCESS_LOG_INTERVAL`]th success, and one
/// checkpoint line per completed batch.
pub(crate) struct Reporter {
    target: String,
    stats: RunStatistics,
    batch_size: NonZeroU64,
    latency: TDigest<K1>,
}

impl Reporter {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            target: config.base_url.clone(),
            stats: RunStatistics::new(config.total_requests.get()),
            batch_size: config.batch_size,
            latency: default_tdigest(),
        }
    }

    pub fn record(&mut self, completion: Completion) -> RequestOutcome {
        self.stats.record(&completion.classification);
        self.latency.insert(completion.latency.as_secs_f64());

        #[cfg(feature = "metrics")]
        {
            if completion.classification.is_success() {
                metrics::counter!("spate.requests_success").increment(1);
            } else {
                metrics::counter!("spate.requests_error").increment(1);
            }
            metrics::histogram!("spate.request_latency").record(completion.latency.as_secs_f64());
        }

        let outcome = RequestOutcome {
            index: completion.index,
            email: completion.email,
            classification: completion.classification,
            error_detail: completion.error_detail,
            latency: completion.latency,
            snapshot: self.stats.snapshot(),
        };
        self.log_outcome(&outcome);

        if let Some(checkpoint) = self.stats.checkpoint(self.batch_size) {
            log_checkpoint(&checkpoint);
        }

        outcome
    }

    fn log_outcome(&self, outcome: &RequestOutcome) {
        let detail = outcome.error_detail.as_deref().unwrap_or("no detail");
        match outcome.classification {
            Classification::Success(_) if outcome.index % SUCCESS_LOG_INTERVAL == 0 => {
                let snapshot = &outcome.snapshot;
                info!(
                    "[{}/{}] {:.2}% done at {:.2} req/s ({} ok, {} err)",
                    snapshot.processed,
                    snapshot.total,
                    snapshot.percent(),
                    snapshot.rate(),
                    snapshot.success,
                    snapshot.error,
                );
            }
            Classification::Success(_) => {}
            Classification::Http(status) => {
                warn!(
                    "[{}] HTTP {status} for {}: {detail}",
                    outcome.index, outcome.email
                );
            }
            Classification::Transport(kind) => {
                warn!(
                    "[{}] {kind} for {}: {detail}",
                    outcome.index, outcome.email
                );
            }
        }
    }

    pub fn finish(self, stopped: bool) -> RunSummary {
        let latency = LatencyQuantiles {
            p50: quantile(&self.latency, 0.5),
            p90: quantile(&self.latency, 0.90),
            p99: quantile(&self.latency, 0.99),
        };
        let conflicts = self.stats.http_error_count(409);
        let summary = self.stats.into_summary(self.target, latency, stopped);

        info!("Run against {} finished: {}", summary.target, summary);
        if stopped {
            warn!(
                "Run stopped early: {}/{} requests were dispatched",
                summary.processed, summary.total_requested
            );
        }
        if summary.processed > 0 {
            let conflict_ratio = conflicts as f64 / summary.processed as f64;
            if conflict_ratio > CONFLICT_WARN_RATIO {
                warn!(
                    "{conflicts} duplicate-email conflicts ({:.3}% of processed); the uniqueness scheme may be broken",
                    conflict_ratio * 100.
                );
            }
        }

        summary
    }
}

fn log_checkpoint(checkpoint: &Checkpoint) {
    let snapshot = &checkpoint.snapshot;
    info!(
        "Batch {} done: {} requests in {:.1}s ({:.2} req/s); total {}/{} ({:.2}%), {} ok, {} err",
        checkpoint.number,
        checkpoint.count,
        checkpoint.elapsed.as_secs_f64(),
        checkpoint.rate(),
        snapshot.processed,
        snapshot.total,
        snapshot.percent(),
        snapshot.success,
        snapshot.error,
    );
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

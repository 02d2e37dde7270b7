//! Back-to-back suite runs against two targets
use crate::suite::{Suite, SuiteSummary};
use serde::Serialize;
use spate_core::{Error, RunConfig, DEFAULT_READ_CONNECTIONS, DEFAULT_READ_DURATION};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;
#[allow(unused_imports)]
use tracing::{info, warn};

/// Rate deltas inside this band count as even; sub-percent noise between
/// two runs is not a meaningful win.
const EVEN_BAND_PCT: f64 = 0.5;

/// Runs the identical suite against two targets, one after the other, and
/// reports per-phase throughput and latency deltas.
///
/// # Example
/// ```no_run
/// use spate::Comparison;
///
/// #[tokio::main]
/// async fn main() -> Result<(), spate::Error> {
///     let report = Comparison::new("http://localhost:3000", "http://localhost:3001")
///         .run()
///         .await?;
///     println!("{report}");
///     Ok(())
/// }
/// ```
pub struct Comparison {
    baseline_url: String,
    candidate_url: String,
    run: RunConfig,
    read_connections: NonZeroUsize,
    read_duration: Duration,
}

impl Comparison {
    pub fn new(baseline_url: impl Into<String>, candidate_url: impl Into<String>) -> Self {
        let baseline_url = baseline_url.into();
        Self {
            run: RunConfig::new(baseline_url.clone()),
            baseline_url,
            candidate_url: candidate_url.into(),
            read_connections: DEFAULT_READ_CONNECTIONS,
            read_duration: DEFAULT_READ_DURATION,
        }
    }

    /// Workload shape shared by both targets; its base URL is replaced per
    /// target.
    pub fn run_config(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    /// Worker connections for the read phases of both suites.
    pub fn read_connections(mut self, connections: NonZeroUsize) -> Self {
        self.read_connections = connections;
        self
    }

    /// Window length for the read phases of both suites.
    pub fn read_duration(mut self, duration: Duration) -> Self {
        self.read_duration = duration;
        self
    }

    pub async fn run(self) -> Result<ComparisonReport, Error> {
        info!(
            "Comparing {} (baseline) against {} (candidate)",
            self.baseline_url, self.candidate_url
        );

        let baseline = self.suite_for(&self.baseline_url).run().await?;
        info!("Baseline finished; running the candidate");
        let candidate = self.suite_for(&self.candidate_url).run().await?;

        let report = ComparisonReport::from_suites(baseline, candidate);
        info!("{report}");
        Ok(report)
    }

    fn suite_for(&self, url: &str) -> Suite {
        let mut run = self.run.clone();
        run.base_url = url.to_string();
        Suite::from_config(run)
            .read_connections(self.read_connections)
            .read_duration(self.read_duration)
    }
}

/// Which side of a phase comparison won on throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Faster {
    Baseline,
    Candidate,
    Even,
}

/// One phase of the suite, side by side.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseComparison {
    pub phase: String,
    pub baseline_rate: f64,
    pub candidate_rate: f64,
    /// Positive when the candidate is faster, as a percentage of the
    /// baseline rate.
    pub rate_delta_pct: f64,
    pub baseline_p99: Duration,
    pub candidate_p99: Duration,
    pub faster: Faster,
}

impl PhaseComparison {
    fn new(
        phase: String,
        baseline_rate: f64,
        candidate_rate: f64,
        baseline_p99: Duration,
        candidate_p99: Duration,
    ) -> Self {
        let rate_delta_pct = if baseline_rate > 0. {
            (candidate_rate - baseline_rate) / baseline_rate * 100.
        } else {
            0.
        };
        let faster = if baseline_rate > 0. {
            if rate_delta_pct > EVEN_BAND_PCT {
                Faster::Candidate
            } else if rate_delta_pct < -EVEN_BAND_PCT {
                Faster::Baseline
            } else {
                Faster::Even
            }
        } else if candidate_rate > 0. {
            Faster::Candidate
        } else {
            Faster::Even
        };

        Self {
            phase,
            baseline_rate,
            candidate_rate,
            rate_delta_pct,
            baseline_p99,
            candidate_p99,
            faster,
        }
    }
}

impl fmt::Display for PhaseComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.faster {
            Faster::Baseline => "baseline faster",
            Faster::Candidate => "candidate faster",
            Faster::Even => "even",
        };
        write!(
            f,
            "{}: {:.2} -> {:.2} req/s ({:+.2}%, {verdict}), p99 {:?} -> {:?}",
            self.phase,
            self.baseline_rate,
            self.candidate_rate,
            self.rate_delta_pct,
            self.baseline_p99,
            self.candidate_p99,
        )
    }
}

/// Full side-by-side of two suite passes.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub baseline: SuiteSummary,
    pub candidate: SuiteSummary,
    pub phases: Vec<PhaseComparison>,
}

impl ComparisonReport {
    pub fn from_suites(baseline: SuiteSummary, candidate: SuiteSummary) -> Self {
        let phases = baseline
            .phases()
            .into_iter()
            .zip(candidate.phases())
            .map(|((phase, b_rate, b_p99), (_, c_rate, c_p99))| {
                PhaseComparison::new(phase, b_rate, c_rate, b_p99, c_p99)
            })
            .collect();

        Self {
            baseline,
            candidate,
            phases,
        }
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (baseline) vs {} (candidate):",
            self.baseline.target, self.candidate.target
        )?;
        for (position, phase) in self.phases.iter().enumerate() {
            if position + 1 < self.phases.len() {
                writeln!(f, "  {phase}")?;
            } else {
                write!(f, "  {phase}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timed::TimedSummary;
    use spate_core::{LatencyQuantiles, RunSummary};
    use std::collections::BTreeMap;

    fn timed(path: &str, rate: f64, p99_ms: u64) -> TimedSummary {
        TimedSummary {
            target: "http://localhost:3000".to_string(),
            path: path.to_string(),
            connections: 100,
            duration: Duration::from_secs(30),
            requests: (rate * 30.) as u64,
            success: (rate * 30.) as u64,
            error: 0,
            rate,
            throughput_bytes: rate * 256.,
            latency: LatencyQuantiles {
                p50: Duration::from_millis(p99_ms / 4),
                p90: Duration::from_millis(p99_ms / 2),
                p99: Duration::from_millis(p99_ms),
            },
        }
    }

    fn flood(rate: f64, p99_ms: u64) -> RunSummary {
        RunSummary {
            target: "http://localhost:3000".to_string(),
            total_requested: 100_000,
            processed: 100_000,
            success: 100_000,
            error: 0,
            success_ratio: 1.,
            duration: Duration::from_secs(20),
            rate,
            http_errors: BTreeMap::new(),
            transport_errors: BTreeMap::new(),
            latency: LatencyQuantiles {
                p50: Duration::from_millis(p99_ms / 4),
                p90: Duration::from_millis(p99_ms / 2),
                p99: Duration::from_millis(p99_ms),
            },
            stopped: false,
        }
    }

    fn suite(list_rate: f64, flood_rate: f64, item_rate: f64) -> SuiteSummary {
        SuiteSummary {
            target: "http://localhost:3000".to_string(),
            list_read: timed("/users", list_rate, 40),
            flood: flood(flood_rate, 30),
            item_read: timed("/users/1", item_rate, 20),
        }
    }

    #[test]
    fn deltas_are_relative_to_the_baseline() {
        let report = ComparisonReport::from_suites(
            suite(5_000., 8_000., 6_000.),
            suite(6_000., 8_000., 3_000.),
        );

        assert_eq!(report.phases.len(), 3);
        assert!((report.phases[0].rate_delta_pct - 20.).abs() < 1e-9);
        assert_eq!(report.phases[0].faster, Faster::Candidate);
        assert!(report.phases[1].rate_delta_pct.abs() < 1e-9);
        assert_eq!(report.phases[1].faster, Faster::Even);
        assert!((report.phases[2].rate_delta_pct + 50.).abs() < 1e-9);
        assert_eq!(report.phases[2].faster, Faster::Baseline);
    }

    #[test]
    fn tiny_deltas_count_as_even() {
        let report = ComparisonReport::from_suites(
            suite(10_000., 10_000., 10_000.),
            suite(10_030., 9_970., 10_000.),
        );

        for phase in &report.phases {
            assert_eq!(phase.faster, Faster::Even, "{}", phase.phase);
        }
    }

    #[test]
    fn dead_baseline_with_live_candidate_is_a_candidate_win() {
        let report =
            ComparisonReport::from_suites(suite(0., 1_000., 1_000.), suite(500., 1_000., 1_000.));

        assert_eq!(report.phases[0].faster, Faster::Candidate);
        assert!(report.phases[0].rate_delta_pct.abs() < 1e-9);
    }

    #[test]
    fn display_names_targets_and_each_phase() {
        let mut baseline = suite(5_000., 8_000., 6_000.);
        baseline.target = "http://blue:3000".to_string();
        let mut candidate = suite(5_500., 8_200., 6_100.);
        candidate.target = "http://green:3000".to_string();

        let rendered = ComparisonReport::from_suites(baseline, candidate).to_string();
        assert!(rendered.contains("http://blue:3000 (baseline)"));
        assert!(rendered.contains("http://green:3000 (candidate)"));
        assert!(rendered.contains("GET /users:"));
        assert!(rendered.contains("POST /users:"));
        assert!(rendered.contains("GET /users/1:"));
    }
}

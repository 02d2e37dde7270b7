use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use spate::{Comparison, LoadTest, StopHandle, Suite, TimedLoad};
use spate_core::{RunConfig, RunSummary, TimedConfig};
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "spate", version, about = "Bounded-concurrency HTTP load harness")]
struct SpateCli {
    #[command(subcommand)]
    command: Command,

    /// Write the final summary as JSON to this file.
    #[arg(long, global = true)]
    summary_out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flood the target's write path with unique synthetic users.
    Run(RunArgs),
    /// Timed read load against a single path.
    Read(ReadArgs),
    /// Full pass against one target: read, flood, read by id.
    Suite(SuiteArgs),
    /// Run the full suite against two targets and compare them.
    Compare(CompareArgs),
}

/// Flags override the `SPATE_*` environment variables, which override the
/// built-in defaults.
#[derive(Args, Debug)]
struct RunArgs {
    /// Base URL of the target.
    #[arg(short, long)]
    target: Option<String>,

    /// Maximum in-flight requests.
    #[arg(short, long)]
    concurrency: Option<NonZeroUsize>,

    /// Requests to send in total.
    #[arg(short = 'n', long)]
    total_requests: Option<NonZeroU64>,

    /// Completed requests per progress checkpoint.
    #[arg(short, long)]
    batch_size: Option<NonZeroU64>,

    /// Per-request deadline, e.g. "30s".
    #[arg(long, value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,

    /// Generated requests that may wait ahead of a free slot.
    #[arg(long, default_value_t = 0)]
    lookahead: usize,

    /// Exit non-zero if the final success ratio lands below this (0.0-1.0).
    #[arg(long)]
    min_success_ratio: Option<f64>,

    /// Exit non-zero if the average request rate lands below this.
    #[arg(long)]
    min_rate: Option<f64>,
}

#[derive(Args, Debug)]
struct ReadArgs {
    /// Base URL of the target.
    #[arg(short, long)]
    target: Option<String>,

    /// Path to hammer.
    #[arg(short, long, default_value = "/users")]
    path: String,

    /// Looping worker connections.
    #[arg(short, long)]
    connections: Option<NonZeroUsize>,

    /// Length of the load window, e.g. "30s".
    #[arg(short, long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Per-request deadline within the window.
    #[arg(long, value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,
}

#[derive(Args, Debug)]
struct SuiteArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Worker connections for the read phases.
    #[arg(long)]
    read_connections: Option<NonZeroUsize>,

    /// Window length for each read phase, e.g. "30s".
    #[arg(long, value_parser = humantime::parse_duration)]
    read_duration: Option<Duration>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Base URL of the baseline target.
    baseline: String,

    /// Base URL of the candidate target.
    candidate: String,

    #[command(flatten)]
    suite: SuiteArgs,
}

impl RunArgs {
    /// Env first, then flags on top.
    fn to_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = RunConfig::from_env()?;
        if let Some(target) = &self.target {
            config.base_url = target.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(total_requests) = self.total_requests {
            config.total_requests = total_requests;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(request_timeout) = self.request_timeout {
            config.request_timeout = request_timeout;
        }
        config.lookahead = self.lookahead;
        config.min_success_ratio = self.min_success_ratio;
        config.min_rate = self.min_rate;
        config.validate()?;
        Ok(config)
    }
}

impl ReadArgs {
    fn to_config(&self) -> anyhow::Result<TimedConfig> {
        let base_url = match &self.target {
            Some(target) => target.clone(),
            None => RunConfig::from_env()?.base_url,
        };
        let mut config = TimedConfig::new(base_url, self.path.clone());
        if let Some(connections) = self.connections {
            config.connections = connections;
        }
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if let Some(request_timeout) = self.request_timeout {
            config.request_timeout = request_timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("spate=info,spate_core=info")),
        )
        .init();

    let cli = SpateCli::parse();
    match cli.command {
        Command::Run(args) => {
            let config = args.to_config()?;
            let (min_success_ratio, min_rate) = (config.min_success_ratio, config.min_rate);

            let load_test = LoadTest::from_config(config);
            wire_ctrl_c(load_test.stop_handle());
            let summary = load_test.await?;

            println!("{summary}");
            write_summary(&cli.summary_out, &summary)?;
            enforce_gates(&summary, min_success_ratio, min_rate)
        }
        Command::Read(args) => {
            let config = args.to_config()?;
            let summary = TimedLoad::from_config(config).await?;

            println!("{summary}");
            write_summary(&cli.summary_out, &summary)
        }
        Command::Suite(args) => {
            let (suite, gates) = build_suite(&args)?;
            wire_ctrl_c(suite.stop_handle());
            let summary = suite.run().await?;

            println!("{summary}");
            write_summary(&cli.summary_out, &summary)?;
            enforce_gates(&summary.flood, gates.0, gates.1)
        }
        Command::Compare(args) => {
            let run = args.suite.run.to_config()?;
            let mut comparison =
                Comparison::new(args.baseline.clone(), args.candidate.clone()).run_config(run);
            if let Some(connections) = args.suite.read_connections {
                comparison = comparison.read_connections(connections);
            }
            if let Some(duration) = args.suite.read_duration {
                comparison = comparison.read_duration(duration);
            }

            let report = comparison.run().await?;
            println!("{report}");
            write_summary(&cli.summary_out, &report)
        }
    }
}

fn build_suite(args: &SuiteArgs) -> anyhow::Result<(Suite, (Option<f64>, Option<f64>))> {
    let config = args.run.to_config()?;
    let gates = (config.min_success_ratio, config.min_rate);

    let mut suite = Suite::from_config(config);
    if let Some(connections) = args.read_connections {
        suite = suite.read_connections(connections);
    }
    if let Some(duration) = args.read_duration {
        suite = suite.read_duration(duration);
    }
    Ok((suite, gates))
}

/// First Ctrl-C stops generation and lets in-flight work drain; the final
/// summary still comes out.
fn wire_ctrl_c(stop: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; draining in-flight requests");
            stop.stop();
        }
    });
}

fn write_summary<S: Serialize>(path: &Option<PathBuf>, summary: &S) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("could not create {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)
        .with_context(|| format!("could not write {}", path.display()))?;
    info!("Summary written to {}", path.display());
    Ok(())
}

/// Post-run pass/fail gates, for CI-style usage.
fn enforce_gates(
    summary: &RunSummary,
    min_success_ratio: Option<f64>,
    min_rate: Option<f64>,
) -> anyhow::Result<()> {
    if let Some(min) = min_success_ratio {
        if summary.success_ratio < min {
            error!(
                "Success ratio {:.4} is below the required {:.4}",
                summary.success_ratio, min
            );
            bail!("success ratio gate failed");
        }
    }
    if let Some(min) = min_rate {
        if summary.rate < min {
            error!("Rate {:.2} req/s is below the required {:.2}", summary.rate, min);
            bail!("rate gate failed");
        }
    }
    Ok(())
}

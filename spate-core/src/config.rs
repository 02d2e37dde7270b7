use crate::constants::*;
use crate::error::Error;
use std::fmt::Display;
use std::num::{NonZeroU64, NonZeroUsize};
use std::str::FromStr;
use std::time::Duration;

/// Environment variables consulted by [`RunConfig::from_env`].
pub const ENV_TARGET_URL: &str = "SPATE_TARGET_URL";
pub const ENV_CONCURRENCY: &str = "SPATE_CONCURRENCY";
pub const ENV_BATCH_SIZE: &str = "SPATE_BATCH_SIZE";
pub const ENV_TOTAL_REQUESTS: &str = "SPATE_TOTAL_REQUESTS";
pub const ENV_REQUEST_TIMEOUT: &str = "SPATE_REQUEST_TIMEOUT";

const DEFAULT_TARGET_URL: &str = "http://localhost:3000";

/// Configuration for one write-path flood.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Base URL of the endpoint under test.
    pub base_url: String,
    /// Admission limit: maximum in-flight calls.
    pub concurrency: NonZeroUsize,
    /// Completed requests between progress checkpoints.
    pub batch_size: NonZeroU64,
    /// Size of the run.
    pub total_requests: NonZeroU64,
    /// Per-call deadline; an expired call classifies as a transport timeout.
    pub request_timeout: Duration,
    /// How many generated-but-unadmitted requests may sit in the FIFO
    /// buffer while every slot is busy. 0 = generate strictly on demand.
    pub lookahead: usize,
    /// Optional pass/fail gate on the final success ratio (0.0..=1.0).
    pub min_success_ratio: Option<f64>,
    /// Optional pass/fail gate on the average request rate (per second).
    pub min_rate: Option<f64>,
}

impl RunConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            total_requests: DEFAULT_TOTAL_REQUESTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            lookahead: 0,
            min_success_ratio: None,
            min_rate: None,
        }
    }

    /// Build a config from `SPATE_*` environment variables, falling back to
    /// the documented defaults for anything unset.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::new(
            std::env::var(ENV_TARGET_URL).unwrap_or_else(|_| DEFAULT_TARGET_URL.to_string()),
        );
        if let Some(concurrency) = parse_var(ENV_CONCURRENCY, env_raw(ENV_CONCURRENCY))? {
            config.concurrency = concurrency;
        }
        if let Some(batch_size) = parse_var(ENV_BATCH_SIZE, env_raw(ENV_BATCH_SIZE))? {
            config.batch_size = batch_size;
        }
        if let Some(total) = parse_var(ENV_TOTAL_REQUESTS, env_raw(ENV_TOTAL_REQUESTS))? {
            config.total_requests = total;
        }
        if let Some(timeout) = parse_duration_var(ENV_REQUEST_TIMEOUT, env_raw(ENV_REQUEST_TIMEOUT))?
        {
            config.request_timeout = timeout;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("target base URL is empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "target base URL `{}` must start with http:// or https://",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be non-zero".to_string()));
        }
        if let Some(ratio) = self.min_success_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::Config(format!(
                    "min success ratio {ratio} is outside 0.0..=1.0"
                )));
            }
        }
        Ok(())
    }

    /// URL of the write path under test.
    pub fn users_url(&self) -> String {
        join_url(&self.base_url, USERS_PATH)
    }

    /// URL of the liveness path used by the pre-flight probe.
    pub fn health_url(&self) -> String {
        join_url(&self.base_url, HEALTH_PATH)
    }
}

/// Configuration for one duration-based read-path phase.
#[derive(Debug, Clone)]
pub struct TimedConfig {
    pub base_url: String,
    /// Path hammered by every worker, e.g. `/users`.
    pub path: String,
    /// Number of looping workers (persistent connections).
    pub connections: NonZeroUsize,
    /// Wall-clock length of the phase.
    pub duration: Duration,
    pub request_timeout: Duration,
}

impl TimedConfig {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            connections: DEFAULT_READ_CONNECTIONS,
            duration: DEFAULT_READ_DURATION,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("target base URL is empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(Error::Config(format!(
                "read path `{}` must start with `/`",
                self.path
            )));
        }
        if self.duration.is_zero() {
            return Err(Error::Config("phase duration must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn target_url(&self) -> String {
        join_url(&self.base_url, &self.path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, HEALTH_PATH)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn env_raw(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse an optional env value, turning failures into a structural
/// configuration error naming the variable.
fn parse_var<T>(key: &str, raw: Option<String>) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| Error::Config(format!("{key}={raw}: {err}"))),
    }
}

/// Like [`parse_var`] but accepts humantime spellings ("30s", "1m 30s")
/// as well as a bare number of seconds.
fn parse_duration_var(key: &str, raw: Option<String>) -> Result<Option<Duration>, Error> {
    match raw {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if let Ok(secs) = trimmed.parse::<u64>() {
                return Ok(Some(Duration::from_secs(secs)));
            }
            humantime::parse_duration(trimmed)
                .map(Some)
                .map_err(|err| Error::Config(format!("{key}={raw}: {err}")))
        }
    }
}

use std::fmt;
use thiserror::Error;

/// Structural failures that abort a run as a whole.
///
/// Per-request failures never surface here; they are converted into
/// [`RequestOutcome`](crate::RequestOutcome) values at the dispatcher
/// boundary and only move counters.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not construct the HTTP client: {0}")]
    ClientBuild(String),

    #[error("target {url} failed the pre-flight health probe: {kind}: {detail}")]
    TargetUnreachable {
        url: String,
        kind: TransportErrorKind,
        detail: String,
    },

    #[error("target {url} is not healthy: probe returned HTTP {status}")]
    TargetUnhealthy { url: String, status: u16 },
}

/// Cause tag for failures below the HTTP semantic layer.
///
/// Kept distinct from status-coded failures: a transport error means the
/// target was unavailable, not that it rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    /// The target host refused the connection.
    Refused,
    /// The call exceeded its deadline.
    Timeout,
    /// Host name resolution failed.
    Dns,
    /// Anything else below the HTTP layer (resets, protocol errors, ...).
    Unknown,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Refused => "connection refused",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed exchange below the HTTP layer.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

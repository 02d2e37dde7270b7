use crate::error::TransportErrorKind;
use serde::Serialize;
use std::time::Duration;

/// One unit of generated load.
///
/// Produced lazily by the generator, consumed exactly once by the
/// dispatcher, and discarded after its outcome is classified.
#[derive(Debug, Clone)]
pub struct SyntheticRequest {
    /// 1-based, strictly increasing within a run.
    pub index: u64,
    pub name: String,
    pub email: String,
    pub age: u32,
}

impl SyntheticRequest {
    /// Borrowed view serialized as the wire payload for `POST /users`.
    pub fn payload(&self) -> NewUser<'_> {
        NewUser {
            name: &self.name,
            email: &self.email,
            age: self.age,
        }
    }
}

/// Wire payload of the write path: `{name, email, age}`.
#[derive(Debug, Serialize)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub age: u32,
}

/// How one resolved call is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx response.
    Success(u16),
    /// Response with a non-2xx status; the target rejected the request.
    Http(u16),
    /// No usable response: the failure happened below the HTTP layer.
    Transport(TransportErrorKind),
}

impl Classification {
    /// Classify a status code. Pure: the same input always yields the
    /// same classification.
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Classification::Success(status)
        } else {
            Classification::Http(status)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success(_))
    }

    /// Status code, when the target produced a response at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Classification::Success(status) | Classification::Http(status) => Some(*status),
            Classification::Transport(_) => None,
        }
    }
}

/// Result of dispatching one [`SyntheticRequest`], plus the run statistics
/// visible at the moment it completed.
///
/// Exactly one outcome exists per request, whether the call succeeded,
/// returned a non-2xx status, or failed at the transport layer.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub index: u64,
    pub email: String,
    pub classification: Classification,
    /// Response body (HTTP errors) or transport error message.
    pub error_detail: Option<String>,
    /// Time from admission to resolution of this call.
    pub latency: Duration,
    pub snapshot: ProgressSnapshot,
}

impl RequestOutcome {
    pub fn success(&self) -> bool {
        self.classification.is_success()
    }
}

/// Run counters at a single observation point.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Average completion rate since run start, per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

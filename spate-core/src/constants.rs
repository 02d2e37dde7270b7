use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;

/// Default admission limit: maximum simultaneously in-flight calls.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(100) };

/// Default number of completed requests between progress checkpoints.
pub const DEFAULT_BATCH_SIZE: NonZeroU64 = unsafe { NonZeroU64::new_unchecked(1_000) };

/// Default run size.
pub const DEFAULT_TOTAL_REQUESTS: NonZeroU64 = unsafe { NonZeroU64::new_unchecked(1_000_000) };

/// Per-call deadline after which a request is classified as a transport timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for the single pre-flight health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Every Nth successful request gets a per-item log line; failures always do.
pub const SUCCESS_LOG_INTERVAL: u64 = 10_000;

/// Defaults for the timed read-path phases.
pub const DEFAULT_READ_CONNECTIONS: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(100) };
pub const DEFAULT_READ_DURATION: Duration = Duration::from_secs(30);

/// Conflict share of processed requests above which the end-of-run report
/// flags a likely uniqueness defect in the generator.
pub const CONFLICT_WARN_RATIO: f64 = 0.001;

/// Wire paths on the target under test.
pub const USERS_PATH: &str = "/users";
pub const HEALTH_PATH: &str = "/health";

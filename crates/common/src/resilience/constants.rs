// Named defaults for the resilience primitives
use std::time::Duration;

/// Default number of failures before a breaker opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default number of half-open successes before a breaker closes
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Default time an open breaker waits before probing
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-attempt operation timeout
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default maximum backoff delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default exponential backoff multiplier
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound on the tolerance window for early open->half-open probes
pub const DEFAULT_TOLERANCE_CAP: Duration = Duration::from_millis(50);

/// Fraction of the recovery timeout used for the tolerance window
pub const DEFAULT_TOLERANCE_FRACTION: f64 = 0.05;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Minimum allowed failure threshold
pub const MIN_FAILURE_THRESHOLD: u32 = 1;

/// Maximum allowed retries per call
pub const MAX_RETRIES_LIMIT: u32 = 100;

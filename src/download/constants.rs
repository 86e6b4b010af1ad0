//! Constants for the download module (timeouts, retry pacing, chunk sizing).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds). There is no total-time cap.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Timeout for the single-shot fallback transport (5 seconds).
pub const FALLBACK_TIMEOUT_SECS: u64 = 5;

/// Base delay between retries of rate-limited or unreachable requests.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

/// Upper bound for a single retry delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Chunk size used before any throughput measurement exists (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Smallest chunk the controller will request (32 KiB).
pub const MIN_CHUNK_SIZE: usize = 32 * 1024;

/// Largest chunk the controller will request (1 MiB).
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Seconds of transfer each chunk should represent at the measured rate.
pub const CHUNK_TARGET_SECS: f64 = 0.150;

/// Minimum streaming time between two throughput measurements.
pub const MEASUREMENT_WINDOW: Duration = Duration::from_secs(1);

/// Suffix appended to a destination while a video transfer is in flight.
pub const PART_SUFFIX: &str = ".part";

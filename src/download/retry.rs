//! Retry logic with exponential backoff for transient fetch failures.
//!
//! When a fetch fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - connection-level failures that may succeed on retry
//! - [`FailureType::RateLimited`] - HTTP 429/503, retried after a delay
//! - [`FailureType::Permanent`] - other HTTP errors and local failures
//! - [`FailureType::Fatal`] - TLS certificate failures, never retried
//!
//! The [`RetryPolicy`] then decides whether another attempt is made, and after
//! how long. Retries are bounded: once `max_attempts` is reached the last
//! error is reported as permanent.
//!
//! # Example
//!
//! ```
//! use mediadl_core::download::{DownloadError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/a.jpg", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::error::Error as _;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::DownloadError;
use super::constants::{MAX_RETRY_AFTER, RETRY_BASE_DELAY, RETRY_MAX_DELAY};

/// Default maximum attempts (initial request included).
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Connection-level failure: DNS, refused, reset, connect timeout.
    Transient,

    /// Server asked us to slow down or is temporarily unavailable (429/503).
    RateLimited,

    /// Failure that another identical attempt would not fix.
    ///
    /// HTTP errors in this class still get one fallback attempt from the
    /// fetch client; local errors propagate directly.
    Permanent,

    /// TLS certificate verification failure. Propagated immediately.
    Fatal,
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the fetch after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the fetch.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `base_delay`: 5 seconds
/// - `max_delay`: 60 seconds
/// - `backoff_multiplier`: 2.0
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
///
/// Jitter is at most 500ms and never more than the capped delay itself.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt (typically 2.0 for doubling).
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
            max_delay: RETRY_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the base delay for the first retry.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Determines whether to retry a failed fetch.
    ///
    /// `attempt` is the attempt number that just failed (1-indexed).
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Fatal => {
                return RetryDecision::DoNotRetry {
                    reason: "certificate verification failed".to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Formula: `min(base_delay * multiplier^(attempt-1), max_delay) + jitter`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);

        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        let capped = Duration::from_millis(capped_ms as u64);

        capped + Self::calculate_jitter(capped.min(MAX_JITTER))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(max: Duration) -> Duration {
        let max_ms = max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 429, 503 | RateLimited |
/// | other HTTP status | Permanent (fallback transport applies) |
/// | Timeout | Transient |
/// | Network (TLS in chain) | Fatal |
/// | Network (other) | Transient |
/// | Tls | Fatal |
/// | Io, InvalidUrl, PathEscape, Decode, ClientBuild, Fallback | Permanent |
#[instrument(level = "debug")]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),

        DownloadError::Timeout { .. } => FailureType::Transient,

        DownloadError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Fatal
            } else {
                FailureType::Transient
            }
        }

        DownloadError::Tls { .. } => FailureType::Fatal,

        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::PathEscape { .. }
        | DownloadError::Decode { .. }
        | DownloadError::ClientBuild { .. }
        | DownloadError::Fallback { .. } => FailureType::Permanent,
    }
}

/// Classifies an HTTP status code into a failure type.
#[must_use]
pub fn classify_http_status(status: u16) -> FailureType {
    match status {
        429 | 503 => FailureType::RateLimited,
        _ => FailureType::Permanent,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
///
/// reqwest does not expose a dedicated predicate, so the text of the source
/// chain is inspected. The top-level message is skipped: it embeds the
/// request URL, which may itself contain `ssl` or `tls`.
pub(crate) fn is_tls_error(error: &reqwest::Error) -> bool {
    source_chain_mentions_tls(error.source())
}

fn source_chain_mentions_tls(mut source: Option<&(dyn std::error::Error + 'static)>) -> bool {
    while let Some(inner) = source {
        let text = inner.to_string().to_lowercase();
        if text.contains("certificate")
            || text.contains("tls")
            || text.contains("ssl")
            || text.contains("handshake")
        {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Parses a Retry-After header value into a delay.
///
/// Accepts both integer seconds and RFC 7231 HTTP-dates. Values above one
/// hour are capped; negative values and past dates yield `None`.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        let duration = Duration::from_secs(seconds);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    let duration = datetime.duration_since(std::time::SystemTime::now()).ok()?;
    Some(duration.min(MAX_RETRY_AFTER))
}

//! Immutable configuration shared by the fetch client and download engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::constants::{CONNECT_TIMEOUT_SECS, FALLBACK_TIMEOUT_SECS};
use super::retry::RetryPolicy;
use crate::user_agent::default_user_agent;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Settings fixed for the lifetime of a [`FetchClient`](super::FetchClient).
///
/// Built once with the `with_*` methods and then handed over by value; there
/// is no way to change a setting on a running client.
///
/// # Example
///
/// ```
/// use mediadl_core::download::FetchConfig;
///
/// let config = FetchConfig::default()
///     .with_concurrency(4)
///     .with_cache_enabled(true);
/// assert_eq!(config.concurrency(), 4);
/// assert!(config.cache_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    user_agent: String,
    connect_timeout: Duration,
    fallback_timeout: Duration,
    retry_policy: RetryPolicy,
    concurrency: usize,
    dynamic_chunks: bool,
    cache_dir: PathBuf,
    cache_enabled: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            fallback_timeout: Duration::from_secs(FALLBACK_TIMEOUT_SECS),
            retry_policy: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            dynamic_chunks: true,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_enabled: false,
        }
    }
}

impl FetchConfig {
    /// Sets the User-Agent sent by both transports.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the connect timeout of the primary transport.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the total timeout of the fallback transport.
    #[must_use]
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    /// Sets the retry policy for rate-limited and unreachable requests.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the album fan-out limit, clamped to `1..=100`.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        self
    }

    /// Enables or disables throughput-adaptive chunk sizing for videos.
    #[must_use]
    pub fn with_dynamic_chunks(mut self, enabled: bool) -> Self {
        self.dynamic_chunks = enabled;
        self
    }

    /// Sets the directory holding cache markers.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Enables or disables the URL cache.
    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn fallback_timeout(&self) -> Duration {
        self.fallback_timeout
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn dynamic_chunks(&self) -> bool {
        self.dynamic_chunks
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }
}

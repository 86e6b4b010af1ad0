//! HTTP fetch client with bounded retry and a blocking fallback transport.
//!
//! [`FetchClient`] is created once per run and shared; the underlying
//! `reqwest::Client` pools connections across requests.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::FetchConfig;
use super::error::DownloadError;
use super::response::{FetchedBody, MediaResponse, ResponseShape};
use super::retry::{FailureType, RetryDecision, classify_error, is_tls_error, parse_retry_after};

/// HTTP client for media requests.
///
/// # Example
///
/// ```no_run
/// use mediadl_core::download::{FetchClient, FetchConfig, ResponseShape};
/// use reqwest::header::HeaderMap;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = FetchClient::new(FetchConfig::default())?;
/// let body = client
///     .fetch("https://example.com/album.json", ResponseShape::Json, &HeaderMap::new())
///     .await?;
/// println!("{:?}", body.into_json());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Creates a client from an immutable configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be
    /// constructed (for example, when the TLS backend fails to initialize).
    #[instrument(level = "debug", skip(config))]
    pub fn new(config: FetchConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent())
            .cookie_store(true)
            .gzip(true)
            .build()
            .map_err(DownloadError::client_build)?;

        debug!(
            connect_timeout_secs = config.connect_timeout().as_secs(),
            max_attempts = config.retry_policy().max_attempts(),
            "created fetch client"
        );
        Ok(Self { client, config })
    }

    /// Returns the configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches `url` and materializes the body into `shape`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch_response`](Self::fetch_response),
    /// plus [`DownloadError::Decode`] if the body is not valid JSON for
    /// [`ResponseShape::Json`].
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        shape: ResponseShape,
        headers: &HeaderMap,
    ) -> Result<FetchedBody, DownloadError> {
        self.fetch_response(url, headers)
            .await?
            .materialize(shape)
            .await
    }

    /// Fetches `url` and returns the unconsumed response.
    ///
    /// Rate-limited (429/503) and unreachable requests are retried under the
    /// configured [`RetryPolicy`](super::RetryPolicy). Any other error status
    /// gets exactly one attempt through the blocking fallback transport. TLS
    /// verification failures are returned immediately.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] if `url` does not parse
    /// - [`DownloadError::Tls`] on certificate failures
    /// - [`DownloadError::HttpStatus`] when retries are exhausted or the
    ///   fallback also fails
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] when the host
    ///   stays unreachable
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn fetch_response(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<MediaResponse, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let policy = self.config.retry_policy();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "sending request");

            let error = match self.send(&parsed, url, headers).await {
                Ok(response) if response.status().is_success() => {
                    return Ok(MediaResponse::live(url, response));
                }
                Ok(response) => {
                    let status = response.status();
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let error =
                        DownloadError::http_status_with_retry_after(url, status.as_u16(), retry_after);
                    if classify_error(&error) == FailureType::Permanent {
                        warn!(status = status.as_u16(), "request failed, trying fallback transport");
                        return self.fallback(url, headers).await;
                    }
                    error
                }
                Err(error) => error,
            };

            match policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let server_delay = retry_after_delay(&error);
                    let delay = server_delay.unwrap_or(backoff_delay);
                    if matches!(error, DownloadError::HttpStatus { .. }) {
                        info!(
                            attempt = next_attempt,
                            max_attempts = policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            using_retry_after = server_delay.is_some(),
                            error = %error,
                            "rate limited, retrying request"
                        );
                    } else {
                        warn!(
                            attempt = next_attempt,
                            max_attempts = policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "connection failed, retrying request"
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, attempts = attempt, "not retrying request");
                    return Err(error);
                }
            }
        }
    }

    async fn send(
        &self,
        parsed: &Url,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<reqwest::Response, DownloadError> {
        self.client
            .get(parsed.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| map_send_error(url, e))
    }

    /// Single attempt through a fresh blocking client on the blocking pool.
    #[instrument(level = "debug", skip(self, headers))]
    async fn fallback(&self, url: &str, headers: &HeaderMap) -> Result<MediaResponse, DownloadError> {
        let owned_url = url.to_string();
        let headers = headers.clone();
        let timeout = self.config.fallback_timeout();
        let user_agent = self.config.user_agent().to_string();

        tokio::task::spawn_blocking(move || blocking_get(&owned_url, headers, timeout, &user_agent))
            .await
            .map_err(|e| DownloadError::fallback(url, e.to_string()))?
    }
}

fn blocking_get(
    url: &str,
    headers: HeaderMap,
    timeout: Duration,
    user_agent: &str,
) -> Result<MediaResponse, DownloadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| DownloadError::fallback(url, e.to_string()))?;

    let response = client
        .get(url)
        .headers(headers)
        .send()
        .map_err(|e| map_send_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "fallback transport failed");
        return Err(DownloadError::http_status(url, status.as_u16()));
    }

    let headers = response.headers().clone();
    let body = response.bytes().map_err(|e| DownloadError::network(url, e))?;
    info!(url, bytes = body.len(), "fallback transport succeeded");
    Ok(MediaResponse::buffered(url, status.as_u16(), headers, body))
}

fn map_send_error(url: &str, error: reqwest::Error) -> DownloadError {
    if is_tls_error(&error) {
        DownloadError::tls(url, error)
    } else if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

fn retry_after_delay(error: &DownloadError) -> Option<Duration> {
    let DownloadError::HttpStatus {
        status,
        retry_after: Some(header),
        ..
    } = error
    else {
        return None;
    };
    let rate_limited = *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        || *status == StatusCode::SERVICE_UNAVAILABLE.as_u16();
    if !rate_limited {
        return None;
    }
    let delay = parse_retry_after(header)?;
    debug!(retry_after = %header, delay_ms = delay.as_millis(), "using Retry-After header delay");
    Some(delay)
}

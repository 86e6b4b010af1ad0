//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns so that a failure can be
//! turned into an `error: <detail>` result without losing context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching or persisting media.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection-level failure (DNS resolution, connection refused, reset, ...).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before a connection was established.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// TLS certificate verification failed. Never retried.
    #[error("TLS verification failed for {url}: {source}")]
    Tls {
        /// The URL whose certificate was rejected.
        url: String,
        /// The underlying TLS error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429/503 responses).
        retry_after: Option<String>,
    },

    /// File system error while writing or comparing media.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// An album title resolved to a directory outside the download root.
    #[error("album path {path} escapes download root {root}")]
    PathEscape {
        /// The configured download root.
        root: PathBuf,
        /// The rejected album path.
        path: PathBuf,
    },

    /// The body could not be materialized into the requested shape.
    #[error("failed to decode response from {url}: {reason}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The HTTP client could not be constructed from the configuration.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The blocking fallback transport could not be run.
    #[error("fallback transport failed for {url}: {reason}")]
    Fallback {
        /// The URL being fetched.
        url: String,
        /// What went wrong.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    ///
    /// The URL is stripped from `source`; it lives in `url`.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source: source.without_url(),
        }
    }

    /// Creates a TLS verification error.
    pub fn tls(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Tls {
            url: url.into(),
            source: source.without_url(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a path-escape error.
    pub fn path_escape(root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::PathEscape {
            root: root.into(),
            path: path.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a client construction error.
    pub fn client_build(source: reqwest::Error) -> Self {
        Self::ClientBuild { source }
    }

    /// Creates a fallback transport error.
    pub fn fallback(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fallback {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Short detail used in `error: <detail>` result records.
    ///
    /// The record already carries the URL, so it is left out. HTTP failures
    /// report the bare status code; everything else leads with an error class
    /// followed by `:` and the underlying cause chain.
    #[must_use]
    pub fn status_detail(&self) -> String {
        match self {
            Self::HttpStatus { status, .. } => status.to_string(),
            Self::Network { source, .. } => format!("network error: {}", error_chain(source)),
            Self::Timeout { .. } => "timeout".to_string(),
            Self::Tls { source, .. } => format!("TLS verification failed: {}", error_chain(source)),
            Self::Io { path, source } => format!("IO error: {source} ({})", path.display()),
            Self::InvalidUrl { .. } => "invalid URL".to_string(),
            Self::PathEscape { path, .. } => {
                format!("album path escapes download root: {}", path.display())
            }
            Self::Decode { reason, .. } => format!("decode error: {reason}"),
            Self::ClientBuild { source } => format!("client error: {}", error_chain(source)),
            Self::Fallback { reason, .. } => format!("fallback transport failed: {reason}"),
        }
    }
}

/// Renders an error and all of its sources, joined by `: `.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path, which the source errors do not carry.

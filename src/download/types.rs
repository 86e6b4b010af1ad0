//! Request and result records exchanged with callers.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::header::HeaderMap;
use serde::{Serialize, Serializer};

use super::error::DownloadError;

/// One media item to persist into an album directory.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    url: String,
    album_path: PathBuf,
    headers: HeaderMap,
}

impl MediaRequest {
    /// Creates a request with no extra headers.
    #[must_use]
    pub fn new(url: impl Into<String>, album_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            album_path: album_path.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Attaches per-request header overrides (`Referer`, `Origin`, ...).
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn album_path(&self) -> &Path {
        &self.album_path
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Terminal status of a single media request.
///
/// Displays and serializes as `ok`, `skipped`, or `error: <detail>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Content was written to a new file.
    Ok,
    /// Identical content already existed, or the URL was a cache hit.
    Skipped,
    /// The request failed; the detail is a short description.
    Error(String),
}

impl DownloadStatus {
    /// Builds an error status from a download error.
    #[must_use]
    pub fn from_error(error: &DownloadError) -> Self {
        Self::Error(error.status_detail())
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Skipped => f.write_str("skipped"),
            Self::Error(detail) => write!(f, "error: {detail}"),
        }
    }
}

impl Serialize for DownloadStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of one [`MediaRequest`], returned exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    /// Source URL of the media item.
    pub url: String,
    /// Terminal status.
    pub status: DownloadStatus,
}

impl DownloadResult {
    #[must_use]
    pub fn ok(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: DownloadStatus::Ok,
        }
    }

    #[must_use]
    pub fn skipped(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: DownloadStatus::Skipped,
        }
    }

    #[must_use]
    pub fn error(url: impl Into<String>, error: &DownloadError) -> Self {
        Self {
            url: url.into(),
            status: DownloadStatus::from_error(error),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(DownloadStatus::Ok.to_string(), "ok");
        assert_eq!(DownloadStatus::Skipped.to_string(), "skipped");
        assert_eq!(DownloadStatus::Error("404".into()).to_string(), "error: 404");
    }

    #[test]
    fn test_result_serializes_to_flat_record() {
        let error = DownloadError::http_status("https://example.com/a.jpg", 404);
        let result = DownloadResult::error("https://example.com/a.jpg", &error);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"url": "https://example.com/a.jpg", "status": "error: 404"})
        );
    }

    #[test]
    fn test_request_defaults_to_no_headers() {
        let request = MediaRequest::new("https://example.com/a.jpg", "/tmp/album");
        assert!(request.headers().is_empty());
        assert_eq!(request.album_path(), Path::new("/tmp/album"));
    }
}

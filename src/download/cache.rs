//! URL cache: empty marker files named by the SHA-256 of the source URL.
//!
//! A hit means "this URL was fetched before" and nothing more. The index is
//! never re-validated, so content that changed upstream after a hit is not
//! noticed; the byte and digest comparisons in the downloaders remain the
//! authoritative duplicate check.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use super::error::DownloadError;

/// Filesystem-backed set of previously fetched URLs.
#[derive(Debug, Clone)]
pub struct CacheIndex {
    dir: PathBuf,
}

impl CacheIndex {
    /// Creates an index rooted at `dir`. The directory is created lazily.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the marker files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Content address of a URL: lowercase hex SHA-256 of its UTF-8 bytes.
    #[must_use]
    pub fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    /// Marker path for a URL.
    #[must_use]
    pub fn marker_path(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key(url))
    }

    /// Whether a marker exists for `url`.
    #[instrument(level = "debug", skip(self))]
    pub async fn has(&self, url: &str) -> bool {
        tokio::fs::try_exists(self.marker_path(url))
            .await
            .unwrap_or(false)
    }

    /// Creates the marker for `url`. Recording twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the cache directory or marker cannot be
    /// created.
    #[instrument(level = "debug", skip(self))]
    pub async fn record(&self, url: &str) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DownloadError::io(&self.dir, e))?;
        let marker = self.marker_path(url);
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&marker)
            .await
            .map_err(|e| DownloadError::io(&marker, e))?;
        debug!(marker = %marker.display(), "recorded url in cache");
        Ok(())
    }
}

/// Records `url` when a cache is configured.
///
/// A marker that cannot be written only costs a redundant fetch next run, so
/// the failure is logged and the download result stands.
pub(crate) async fn record_if_enabled(cache: Option<&CacheIndex>, url: &str) {
    let Some(cache) = cache else {
        return;
    };
    if let Err(error) = cache.record(url).await {
        warn!(url, error = %error, "failed to record url in cache");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_is_sha256_hex() {
        assert_eq!(
            CacheIndex::key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(CacheIndex::key("https://example.com/a.jpg").len(), 64);
    }

    #[tokio::test]
    async fn test_record_then_has() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheIndex::new(temp_dir.path().join(".cache"));
        let url = "https://example.com/a.jpg";

        assert!(!cache.has(url).await);
        cache.record(url).await.unwrap();
        assert!(cache.has(url).await);
        assert!(!cache.has("https://example.com/b.jpg").await);
    }

    #[tokio::test]
    async fn test_record_is_idempotent_and_empty() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheIndex::new(temp_dir.path());
        let url = "https://example.com/v.mp4";

        cache.record(url).await.unwrap();
        cache.record(url).await.unwrap();

        let marker = cache.marker_path(url);
        assert_eq!(std::fs::metadata(&marker).unwrap().len(), 0);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }
}

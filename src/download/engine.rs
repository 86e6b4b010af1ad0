//! Download engine: per-item orchestration and bounded album fan-out.
//!
//! For each [`MediaRequest`] the engine consults the URL cache, fetches the
//! response, picks a strategy from its `Content-Type`, and routes it to the
//! image or video downloader. Every request ends in exactly one
//! [`DownloadResult`]; no error escapes an item.
//!
//! # Example
//!
//! ```no_run
//! use mediadl_core::download::{DownloadEngine, FetchConfig};
//! use reqwest::header::HeaderMap;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(FetchConfig::default().with_concurrency(4))?;
//! let urls = vec!["https://example.com/a.jpg".to_string()];
//! let results = engine
//!     .download_album(&urls, Path::new("./downloads/album"), &HeaderMap::new())
//!     .await;
//! for result in results {
//!     println!("{} {}", result.url, result.status);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::cache::CacheIndex;
use super::classify::{MediaKind, classify};
use super::client::FetchClient;
use super::config::FetchConfig;
use super::error::DownloadError;
use super::filename::{extension_from_content_type, has_extension, media_name_from_url};
use super::image::download_image;
use super::progress::DownloadProgress;
use super::response::MediaResponse;
use super::types::{DownloadResult, DownloadStatus, MediaRequest};
use super::video::download_video;

/// Concurrent media downloader.
///
/// # Concurrency Model
///
/// - All items of an album are started together and awaited together
/// - A semaphore sized by [`FetchConfig::concurrency`] bounds how many are in
///   flight; permits are released on drop
/// - Results come back in input order
#[derive(Debug)]
pub struct DownloadEngine {
    client: FetchClient,
    cache: Option<CacheIndex>,
    semaphore: Arc<Semaphore>,
    progress: DownloadProgress,
}

impl DownloadEngine {
    /// Creates an engine and its fetch client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(config))]
    pub fn new(config: FetchConfig) -> Result<Self, DownloadError> {
        let cache = config
            .cache_enabled()
            .then(|| CacheIndex::new(config.cache_dir()));
        let concurrency = config.concurrency();

        debug!(
            concurrency,
            cache = cache.is_some(),
            dynamic_chunks = config.dynamic_chunks(),
            "creating download engine"
        );

        Ok(Self {
            client: FetchClient::new(config)?,
            cache,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            progress: DownloadProgress::hidden(),
        })
    }

    /// Replaces the (hidden by default) progress display.
    #[must_use]
    pub fn with_progress(mut self, progress: DownloadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// The fetch client shared by all downloads.
    #[must_use]
    pub fn client(&self) -> &FetchClient {
        &self.client
    }

    /// The URL cache, when enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&CacheIndex> {
        self.cache.as_ref()
    }

    /// Downloads one media item and reports how it ended.
    ///
    /// A cache hit returns `skipped` without any network access.
    #[instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn download_media(&self, request: &MediaRequest) -> DownloadResult {
        let url = request.url();

        if let Some(cache) = &self.cache
            && cache.has(url).await
        {
            info!("url found in cache, skipping");
            return DownloadResult::skipped(url);
        }

        let response = match self.client.fetch_response(url, request.headers()).await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "fetch failed");
                return DownloadResult::error(url, &error);
            }
        };

        let destination = match destination_for(&response, request.album_path()) {
            Ok(destination) => destination,
            Err(error) => return DownloadResult::error(url, &error),
        };

        match classify(response.headers()) {
            MediaKind::Image => {
                debug!(destination = %destination.display(), "routing to image downloader");
                download_image(response, &destination, self.cache.as_ref()).await
            }
            MediaKind::Video => {
                debug!(destination = %destination.display(), "routing to video downloader");
                let name = destination
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let bar = self.progress.video_bar(&name, response.content_length());
                download_video(
                    response,
                    &destination,
                    self.client.config().dynamic_chunks(),
                    self.cache.as_ref(),
                    &bar,
                )
                .await
            }
        }
    }

    /// Downloads every URL into `album_path`, at most `concurrency` at a time.
    ///
    /// Returns one result per URL, in the order given.
    #[instrument(skip(self, urls, headers), fields(album = %album_path.display(), items = urls.len()))]
    pub async fn download_album(
        &self,
        urls: &[String],
        album_path: &Path,
        headers: &HeaderMap,
    ) -> Vec<DownloadResult> {
        let title = album_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.progress.start_album(&title, urls.len());
        info!("starting album");

        let tasks = urls.iter().map(|url| {
            let request = MediaRequest::new(url.clone(), album_path).with_headers(headers.clone());
            async move {
                let result = match self.semaphore.acquire().await {
                    Ok(_permit) => self.download_media(&request).await,
                    Err(_) => DownloadResult {
                        url: request.url().to_string(),
                        status: DownloadStatus::Error("download engine closed".to_string()),
                    },
                };
                self.progress.item_done(&result.status.to_string());
                result
            }
        });
        let results = join_all(tasks).await;

        let failed = results.iter().filter(|r| r.status.is_error()).count();
        info!(total = results.len(), failed, "album complete");
        results
    }
}

/// Final path for a response: URL-derived name, with an extension recovered
/// from `Content-Type` when the name has none.
fn destination_for(response: &MediaResponse, album_path: &Path) -> Result<PathBuf, DownloadError> {
    let mut name = media_name_from_url(response.url())?;
    if !has_extension(&name)
        && let Some(ext) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_from_content_type)
    {
        name = format!("{name}.{ext}");
    }
    Ok(album_path.join(name))
}

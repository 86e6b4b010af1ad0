//! Image downloader: buffer the body, byte-compare, write.

use std::io::ErrorKind;
use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::cache::{CacheIndex, record_if_enabled};
use super::error::DownloadError;
use super::filename::claim_unique_file;
use super::response::MediaResponse;
use super::types::{DownloadResult, DownloadStatus};

/// Persists an image response at `destination`.
///
/// An existing file with identical bytes is left untouched and the result is
/// `skipped`. Different bytes go to the next free `stem_N.ext`. The URL is
/// recorded in `cache` for both `ok` and `skipped`.
#[instrument(skip(response, cache), fields(url = %response.url(), destination = %destination.display()))]
pub async fn download_image(
    response: MediaResponse,
    destination: &Path,
    cache: Option<&CacheIndex>,
) -> DownloadResult {
    let url = response.url().to_string();
    match store_image(response, destination).await {
        Ok(status) => {
            record_if_enabled(cache, &url).await;
            DownloadResult { url, status }
        }
        Err(error) => {
            warn!(error = %error, "image download failed");
            DownloadResult::error(url, &error)
        }
    }
}

async fn store_image(
    response: MediaResponse,
    destination: &Path,
) -> Result<DownloadStatus, DownloadError> {
    let body = response.bytes().await?;

    match tokio::fs::read(destination).await {
        Ok(existing) if existing.as_slice() == body.as_ref() => {
            info!(bytes = body.len(), "identical image already present, skipping");
            return Ok(DownloadStatus::Skipped);
        }
        Ok(_) => debug!("existing image differs, writing alongside"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(DownloadError::io(destination, e)),
    }

    let (target, mut file) = claim_unique_file(destination).await?;
    let written = async {
        file.write_all(&body).await?;
        file.flush().await
    }
    .await;
    drop(file);
    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&target).await {
            warn!(path = %target.display(), error = %cleanup, "failed to remove partial image");
        }
        return Err(DownloadError::io(&target, e));
    }

    info!(path = %target.display(), bytes = body.len(), "image saved");
    Ok(DownloadStatus::Ok)
}

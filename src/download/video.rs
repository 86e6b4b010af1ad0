//! Video downloader: stream to a `.part` file while hashing, then dedup by digest.
//!
//! Memory use is bounded by one chunk per side: the incoming stream and, when
//! a file already exists at the destination, a read of the same length from
//! that file. The existing file is never loaded whole.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use super::cache::{CacheIndex, record_if_enabled};
use super::chunk::ChunkSizeController;
use super::constants::DEFAULT_CHUNK_SIZE;
use super::error::DownloadError;
use super::filename::{claim_unique_file, part_path};
use super::response::{ChunkReader, MediaResponse};
use super::types::{DownloadResult, DownloadStatus};

/// Streams a video response into `destination`.
///
/// The body is written to `<destination>.part` one chunk at a time. When a
/// file already exists at `destination` and its SHA-256 equals that of the
/// stream, the temp file is removed and the result is `skipped`. Otherwise
/// the next free name is claimed, the temp file is renamed onto it, and the
/// URL is recorded in `cache`. On any error the temp file is removed.
#[instrument(
    skip(response, cache, progress),
    fields(url = %response.url(), destination = %destination.display())
)]
pub async fn download_video(
    response: MediaResponse,
    destination: &Path,
    dynamic_chunks: bool,
    cache: Option<&CacheIndex>,
    progress: &ProgressBar,
) -> DownloadResult {
    let url = response.url().to_string();

    let (part, file) = match create_part_file(destination).await {
        Ok(created) => created,
        Err(error) => {
            warn!(error = %error, "could not create temp file");
            return DownloadResult::error(url, &error);
        }
    };

    let outcome = store_video(response, file, &part, destination, dynamic_chunks, progress).await;
    progress.finish_and_clear();

    match outcome {
        Ok(status) => {
            record_if_enabled(cache, &url).await;
            DownloadResult { url, status }
        }
        Err(error) => {
            warn!(error = %error, "video download failed");
            discard_part(&part).await;
            DownloadResult::error(url, &error)
        }
    }
}

async fn store_video(
    response: MediaResponse,
    mut file: File,
    part: &Path,
    destination: &Path,
    dynamic_chunks: bool,
    progress: &ProgressBar,
) -> Result<DownloadStatus, DownloadError> {
    let declared = response.content_length();
    if declared > 0 {
        progress.set_length(declared);
    }
    debug!(content_length = declared, part = %part.display(), "streaming video");

    let mut existing = ExistingDigest::open(destination).await?;
    let mut reader = response.into_chunks();
    let digest = stream_body(
        &mut reader,
        &mut file,
        part,
        existing.as_mut(),
        dynamic_chunks,
        progress,
    )
    .await?;
    drop(file);

    if let Some(existing) = existing
        && existing.finish().await? == digest
    {
        discard_part(part).await;
        info!("identical video already present, skipping");
        return Ok(DownloadStatus::Skipped);
    }

    let (target, placeholder) = claim_unique_file(destination).await?;
    drop(placeholder);
    if let Err(e) = tokio::fs::rename(part, &target).await {
        discard_part(&target).await;
        return Err(DownloadError::io(&target, e));
    }
    info!(path = %target.display(), "video saved");
    Ok(DownloadStatus::Ok)
}

/// Copies the body into `writer` with exactly one `write_all` per chunk.
///
/// Returns the SHA-256 of everything written; `existing` is advanced by the
/// same number of bytes after each chunk.
async fn stream_body<W>(
    reader: &mut ChunkReader,
    writer: &mut W,
    part: &Path,
    mut existing: Option<&mut ExistingDigest>,
    dynamic_chunks: bool,
    progress: &ProgressBar,
) -> Result<Output<Sha256>, DownloadError>
where
    W: AsyncWrite + Unpin,
{
    let mut controller = ChunkSizeController::new(dynamic_chunks);
    let mut hasher = Sha256::new();

    while let Some(chunk) = reader.next_chunk(controller.current()).await? {
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(part, e))?;
        hasher.update(&chunk);
        if let Some(existing) = existing.as_deref_mut() {
            existing.advance(chunk.len()).await?;
        }
        progress.inc(chunk.len() as u64);
        controller.observe(chunk.len());
    }

    writer.flush().await.map_err(|e| DownloadError::io(part, e))?;
    Ok(hasher.finalize())
}

/// Opens `<destination>.part` exclusively, probing `_N` names if it is taken.
async fn create_part_file(destination: &Path) -> Result<(PathBuf, File), DownloadError> {
    claim_unique_file(&part_path(destination)).await
}

async fn discard_part(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!(part = %part.display(), "removed temp file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(part = %part.display(), error = %e, "failed to remove temp file"),
    }
}

/// Incremental digest of a file that already sits at the destination.
struct ExistingDigest {
    path: PathBuf,
    file: File,
    hasher: Sha256,
    buffer: Vec<u8>,
}

impl ExistingDigest {
    async fn open(path: &Path) -> Result<Option<Self>, DownloadError> {
        match File::open(path).await {
            Ok(file) => Ok(Some(Self {
                path: path.to_path_buf(),
                file,
                hasher: Sha256::new(),
                buffer: Vec::new(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DownloadError::io(path, e)),
        }
    }

    /// Hashes up to `len` more bytes; returns how many were available.
    async fn advance(&mut self, len: usize) -> Result<usize, DownloadError> {
        self.buffer.resize(len, 0);
        let mut filled = 0;
        while filled < len {
            let read = self
                .file
                .read(&mut self.buffer[filled..len])
                .await
                .map_err(|e| DownloadError::io(&self.path, e))?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        self.hasher.update(&self.buffer[..filled]);
        Ok(filled)
    }

    /// Hashes whatever the stream did not cover and returns the digest.
    async fn finish(mut self) -> Result<Output<Sha256>, DownloadError> {
        while self.advance(DEFAULT_CHUNK_SIZE).await? > 0 {}
        Ok(self.hasher.finalize())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use bytes::Bytes;
    use futures_util::stream;
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use tempfile::TempDir;

    use super::*;

    const URL: &str = "https://example.com/clip.mp4";

    fn video_response(parts: Vec<&'static [u8]>) -> MediaResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        let items = parts
            .into_iter()
            .map(|p| Ok(Bytes::from_static(p)))
            .collect::<Vec<Result<Bytes, DownloadError>>>();
        MediaResponse::from_stream(URL, 200, headers, stream::iter(items))
    }

    /// Writer that counts write calls and accepts every buffer whole.
    #[derive(Default)]
    struct CountingWriter {
        writes: usize,
        bytes: Vec<u8>,
    }

    impl AsyncWrite for CountingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.writes += 1;
            self.bytes.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_n_chunks_produce_n_writes() {
        let parts: Vec<&'static [u8]> = vec![
            &b"one"[..],
            &b"two"[..],
            &b"three"[..],
            &b"four"[..],
            &b"five"[..],
        ];
        let mut reader = video_response(parts).into_chunks();
        let mut writer = CountingWriter::default();

        stream_body(
            &mut reader,
            &mut writer,
            Path::new("clip.mp4.part"),
            None,
            true,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(writer.writes, 5);
        assert_eq!(writer.bytes, b"onetwothreefourfive");
    }

    #[tokio::test]
    async fn test_new_video_is_renamed_into_place() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("clip.mp4");

        let result = download_video(
            video_response(vec![&b"abc"[..], &b"def"[..]]),
            &destination,
            true,
            None,
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(result.status, DownloadStatus::Ok);
        assert_eq!(std::fs::read(&destination).unwrap(), b"abcdef");
        assert!(!part_path(&destination).exists());
    }

    #[tokio::test]
    async fn test_identical_video_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("clip.mp4");
        std::fs::write(&destination, b"abcdef").unwrap();

        let result = download_video(
            video_response(vec![&b"ab"[..], &b"cdef"[..]]),
            &destination,
            false,
            None,
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(result.status, DownloadStatus::Skipped);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_prefix_of_existing_is_not_a_duplicate() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("clip.mp4");
        std::fs::write(&destination, b"abcdef-and-more").unwrap();

        let result = download_video(
            video_response(vec![&b"abcdef"[..]]),
            &destination,
            true,
            None,
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(result.status, DownloadStatus::Ok);
        assert_eq!(std::fs::read(temp_dir.path().join("clip_1.mp4")).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_stream_error_removes_part_file() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("clip.mp4");
        let items: Vec<Result<Bytes, DownloadError>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(DownloadError::timeout(URL)),
        ];
        let response = MediaResponse::from_stream(URL, 200, HeaderMap::new(), stream::iter(items));

        let result = download_video(response, &destination, true, None, &ProgressBar::hidden()).await;

        assert!(result.status.is_error());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_videos_both_survive() {
        for _ in 0..25 {
            let temp_dir = TempDir::new().unwrap();
            let destination = temp_dir.path().join("clip.mp4");
            let first: &'static [u8] = &[1u8; 64 * 1024];
            let second: &'static [u8] = &[2u8; 64 * 1024];

            let handles: Vec<_> = [first, second]
                .into_iter()
                .map(|body| {
                    let destination = destination.clone();
                    tokio::spawn(async move {
                        download_video(
                            video_response(vec![body]),
                            &destination,
                            false,
                            None,
                            &ProgressBar::hidden(),
                        )
                        .await
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.await.unwrap().status, DownloadStatus::Ok);
            }

            let mut saved: Vec<Vec<u8>> = std::fs::read_dir(temp_dir.path())
                .unwrap()
                .map(|entry| std::fs::read(entry.unwrap().path()).unwrap())
                .collect();
            saved.sort();
            assert_eq!(saved, vec![first.to_vec(), second.to_vec()]);
        }
    }

    #[tokio::test]
    async fn test_busy_part_name_is_not_clobbered() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("clip.mp4");
        let foreign_part = part_path(&destination);
        std::fs::write(&foreign_part, b"in flight").unwrap();

        let result = download_video(
            video_response(vec![&b"xyz"[..]]),
            &destination,
            true,
            None,
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(result.status, DownloadStatus::Ok);
        assert_eq!(std::fs::read(&foreign_part).unwrap(), b"in flight");
        assert_eq!(std::fs::read(&destination).unwrap(), b"xyz");
    }
}

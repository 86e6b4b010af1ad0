//! Media fetch engine: resilient HTTP, adaptive streaming, and dedup.
//!
//! # Features
//!
//! - Bounded retry with backoff for rate-limited (429/503) and unreachable hosts
//! - One-shot blocking fallback transport for other error statuses
//! - Images buffered and byte-compared against existing files
//! - Videos streamed to `.part` files in throughput-sized chunks and
//!   SHA-256-compared without loading either side whole
//! - Album directories confined to the download root
//! - Optional URL cache of empty marker files
//!
//! # Example
//!
//! ```no_run
//! use mediadl_core::download::{DownloadEngine, FetchConfig, MediaRequest, final_album_path};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let album = final_album_path(Path::new("./downloads"), "Summer: Day 1")?;
//! let engine = DownloadEngine::new(FetchConfig::default())?;
//! let result = engine
//!     .download_media(&MediaRequest::new("https://example.com/a.jpg", album))
//!     .await;
//! println!("{}", serde_json::to_string(&result)?);
//! # Ok(())
//! # }
//! ```

mod cache;
mod chunk;
mod classify;
mod client;
mod config;
mod constants;
mod engine;
mod error;
mod filename;
mod image;
mod progress;
mod response;
mod retry;
mod types;
mod video;

pub use cache::CacheIndex;
pub use chunk::{ChunkSizeController, next_chunk_size};
pub use classify::{MediaKind, classify};
pub use client::FetchClient;
pub use config::{DEFAULT_CACHE_DIR, DEFAULT_CONCURRENCY, FetchConfig, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use constants::CONNECT_TIMEOUT_SECS;
pub use engine::DownloadEngine;
pub use error::DownloadError;
pub use filename::{
    claim_unique_file, extension_from_content_type, final_album_path, media_name_from_url,
    part_path, sanitize, unique_filename,
};
pub use image::download_image;
pub use progress::DownloadProgress;
pub use response::{ChunkReader, FetchedBody, MediaResponse, ResponseShape};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    classify_http_status, parse_retry_after,
};
pub use types::{DownloadResult, DownloadStatus, MediaRequest};
pub use video::download_video;

// Note: no module-local Result aliases; signatures spell out
// `Result<T, DownloadError>`.

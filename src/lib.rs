//! mediadl Core Library
//!
//! This library persists remote media (images and video) discovered by site
//! adapters into album directories, reliably and without duplicates.
//!
//! # Architecture
//!
//! - [`download`] - fetch client, downloaders, and the concurrent engine
//! - [`summary`] - per-run result counts and the error report card

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod summary;
mod user_agent;

// Re-export commonly used types
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadEngine, DownloadError, DownloadProgress,
    DownloadResult, DownloadStatus, FetchClient, FetchConfig, MediaRequest, RetryPolicy,
    final_album_path,
};
pub use summary::{RunSummary, normalize_error_message};

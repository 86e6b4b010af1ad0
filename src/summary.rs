//! Run summary: result counts and a grouped error report card.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::download::{DownloadResult, DownloadStatus};

const NAME_RESOLUTION_ERROR: &str = "Name Resolution Error - Failed to resolve host";

/// Aggregate of every result in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    downloaded: usize,
    skipped: usize,
    errors: usize,
    error_classes: BTreeMap<String, usize>,
}

impl RunSummary {
    /// Builds a summary from a batch of results.
    #[must_use]
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a DownloadResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(result);
        }
        summary
    }

    /// Adds one result to the counts.
    pub fn record(&mut self, result: &DownloadResult) {
        match &result.status {
            DownloadStatus::Ok => self.downloaded += 1,
            DownloadStatus::Skipped => self.skipped += 1,
            DownloadStatus::Error(_) => {
                self.errors += 1;
                let class = normalize_error_message(&result.status.to_string());
                *self.error_classes.entry(class).or_default() += 1;
            }
        }
    }

    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Error classes with their counts, most frequent first.
    ///
    /// Ties keep alphabetical order.
    #[must_use]
    pub fn error_report(&self) -> Vec<(&str, usize)> {
        let mut report: Vec<(&str, usize)> = self
            .error_classes
            .iter()
            .map(|(class, count)| (class.as_str(), *count))
            .collect();
        report.sort_by(|a, b| b.1.cmp(&a.1));
        report
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Downloaded: {}", self.downloaded)?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        writeln!(f, "Errors: {}", self.errors)?;
        if !self.has_errors() {
            return Ok(());
        }

        writeln!(f)?;
        writeln!(f, "===== Error Report Card =====")?;
        writeln!(f, "Total Errors: {}", self.errors)?;
        writeln!(f, "Unique Error Types: {}", self.error_classes.len())?;
        writeln!(f)?;
        writeln!(f, "Top Issues:")?;
        for (class, count) in self.error_report() {
            writeln!(f, "  - {class} ({count})")?;
        }
        Ok(())
    }
}

/// Reduces an `error: <detail>` status to a groupable error class.
///
/// # Example
///
/// ```
/// use mediadl_core::summary::normalize_error_message;
///
/// assert_eq!(normalize_error_message("error: 404"), "404");
/// assert_eq!(normalize_error_message("error: timeout"), "timeout");
/// assert_eq!(
///     normalize_error_message("error: network error: error sending request"),
///     "network error"
/// );
/// ```
#[must_use]
pub fn normalize_error_message(raw_status: &str) -> String {
    let detail = raw_status
        .split_once("error:")
        .map_or(raw_status, |(_, rest)| rest)
        .trim();

    let lowered = detail.to_lowercase();
    if lowered.contains("dns error")
        || lowered.contains("failed to lookup address")
        || lowered.contains("failed to resolve")
    {
        return NAME_RESOLUTION_ERROR.to_string();
    }

    detail.split(':').next().unwrap_or(detail).trim().to_string()
}

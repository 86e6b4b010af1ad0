//! Progress bars for album runs: one item counter plus a byte bar per video.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const ALBUM_TEMPLATE: &str = "{prefix:.bold} [{bar:30}] {pos}/{len} {msg}";
const VIDEO_TEMPLATE: &str = "  {msg:30!} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec}";

/// Shared progress display; cheap to clone.
///
/// A hidden instance draws nothing, which is what library callers and tests
/// get by default.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    multi: MultiProgress,
    items: ProgressBar,
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::hidden()
    }
}

impl DownloadProgress {
    /// Progress that renders nothing.
    #[must_use]
    pub fn hidden() -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let items = multi.add(ProgressBar::hidden());
        Self { multi, items }
    }

    /// Progress rendered to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let items = multi.add(ProgressBar::new(0));
        items.set_style(
            ProgressStyle::with_template(ALBUM_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { multi, items }
    }

    /// Starts counting items for an album.
    pub fn start_album(&self, title: &str, len: usize) {
        self.items.set_prefix(title.to_string());
        self.items.set_length(len as u64);
        self.items.set_position(0);
    }

    /// Marks one album item as finished.
    pub fn item_done(&self, status: &str) {
        self.items.set_message(status.to_string());
        self.items.inc(1);
    }

    /// Adds a byte bar for a streamed transfer. A `total` of 0 means unknown.
    #[must_use]
    pub fn video_bar(&self, name: &str, total: u64) -> ProgressBar {
        if self.multi.is_hidden() {
            return ProgressBar::hidden();
        }
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(VIDEO_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(name.to_string());
        bar
    }

    /// Clears all bars.
    pub fn finish(&self) {
        self.items.finish_and_clear();
        // Best effort: a failed clear only leaves stale lines on the terminal.
        let _ = self.multi.clear();
    }
}

//! Throughput-adaptive chunk sizing for streamed transfers.
//!
//! The controller is a coarse governor: it re-measures at most once per
//! [`MEASUREMENT_WINDOW`] of streaming and asks [`next_chunk_size`] for the
//! size of subsequent reads. It is owned by a single transfer.

use std::time::Instant;

use tracing::trace;

use super::constants::{
    CHUNK_TARGET_SECS, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MEASUREMENT_WINDOW, MIN_CHUNK_SIZE,
};

/// Returns the chunk size to request for a measured throughput.
///
/// With no measurement the default (64 KiB) is used. Otherwise the size is
/// `throughput * 0.150s`, clamped to `[32 KiB, 1 MiB]`. Non-finite inputs
/// count as no measurement.
///
/// # Example
///
/// ```
/// use mediadl_core::download::next_chunk_size;
///
/// assert_eq!(next_chunk_size(None), 64 * 1024);
/// assert_eq!(next_chunk_size(Some(1_000_000.0)), 150_000);
/// assert_eq!(next_chunk_size(Some(1.0)), 32 * 1024);
/// ```
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn next_chunk_size(throughput_bytes_per_sec: Option<f64>) -> usize {
    let Some(throughput) = throughput_bytes_per_sec.filter(|t| t.is_finite()) else {
        return DEFAULT_CHUNK_SIZE;
    };
    let target = (throughput * CHUNK_TARGET_SECS).max(0.0);
    (target as usize).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
}

/// Per-transfer chunk-size state.
#[derive(Debug)]
pub struct ChunkSizeController {
    dynamic: bool,
    current: usize,
    window_bytes: u64,
    window_start: Instant,
}

impl ChunkSizeController {
    /// Creates a controller starting at the default chunk size.
    ///
    /// When `dynamic` is false the size never changes.
    #[must_use]
    pub fn new(dynamic: bool) -> Self {
        Self::starting_at(dynamic, Instant::now())
    }

    fn starting_at(dynamic: bool, now: Instant) -> Self {
        Self {
            dynamic,
            current: next_chunk_size(None),
            window_bytes: 0,
            window_start: now,
        }
    }

    /// Size to request for the next read.
    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Records `bytes` received and returns the size for the next read.
    pub fn observe(&mut self, bytes: usize) -> usize {
        self.observe_at(bytes, Instant::now())
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe_at(&mut self, bytes: usize, now: Instant) -> usize {
        self.window_bytes = self.window_bytes.saturating_add(bytes as u64);
        if !self.dynamic {
            return self.current;
        }

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= MEASUREMENT_WINDOW {
            let throughput = self.window_bytes as f64 / elapsed.as_secs_f64();
            self.current = next_chunk_size(Some(throughput));
            trace!(throughput, chunk_size = self.current, "re-measured throughput");
            self.window_bytes = 0;
            self.window_start = now;
        }
        self.current
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_without_measurement() {
        assert_eq!(next_chunk_size(None), 65_536);
    }

    #[test]
    fn test_chunk_size_matches_clamped_formula() {
        for t in [1.0, 10_000.0, 218_453.0, 250_000.0, 1_000_000.0, 6_990_507.0, 1e9, 1e15] {
            let expected = ((t * 0.15) as usize).clamp(32_768, 1_048_576);
            let actual = next_chunk_size(Some(t));
            assert_eq!(actual, expected, "throughput {t}");
            assert!((32_768..=1_048_576).contains(&actual));
        }
    }

    #[test]
    fn test_chunk_size_bounds() {
        assert_eq!(next_chunk_size(Some(0.5)), MIN_CHUNK_SIZE);
        assert_eq!(next_chunk_size(Some(100_000_000.0)), MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_non_finite_throughput_uses_default() {
        assert_eq!(next_chunk_size(Some(f64::NAN)), DEFAULT_CHUNK_SIZE);
        assert_eq!(next_chunk_size(Some(f64::INFINITY)), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_controller_waits_for_full_window() {
        let start = Instant::now();
        let mut controller = ChunkSizeController::starting_at(true, start);
        let size = controller.observe_at(5_000_000, start + Duration::from_millis(500));
        assert_eq!(size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_controller_adapts_after_window() {
        let start = Instant::now();
        let mut controller = ChunkSizeController::starting_at(true, start);
        controller.observe_at(1_000_000, start + Duration::from_millis(500));
        let size = controller.observe_at(1_000_000, start + Duration::from_secs(2));
        // 2 MB over 2 s = 1 MB/s -> 150 kB
        assert_eq!(size, 150_000);
        assert_eq!(controller.current(), 150_000);
    }

    #[test]
    fn test_controller_resets_window_after_measurement() {
        let start = Instant::now();
        let mut controller = ChunkSizeController::starting_at(true, start);
        controller.observe_at(2_000_000, start + Duration::from_secs(1));
        let size = controller.observe_at(10, start + Duration::from_millis(1500));
        assert_eq!(size, 300_000);
    }

    #[test]
    fn test_static_controller_never_changes() {
        let start = Instant::now();
        let mut controller = ChunkSizeController::starting_at(false, start);
        let size = controller.observe_at(50_000_000, start + Duration::from_secs(10));
        assert_eq!(size, DEFAULT_CHUNK_SIZE);
    }
}

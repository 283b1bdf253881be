//! Estimator convergence detection
//!
//! After a physical drone's state estimator is reset, its position
//! variance stream is watched until it settles. Convergence holds when,
//! for every spatial axis, the spread of the most recent
//! [`CONVERGENCE_WINDOW`] variance samples stays below a threshold.

use heapless::HistoryBuffer;

/// Sliding-window size per axis
pub const CONVERGENCE_WINDOW: usize = 10;

/// Seed value for fresh windows, far above any plausible variance
pub const WINDOW_SENTINEL: f32 = 1000.0;

/// Watches a live variance stream and decides when an estimator has
/// stabilized.
///
/// Convergence is impossible until a full window of real samples has
/// been observed; the sample counter enforces this, since seeded
/// windows alone would show a zero spread.
#[derive(Debug)]
pub struct ConvergenceDetector {
    var_x: HistoryBuffer<f32, CONVERGENCE_WINDOW>,
    var_y: HistoryBuffer<f32, CONVERGENCE_WINDOW>,
    var_z: HistoryBuffer<f32, CONVERGENCE_WINDOW>,
    seen: usize,
}

impl ConvergenceDetector {
    /// Create a detector with sentinel-seeded windows
    pub fn new() -> Self {
        Self {
            var_x: HistoryBuffer::new_with(WINDOW_SENTINEL),
            var_y: HistoryBuffer::new_with(WINDOW_SENTINEL),
            var_z: HistoryBuffer::new_with(WINDOW_SENTINEL),
            seen: 0,
        }
    }

    /// Push one variance sample per axis, evicting the oldest
    pub fn observe(&mut self, sample_x: f32, sample_y: f32, sample_z: f32) {
        self.var_x.write(sample_x);
        self.var_y.write(sample_y);
        self.var_z.write(sample_z);
        self.seen = self.seen.saturating_add(1);
    }

    /// True iff a full window of real samples has been observed and
    /// `max - min < threshold` holds on every axis window
    pub fn is_converged(&self, threshold: f32) -> bool {
        self.seen >= CONVERGENCE_WINDOW
            && window_spread(&self.var_x) < threshold
            && window_spread(&self.var_y) < threshold
            && window_spread(&self.var_z) < threshold
    }

    /// Re-seed all windows, e.g. after re-issuing an estimator reset
    pub fn reset(&mut self) {
        self.var_x.clear_with(WINDOW_SENTINEL);
        self.var_y.clear_with(WINDOW_SENTINEL);
        self.var_z.clear_with(WINDOW_SENTINEL);
        self.seen = 0;
    }
}

impl Default for ConvergenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn window_spread(window: &HistoryBuffer<f32, CONVERGENCE_WINDOW>) -> f32 {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &sample in window.as_slice() {
        min = min.min(sample);
        max = max.max(sample);
    }
    max - min
}

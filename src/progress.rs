//! Progress reporting for optimizer runs.
//!
//! Optimizers call [`ProgressObserver::on_progress`] once per generation or
//! iteration with a 1-based completed count, the total count and a short
//! phase label. The call is synchronous; the loop continues once it returns.
//! Any `FnMut(usize, usize, &str)` closure is an observer, so a UI can hook
//! in without implementing the trait.

/// Phase label reported by the Gaussian optimizer.
pub const SMOOTHING_PHASE: &str = "Smoothing image";
/// Phase label reported by the mask optimizer.
pub const SHARPENING_PHASE: &str = "Sharpening image";

/// Receives progress updates from an optimizer loop.
pub trait ProgressObserver {
    /// Called after `completed` of `total` steps of `phase`.
    fn on_progress(&mut self, completed: usize, total: usize, phase: &str);
}

impl<F> ProgressObserver for F
where
    F: FnMut(usize, usize, &str),
{
    #[inline]
    fn on_progress(&mut self, completed: usize, total: usize, phase: &str) {
        self(completed, total, phase)
    }
}

/// Ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    #[inline]
    fn on_progress(&mut self, _completed: usize, _total: usize, _phase: &str) {}
}

/// Logs every update at `info` level as `completed/total (percent) - phase`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, completed: usize, total: usize, phase: &str) {
        log::info!(
            "{completed}/{total} ({:.2}%) - {phase}",
            fraction(completed, total) * 100.0
        );
    }
}

/// Completed fraction in [0, 1]; an empty run counts as complete.
#[inline]
pub fn fraction(completed: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        (completed as f64 / total as f64).min(1.0)
    }
}

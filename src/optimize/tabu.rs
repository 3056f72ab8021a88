//! Tabu search over (blur mask, sharp mask) pairs.
//!
//! Every iteration scores the full cross product of the current state's
//! blur-mask and sharp-mask neighbors by the SNR of the filtered image
//! against the search image, and moves to the best pair that is not in
//! the tabu memory. Moves are taken even when they are worse than the
//! current state, which lets the search leave local optima; the best state
//! ever seen is tracked separately and is what the run returns.
//!
//! # Mechanisms
//!
//! 1.  **Tabu memory:** a FIFO of the last `tabu_capacity` visited states.
//!     Pairs found there are skipped outright (no aspiration criterion).
//! 2.  **Stalling:** when every neighbor is tabu the current state is kept
//!     and recorded again.
//!
//! The sharpened image of each sharp neighbor is computed once per
//! iteration and shared by all blur neighbors.

use rand::Rng;

use crate::error::{ConfigError, Result};
use crate::filters::apply_mask;
use crate::image::ImageBuffer;
use crate::mask::{init_masks, Mask, DEFAULT_BLUR_STEP, DEFAULT_SHARP_STEP};
use crate::metric::snr;
use crate::progress::{ProgressObserver, SHARPENING_PHASE};

use super::tabu_memory::{MaskPair, TabuMemory};

/// Tabu search settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TabuConfig {
    /// Number of iterations to run.
    pub iterations: usize,
    /// Number of visited states kept tabu.
    pub tabu_capacity: usize,
    /// Perturbation applied to one blur mask cell.
    pub blur_step: f64,
    /// Perturbation applied to one sharp mask cell.
    pub sharp_step: f64,
}

impl Default for TabuConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            tabu_capacity: 10,
            blur_step: DEFAULT_BLUR_STEP,
            sharp_step: DEFAULT_SHARP_STEP,
        }
    }
}

impl TabuConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.tabu_capacity == 0 {
            return Err(ConfigError::ZeroTabuCapacity);
        }
        for step in [self.blur_step, self.sharp_step] {
            if !step.is_finite() || step <= 0.0 {
                return Err(ConfigError::InvalidStep(step));
            }
        }
        Ok(())
    }
}

/// Result of a tabu search run.
#[derive(Debug, Clone, PartialEq)]
pub struct TabuOutcome {
    /// Blur mask of the best state.
    pub blur: Mask,
    /// Sharp mask of the best state.
    pub sharp: Mask,
    /// SNR of the best state; `-inf` if no move was ever made.
    pub snr: f64,
    /// State the search ended in, which may differ from the best.
    pub current: MaskPair,
    /// Current state after each iteration, in order.
    pub visited: Vec<MaskPair>,
}

/// Tabu search optimizer for mask pairs.
#[derive(Debug, Clone)]
pub struct MaskOptimizer {
    config: TabuConfig,
    memory: TabuMemory,
}

impl MaskOptimizer {
    /// Creates an optimizer after validating `config`.
    pub fn new(config: TabuConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            memory: TabuMemory::new(config.tabu_capacity),
        })
    }

    pub fn config(&self) -> &TabuConfig {
        &self.config
    }

    /// Tabu memory as left by the last run.
    pub fn memory(&self) -> &TabuMemory {
        &self.memory
    }

    /// Run tabu search from randomly initialized masks of side `mask_size`.
    pub fn optimize_from_random<R, P>(
        &mut self,
        mask_size: usize,
        rng: &mut R,
        image: &ImageBuffer,
        progress: &mut P,
    ) -> Result<TabuOutcome>
    where
        R: Rng + ?Sized,
        P: ProgressObserver + ?Sized,
    {
        let (blur, sharp) = init_masks(mask_size, rng)?;
        self.optimize(&blur, &sharp, image, progress)
    }

    /// Run tabu search from the given masks.
    ///
    /// # Arguments
    /// * `initial_blur` - Starting blur mask
    /// * `initial_sharp` - Starting sharp mask, same size as the blur mask
    /// * `image` - Image filtered by every candidate and used as SNR reference
    /// * `progress` - Notified at the end of every iteration
    ///
    /// # Returns
    /// Best (blur, sharp, SNR) seen across all iterations
    pub fn optimize<P>(
        &mut self,
        initial_blur: &Mask,
        initial_sharp: &Mask,
        image: &ImageBuffer,
        progress: &mut P,
    ) -> Result<TabuOutcome>
    where
        P: ProgressObserver + ?Sized,
    {
        if initial_blur.size() != initial_sharp.size() {
            return Err(ConfigError::MaskShapeMismatch {
                blur: initial_blur.size(),
                sharp: initial_sharp.size(),
            }
            .into());
        }

        let total = self.config.iterations;
        log::info!(
            "tabu search: {}x{} masks, {total} iterations, capacity {}",
            initial_blur.size(),
            initial_blur.size(),
            self.config.tabu_capacity
        );

        self.memory.clear();
        let mut current = MaskPair::new(initial_blur.clone(), initial_sharp.clone());
        let mut best = current.clone();
        let mut best_snr = f64::NEG_INFINITY;
        let mut visited = Vec::with_capacity(total);

        for iteration in 0..total {
            match self.search_neighborhood(&current, image)? {
                Some((candidate, score)) => {
                    current = candidate;
                    if score > best_snr {
                        best = current.clone();
                        best_snr = score;
                        log::debug!("iteration {}: new best SNR {score:.4} dB", iteration + 1);
                    }
                }
                None => {
                    log::debug!("iteration {}: every neighbor is tabu", iteration + 1);
                }
            }

            self.memory.record(current.clone());
            visited.push(current.clone());
            progress.on_progress(iteration + 1, total, SHARPENING_PHASE);
        }

        log::info!("tabu search finished: best SNR {best_snr:.4} dB");
        Ok(TabuOutcome {
            blur: best.blur,
            sharp: best.sharp,
            snr: best_snr,
            current,
            visited,
        })
    }

    /// Best non-tabu neighbor of `current` and its SNR.
    ///
    /// Blur neighbors are the outer loop and sharp neighbors the inner one;
    /// the first pair with the strictly highest score wins.
    fn search_neighborhood(
        &self,
        current: &MaskPair,
        image: &ImageBuffer,
    ) -> Result<Option<(MaskPair, f64)>> {
        let blur_neighbors = current.blur.blur_neighbors(self.config.blur_step);
        let sharp_neighbors = current.sharp.sharp_neighbors(self.config.sharp_step);

        let mut sharpened: Vec<Option<ImageBuffer>> = vec![None; sharp_neighbors.len()];
        let mut best: Option<(usize, usize)> = None;
        let mut best_score = f64::NEG_INFINITY;

        for (bi, blur) in blur_neighbors.iter().enumerate() {
            for (si, sharp) in sharp_neighbors.iter().enumerate() {
                if self.memory.contains_pair(blur, sharp) {
                    continue;
                }

                let stage = sharpened[si].get_or_insert_with(|| apply_mask(image, sharp));
                let processed = apply_mask(stage, blur);
                let score = snr(image, &processed)?;

                if score > best_score {
                    best_score = score;
                    best = Some((bi, si));
                }
            }
        }

        Ok(best.map(|(bi, si)| {
            let pair = MaskPair::new(blur_neighbors[bi].clone(), sharp_neighbors[si].clone());
            (pair, best_score)
        }))
    }
}

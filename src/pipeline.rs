//! End-to-end restoration: smooth with a tuned Gaussian, then sharpen with
//! tuned masks.
//!
//! 1. Differential evolution picks the Gaussian parameters and the input is
//!    blurred with them (the *denoised* image).
//! 2. Masks are initialized at random and tabu search tunes them against
//!    the denoised image.
//! 3. The best mask pair is applied to the denoised image (the *sharpened*
//!    image).
//!
//! All knobs live in [`RestoreConfig`], which deserializes with serde and
//! falls back to the defaults for any missing field.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::filters::{apply_gaussian, apply_mask_pair};
use crate::image::ImageBuffer;
use crate::mask::{Mask, DEFAULT_BLUR_STEP, DEFAULT_SHARP_STEP};
use crate::optimize::{
    DeConfig, DeOutcome, GaussianBounds, GaussianOptimizer, MaskOptimizer, TabuConfig,
};
use crate::progress::ProgressObserver;

/// Iteration counts above this are accepted but logged as slow.
pub const SLOW_ITERATION_WARNING: usize = 100;

/// Restoration pipeline settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Differential evolution generations.
    pub blur_iterations: usize,
    /// Tabu search iterations.
    pub sharp_iterations: usize,
    pub population_size: usize,
    pub mutation_factor: f64,
    pub crossover_rate: f64,
    pub kernel_bounds: (f64, f64),
    pub sigma_bounds: (f64, f64),
    /// Side length of both masks, odd.
    pub mask_size: usize,
    pub tabu_capacity: usize,
    pub blur_step: f64,
    pub sharp_step: f64,
    /// Fixed seed for reproducible runs; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        let de = DeConfig::default();
        let bounds = GaussianBounds::default();
        Self {
            blur_iterations: 10,
            sharp_iterations: 10,
            population_size: de.population_size,
            mutation_factor: de.mutation_factor,
            crossover_rate: de.crossover_rate,
            kernel_bounds: bounds.kernel_size,
            sigma_bounds: bounds.sigma,
            mask_size: 5,
            tabu_capacity: 10,
            blur_step: DEFAULT_BLUR_STEP,
            sharp_step: DEFAULT_SHARP_STEP,
            seed: None,
        }
    }
}

impl RestoreConfig {
    pub fn de_config(&self) -> DeConfig {
        DeConfig {
            population_size: self.population_size,
            max_generations: self.blur_iterations,
            mutation_factor: self.mutation_factor,
            crossover_rate: self.crossover_rate,
        }
    }

    pub fn tabu_config(&self) -> TabuConfig {
        TabuConfig {
            iterations: self.sharp_iterations,
            tabu_capacity: self.tabu_capacity,
            blur_step: self.blur_step,
            sharp_step: self.sharp_step,
        }
    }

    pub fn bounds(&self) -> GaussianBounds {
        GaussianBounds::new(self.kernel_bounds, self.sigma_bounds)
    }

    /// Check every setting before any work starts.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.blur_iterations == 0 {
            return Err(ConfigError::ZeroIterations("blur"));
        }
        if self.sharp_iterations == 0 {
            return Err(ConfigError::ZeroIterations("sharp"));
        }
        if self.mask_size == 0 || self.mask_size % 2 == 0 {
            return Err(ConfigError::InvalidMaskSize(self.mask_size));
        }
        self.de_config().validate()?;
        self.tabu_config().validate()?;
        self.bounds().validate()?;

        if self.blur_iterations > SLOW_ITERATION_WARNING
            || self.sharp_iterations > SLOW_ITERATION_WARNING
        {
            log::warn!(
                "{} blur / {} sharp iterations requested; this may take a long time",
                self.blur_iterations,
                self.sharp_iterations
            );
        }
        Ok(())
    }

    /// Random source for a run: seeded if `seed` is set.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Everything a restoration run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    /// Input blurred with the tuned Gaussian.
    pub denoised: ImageBuffer,
    /// Denoised image filtered with the tuned masks.
    pub sharpened: ImageBuffer,
    pub gaussian: DeOutcome,
    pub blur_mask: Mask,
    pub sharp_mask: Mask,
    /// SNR of the best mask pair against the denoised image.
    pub snr: f64,
}

/// Run the full pipeline with the random source described by `config`.
pub fn restore<P>(
    image: &ImageBuffer,
    config: &RestoreConfig,
    progress: &mut P,
) -> Result<RestoreOutcome>
where
    P: ProgressObserver + ?Sized,
{
    restore_with_rng(image, config, config.rng(), progress)
}

/// Run the full pipeline with an explicit random source.
pub fn restore_with_rng<R, P>(
    image: &ImageBuffer,
    config: &RestoreConfig,
    mut rng: R,
    progress: &mut P,
) -> Result<RestoreOutcome>
where
    R: Rng,
    P: ProgressObserver + ?Sized,
{
    config.validate()?;
    log::info!(
        "restoring {}x{} image: {} blur / {} sharp iterations",
        image.width(),
        image.height(),
        config.blur_iterations,
        config.sharp_iterations
    );

    let mut smoother = GaussianOptimizer::new(config.de_config(), &mut rng)?;
    let gaussian = smoother.optimize(&config.bounds(), image, progress)?;
    let denoised = apply_gaussian(image, gaussian.kernel_size, gaussian.sigma);

    let mut sharpener = MaskOptimizer::new(config.tabu_config())?;
    let tabu = sharpener.optimize_from_random(config.mask_size, &mut rng, &denoised, progress)?;
    let sharpened = apply_mask_pair(&denoised, &tabu.blur, &tabu.sharp);

    Ok(RestoreOutcome {
        denoised,
        sharpened,
        gaussian,
        blur_mask: tabu.blur,
        sharp_mask: tabu.sharp,
        snr: tabu.snr,
    })
}

//! Differential evolution over Gaussian blur parameters.
//!
//! Searches the 2D space (kernel size, sigma) for the Gaussian blur that
//! best matches a fixed reference blur (kernel 7, sigma 2.0) of the input
//! image. Fitness is the mean squared sample difference between the two
//! blurred images; lower is better.
//!
//! # Algorithm
//!
//! The classic `DE/rand/1/bin` scheme with greedy one-for-one replacement:
//!
//! 1.  **Mutation:** for target `i`, three other distinct members `a, b, c`
//!     form `a + F * (b - c)`, clipped to the bounds.
//! 2.  **Crossover:** each dimension comes from the mutant with probability
//!     `CR`; if none does, one random dimension is forced from the mutant.
//! 3.  **Selection:** the trial replaces the target only if strictly better,
//!     so every slot's fitness is non-increasing over generations.
//!
//! Kernel sizes are kept as reals during the search and coerced to the
//! nearest odd integer at or above the raw value whenever a blur is built.

use rand::seq::index;
use rand::Rng;

use crate::error::{ConfigError, Result};
use crate::filters::{apply_gaussian, coerce_odd_kernel};
use crate::image::ImageBuffer;
use crate::progress::{ProgressObserver, SMOOTHING_PHASE};

/// Kernel size of the reference blur.
pub const REFERENCE_KERNEL_SIZE: usize = 7;
/// Sigma of the reference blur.
pub const REFERENCE_SIGMA: f64 = 2.0;

const DIMS: usize = 2;

/// Search ranges for kernel size and sigma, inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBounds {
    pub kernel_size: (f64, f64),
    pub sigma: (f64, f64),
}

impl Default for GaussianBounds {
    fn default() -> Self {
        Self {
            kernel_size: (5.0, 51.0),
            sigma: (0.1, 15.0),
        }
    }
}

impl GaussianBounds {
    pub fn new(kernel_size: (f64, f64), sigma: (f64, f64)) -> Self {
        Self { kernel_size, sigma }
    }

    /// Check that both ranges are finite, ordered and usable for a blur.
    ///
    /// The kernel range must also contain the odd sizes its ends coerce to,
    /// so an even upper end such as 50 is rejected.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let check = |name: &'static str, (low, high): (f64, f64), min: f64| {
            if !low.is_finite() || !high.is_finite() || low > high || low < min {
                Err(ConfigError::InvalidBounds { name, low, high })
            } else {
                Ok(())
            }
        };
        check("kernel size", self.kernel_size, 1.0)?;
        check("sigma", self.sigma, f64::MIN_POSITIVE)?;

        // Coercion is monotone, so the coerced ends bound every coerced kernel
        let (low, high) = self.kernel_size;
        if (coerce_odd_kernel(low) as f64) < low || coerce_odd_kernel(high) as f64 > high {
            return Err(ConfigError::InvalidBounds {
                name: "kernel size",
                low,
                high,
            });
        }
        Ok(())
    }

    #[inline]
    fn low(&self) -> [f64; DIMS] {
        [self.kernel_size.0, self.sigma.0]
    }

    #[inline]
    fn high(&self) -> [f64; DIMS] {
        [self.kernel_size.1, self.sigma.1]
    }
}

/// Differential evolution settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeConfig {
    /// Number of candidates, at least 4.
    pub population_size: usize,
    /// Number of generations to run.
    pub max_generations: usize,
    /// Differential weight `F`.
    pub mutation_factor: f64,
    /// Crossover probability `CR`.
    pub crossover_rate: f64,
}

impl Default for DeConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 10,
            mutation_factor: 0.7,
            crossover_rate: 0.8,
        }
    }
}

impl DeConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.population_size < 4 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        let f = self.mutation_factor;
        if !f.is_finite() {
            return Err(ConfigError::MutationFactor(f));
        }
        let cr = self.crossover_rate;
        if !(0.0..=1.0).contains(&cr) {
            return Err(ConfigError::CrossoverRate(cr));
        }
        Ok(())
    }
}

/// A point in (kernel size, sigma) space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    genes: [f64; DIMS],
}

impl Candidate {
    pub fn new(kernel_size: f64, sigma: f64) -> Self {
        Self {
            genes: [kernel_size, sigma],
        }
    }

    /// Kernel size as searched, before coercion.
    pub fn raw_kernel_size(&self) -> f64 {
        self.genes[0]
    }

    /// Kernel size coerced to an odd integer.
    pub fn kernel_size(&self) -> usize {
        coerce_odd_kernel(self.genes[0])
    }

    pub fn sigma(&self) -> f64 {
        self.genes[1]
    }
}

/// Candidates and their fitness, slot for slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    candidates: Vec<Candidate>,
    fitness: Vec<f64>,
}

impl Population {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn fitness(&self) -> &[f64] {
        &self.fitness
    }

    /// Slot with the lowest fitness; the first one on ties.
    pub fn best_index(&self) -> Option<usize> {
        self.fitness
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Fitness of Gaussian parameters against the reference blur of one image.
#[derive(Debug, Clone)]
pub struct GaussianObjective<'a> {
    image: &'a ImageBuffer,
    reference: ImageBuffer,
}

impl<'a> GaussianObjective<'a> {
    /// Blurs `image` once with the reference parameters.
    pub fn new(image: &'a ImageBuffer) -> Self {
        let reference = apply_gaussian(image, REFERENCE_KERNEL_SIZE, REFERENCE_SIGMA);
        Self { image, reference }
    }

    pub fn reference(&self) -> &ImageBuffer {
        &self.reference
    }

    /// Mean squared difference between the candidate's blur and the reference.
    pub fn evaluate(&self, candidate: &Candidate) -> Result<f64> {
        let blurred = apply_gaussian(self.image, candidate.kernel_size(), candidate.sigma());
        Ok(self.reference.mean_squared_error(&blurred)?)
    }
}

/// Result of a differential evolution run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeOutcome {
    /// Odd kernel size of the best candidate.
    pub kernel_size: usize,
    pub sigma: f64,
    /// Objective value of the best candidate.
    pub fitness: f64,
}

/// Differential evolution optimizer for Gaussian blur parameters.
///
/// Owns its random source so a seeded generator reproduces a run exactly.
#[derive(Debug, Clone)]
pub struct GaussianOptimizer<R> {
    config: DeConfig,
    rng: R,
}

impl<R> GaussianOptimizer<R>
where
    R: Rng,
{
    /// Creates an optimizer after validating `config`.
    pub fn new(config: DeConfig, rng: R) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &DeConfig {
        &self.config
    }

    /// Search for the Gaussian parameters closest to the reference blur.
    ///
    /// # Arguments
    /// * `bounds` - Search ranges for kernel size and sigma
    /// * `image` - Image both blurs are applied to
    /// * `progress` - Notified at the start of every generation
    ///
    /// # Returns
    /// Best candidate of the final population with its fitness
    pub fn optimize<P>(
        &mut self,
        bounds: &GaussianBounds,
        image: &ImageBuffer,
        progress: &mut P,
    ) -> Result<DeOutcome>
    where
        P: ProgressObserver + ?Sized,
    {
        bounds.validate()?;
        log::info!(
            "differential evolution: population {}, {} generations, F={}, CR={}",
            self.config.population_size,
            self.config.max_generations,
            self.config.mutation_factor,
            self.config.crossover_rate
        );

        let objective = GaussianObjective::new(image);
        let mut evaluate = |c: &Candidate| objective.evaluate(c);

        let mut population = self.initialize(bounds, &mut evaluate)?;
        let total = self.config.max_generations;

        for generation in 0..total {
            progress.on_progress(generation + 1, total, SMOOTHING_PHASE);
            let replaced = self.evolve(&mut population, bounds, &mut evaluate)?;

            if log::log_enabled!(log::Level::Debug) {
                let best = population.best_index().map(|i| population.fitness[i]);
                log::debug!(
                    "generation {}: {replaced} replaced, best fitness {best:?}",
                    generation + 1
                );
            }
        }

        let outcome = Self::outcome(&population);
        log::info!(
            "differential evolution finished: kernel {}, sigma {:.4}, fitness {:.6}",
            outcome.kernel_size,
            outcome.sigma,
            outcome.fitness
        );
        Ok(outcome)
    }

    /// Sample every candidate uniformly within `bounds` and evaluate it.
    pub fn initialize<F>(&mut self, bounds: &GaussianBounds, evaluate: &mut F) -> Result<Population>
    where
        F: FnMut(&Candidate) -> Result<f64>,
    {
        let (low, high) = (bounds.low(), bounds.high());
        let n = self.config.population_size;

        let mut candidates = Vec::with_capacity(n);
        let mut fitness = Vec::with_capacity(n);
        for _ in 0..n {
            let mut genes = [0.0; DIMS];
            for d in 0..DIMS {
                genes[d] = low[d] + self.rng.random::<f64>() * (high[d] - low[d]);
            }
            let candidate = Candidate { genes };
            fitness.push(evaluate(&candidate)?);
            candidates.push(candidate);
        }

        Ok(Population {
            candidates,
            fitness,
        })
    }

    /// Run one generation in place.
    ///
    /// # Returns
    /// Number of slots whose candidate was replaced
    pub fn evolve<F>(
        &mut self,
        population: &mut Population,
        bounds: &GaussianBounds,
        evaluate: &mut F,
    ) -> Result<usize>
    where
        F: FnMut(&Candidate) -> Result<f64>,
    {
        let (low, high) = (bounds.low(), bounds.high());
        let n = population.len();
        let f = self.config.mutation_factor;
        let cr = self.config.crossover_rate;
        let mut replaced = 0;

        for i in 0..n {
            let [a, b, c] = self.pick_donors(n, i);
            let (a, b, c) = (
                population.candidates[a].genes,
                population.candidates[b].genes,
                population.candidates[c].genes,
            );

            let mut mutant = [0.0; DIMS];
            for d in 0..DIMS {
                mutant[d] = (a[d] + f * (b[d] - c[d])).clamp(low[d], high[d]);
            }

            let mut cross = [false; DIMS];
            for flag in cross.iter_mut() {
                *flag = self.rng.random::<f64>() < cr;
            }
            if !cross.iter().any(|&x| x) {
                cross[self.rng.random_range(0..DIMS)] = true;
            }

            let target = population.candidates[i].genes;
            let mut genes = target;
            for d in 0..DIMS {
                if cross[d] {
                    genes[d] = mutant[d];
                }
            }

            let trial = Candidate { genes };
            let trial_fitness = evaluate(&trial)?;
            if trial_fitness < population.fitness[i] {
                population.fitness[i] = trial_fitness;
                population.candidates[i] = trial;
                replaced += 1;
            }
        }

        Ok(replaced)
    }

    /// Three distinct slots, none equal to `target`.
    fn pick_donors(&mut self, n: usize, target: usize) -> [usize; 3] {
        let picked = index::sample(&mut self.rng, n - 1, 3);
        let mut donors = [0; 3];
        for (slot, idx) in donors.iter_mut().zip(picked.iter()) {
            *slot = if idx >= target { idx + 1 } else { idx };
        }
        donors
    }

    fn outcome(population: &Population) -> DeOutcome {
        // Population size is validated to be at least 4
        let best = population.best_index().unwrap_or(0);
        let candidate = population.candidates[best];
        DeOutcome {
            kernel_size: candidate.kernel_size(),
            sigma: candidate.sigma(),
            fitness: population.fitness[best],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gray_image() -> ImageBuffer {
        ImageBuffer::from_u8(Array3::from_elem((12, 12, 3), 128u8)).unwrap()
    }

    fn textured_image() -> ImageBuffer {
        let data = Array3::from_shape_fn((14, 14, 3), |(y, x, c)| {
            (((x * 37) ^ (y * 91) ^ (c * 13)) % 256) as u8
        });
        ImageBuffer::from_u8(data).unwrap()
    }

    fn config(population_size: usize, max_generations: usize) -> DeConfig {
        DeConfig {
            population_size,
            max_generations,
            ..DeConfig::default()
        }
    }

    fn sphere(c: &Candidate) -> Result<f64> {
        let dk = c.raw_kernel_size() - 7.0;
        let ds = c.sigma() - 2.0;
        Ok(dk * dk + ds * ds)
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            config(3, 1).validate().unwrap_err(),
            ConfigError::PopulationTooSmall(3)
        );
        let bad_f = DeConfig {
            mutation_factor: f64::INFINITY,
            ..DeConfig::default()
        };
        assert_eq!(
            bad_f.validate().unwrap_err(),
            ConfigError::MutationFactor(f64::INFINITY)
        );
        for f in [0.0, -0.5, 3.0] {
            let any_f = DeConfig {
                mutation_factor: f,
                ..DeConfig::default()
            };
            assert!(any_f.validate().is_ok());
        }
        let bad_cr = DeConfig {
            crossover_rate: 1.5,
            ..DeConfig::default()
        };
        assert_eq!(bad_cr.validate().unwrap_err(), ConfigError::CrossoverRate(1.5));
        assert!(DeConfig::default().validate().is_ok());
        assert!(GaussianOptimizer::new(config(2, 1), StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_bounds_validation() {
        assert!(GaussianBounds::default().validate().is_ok());
        let reversed = GaussianBounds::new((51.0, 5.0), (0.1, 15.0));
        assert!(matches!(
            reversed.validate(),
            Err(ConfigError::InvalidBounds { name: "kernel size", .. })
        ));
        let zero_sigma = GaussianBounds::new((5.0, 51.0), (0.0, 15.0));
        assert!(matches!(
            zero_sigma.validate(),
            Err(ConfigError::InvalidBounds { name: "sigma", .. })
        ));
        let nan = GaussianBounds::new((5.0, f64::NAN), (0.1, 15.0));
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_kernel_bounds_must_contain_coerced_sizes() {
        for kernel in [(5.0, 50.0), (8.0, 8.0), (5.0, 8.5), (5.5, 51.0)] {
            let bounds = GaussianBounds::new(kernel, (0.1, 15.0));
            assert!(
                matches!(
                    bounds.validate(),
                    Err(ConfigError::InvalidBounds { name: "kernel size", .. })
                ),
                "{kernel:?} accepted"
            );
        }
        for kernel in [(5.0, 51.0), (4.0, 9.0), (6.5, 9.9), (9.0, 9.0)] {
            assert!(GaussianBounds::new(kernel, (0.1, 15.0)).validate().is_ok());
        }

        let mut optimizer =
            GaussianOptimizer::new(config(4, 1), StdRng::seed_from_u64(1)).unwrap();
        let result = optimizer.optimize(
            &GaussianBounds::new((8.0, 8.0), (2.0, 2.0)),
            &textured_image(),
            &mut NoProgress,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_crossover_takes_one_gene_from_mutant() {
        let bounds = GaussianBounds::new((5.0, 21.0), (0.5, 6.0));
        let de = DeConfig {
            crossover_rate: 0.0,
            ..config(6, 1)
        };
        let mut optimizer = GaussianOptimizer::new(de, StdRng::seed_from_u64(11)).unwrap();
        let mut evaluate = sphere;
        let mut population = optimizer.initialize(&bounds, &mut evaluate).unwrap();
        let before = population.clone();

        // Replays the draws of one generation on a copy of the random source
        let mut replay = optimizer.clone();
        let mut trials = Vec::new();
        let mut reject_all = |c: &Candidate| -> Result<f64> {
            trials.push(*c);
            Ok(f64::INFINITY)
        };
        let replaced = optimizer
            .evolve(&mut population, &bounds, &mut reject_all)
            .unwrap();
        assert_eq!(replaced, 0);
        assert_eq!(population, before);
        assert_eq!(trials.len(), 6);

        let (low, high) = (bounds.low(), bounds.high());
        for (i, trial) in trials.iter().enumerate() {
            let [a, b, c] = replay.pick_donors(6, i);
            let (a, b, c) = (
                before.candidates[a].genes,
                before.candidates[b].genes,
                before.candidates[c].genes,
            );
            for _ in 0..DIMS {
                let _ = replay.rng.random::<f64>();
            }
            let forced = replay.rng.random_range(0..DIMS);

            let target = before.candidates[i].genes;
            for d in 0..DIMS {
                if d == forced {
                    let mutant = (a[d] + de.mutation_factor * (b[d] - c[d])).clamp(low[d], high[d]);
                    assert_eq!(trial.genes[d], mutant);
                } else {
                    assert_eq!(trial.genes[d], target[d]);
                }
            }
        }
    }

    #[test]
    fn test_single_generation_on_gray_image() {
        let mut optimizer =
            GaussianOptimizer::new(config(50, 1), StdRng::seed_from_u64(42)).unwrap();
        let outcome = optimizer
            .optimize(&GaussianBounds::default(), &gray_image(), &mut NoProgress)
            .unwrap();

        assert_eq!(outcome.kernel_size % 2, 1);
        assert!((5..=51).contains(&outcome.kernel_size));
        assert!((0.1..=15.0).contains(&outcome.sigma));
        assert!(outcome.fitness >= 0.0);
    }

    #[test]
    fn test_fitness_never_worsens_per_slot() {
        let bounds = GaussianBounds::default();
        let mut optimizer =
            GaussianOptimizer::new(config(12, 1), StdRng::seed_from_u64(9)).unwrap();
        let mut evaluate = sphere;
        let mut population = optimizer.initialize(&bounds, &mut evaluate).unwrap();

        for _ in 0..30 {
            let before = population.fitness().to_vec();
            optimizer
                .evolve(&mut population, &bounds, &mut evaluate)
                .unwrap();
            for (new, old) in population.fitness().iter().zip(before.iter()) {
                assert!(new <= old);
            }
        }

        // The sphere minimum sits inside the bounds
        let best = population.best_index().unwrap();
        assert!(population.fitness()[best] < 1.0);
    }

    #[test]
    fn test_candidates_stay_within_bounds() {
        let bounds = GaussianBounds::new((5.0, 9.0), (0.5, 1.0));
        let mut optimizer =
            GaussianOptimizer::new(config(8, 1), StdRng::seed_from_u64(5)).unwrap();
        let mut evaluate = sphere;
        let mut population = optimizer.initialize(&bounds, &mut evaluate).unwrap();
        for _ in 0..10 {
            optimizer
                .evolve(&mut population, &bounds, &mut evaluate)
                .unwrap();
            for c in population.candidates() {
                assert!((5.0..=9.0).contains(&c.raw_kernel_size()));
                assert!((0.5..=1.0).contains(&c.sigma()));
            }
        }
    }

    #[test]
    fn test_zero_width_bounds_are_a_fixed_point() {
        let bounds = GaussianBounds::new((9.0, 9.0), (2.0, 2.0));
        let mut optimizer =
            GaussianOptimizer::new(config(4, 2), StdRng::seed_from_u64(1)).unwrap();
        let outcome = optimizer
            .optimize(&bounds, &textured_image(), &mut NoProgress)
            .unwrap();
        assert_eq!(outcome.kernel_size, 9);
        assert_eq!(outcome.sigma, 2.0);
    }

    #[test]
    fn test_reference_parameters_have_zero_fitness() {
        let image = textured_image();
        let objective = GaussianObjective::new(&image);
        let exact = objective.evaluate(&Candidate::new(7.0, 2.0)).unwrap();
        // 6.x coerces to 7 as well
        let coerced = objective.evaluate(&Candidate::new(6.4, 2.0)).unwrap();
        let far = objective.evaluate(&Candidate::new(31.0, 12.0)).unwrap();
        assert_eq!(exact, 0.0);
        assert_eq!(coerced, 0.0);
        assert!(far > 0.0);
    }

    #[test]
    fn test_progress_once_per_generation() {
        let mut calls = Vec::new();
        let mut optimizer =
            GaussianOptimizer::new(config(4, 3), StdRng::seed_from_u64(3)).unwrap();
        optimizer
            .optimize(
                &GaussianBounds::new((5.0, 9.0), (0.5, 3.0)),
                &gray_image(),
                &mut |c: usize, t: usize, p: &str| calls.push((c, t, p.to_string())),
            )
            .unwrap();
        let expected: Vec<_> = (1..=3).map(|c| (c, 3, SMOOTHING_PHASE.to_string())).collect();
        assert_eq!(calls, expected);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut optimizer =
                GaussianOptimizer::new(config(6, 2), StdRng::seed_from_u64(77)).unwrap();
            optimizer
                .optimize(
                    &GaussianBounds::new((5.0, 15.0), (0.5, 4.0)),
                    &textured_image(),
                    &mut NoProgress,
                )
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_donors_are_distinct_from_target() {
        let mut optimizer =
            GaussianOptimizer::new(config(4, 1), StdRng::seed_from_u64(0)).unwrap();
        for _ in 0..200 {
            for target in 0..4 {
                let donors = optimizer.pick_donors(4, target);
                assert!(!donors.contains(&target));
                assert_ne!(donors[0], donors[1]);
                assert_ne!(donors[1], donors[2]);
                assert_ne!(donors[0], donors[2]);
            }
        }
    }
}

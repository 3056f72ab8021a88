//! filtertune
//!
//! Search-based tuning of image restoration filters, with Python bindings
//! via PyO3 and WASM bindings for JavaScript.
//!
//! ## Optimizers
//! - **Differential evolution**: picks a Gaussian blur's kernel size and
//!   sigma so it matches a fixed reference blur (kernel 7, sigma 2.0)
//! - **Tabu search**: co-tunes a sharpen mask and a blur mask, maximizing
//!   the SNR of the filtered image against the image being searched
//!
//! [`pipeline::restore`] chains both: the image smoothed with the tuned
//! Gaussian is the input of the mask search.
//!
//! ## Image Format
//! Buffers are (height, width, 3) and carry a sample depth:
//! - `U8`: 8-bit per channel (0-255), filter output saturates like 8-bit convolution
//! - `F32`: float per channel, filter output is not quantized
//!
//! ## Randomness
//! Optimizers take an explicit `rand::Rng`, so seeded runs are reproducible.

pub mod error;
pub mod filters;
pub mod image;
pub mod mask;
pub mod metric;
pub mod optimize;
pub mod pipeline;
pub mod progress;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{ConfigError, Error, ImageError, Result};
pub use image::{ImageBuffer, SampleDepth};
pub use mask::{init_masks, Mask};
pub use metric::snr;
pub use optimize::{
    DeConfig, DeOutcome, GaussianBounds, GaussianOptimizer, MaskOptimizer, MaskPair, TabuConfig,
    TabuOutcome,
};
pub use pipeline::{restore, RestoreConfig, RestoreOutcome};
pub use progress::{LogProgress, NoProgress, ProgressObserver};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::filters;
    use crate::image::ImageBuffer;
    use crate::mask::{self, Mask};
    use crate::metric;
    use crate::optimize::{DeConfig, GaussianBounds, GaussianOptimizer, MaskOptimizer, TabuConfig};
    use crate::pipeline::{self, RestoreConfig};
    use crate::progress::ProgressObserver;

    fn value_error(err: impl Into<crate::Error>) -> PyErr {
        PyValueError::new_err(err.into().to_string())
    }

    fn image_from(image: PyReadonlyArray3<'_, u8>) -> PyResult<ImageBuffer> {
        ImageBuffer::from_u8(image.as_array().to_owned()).map_err(value_error)
    }

    fn mask_from(mask: PyReadonlyArray2<'_, f64>) -> PyResult<Mask> {
        Mask::new(mask.as_array().to_owned()).map_err(value_error)
    }

    fn rng_from(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Forwards progress to an optional Python callable `(current, total, message)`.
    struct PyProgress<'py> {
        callback: Option<Bound<'py, PyAny>>,
    }

    impl ProgressObserver for PyProgress<'_> {
        fn on_progress(&mut self, completed: usize, total: usize, phase: &str) {
            if let Some(callback) = &self.callback {
                if let Err(err) = callback.call1((completed, total, phase)) {
                    log::warn!("progress callback raised: {err}");
                }
            }
        }
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Blur an RGB u8 image with a Gaussian kernel.
    ///
    /// Even kernel sizes are bumped to the next odd size.
    #[pyfunction]
    pub fn apply_gaussian<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        kernel_size: usize,
        sigma: f64,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        if !(sigma > 0.0) {
            return Err(PyValueError::new_err(format!("sigma must be positive, got {sigma}")));
        }
        let image = image_from(image)?;
        let kernel_size = filters::coerce_odd_kernel(kernel_size as f64);
        let result = filters::apply_gaussian(&image, kernel_size, sigma);
        Ok(result.to_u8().into_pyarray(py))
    }

    /// Apply a sharp mask, then a blur mask, to every channel.
    #[pyfunction]
    pub fn apply_mask_pair<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        blur_mask: PyReadonlyArray2<'py, f64>,
        sharp_mask: PyReadonlyArray2<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let image = image_from(image)?;
        let blur = mask_from(blur_mask)?;
        let sharp = mask_from(sharp_mask)?;
        let result = filters::apply_mask_pair(&image, &blur, &sharp);
        Ok(result.to_u8().into_pyarray(py))
    }

    /// SNR of `processed` against `reference` in dB; `inf` when identical.
    #[pyfunction]
    pub fn snr<'py>(
        reference: PyReadonlyArray3<'py, u8>,
        processed: PyReadonlyArray3<'py, u8>,
    ) -> PyResult<f64> {
        let reference = image_from(reference)?;
        let processed = image_from(processed)?;
        metric::snr(&reference, &processed).map_err(value_error)
    }

    /// Random (blur_mask, sharp_mask) of the given odd size.
    #[pyfunction]
    #[pyo3(signature = (size=5, seed=None))]
    pub fn init_masks<'py>(
        py: Python<'py>,
        size: usize,
        seed: Option<u64>,
    ) -> PyResult<(Bound<'py, PyArray2<f64>>, Bound<'py, PyArray2<f64>>)> {
        let mut rng = rng_from(seed);
        let (blur, sharp) = mask::init_masks(size, &mut rng).map_err(value_error)?;
        Ok((
            blur.into_cells().into_pyarray(py),
            sharp.into_cells().into_pyarray(py),
        ))
    }

    // ========================================================================
    // Optimizers
    // ========================================================================

    /// Differential evolution over Gaussian parameters.
    ///
    /// Returns `(kernel_size, sigma, fitness)`.
    #[pyfunction]
    #[pyo3(signature = (
        image,
        population_size=50,
        max_generations=10,
        mutation_factor=0.7,
        crossover_rate=0.8,
        kernel_bounds=(5.0, 51.0),
        sigma_bounds=(0.1, 15.0),
        seed=None,
        progress=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn optimize_gaussian<'py>(
        image: PyReadonlyArray3<'py, u8>,
        population_size: usize,
        max_generations: usize,
        mutation_factor: f64,
        crossover_rate: f64,
        kernel_bounds: (f64, f64),
        sigma_bounds: (f64, f64),
        seed: Option<u64>,
        progress: Option<Bound<'py, PyAny>>,
    ) -> PyResult<(usize, f64, f64)> {
        let image = image_from(image)?;
        let config = DeConfig {
            population_size,
            max_generations,
            mutation_factor,
            crossover_rate,
        };
        let mut optimizer = GaussianOptimizer::new(config, rng_from(seed)).map_err(value_error)?;
        let bounds = GaussianBounds::new(kernel_bounds, sigma_bounds);
        let outcome = optimizer
            .optimize(&bounds, &image, &mut PyProgress { callback: progress })
            .map_err(value_error)?;
        Ok((outcome.kernel_size, outcome.sigma, outcome.fitness))
    }

    /// Tabu search over mask pairs.
    ///
    /// Returns `(best_blur_mask, best_sharp_mask, best_snr)`.
    #[pyfunction]
    #[pyo3(signature = (image, blur_mask, sharp_mask, iterations=10, tabu_capacity=10, progress=None))]
    pub fn optimize_masks<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        blur_mask: PyReadonlyArray2<'py, f64>,
        sharp_mask: PyReadonlyArray2<'py, f64>,
        iterations: usize,
        tabu_capacity: usize,
        progress: Option<Bound<'py, PyAny>>,
    ) -> PyResult<(Bound<'py, PyArray2<f64>>, Bound<'py, PyArray2<f64>>, f64)> {
        let image = image_from(image)?;
        let blur = mask_from(blur_mask)?;
        let sharp = mask_from(sharp_mask)?;
        let config = TabuConfig {
            iterations,
            tabu_capacity,
            ..TabuConfig::default()
        };
        let mut optimizer = MaskOptimizer::new(config).map_err(value_error)?;
        let outcome = optimizer
            .optimize(&blur, &sharp, &image, &mut PyProgress { callback: progress })
            .map_err(value_error)?;
        Ok((
            outcome.blur.into_cells().into_pyarray(py),
            outcome.sharp.into_cells().into_pyarray(py),
            outcome.snr,
        ))
    }

    /// Full restoration: Gaussian smoothing followed by mask sharpening.
    ///
    /// Returns `(denoised, sharpened, blur_mask, sharp_mask, snr)`.
    #[pyfunction]
    #[pyo3(signature = (image, blur_iterations=10, sharp_iterations=10, seed=None, progress=None))]
    #[allow(clippy::type_complexity)]
    pub fn restore<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        blur_iterations: usize,
        sharp_iterations: usize,
        seed: Option<u64>,
        progress: Option<Bound<'py, PyAny>>,
    ) -> PyResult<(
        Bound<'py, PyArray3<u8>>,
        Bound<'py, PyArray3<u8>>,
        Bound<'py, PyArray2<f64>>,
        Bound<'py, PyArray2<f64>>,
        f64,
    )> {
        let image = image_from(image)?;
        let config = RestoreConfig {
            blur_iterations,
            sharp_iterations,
            seed,
            ..RestoreConfig::default()
        };
        let outcome = pipeline::restore(&image, &config, &mut PyProgress { callback: progress })
            .map_err(value_error)?;
        Ok((
            outcome.denoised.to_u8().into_pyarray(py),
            outcome.sharpened.to_u8().into_pyarray(py),
            outcome.blur_mask.into_cells().into_pyarray(py),
            outcome.sharp_mask.into_cells().into_pyarray(py),
            outcome.snr,
        ))
    }

    /// Python module definition
    #[pymodule]
    pub fn filtertune(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Filters
        m.add_function(wrap_pyfunction!(apply_gaussian, m)?)?;
        m.add_function(wrap_pyfunction!(apply_mask_pair, m)?)?;
        m.add_function(wrap_pyfunction!(snr, m)?)?;
        m.add_function(wrap_pyfunction!(init_masks, m)?)?;

        // Optimizers
        m.add_function(wrap_pyfunction!(optimize_gaussian, m)?)?;
        m.add_function(wrap_pyfunction!(optimize_masks, m)?)?;
        m.add_function(wrap_pyfunction!(restore, m)?)?;

        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::filtertune;

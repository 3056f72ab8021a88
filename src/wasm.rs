//! WebAssembly exports for filtertune.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! ## Data Layout
//!
//! Images cross the boundary as flat RGB u8 arrays (length = width * height * 3).
//! Masks are flat row-major f64 arrays of `mask_size * mask_size` weights.
//! Invalid input is reported as a thrown JS error string.

use ndarray::Array2;
use wasm_bindgen::prelude::*;

use crate::filters::{apply_gaussian, apply_mask_pair, coerce_odd_kernel};
use crate::image::ImageBuffer;
use crate::mask::Mask;
use crate::metric::snr;
use crate::pipeline::{restore, RestoreConfig};
use crate::progress::LogProgress;

fn js_error(err: impl Into<crate::Error>) -> JsValue {
    JsValue::from_str(&err.into().to_string())
}

fn image_from(data: &[u8], width: usize, height: usize) -> Result<ImageBuffer, JsValue> {
    ImageBuffer::from_raw_u8(data, width, height).map_err(js_error)
}

fn mask_from(weights: &[f64], mask_size: usize) -> Result<Mask, JsValue> {
    let cells = Array2::from_shape_vec((mask_size, mask_size), weights.to_vec()).map_err(|_| {
        JsValue::from_str(&format!(
            "mask has {} weights, expected {mask_size}x{mask_size}",
            weights.len()
        ))
    })?;
    Mask::new(cells).map_err(js_error)
}

// ============================================================================
// Filters
// ============================================================================

/// Blur an RGB u8 image with a Gaussian kernel.
///
/// # Arguments
/// * `data` - Flat array of RGB bytes (length = width * height * 3)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `kernel_size` - Kernel side length; even sizes are bumped to the next odd size
/// * `sigma` - Standard deviation, must be positive
///
/// # Returns
/// Flat array of blurred RGB bytes
#[wasm_bindgen]
pub fn apply_gaussian_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    kernel_size: usize,
    sigma: f64,
) -> Result<Vec<u8>, JsValue> {
    if !(sigma > 0.0) {
        return Err(JsValue::from_str(&format!("sigma must be positive, got {sigma}")));
    }
    let image = image_from(data, width, height)?;
    let result = apply_gaussian(&image, coerce_odd_kernel(kernel_size as f64), sigma);
    Ok(result.to_raw_u8())
}

/// Apply a sharp mask, then a blur mask, to an RGB u8 image.
///
/// # Arguments
/// * `data` - Flat array of RGB bytes (length = width * height * 3)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `blur_mask` - Row-major blur weights
/// * `sharp_mask` - Row-major sharp weights
/// * `mask_size` - Side length of both masks (odd)
///
/// # Returns
/// Flat array of filtered RGB bytes
#[wasm_bindgen]
pub fn apply_mask_pair_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    blur_mask: &[f64],
    sharp_mask: &[f64],
    mask_size: usize,
) -> Result<Vec<u8>, JsValue> {
    let image = image_from(data, width, height)?;
    let blur = mask_from(blur_mask, mask_size)?;
    let sharp = mask_from(sharp_mask, mask_size)?;
    Ok(apply_mask_pair(&image, &blur, &sharp).to_raw_u8())
}

/// Signal-to-noise ratio of `processed` against `reference` in dB.
///
/// Returns `Infinity` when the images are identical.
#[wasm_bindgen]
pub fn snr_wasm(
    reference: &[u8],
    processed: &[u8],
    width: usize,
    height: usize,
) -> Result<f64, JsValue> {
    let reference = image_from(reference, width, height)?;
    let processed = image_from(processed, width, height)?;
    snr(&reference, &processed).map_err(js_error)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the full restoration pipeline with a fixed seed.
///
/// # Arguments
/// * `data` - Flat array of RGB bytes (length = width * height * 3)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `blur_iterations` - Differential evolution generations
/// * `sharp_iterations` - Tabu search iterations
/// * `seed` - Random seed
///
/// # Returns
/// Flat array of the sharpened RGB bytes
#[wasm_bindgen]
pub fn restore_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    blur_iterations: usize,
    sharp_iterations: usize,
    seed: u64,
) -> Result<Vec<u8>, JsValue> {
    let image = image_from(data, width, height)?;
    let config = RestoreConfig {
        blur_iterations,
        sharp_iterations,
        seed: Some(seed),
        ..RestoreConfig::default()
    };
    let outcome = restore(&image, &config, &mut LogProgress).map_err(js_error)?;
    Ok(outcome.sharpened.to_raw_u8())
}

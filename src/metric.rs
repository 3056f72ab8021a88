//! Signal-to-noise ratio between a reference and a processed image.

use crate::error::ImageError;
use crate::image::ImageBuffer;

/// Compute the SNR of `processed` against `reference`, in decibels.
///
/// Signal power is the mean squared reference sample and noise power the
/// mean squared difference. Returns `f64::INFINITY` when the two images
/// are sample-identical. The ratio is taken as `20 * log10(signal / noise)`.
///
/// # Errors
/// Returns [`ImageError::ShapeMismatch`] if the images differ in shape.
pub fn snr(reference: &ImageBuffer, processed: &ImageBuffer) -> Result<f64, ImageError> {
    reference.check_same_shape(processed)?;

    let mut signal = 0.0f64;
    let mut noise = 0.0f64;
    for (&r, &p) in reference.view().iter().zip(processed.view().iter()) {
        let r = r as f64;
        let d = p as f64 - r;
        signal += r * r;
        noise += d * d;
    }

    if noise == 0.0 {
        return Ok(f64::INFINITY);
    }

    // Both sums share the same sample count, so the means cancel
    Ok(20.0 * (signal / noise).log10())
}

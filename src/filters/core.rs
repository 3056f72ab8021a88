//! Core utilities shared by the filters.
//!
//! This module provides:
//! - Gaussian kernel generation for an explicit kernel size
//! - Kernel size coercion (odd sizes only)
//! - Reflect-101 border extrapolation
//! - 2D and separable correlation of single channel planes
//! - Per-channel dispatch over an image buffer
//!
//! Kernels are applied as correlations anchored at their center (no kernel
//! flip), so a mask with a single 1 at offset (dy, dx) from the center
//! samples `input[y + dy, x + dx]`.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;

use crate::image::{ImageBuffer, SampleDepth, CHANNELS};

/// Coerce a raw kernel size to the nearest odd value at or above it.
///
/// The raw value is truncated toward zero first; an even result is bumped
/// by one. Values below 1 become 1.
#[inline]
pub fn coerce_odd_kernel(raw: f64) -> usize {
    let size = if raw.is_finite() && raw > 0.0 { raw as usize } else { 0 };
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Generate a 1D Gaussian kernel of a given size.
///
/// # Arguments
/// * `size` - Number of taps, odd and at least 1
/// * `sigma` - Standard deviation, must be positive
///
/// # Returns
/// Normalized kernel whose taps sum to 1
pub fn gaussian_kernel_1d(size: usize, sigma: f64) -> Vec<f64> {
    debug_assert!(size % 2 == 1, "gaussian kernel size must be odd, got {size}");
    debug_assert!(sigma > 0.0, "gaussian sigma must be positive, got {sigma}");

    let half = (size as f64 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);

    let mut kernel: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - half;
            (scale * x * x).exp()
        })
        .collect();

    // Normalize
    let sum: f64 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }

    kernel
}

/// Map an out-of-range coordinate back into `0..len` using reflect-101
/// extrapolation (`dcb|abcd|cba`).
#[inline]
pub fn reflect_101(mut p: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let n = len as isize;
    while p < 0 || p >= n {
        if p < 0 {
            p = -p;
        } else {
            p = 2 * n - p - 2;
        }
    }
    p as usize
}

/// Correlate a single plane with a 2D kernel.
///
/// # Arguments
/// * `plane` - Channel plane (height, width)
/// * `kernel` - Kernel with odd side lengths, anchored at its center
/// * `depth` - Sample depth used to quantize the result
///
/// # Returns
/// Filtered plane with the same dimensions
pub fn correlate_plane(
    plane: ArrayView2<f32>,
    kernel: ArrayView2<f64>,
    depth: SampleDepth,
) -> Array2<f32> {
    let (height, width) = plane.dim();
    let (kh, kw) = kernel.dim();
    let (ay, ax) = ((kh / 2) as isize, (kw / 2) as isize);

    let mut output = Array2::<f32>::zeros((height, width));

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f64;
            for ky in 0..kh {
                let sy = reflect_101(y as isize + ky as isize - ay, height);
                for kx in 0..kw {
                    let kv = kernel[[ky, kx]];
                    if kv == 0.0 {
                        continue;
                    }
                    let sx = reflect_101(x as isize + kx as isize - ax, width);
                    sum += plane[[sy, sx]] as f64 * kv;
                }
            }
            output[[y, x]] = depth.quantize(sum as f32);
        }
    }

    output
}

/// Correlate a single plane with a separable kernel (`column ⊗ row`).
///
/// Equivalent to [`correlate_plane`] with the outer product of the two
/// kernels; quantization happens once, after both passes.
pub fn correlate_plane_separable(
    plane: ArrayView2<f32>,
    row_kernel: &[f64],
    column_kernel: &[f64],
    depth: SampleDepth,
) -> Array2<f32> {
    let (height, width) = plane.dim();
    let half_x = (row_kernel.len() / 2) as isize;
    let half_y = (column_kernel.len() / 2) as isize;

    // Horizontal pass
    let mut temp = Array2::<f64>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f64;
            for (ki, &kv) in row_kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + ki as isize - half_x, width);
                sum += plane[[y, sx]] as f64 * kv;
            }
            temp[[y, x]] = sum;
        }
    }

    // Vertical pass
    let mut output = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f64;
            for (ki, &kv) in column_kernel.iter().enumerate() {
                let sy = reflect_101(y as isize + ki as isize - half_y, height);
                sum += temp[[sy, x]] * kv;
            }
            output[[y, x]] = depth.quantize(sum as f32);
        }
    }

    output
}

/// Run a plane filter over every channel and reassemble the result.
///
/// Channels are processed in parallel; output keeps the input's channel
/// order and sample depth.
pub fn map_planes<F>(image: &ImageBuffer, filter: F) -> ImageBuffer
where
    F: Fn(ArrayView2<f32>) -> Array2<f32> + Sync,
{
    let planes: Vec<Array2<f32>> = (0..CHANNELS)
        .into_par_iter()
        .map(|c| filter(image.plane(c)))
        .collect();

    let mut data = Array3::<f32>::zeros(image.dim());
    for (c, plane) in planes.iter().enumerate() {
        data.index_axis_mut(Axis(2), c).assign(plane);
    }
    ImageBuffer::from_validated(data, image.depth())
}

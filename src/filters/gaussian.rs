//! Gaussian blur with an explicit kernel size.
//!
//! Uses separable 2-pass correlation per channel. The kernel size and
//! sigma are taken as given: callers coerce even sizes with
//! [`coerce_odd_kernel`](super::core::coerce_odd_kernel) before calling.

use crate::image::ImageBuffer;

use super::core::{correlate_plane_separable, gaussian_kernel_1d, map_planes};

/// Apply a Gaussian blur to every channel.
///
/// # Arguments
/// * `image` - 3-channel image
/// * `kernel_size` - Odd number of taps per axis
/// * `sigma` - Standard deviation of the Gaussian, positive
///
/// # Returns
/// Blurred image with the same shape and sample depth
pub fn apply_gaussian(image: &ImageBuffer, kernel_size: usize, sigma: f64) -> ImageBuffer {
    let kernel = gaussian_kernel_1d(kernel_size, sigma);
    let depth = image.depth();
    map_planes(image, |plane| {
        correlate_plane_separable(plane, &kernel, &kernel, depth)
    })
}

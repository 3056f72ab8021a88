//! Sharpen-then-blur mask pair filter.
//!
//! Each color channel is correlated with the sharp mask, and that result is
//! correlated with the blur mask. Both stages quantize to the image's
//! sample depth, so an 8-bit image saturates after sharpening before it is
//! blurred.

use crate::image::ImageBuffer;
use crate::mask::Mask;

use super::core::{correlate_plane, map_planes};

/// Apply a sharp mask and then a blur mask to every channel.
///
/// # Arguments
/// * `image` - 3-channel image
/// * `blur_mask` - Second-stage kernel
/// * `sharp_mask` - First-stage kernel
///
/// # Returns
/// New image with channels in the original order
pub fn apply_mask_pair(image: &ImageBuffer, blur_mask: &Mask, sharp_mask: &Mask) -> ImageBuffer {
    let depth = image.depth();
    map_planes(image, |plane| {
        let sharp = correlate_plane(plane, sharp_mask.view(), depth);
        correlate_plane(sharp.view(), blur_mask.view(), depth)
    })
}

/// Apply a single mask to every channel.
///
/// Used to share the sharpening stage between many blur masks.
pub fn apply_mask(image: &ImageBuffer, mask: &Mask) -> ImageBuffer {
    let depth = image.depth();
    map_planes(image, |plane| correlate_plane(plane, mask.view(), depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn pattern_image() -> ImageBuffer {
        let data = Array3::from_shape_fn((8, 9, 3), |(y, x, c)| {
            ((x * 17 + y * 31 + c * 7) % 200) as u8
        });
        ImageBuffer::from_u8(data).unwrap()
    }

    fn delta(size: usize, dy: isize, dx: isize) -> Mask {
        let center = (size / 2) as isize;
        let mut cells = Array2::<f64>::zeros((size, size));
        cells[[(center + dy) as usize, (center + dx) as usize]] = 1.0;
        Mask::new(cells).unwrap()
    }

    #[test]
    fn test_offset_blur_mask_shifts_each_channel() {
        let img = pattern_image();
        let sharp = delta(5, 0, 0);
        let blur = delta(5, 1, -2);
        let out = apply_mask_pair(&img, &blur, &sharp);

        let (src, dst) = (img.view(), out.view());
        for y in 0..img.height() - 1 {
            for x in 2..img.width() {
                for c in 0..3 {
                    assert_eq!(dst[[y, x, c]], src[[y + 1, x - 2, c]]);
                }
            }
        }
    }

    #[test]
    fn test_zero_sharp_mask_blanks_image() {
        let img = pattern_image();
        let sharp = Mask::new(Array2::zeros((5, 5))).unwrap();
        let out = apply_mask_pair(&img, &delta(5, 0, 0), &sharp);
        assert!(out.view().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let img = pattern_image();
        let before = img.clone();
        let _ = apply_mask_pair(&img, &Mask::uniform(3), &delta(3, 0, 0));
        assert_eq!(img, before);
    }

    #[test]
    fn test_u8_saturates_between_stages() {
        let img = ImageBuffer::from_u8(Array3::from_elem((4, 4, 3), 200u8)).unwrap();
        let mut boost = Array2::<f64>::zeros((3, 3));
        boost[[1, 1]] = 2.0;
        let sharp = Mask::new(boost).unwrap();
        let mut halve = Array2::<f64>::zeros((3, 3));
        halve[[1, 1]] = 0.5;
        let blur = Mask::new(halve).unwrap();

        // 200 * 2 saturates to 255 before halving
        let out = apply_mask_pair(&img, &blur, &sharp);
        assert!(out.view().iter().all(|&v| v == 128.0));
    }

    #[test]
    fn test_split_stages_match_pair() {
        let img = pattern_image();
        let sharp = delta(3, -1, 1);
        let blur = Mask::uniform(3);
        let staged = apply_mask(&apply_mask(&img, &sharp), &blur);
        assert_eq!(staged, apply_mask_pair(&img, &blur, &sharp));
    }
}

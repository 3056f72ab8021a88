//! Immutable 3-channel image value type.
//!
//! ## Format
//!
//! | Depth | Shape | Storage | Range |
//! |-------|-------|---------|-------|
//! | `U8`  | (H, W, 3) | f32 | 0.0-255.0, integral after every filter stage |
//! | `F32` | (H, W, 3) | f32 | unbounded |
//!
//! Samples are always stored as f32 so the filters share one code path.
//! The depth records what the caller handed in and decides how filter
//! output is quantized, which mirrors how 8-bit convolution saturates.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::error::ImageError;

/// Number of color channels every buffer carries.
pub const CHANNELS: usize = 3;

/// Sample depth of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleDepth {
    /// 8-bit samples: filter results are rounded and saturated to 0-255.
    #[default]
    U8,
    /// Float samples: filter results are kept as computed.
    F32,
}

impl SampleDepth {
    /// Quantize a filtered sample to this depth.
    #[inline]
    pub fn quantize(self, v: f32) -> f32 {
        match self {
            SampleDepth::U8 => v.round().clamp(0.0, 255.0),
            SampleDepth::F32 => v,
        }
    }
}

/// A validated (height, width, 3) image.
///
/// Buffers are never modified after construction; every filter returns a
/// new one.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    data: Array3<f32>,
    depth: SampleDepth,
}

impl ImageBuffer {
    fn validate(dim: (usize, usize, usize)) -> Result<(), ImageError> {
        let (height, width, channels) = dim;
        if channels != CHANNELS {
            return Err(ImageError::ChannelCount(channels));
        }
        if height == 0 || width == 0 {
            return Err(ImageError::Empty { height, width });
        }
        Ok(())
    }

    /// Wrap an 8-bit image.
    pub fn from_u8(image: Array3<u8>) -> Result<Self, ImageError> {
        Self::validate(image.dim())?;
        Ok(Self {
            data: image.mapv(|v| v as f32),
            depth: SampleDepth::U8,
        })
    }

    /// Wrap a float image.
    pub fn from_f32(image: Array3<f32>) -> Result<Self, ImageError> {
        Self::validate(image.dim())?;
        Ok(Self {
            data: image,
            depth: SampleDepth::F32,
        })
    }

    /// Build an 8-bit image from interleaved RGB bytes.
    pub fn from_raw_u8(data: &[u8], width: usize, height: usize) -> Result<Self, ImageError> {
        let expected = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(CHANNELS));
        if expected != Some(data.len()) {
            return Err(ImageError::BufferLength {
                len: data.len(),
                height,
                width,
            });
        }
        let image = Array3::from_shape_vec((height, width, CHANNELS), data.to_vec())
            .map_err(|_| ImageError::BufferLength {
                len: data.len(),
                height,
                width,
            })?;
        Self::from_u8(image)
    }

    /// Reassemble an image from per-channel planes, in channel order.
    pub fn from_planes(planes: &[Array2<f32>], depth: SampleDepth) -> Result<Self, ImageError> {
        if planes.len() != CHANNELS {
            return Err(ImageError::ChannelCount(planes.len()));
        }
        let expected = planes[0].dim();
        Self::validate((expected.0, expected.1, CHANNELS))?;

        let mut data = Array3::<f32>::zeros((expected.0, expected.1, CHANNELS));
        for (c, plane) in planes.iter().enumerate() {
            if plane.dim() != expected {
                return Err(ImageError::PlaneShape {
                    index: c,
                    found: plane.dim(),
                    expected,
                });
            }
            data.index_axis_mut(Axis(2), c).assign(plane);
        }
        Ok(Self { data, depth })
    }

    /// Wrap data already known to have a valid shape.
    pub(crate) fn from_validated(data: Array3<f32>, depth: SampleDepth) -> Self {
        debug_assert!(Self::validate(data.dim()).is_ok());
        Self { data, depth }
    }

    pub fn height(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn depth(&self) -> SampleDepth {
        self.depth
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Borrow a single channel plane.
    pub fn plane(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(2), channel)
    }

    /// Convert to 8-bit, saturating out-of-range samples.
    pub fn to_u8(&self) -> Array3<u8> {
        self.data.mapv(|v| v.round().clamp(0.0, 255.0) as u8)
    }

    /// Interleaved RGB bytes, row-major.
    pub fn to_raw_u8(&self) -> Vec<u8> {
        self.to_u8().iter().copied().collect()
    }

    /// Mean squared sample difference against another image of the same shape.
    pub fn mean_squared_error(&self, other: &ImageBuffer) -> Result<f64, ImageError> {
        self.check_same_shape(other)?;
        let sum: f64 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| {
                let d = a as f64 - b as f64;
                d * d
            })
            .sum();
        Ok(sum / self.data.len() as f64)
    }

    pub(crate) fn check_same_shape(&self, other: &ImageBuffer) -> Result<(), ImageError> {
        if self.dim() != other.dim() {
            return Err(ImageError::ShapeMismatch {
                left: self.dim(),
                right: other.dim(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_channel_count() {
        let img = Array3::<u8>::zeros((4, 4, 4));
        assert_eq!(
            ImageBuffer::from_u8(img).unwrap_err(),
            ImageError::ChannelCount(4)
        );
    }

    #[test]
    fn test_rejects_empty_image() {
        let img = Array3::<f32>::zeros((0, 4, 3));
        assert!(matches!(
            ImageBuffer::from_f32(img),
            Err(ImageError::Empty { height: 0, width: 4 })
        ));
    }

    #[test]
    fn test_raw_buffer_length_is_checked() {
        let data = vec![0u8; 10];
        assert!(matches!(
            ImageBuffer::from_raw_u8(&data, 2, 2),
            Err(ImageError::BufferLength { len: 10, .. })
        ));
    }

    #[test]
    fn test_raw_dimensions_that_overflow_are_rejected() {
        let data = vec![0u8; 12];
        for (width, height) in [(usize::MAX, 2), (usize::MAX / 2, 2), (2, usize::MAX / 3 + 1)] {
            assert!(matches!(
                ImageBuffer::from_raw_u8(&data, width, height),
                Err(ImageError::BufferLength { len: 12, .. })
            ));
        }
    }

    #[test]
    fn test_raw_layout_is_interleaved() {
        let data: Vec<u8> = (0..12).collect();
        let img = ImageBuffer::from_raw_u8(&data, 2, 2).unwrap();
        assert_eq!(img.dim(), (2, 2, 3));
        assert_eq!(img.view()[[0, 1, 2]], 5.0);
        assert_eq!(img.view()[[1, 0, 0]], 6.0);
        assert_eq!(img.to_raw_u8(), data);
    }

    #[test]
    fn test_planes_round_trip_in_channel_order() {
        let mut img = Array3::<u8>::zeros((3, 2, 3));
        for c in 0..3 {
            img.index_axis_mut(Axis(2), c).fill(10 * (c as u8 + 1));
        }
        let buffer = ImageBuffer::from_u8(img.clone()).unwrap();
        let planes: Vec<Array2<f32>> = (0..3).map(|c| buffer.plane(c).to_owned()).collect();
        let rebuilt = ImageBuffer::from_planes(&planes, buffer.depth()).unwrap();
        assert_eq!(rebuilt, buffer);
        assert_eq!(rebuilt.to_u8(), img);
    }

    #[test]
    fn test_u8_quantization_saturates() {
        assert_eq!(SampleDepth::U8.quantize(300.2), 255.0);
        assert_eq!(SampleDepth::U8.quantize(-4.0), 0.0);
        assert_eq!(SampleDepth::U8.quantize(12.6), 13.0);
        assert_eq!(SampleDepth::F32.quantize(-4.25), -4.25);
    }

    #[test]
    fn test_mean_squared_error() {
        let a = ImageBuffer::from_u8(Array3::from_elem((2, 2, 3), 10u8)).unwrap();
        let b = ImageBuffer::from_u8(Array3::from_elem((2, 2, 3), 13u8)).unwrap();
        assert_eq!(a.mean_squared_error(&b).unwrap(), 9.0);
        assert_eq!(a.mean_squared_error(&a).unwrap(), 0.0);
    }
}

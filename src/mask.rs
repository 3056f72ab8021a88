//! Square convolution masks, their random initialization and their
//! discrete neighborhoods.
//!
//! Two kinds of masks are searched:
//! - **Blur masks**: cells in [0, 1] summing to 1. The center is kept in
//!   [0.7, 1.0] and the remaining cells in [0.0, 0.5] while perturbing, and
//!   every perturbed mask is renormalized.
//! - **Sharp masks**: cells in [-1, 1.5] with no constraint on the sum.
//!
//! Neighbors are generated one cell at a time in row-major order, the
//! negative step before the positive one.

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::error::ConfigError;

/// Clip range of every sharp mask cell.
pub const SHARP_RANGE: (f64, f64) = (-1.0, 1.5);
/// Clip range of the blur mask center while perturbing.
pub const BLUR_CENTER_RANGE: (f64, f64) = (0.7, 1.0);
/// Clip range of the other blur mask cells while perturbing.
pub const BLUR_EDGE_RANGE: (f64, f64) = (0.0, 0.5);
/// Initial sampling range of the sharp mask center.
pub const SHARP_CENTER_INIT: (f64, f64) = (1.0, 1.5);

pub const DEFAULT_SHARP_STEP: f64 = 0.4;
pub const DEFAULT_BLUR_STEP: f64 = 0.8;

/// A square mask with an odd side length.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    cells: Array2<f64>,
}

impl Mask {
    /// Wrap a grid of cells.
    ///
    /// # Errors
    /// The grid must be square with an odd, non-zero side length.
    pub fn new(cells: Array2<f64>) -> Result<Self, ConfigError> {
        let (rows, cols) = cells.dim();
        if rows != cols {
            return Err(ConfigError::NonSquareMask { rows, cols });
        }
        if rows % 2 == 0 {
            return Err(ConfigError::InvalidMaskSize(rows));
        }
        Ok(Self { cells })
    }

    /// A mask whose cells are all `1 / (size * size)`.
    pub fn uniform(size: usize) -> Self {
        let value = 1.0 / (size * size) as f64;
        Self {
            cells: Array2::from_elem((size, size), value),
        }
    }

    pub fn size(&self) -> usize {
        self.cells.nrows()
    }

    /// Row and column of the center cell.
    pub fn center(&self) -> usize {
        self.size() / 2
    }

    pub fn sum(&self) -> f64 {
        self.cells.sum()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.cells.view()
    }

    pub fn cells(&self) -> &Array2<f64> {
        &self.cells
    }

    pub fn into_cells(self) -> Array2<f64> {
        self.cells
    }

    /// Scale the mask to sum to 1, or replace it with a uniform mask of the
    /// same size when the sum is not positive.
    pub fn normalized(mut self) -> Self {
        let total = self.sum();
        if total > 0.0 {
            self.cells.mapv_inplace(|v| v / total);
            self
        } else {
            Self::uniform(self.size())
        }
    }

    fn clip_range(&self, row: usize, col: usize, blur: bool) -> (f64, f64) {
        if !blur {
            SHARP_RANGE
        } else if row == self.center() && col == self.center() {
            BLUR_CENTER_RANGE
        } else {
            BLUR_EDGE_RANGE
        }
    }

    fn single_cell_neighbors(&self, step: f64, blur: bool) -> Vec<Mask> {
        let size = self.size();
        let mut neighbors = Vec::with_capacity(2 * size * size);

        for row in 0..size {
            for col in 0..size {
                let (low, high) = self.clip_range(row, col, blur);
                for delta in [-step, step] {
                    let mut cells = self.cells.clone();
                    cells[[row, col]] = (cells[[row, col]] + delta).clamp(low, high);
                    let neighbor = Mask { cells };
                    neighbors.push(if blur { neighbor.normalized() } else { neighbor });
                }
            }
        }

        neighbors
    }

    /// All sharp-mask neighbors: each cell moved by `-step` and `+step`,
    /// clipped to [`SHARP_RANGE`]. Returns `2 * size²` masks.
    pub fn sharp_neighbors(&self, step: f64) -> Vec<Mask> {
        self.single_cell_neighbors(step, false)
    }

    /// All blur-mask neighbors: each cell moved by `-step` and `+step`,
    /// clipped to [`BLUR_CENTER_RANGE`] or [`BLUR_EDGE_RANGE`], then
    /// renormalized. Returns `2 * size²` masks, each summing to 1.
    pub fn blur_neighbors(&self, step: f64) -> Vec<Mask> {
        self.single_cell_neighbors(step, true)
    }
}

/// Randomly initialize a blur mask and a sharp mask of the given size.
///
/// # Arguments
/// * `size` - Odd side length of both masks
/// * `rng` - Random source
///
/// # Returns
/// `(blur_mask, sharp_mask)`. The blur mask draws its cells from [0, 1) and
/// its center from [0.7, 1.0] doubled, then is normalized to sum 1. The
/// sharp mask draws its cells from [-1, 1.5] and its center from [1, 1.5].
pub fn init_masks<R>(size: usize, rng: &mut R) -> Result<(Mask, Mask), ConfigError>
where
    R: Rng + ?Sized,
{
    if size == 0 || size % 2 == 0 {
        return Err(ConfigError::InvalidMaskSize(size));
    }
    let center = size / 2;

    let blur_cells = Array2::from_shape_fn((size, size), |(row, col)| {
        if row == center && col == center {
            rng.random_range(BLUR_CENTER_RANGE.0..=BLUR_CENTER_RANGE.1) * 2.0
        } else {
            rng.random::<f64>()
        }
    });
    let blur = Mask { cells: blur_cells }.normalized();

    let sharp_cells = Array2::from_shape_fn((size, size), |(row, col)| {
        if row == center && col == center {
            rng.random_range(SHARP_CENTER_INIT.0..=SHARP_CENTER_INIT.1)
        } else {
            rng.random_range(SHARP_RANGE.0..=SHARP_RANGE.1)
        }
    });
    let sharp = Mask { cells: sharp_cells };

    log::debug!("initialized {size}x{size} masks, blur center {:.4}", blur.cells[[center, center]]);
    Ok((blur, sharp))
}

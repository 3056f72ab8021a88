//! Error types shared by the image buffer, the optimizers and the pipeline.
//!
//! Degenerate numeric situations (a blur mask summing to zero, a processed
//! image identical to its reference) are recovered where they occur and
//! never show up here. Only malformed inputs and configurations do.

use thiserror::Error;

/// Invalid image shapes or raw buffers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("image must have 3 channels, got {0}")]
    ChannelCount(usize),
    #[error("image must not be empty (got {height}x{width})")]
    Empty { height: usize, width: usize },
    #[error("buffer of length {len} does not match {height}x{width}x3")]
    BufferLength {
        len: usize,
        height: usize,
        width: usize,
    },
    #[error("images differ in shape: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize, usize),
        right: (usize, usize, usize),
    },
    #[error("plane {index} has shape {found:?}, expected {expected:?}")]
    PlaneShape {
        index: usize,
        found: (usize, usize),
        expected: (usize, usize),
    },
}

/// Optimizer and pipeline configuration violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("population size must be at least 4, got {0}")]
    PopulationTooSmall(usize),
    #[error("invalid {name} bounds [{low}, {high}]")]
    InvalidBounds {
        name: &'static str,
        low: f64,
        high: f64,
    },
    #[error("mutation factor must be finite, got {0}")]
    MutationFactor(f64),
    #[error("crossover rate must be in [0, 1], got {0}")]
    CrossoverRate(f64),
    #[error("tabu capacity must be positive")]
    ZeroTabuCapacity,
    #[error("mask size must be odd and positive, got {0}")]
    InvalidMaskSize(usize),
    #[error("mask must be square, got {rows}x{cols}")]
    NonSquareMask { rows: usize, cols: usize },
    #[error("blur mask is {blur}x{blur} but sharp mask is {sharp}x{sharp}")]
    MaskShapeMismatch { blur: usize, sharp: usize },
    #[error("{0} iterations must be positive")]
    ZeroIterations(&'static str),
    #[error("neighbor step must be finite and positive, got {0}")]
    InvalidStep(f64),
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Filter evaluators used as optimizer objectives.
//!
//! ## Supported Format
//!
//! | Format | Shape | Depth | Description |
//! |--------|-------|-------|-------------|
//! | RGB8 | (H, W, 3) | `U8` | Results rounded and saturated to 0-255 after each stage |
//! | RGB float | (H, W, 3) | `F32` | Results kept unquantized |
//!
//! ## Architecture
//!
//! All filters follow these principles:
//! - **Correlation** - Kernels are anchored at their center and not flipped
//! - **Reflect-101 borders** - Samples outside the image mirror around the edge pixel
//! - **Immutable buffers** - Every filter returns a new [`ImageBuffer`](crate::image::ImageBuffer)
//! - **Per-channel** - Channels are filtered independently, in parallel with rayon
//!
//! ## Filters
//!
//! - **Gaussian**: separable blur with explicit kernel size and sigma
//! - **Mask pair**: sharp mask followed by blur mask

pub mod core;
pub mod gaussian;
pub mod mask;

pub use self::core::coerce_odd_kernel;
pub use gaussian::apply_gaussian;
pub use mask::{apply_mask, apply_mask_pair};

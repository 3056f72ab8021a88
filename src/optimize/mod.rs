//! Search-based tuners for the filters.
//!
//! - **Differential evolution** (`differential_evolution.rs`) - continuous
//!   search over Gaussian kernel size and sigma
//! - **Tabu search** (`tabu.rs`) - discrete local search over sharp and blur
//!   mask pairs, with its bounded memory in `tabu_memory.rs`
//!
//! Both run single-threaded loops on the calling thread and report through
//! a [`ProgressObserver`](crate::progress::ProgressObserver).

pub mod differential_evolution;
pub mod tabu;
pub mod tabu_memory;

pub use differential_evolution::{
    Candidate, DeConfig, DeOutcome, GaussianBounds, GaussianObjective, GaussianOptimizer,
    Population,
};
pub use tabu::{MaskOptimizer, TabuConfig, TabuOutcome};
pub use tabu_memory::{MaskPair, TabuMemory};

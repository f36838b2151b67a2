//! blockgrad: sparse primitives for block coordinate descent on logistic
//! linear models.
//!
//! A block-coordinate-descent driver repeatedly proposes a weight delta for a
//! subset of features, asks for the resulting change in predictions, and then
//! asks for first- and second-order gradients of the loss restricted to that
//! same subset. This crate provides the two halves of that exchange:
//!
//! - [`spmv`] - the sparse-matrix/dense-vector multiply primitive, in plain
//!   (`y += A·x`) and transposed (`y += Aᵀ·x`) form, with optional position
//!   mappings restricting which coordinates are read or written
//! - [`LogitDeltaLoss`] - the delta logistic loss evaluator, which sandwiches
//!   the per-example sigmoid weight transform between two multiply calls to
//!   produce incremental predictions, gradients, and the diagonal Hessian
//!
//! # Data Format
//!
//! The evaluator is fed X' (the transpose of the design matrix X) as a
//! [`RowBlock`]: rows are features, columns are examples, labels ride along
//! one per example. See the [`data`] module for the exact invariants.
//!
//! # Threading
//!
//! Components never build thread pools. They hold a [`Parallelism`] flag and
//! use rayon parallel iterators when it allows; callers install a pool once
//! via [`run_with_threads`].

pub mod data;
pub mod loss;
pub mod spmv;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{BlockError, RowBlock};
pub use loss::{GradParams, Loss, LogitDeltaLoss, LogitDeltaParams, PredictParams};
pub use utils::{run_with_threads, Parallelism};

//! Sparse data views consumed by the multiply primitive and the loss
//! evaluators.

mod block;

pub use block::{BlockError, RowBlock};

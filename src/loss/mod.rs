//! Loss evaluators for the block coordinate descent driver.
//!
//! The driver owns the weight vector, picks a feature block per iteration,
//! and talks to a loss through the [`Loss`] trait: [`Loss::predict`] applies
//! a proposed weight delta to the running predictions, [`Loss::calc_grad`]
//! turns the current predictions into gradients (and, if configured,
//! diagonal curvature) for the same block.
//!
//! Both operations mutate only their output buffer and accumulate rather
//! than overwrite, so a driver can take many block steps without ever
//! recomputing a full prediction pass.

mod logit_delta;

pub use logit_delta::{LogitDeltaLoss, LogitDeltaParams};

use crate::data::RowBlock;

/// Input to [`Loss::predict`].
#[derive(Debug, Clone, Copy)]
pub struct PredictParams<'a> {
    /// Weight delta for the block, `new_w - old_w`. Indexed by block row
    /// through `w_pos`.
    pub delta_w: &'a [f32],
    /// Optional weight position mapping: entry per block row, negative means
    /// the row carries no delta this step.
    pub w_pos: Option<&'a [i32]>,
}

/// Input to [`Loss::calc_grad`].
#[derive(Debug, Clone, Copy)]
pub struct GradParams<'a> {
    /// Current predictions, one per example. Never mutated.
    pub pred: &'a [f32],
    /// Optional gradient position mapping: entry per block row, negative
    /// means the row's gradient is not wanted.
    pub grad_pos: Option<&'a [i32]>,
    /// Per-coordinate step bound, required by the upper-bound curvature
    /// path.
    pub delta: Option<&'a [f32]>,
}

/// A loss function as seen by the coordinate descent driver.
///
/// Violated preconditions (missing labels, mismatched mapping lengths,
/// undersized buffers) are driver bugs and panic immediately rather than
/// producing a plausible but wrong result.
pub trait Loss {
    /// Accumulate the block's contribution to the predictions:
    /// `pred += X · δw`, where the block holds X'.
    ///
    /// `pred` must be pre-allocated with one entry per example and is
    /// updated in place, supporting incremental maintenance across steps.
    fn predict(&self, block: &RowBlock<'_>, params: PredictParams<'_>, pred: &mut [f32]);

    /// Compute first-order gradients, and optionally diagonal curvature,
    /// into `grad`.
    ///
    /// The output layout is shared with the driver: each active coordinate's
    /// gradient lands at its `grad_pos` slot, and when curvature is computed
    /// its diagonal Hessian entry lands at the slot immediately after. A
    /// driver requesting curvature must pre-allocate twice the gradient
    /// length and use a mapping with a stride of two.
    fn calc_grad(&self, block: &RowBlock<'_>, params: GradParams<'_>, grad: &mut [f32]);
}

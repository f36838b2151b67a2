//! Delta logistic loss, specialized for block coordinate descent.
//!
//! The loss is `ℓ(x, y, w) = log(1 + exp(-y ⟨w, x⟩))` with sign-encoded
//! labels. The evaluator is fed X' (the transpose of the design matrix, in
//! row-major form) and a weight delta each step, and can produce second
//! order information:
//!
//! ```text
//! tau  = 1 / (1 + exp(y .* pred))
//! f'(w)  = -X' * (tau .* y)           first-order gradient
//! f''(w) = (X .* X)' * (tau .* (1 - tau))   diagonal Hessian
//! ```
//!
//! The per-example transforms saturate cleanly in f32: `exp` overflow gives
//! infinity, the division gives zero, and every weight stays inside its
//! mathematical range regardless of prediction magnitude.

use rayon::prelude::*;

use super::{GradParams, Loss, PredictParams};
use crate::data::RowBlock;
use crate::spmv;
use crate::utils::Parallelism;

/// Configuration for [`LogitDeltaLoss`].
///
/// When both flags are set the exact diagonal path wins; when neither is
/// set, [`Loss::calc_grad`] stops after the first-order gradient.
#[derive(Debug, Clone, Copy)]
pub struct LogitDeltaParams {
    /// Compute the exact diagonal Hessian.
    pub compute_diag_hessian: bool,
    /// Compute an upper bound of the diagonal Hessian instead.
    ///
    /// The estimator itself is not implemented yet: the path validates its
    /// input (the step bound must be supplied) and leaves the Hessian slots
    /// untouched. It is the extension point for a cheap curvature bound
    /// derived from the per-coordinate step size.
    pub compute_upper_diag_hessian: bool,
}

impl Default for LogitDeltaParams {
    fn default() -> Self {
        Self {
            compute_diag_hessian: false,
            compute_upper_diag_hessian: true,
        }
    }
}

/// The delta logistic loss evaluator.
///
/// Holds its configuration and an immutable [`Parallelism`] mode; every call
/// is otherwise stateless, so one evaluator can serve many blocks and many
/// position mappings concurrently.
#[derive(Debug, Clone)]
pub struct LogitDeltaLoss {
    params: LogitDeltaParams,
    parallelism: Parallelism,
}

impl LogitDeltaLoss {
    /// Create an evaluator with an explicit parallelism mode.
    pub fn new(params: LogitDeltaParams, parallelism: Parallelism) -> Self {
        Self {
            params,
            parallelism,
        }
    }

    /// Create an evaluator from thread count semantics (0 = auto,
    /// 1 = sequential, >1 = parallel).
    pub fn with_threads(params: LogitDeltaParams, n_threads: usize) -> Self {
        Self::new(params, Parallelism::from_threads(n_threads))
    }

    #[inline]
    fn sign(label: f32) -> f32 {
        if label > 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    /// `p[i] = -y_i / (1 + exp(y_i * p[i]))`, the signed gradient weight
    /// tau applied over the predictions currently in `p`.
    fn grad_weights(&self, label: &[f32], p: &mut [f32]) {
        let transform = |(pi, &li): (&mut f32, &f32)| {
            let y = Self::sign(li);
            *pi = -y / (1.0 + (y * *pi).exp());
        };
        if self.parallelism.is_parallel() {
            p.par_iter_mut().zip(label).for_each(transform);
        } else {
            p.iter_mut().zip(label).for_each(transform);
        }
    }

    /// `p[i] = t_i * (1 - t_i)` with `t_i = -y_i * p[i]`, recovering the
    /// unsigned sigmoid weight from the tau stored by [`Self::grad_weights`]
    /// (equal to recomputing it from the original prediction). The result is
    /// the Bernoulli variance, always in `[0, 0.25]`.
    fn curvature_weights(&self, label: &[f32], p: &mut [f32]) {
        let transform = |(pi, &li): (&mut f32, &f32)| {
            let t = -Self::sign(li) * *pi;
            *pi = t * (1.0 - t);
        };
        if self.parallelism.is_parallel() {
            p.par_iter_mut().zip(label).for_each(transform);
        } else {
            p.iter_mut().zip(label).for_each(transform);
        }
    }
}

impl Loss for LogitDeltaLoss {
    /// `pred += X · δw`, restricted to the rows `w_pos` marks as active.
    fn predict(&self, block: &RowBlock<'_>, params: PredictParams<'_>, pred: &mut [f32]) {
        if let Some(map) = params.w_pos {
            assert_eq!(
                map.len(),
                block.n_rows(),
                "weight position mapping must have one entry per block row"
            );
        }
        spmv::transpose_times(
            block,
            params.delta_w,
            pred,
            params.w_pos,
            None,
            self.parallelism,
        );
    }

    fn calc_grad(&self, block: &RowBlock<'_>, params: GradParams<'_>, grad: &mut [f32]) {
        let label = block
            .labels()
            .expect("calc_grad requires labels on the block");
        assert!(
            label.len() >= params.pred.len(),
            "label array must cover every example: {} labels for {} predictions",
            label.len(),
            params.pred.len()
        );
        if let Some(map) = params.grad_pos {
            assert_eq!(
                map.len(),
                block.n_rows(),
                "gradient position mapping must have one entry per block row"
            );
        }
        let label = &label[..params.pred.len()];

        // Signed gradient weight per example, in a working copy so the
        // caller's predictions survive the call.
        let mut p = params.pred.to_vec();
        self.grad_weights(label, &mut p);

        // First-order gradient into the grad_pos slots.
        spmv::times(block, &p, grad, None, params.grad_pos, self.parallelism);
        if !self.params.compute_diag_hessian && !self.params.compute_upper_diag_hessian {
            return;
        }

        // Bernoulli variance weight per example, recovered from tau before
        // it is overwritten.
        self.curvature_weights(label, &mut p);

        if self.params.compute_diag_hessian {
            let grad_pos = params.grad_pos.expect(
                "exact diagonal hessian requires a gradient position mapping; \
                 without one the hessian would land in the gradient's own slots",
            );
            // Each coordinate's hessian is stored right after its gradient.
            let h_pos: Vec<i32> = grad_pos
                .iter()
                .map(|&pos| if pos >= 0 { pos + 1 } else { pos })
                .collect();

            // X .* X shares the block's structure, only values are squared.
            let xx_value = block.squared_values();
            let xx = match &xx_value {
                Some(v) => block.with_values(v),
                None => *block,
            };
            spmv::times(&xx, &p, grad, None, Some(&h_pos), self.parallelism);
        } else {
            assert!(
                params.delta.is_some(),
                "compute_upper_diag_hessian requires the per-coordinate step bound"
            );
            // TODO(upper-bound estimator): derive the diagonal bound from
            // the step bound; until then the hessian slots keep their
            // pre-call values.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // X' for a 2-example, 2-feature block, all values 1.
    const OFFSET: [usize; 3] = [0, 2, 4];
    const INDEX: [u32; 4] = [0, 1, 0, 1];
    const VALUE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
    const LABEL: [f32; 2] = [1.0, -1.0];

    fn block<'a>() -> RowBlock<'a> {
        RowBlock::new(&OFFSET, &INDEX, Some(&VALUE), Some(&LABEL)).unwrap()
    }

    fn first_order() -> LogitDeltaLoss {
        LogitDeltaLoss::new(
            LogitDeltaParams {
                compute_diag_hessian: false,
                compute_upper_diag_hessian: false,
            },
            Parallelism::Sequential,
        )
    }

    #[test]
    fn default_params() {
        let params = LogitDeltaParams::default();
        assert!(!params.compute_diag_hessian);
        assert!(params.compute_upper_diag_hessian);
    }

    #[test]
    fn predict_accumulates_delta() {
        let loss = first_order();
        let delta_w = [0.5f32, -0.25];
        let mut pred = [1.0f32, 1.0];
        loss.predict(
            &block(),
            PredictParams {
                delta_w: &delta_w,
                w_pos: None,
            },
            &mut pred,
        );
        // pred += X * delta_w; every entry of X is 1
        assert_abs_diff_eq!(pred[0], 1.25, epsilon = 1e-6);
        assert_abs_diff_eq!(pred[1], 1.25, epsilon = 1e-6);
    }

    #[test]
    fn grad_at_zero_predictions() {
        let loss = first_order();
        let pred = [0.0f32, 0.0];
        let mut grad = [0.0f32; 2];
        loss.calc_grad(
            &block(),
            GradParams {
                pred: &pred,
                grad_pos: None,
                delta: None,
            },
            &mut grad,
        );
        // tau = [-0.5, 0.5], each feature sums both examples
        assert_abs_diff_eq!(grad[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn diag_hessian_interleaves_with_gradient() {
        let loss = LogitDeltaLoss::new(
            LogitDeltaParams {
                compute_diag_hessian: true,
                compute_upper_diag_hessian: false,
            },
            Parallelism::Sequential,
        );
        let pred = [0.0f32, 0.0];
        let grad_pos = [0i32, 2];
        let mut grad = [0.0f32; 4];
        loss.calc_grad(
            &block(),
            GradParams {
                pred: &pred,
                grad_pos: Some(&grad_pos),
                delta: None,
            },
            &mut grad,
        );
        // gradient slots 0 and 2 are zero, hessian slots 1 and 3 hold
        // sum of 0.25 over both examples
        assert_abs_diff_eq!(grad[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[2], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[3], 0.5, epsilon = 1e-6);
    }

    #[test]
    #[should_panic(expected = "requires labels")]
    fn calc_grad_without_labels_panics() {
        let no_labels = RowBlock::new(&OFFSET, &INDEX, Some(&VALUE), None).unwrap();
        let loss = first_order();
        let pred = [0.0f32, 0.0];
        let mut grad = [0.0f32; 2];
        loss.calc_grad(
            &no_labels,
            GradParams {
                pred: &pred,
                grad_pos: None,
                delta: None,
            },
            &mut grad,
        );
    }

    #[test]
    #[should_panic(expected = "step bound")]
    fn upper_hessian_without_delta_panics() {
        let loss = LogitDeltaLoss::new(LogitDeltaParams::default(), Parallelism::Sequential);
        let pred = [0.0f32, 0.0];
        let grad_pos = [0i32, 2];
        let mut grad = [0.0f32; 4];
        loss.calc_grad(
            &block(),
            GradParams {
                pred: &pred,
                grad_pos: Some(&grad_pos),
                delta: None,
            },
            &mut grad,
        );
    }

    #[test]
    #[should_panic(expected = "requires a gradient position mapping")]
    fn diag_hessian_without_positions_panics() {
        let loss = LogitDeltaLoss::new(
            LogitDeltaParams {
                compute_diag_hessian: true,
                compute_upper_diag_hessian: false,
            },
            Parallelism::Sequential,
        );
        let pred = [0.0f32, 0.0];
        let mut grad = [0.0f32; 4];
        loss.calc_grad(
            &block(),
            GradParams {
                pred: &pred,
                grad_pos: None,
                delta: None,
            },
            &mut grad,
        );
    }
}

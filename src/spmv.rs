//! Sparse-matrix/dense-vector multiply over [`RowBlock`] views.
//!
//! Two entry points:
//!
//! - [`times`]: `y += A·x` - each row produces one output entry
//! - [`transpose_times`]: `y += Aᵀ·x` - each row scatters into the columns
//!   it touches
//!
//! Both **accumulate** into `y`, never overwrite: callers that want a fresh
//! product must zero the buffer first. Incremental prediction maintenance in
//! the coordinate descent loop relies on this.
//!
//! # Position mappings
//!
//! Either side may be restricted by an optional `&[i32]` mapping: entry `i`
//! gives the physical offset of logical coordinate `i` in the backing array,
//! and a negative entry means the coordinate is absent and is skipped
//! entirely (never read, never written). An absent mapping is the identity.
//! Mappings over the row dimension must have one entry per row and are
//! asserted; mappings over the column dimension are bounds-checked on use.
//!
//! # Parallelism and determinism
//!
//! With [`Parallelism::Parallel`], `times` computes per-row `(slot, sum)`
//! pairs in parallel and applies them in row order, while `transpose_times`
//! accumulates into thread-local buffers that are merged after the parallel
//! region. No output entry is ever written concurrently. Results are
//! value-equivalent across thread counts; bit-exact reproducibility is only
//! guaranteed in sequential mode, since floating-point summation order may
//! differ between runs.

use crate::data::RowBlock;
use crate::utils::Parallelism;
use rayon::prelude::*;

/// Resolve logical coordinate `i` through an optional position mapping.
#[inline]
fn map_pos(pos: Option<&[i32]>, i: usize) -> Option<usize> {
    match pos {
        Some(map) => {
            let p = map[i];
            (p >= 0).then_some(p as usize)
        }
        None => Some(i),
    }
}

/// Entry weight: explicit value, or the implicit 1.0.
#[inline]
fn weight(values: Option<&[f32]>, k: usize) -> f32 {
    values.map_or(1.0, |v| v[k])
}

/// `y += A·x`: accumulate each row's weighted sum of `x` entries into the
/// row's output slot.
///
/// `x` is indexed by the block's column ids through `x_pos`; `y` is indexed
/// by row id through `y_pos`.
pub fn times(
    block: &RowBlock<'_>,
    x: &[f32],
    y: &mut [f32],
    x_pos: Option<&[i32]>,
    y_pos: Option<&[i32]>,
    parallelism: Parallelism,
) {
    if let Some(map) = y_pos {
        assert_eq!(
            map.len(),
            block.n_rows(),
            "output position mapping must have one entry per row"
        );
    }

    // Each row owns exactly one output slot, so the sums can be computed in
    // parallel and applied afterwards without write conflicts.
    let sums = parallelism.maybe_par_map(0..block.n_rows(), |r| {
        let slot = map_pos(y_pos, r)?;
        let (idx, vals) = block.row(r);
        let mut acc = 0.0f32;
        for (k, &j) in idx.iter().enumerate() {
            if let Some(p) = map_pos(x_pos, j as usize) {
                acc += weight(vals, k) * x[p];
            }
        }
        Some((slot, acc))
    });

    for (slot, acc) in sums.into_iter().flatten() {
        y[slot] += acc;
    }
}

/// `y += Aᵀ·x`: scatter each row's input entry across the columns it
/// touches.
///
/// `x` is indexed by row id through `x_pos`; `y` is indexed by the block's
/// column ids through `y_pos`.
pub fn transpose_times(
    block: &RowBlock<'_>,
    x: &[f32],
    y: &mut [f32],
    x_pos: Option<&[i32]>,
    y_pos: Option<&[i32]>,
    parallelism: Parallelism,
) {
    if let Some(map) = x_pos {
        assert_eq!(
            map.len(),
            block.n_rows(),
            "input position mapping must have one entry per row"
        );
    }

    if parallelism.is_parallel() && block.n_rows() > 1 {
        // Rows collide on shared columns, so each rayon chunk scatters into
        // its own buffer; buffers are merged once the region is done.
        let merged = (0..block.n_rows())
            .into_par_iter()
            .fold(
                || vec![0.0f32; y.len()],
                |mut acc, r| {
                    scatter_row(block, x, x_pos, y_pos, r, &mut acc);
                    acc
                },
            )
            .reduce(
                || vec![0.0f32; y.len()],
                |mut a, b| {
                    for (ai, bi) in a.iter_mut().zip(&b) {
                        *ai += bi;
                    }
                    a
                },
            );
        for (yi, mi) in y.iter_mut().zip(&merged) {
            *yi += mi;
        }
    } else {
        for r in 0..block.n_rows() {
            scatter_row(block, x, x_pos, y_pos, r, y);
        }
    }
}

fn scatter_row(
    block: &RowBlock<'_>,
    x: &[f32],
    x_pos: Option<&[i32]>,
    y_pos: Option<&[i32]>,
    r: usize,
    out: &mut [f32],
) {
    let Some(p) = map_pos(x_pos, r) else {
        return;
    };
    let xr = x[p];
    if xr == 0.0 {
        return;
    }
    let (idx, vals) = block.row(r);
    for (k, &j) in idx.iter().enumerate() {
        if let Some(slot) = map_pos(y_pos, j as usize) {
            out[slot] += weight(vals, k) * xr;
        }
    }
}

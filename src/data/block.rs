//! Row-major sparse block views.
//!
//! A [`RowBlock`] is an immutable, borrowed view of a sparse matrix in
//! CSR-like row-major form. The storage layer owns the arrays; this crate
//! only ever borrows them, so handing a block to the multiply primitive or a
//! loss evaluator is zero-copy.
//!
//! In the delta formulation used by the coordinate descent driver, the block
//! holds X' (the transpose of the design matrix X): rows are features,
//! column indices are examples, and `label` carries one entry per *example*
//! (one per column), sign-encoded (`> 0` means positive class).

use thiserror::Error;

/// Structural validation errors for [`RowBlock::new`].
#[derive(Debug, Clone, Error)]
pub enum BlockError {
    #[error("offset array must have size + 1 entries: expected {expected}, got {got}")]
    OffsetLen { expected: usize, got: usize },

    #[error("offset array must start at 0, got {0}")]
    OffsetStart(usize),

    #[error("offset array must be non-decreasing: offset[{at}] = {value} < offset[{prev_at}] = {prev}")]
    OffsetNotMonotonic {
        at: usize,
        value: usize,
        prev_at: usize,
        prev: usize,
    },

    #[error("offsets address {nnz} entries but the index array has {got}")]
    IndexLen { nnz: usize, got: usize },

    #[error("value array length {got} does not match index array length {expected}")]
    ValueLen { expected: usize, got: usize },
}

/// Immutable view of a sparse row-major block.
///
/// `offset[r]..offset[r + 1]` delimits the entries of row `r` inside `index`
/// (column ids) and `value` (nonzero values; absent means an implicit 1.0
/// for every entry). The view is `Copy`: re-viewing costs nothing.
///
/// # Example
///
/// ```
/// use blockgrad::RowBlock;
///
/// // Two rows: row 0 touches columns 0 and 1, row 1 touches column 1.
/// let offset = [0usize, 2, 3];
/// let index = [0u32, 1, 1];
/// let value = [0.5f32, 1.0, 2.0];
/// let block = RowBlock::new(&offset, &index, Some(&value), None).unwrap();
///
/// assert_eq!(block.n_rows(), 2);
/// assert_eq!(block.nnz(), 3);
/// assert_eq!(block.row(1), (&[1u32][..], Some(&[2.0f32][..])));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RowBlock<'a> {
    size: usize,
    offset: &'a [usize],
    index: &'a [u32],
    value: Option<&'a [f32]>,
    label: Option<&'a [f32]>,
}

impl<'a> RowBlock<'a> {
    /// Create a validated block view.
    ///
    /// `offset` must have one more entry than the number of rows, start at
    /// zero, and be non-decreasing; its last entry must not address past the
    /// end of `index`; `value`, when present, must match `index` in length.
    /// `label` is not constrained here: how many labels are needed depends on
    /// the operation (see [`Loss::calc_grad`](crate::Loss::calc_grad)).
    pub fn new(
        offset: &'a [usize],
        index: &'a [u32],
        value: Option<&'a [f32]>,
        label: Option<&'a [f32]>,
    ) -> Result<Self, BlockError> {
        let size = offset.len().checked_sub(1).ok_or(BlockError::OffsetLen {
            expected: 1,
            got: 0,
        })?;

        if offset[0] != 0 {
            return Err(BlockError::OffsetStart(offset[0]));
        }
        for at in 1..offset.len() {
            if offset[at] < offset[at - 1] {
                return Err(BlockError::OffsetNotMonotonic {
                    at,
                    value: offset[at],
                    prev_at: at - 1,
                    prev: offset[at - 1],
                });
            }
        }
        if offset[size] > index.len() {
            return Err(BlockError::IndexLen {
                nnz: offset[size],
                got: index.len(),
            });
        }
        if let Some(value) = value {
            if value.len() != index.len() {
                return Err(BlockError::ValueLen {
                    expected: index.len(),
                    got: value.len(),
                });
            }
        }

        Ok(Self {
            size,
            offset,
            index,
            value,
            label,
        })
    }

    /// Number of rows in the block.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.size
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.offset[self.size]
    }

    /// Column ids and values of row `r`. Values are `None` when the block
    /// carries implicit unit values.
    #[inline]
    pub fn row(&self, r: usize) -> (&'a [u32], Option<&'a [f32]>) {
        let range = self.offset[r]..self.offset[r + 1];
        (
            &self.index[range.clone()],
            self.value.map(|v| &v[range]),
        )
    }

    /// The raw value array, if the block carries explicit values.
    #[inline]
    pub fn values(&self) -> Option<&'a [f32]> {
        self.value
    }

    /// Per-example labels, if attached.
    #[inline]
    pub fn labels(&self) -> Option<&'a [f32]> {
        self.label
    }

    /// Re-view the same structure (offsets, indices, labels) over a
    /// replacement value buffer of the same length.
    ///
    /// This is how the curvature path builds the element-wise squared block
    /// without copying index data: the structure stays borrowed from `self`,
    /// only the values differ.
    #[inline]
    pub fn with_values<'b>(&self, value: &'b [f32]) -> RowBlock<'b>
    where
        'a: 'b,
    {
        debug_assert_eq!(value.len(), self.index.len());
        RowBlock {
            size: self.size,
            offset: self.offset,
            index: self.index,
            value: Some(value),
            label: self.label,
        }
    }

    /// Element-wise squared copy of the value array, or `None` when values
    /// are implicit (1.0 squared is still 1.0, so the block itself already
    /// is its own squared companion).
    pub fn squared_values(&self) -> Option<Vec<f32>> {
        self.value.map(|v| v.iter().map(|x| x * x).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_block() {
        let offset = [0usize, 2, 2, 4];
        let index = [0u32, 3, 1, 2];
        let value = [1.0f32, 2.0, 3.0, 4.0];
        let block = RowBlock::new(&offset, &index, Some(&value), None).unwrap();

        assert_eq!(block.n_rows(), 3);
        assert_eq!(block.nnz(), 4);
        assert_eq!(block.row(0), (&[0u32, 3][..], Some(&[1.0f32, 2.0][..])));
        assert_eq!(block.row(1), (&[][..], Some(&[][..])));
        assert_eq!(block.row(2), (&[1u32, 2][..], Some(&[3.0f32, 4.0][..])));
    }

    #[test]
    fn empty_block() {
        let offset = [0usize];
        let block = RowBlock::new(&offset, &[], None, None).unwrap();
        assert_eq!(block.n_rows(), 0);
        assert_eq!(block.nnz(), 0);
    }

    #[test]
    fn implicit_unit_values() {
        let offset = [0usize, 2];
        let index = [0u32, 1];
        let block = RowBlock::new(&offset, &index, None, None).unwrap();
        assert_eq!(block.row(0), (&[0u32, 1][..], None));
        assert!(block.squared_values().is_none());
    }

    #[test]
    fn rejects_empty_offset() {
        assert!(matches!(
            RowBlock::new(&[], &[], None, None),
            Err(BlockError::OffsetLen { .. })
        ));
    }

    #[test]
    fn rejects_nonzero_start() {
        let offset = [1usize, 2];
        let index = [0u32, 1];
        assert!(matches!(
            RowBlock::new(&offset, &index, None, None),
            Err(BlockError::OffsetStart(1))
        ));
    }

    #[test]
    fn rejects_decreasing_offset() {
        let offset = [0usize, 3, 1];
        let index = [0u32, 1, 2];
        assert!(matches!(
            RowBlock::new(&offset, &index, None, None),
            Err(BlockError::OffsetNotMonotonic { at: 2, .. })
        ));
    }

    #[test]
    fn rejects_offset_past_index() {
        let offset = [0usize, 4];
        let index = [0u32, 1];
        assert!(matches!(
            RowBlock::new(&offset, &index, None, None),
            Err(BlockError::IndexLen { nnz: 4, got: 2 })
        ));
    }

    #[test]
    fn rejects_value_len_mismatch() {
        let offset = [0usize, 2];
        let index = [0u32, 1];
        let value = [1.0f32];
        assert!(matches!(
            RowBlock::new(&offset, &index, Some(&value), None),
            Err(BlockError::ValueLen { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn squared_view_shares_structure() {
        let offset = [0usize, 2, 3];
        let index = [0u32, 2, 1];
        let value = [1.0f32, -2.0, 3.0];
        let label = [1.0f32, -1.0, 1.0];
        let block = RowBlock::new(&offset, &index, Some(&value), Some(&label)).unwrap();

        let squared = block.squared_values().unwrap();
        assert_eq!(squared, vec![1.0, 4.0, 9.0]);

        let xx = block.with_values(&squared);
        // Structure and labels are the same slices, only values changed.
        assert!(std::ptr::eq(block.row(0).0, xx.row(0).0));
        assert!(std::ptr::eq(block.labels().unwrap(), xx.labels().unwrap()));
        assert_eq!(xx.row(0).1, Some(&[1.0f32, 4.0][..]));
    }
}

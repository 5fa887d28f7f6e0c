//! Owned strided array used as the default output buffer.
//!
//! Supports both row-major (C default) and column-major (Fortran default)
//! layouts, fallible allocation and in-place resizing.

use crate::operand::{DType, Element, StridedOperand};
use crate::{LoopError, Result};

/// Memory layout requested for a freshly allocated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// C-like layout: last axis varies fastest.
    #[default]
    RowMajor,
    /// Fortran-like layout: first axis varies fastest.
    ColMajor,
}

impl Layout {
    pub fn strides(self, dims: &[usize]) -> Vec<isize> {
        match self {
            Layout::RowMajor => row_major_strides(dims),
            Layout::ColMajor => col_major_strides(dims),
        }
    }
}

fn packed_strides<'a>(dims: impl Iterator<Item = &'a usize>) -> Vec<isize> {
    dims.scan(1isize, |step, &d| {
        let s = *step;
        *step *= d as isize;
        Some(s)
    })
    .collect()
}

/// Strides of a dense array whose first axis varies fastest.
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    packed_strides(dims.iter())
}

/// Strides of a dense array whose last axis varies fastest.
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let mut strides = packed_strides(dims.iter().rev());
    strides.reverse();
    strides
}

/// Whether `(dims, strides)` addresses one dense block in either axis order.
///
/// Length-1 axes never move the address, so their strides are not checked.
pub(crate) fn is_dense(dims: &[usize], strides: &[isize]) -> bool {
    fn packed<'a>(axes: impl Iterator<Item = (&'a usize, &'a isize)>) -> bool {
        let mut step = 1isize;
        for (&d, &s) in axes.filter(|&(&d, _)| d > 1) {
            if s != step {
                return false;
            }
            step = step.saturating_mul(d as isize);
        }
        true
    }
    dims.len() == strides.len()
        && (packed(dims.iter().rev().zip(strides.iter().rev()))
            || packed(dims.iter().zip(strides.iter())))
}

fn checked_len(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| LoopError::AllocationError {
            shape: shape.to_vec(),
            reason: "element count overflows usize".into(),
        })
}

/// A destination buffer the planner can allocate or resize.
pub trait OutputBuffer: StridedOperand + Sized {
    /// Allocate fresh storage of `shape` in `layout`.
    fn allocate(shape: &[usize], layout: Layout) -> Result<Self>;

    /// Resize in place to `shape`, laid out as `layout`. Returns `false` if the
    /// buffer cannot be resized in place; the buffer is then left untouched.
    fn try_resize(&mut self, shape: &[usize], layout: Layout) -> bool;
}

/// Owned strided multidimensional array.
#[derive(Clone)]
pub struct StridedArray<T> {
    data: Vec<T>,
    dims: Vec<usize>,
    strides: Vec<isize>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for StridedArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedArray")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .finish()
    }
}

impl<T: Element> StridedArray<T> {
    /// Create a row-major array filled with `T::default()`.
    ///
    /// # Panics
    /// Panics if the allocation fails; use [`OutputBuffer::allocate`] to handle that.
    pub fn row_major(dims: &[usize]) -> Self {
        let total: usize = dims.iter().product();
        Self {
            data: vec![T::default(); total],
            dims: dims.to_vec(),
            strides: row_major_strides(dims),
        }
    }

    /// Create a column-major array filled with `T::default()`.
    pub fn col_major(dims: &[usize]) -> Self {
        let total: usize = dims.iter().product();
        Self {
            data: vec![T::default(); total],
            dims: dims.to_vec(),
            strides: col_major_strides(dims),
        }
    }

    /// Create a row-major array with values produced by a function.
    ///
    /// The function is called with indices in row-major iteration order.
    pub fn from_fn_row_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let total: usize = dims.iter().product();
        let strides = row_major_strides(dims);
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            data.push(f(&idx));
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Self {
            data,
            dims: dims.to_vec(),
            strides,
        }
    }
}

impl<T> StridedArray<T> {
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The backing storage, in memory order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Permute the axes without moving any data.
    ///
    /// # Panics
    /// Panics if `perm` is not a permutation of `0..ndim`.
    pub fn permute(self, perm: &[usize]) -> Self {
        let rank = self.dims.len();
        assert_eq!(perm.len(), rank, "permutation length must equal rank");
        let mut seen = vec![false; rank];
        for &p in perm {
            assert!(p < rank && !seen[p], "invalid permutation {perm:?}");
            seen[p] = true;
        }
        Self {
            dims: perm.iter().map(|&p| self.dims[p]).collect(),
            strides: perm.iter().map(|&p| self.strides[p]).collect(),
            data: self.data,
        }
    }

    /// Element offset of a multi-index.
    pub fn offset_of(&self, indices: &[usize]) -> isize {
        assert_eq!(indices.len(), self.dims.len(), "index rank mismatch");
        indices
            .iter()
            .zip(self.dims.iter().zip(self.strides.iter()))
            .map(|(&i, (&d, &s))| {
                assert!(i < d, "index {i} out of bounds for dim {d}");
                i as isize * s
            })
            .sum()
    }
}

impl<T: Copy> StridedArray<T> {
    pub fn get(&self, indices: &[usize]) -> T {
        self.data[self.offset_of(indices) as usize]
    }

    pub fn set(&mut self, indices: &[usize], value: T) {
        let off = self.offset_of(indices) as usize;
        self.data[off] = value;
    }
}

impl<T: Element> StridedOperand for StridedArray<T> {
    fn rank(&self) -> usize {
        self.dims.len()
    }
    fn dim(&self, dim: usize) -> usize {
        self.dims[dim]
    }
    fn stride(&self, dim: usize) -> isize {
        self.strides[dim]
    }
    fn dtype(&self) -> DType {
        T::DTYPE
    }
}

impl<T: Element> OutputBuffer for StridedArray<T> {
    fn allocate(shape: &[usize], layout: Layout) -> Result<Self> {
        let total = checked_len(shape)?;
        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|e| LoopError::AllocationError {
                shape: shape.to_vec(),
                reason: e.to_string(),
            })?;
        data.resize(total, T::default());
        Ok(Self {
            data,
            dims: shape.to_vec(),
            strides: layout.strides(shape),
        })
    }

    fn try_resize(&mut self, shape: &[usize], layout: Layout) -> bool {
        // Only storage that is exactly one contiguous block can be reinterpreted.
        if !is_dense(&self.dims, &self.strides) || self.data.len() != self.len() {
            return false;
        }
        let Ok(total) = checked_len(shape) else {
            return false;
        };
        if total > self.data.len() && self.data.try_reserve_exact(total - self.data.len()).is_err() {
            return false;
        }
        self.data.resize(total, T::default());
        self.dims = shape.to_vec();
        self.strides = layout.strides(shape);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_dense_row_vs_col() {
        let dims = [3usize, 4];
        assert!(is_dense(&dims, &[4, 1]));
        assert!(is_dense(&dims, &[1, 3]));
        assert!(!is_dense(&dims, &[8, 2]));
        assert!(!is_dense(&dims, &[-4, 1]));
        assert!(is_dense(&[], &[]));
    }

    #[test]
    fn test_is_dense_ignores_unit_axes() {
        // The middle axis never varies, so its stride is irrelevant.
        assert!(is_dense(&[2, 1, 3], &[3, 999, 1]));
    }

    #[test]
    fn test_dense_strides() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(col_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_allocate_layouts() {
        let a = StridedArray::<f32>::allocate(&[2, 3], Layout::RowMajor).unwrap();
        assert_eq!(a.strides(), &[3, 1]);
        assert_eq!(a.data().len(), 6);
        let b = StridedArray::<f32>::allocate(&[2, 3], Layout::ColMajor).unwrap();
        assert_eq!(b.strides(), &[1, 2]);
    }

    #[test]
    fn test_allocate_overflow_is_allocation_error() {
        let err = StridedArray::<u8>::allocate(&[usize::MAX, 2], Layout::RowMajor).unwrap_err();
        assert!(matches!(err, LoopError::AllocationError { .. }));
    }

    #[test]
    fn test_try_resize_contiguous() {
        let mut a = StridedArray::<i32>::row_major(&[2, 2]);
        assert!(a.try_resize(&[3, 4, 5], Layout::RowMajor));
        assert_eq!(a.dims(), &[3, 4, 5]);
        assert_eq!(a.strides(), &[20, 5, 1]);
        assert_eq!(a.data().len(), 60);
    }

    #[test]
    fn test_try_resize_rejects_permuted() {
        let mut a = StridedArray::<i32>::row_major(&[2, 3, 4]).permute(&[1, 0, 2]);
        assert!(!a.try_resize(&[4, 4], Layout::RowMajor));
        assert_eq!(a.dims(), &[3, 2, 4]);
    }

    #[test]
    fn test_from_fn_row_major_get() {
        let a = StridedArray::<f64>::from_fn_row_major(&[2, 3], |idx| (idx[0] * 10 + idx[1]) as f64);
        assert_eq!(a.get(&[1, 2]), 12.0);
        let t = a.permute(&[1, 0]);
        assert_eq!(t.get(&[2, 1]), 12.0);
    }
}

//! Output shape inference and destination allocation.

use crate::array::{Layout, OutputBuffer};
use crate::loop_order::{common_len, LoopOrder};
use crate::operand::StridedOperand;
use crate::{LoopError, Result};

/// Broadcast output shape of `operands` under `orders`.
///
/// The length at logical dimension `i` is taken from the first operand (in
/// operand order) with a concrete binding there, or 1 if every operand
/// broadcasts along `i`.
pub fn resolve_output_shape<A: StridedOperand>(
    operands: &[A],
    orders: &[LoopOrder],
) -> Result<Vec<usize>> {
    if operands.len() != orders.len() {
        return Err(LoopError::OperandCountMismatch {
            expected: operands.len(),
            found: orders.len(),
        });
    }
    let nlevels = common_len(orders)?;
    Ok((0..nlevels)
        .map(|level| level_extent(operands, orders, level))
        .collect())
}

/// Extent of one logical level: the first concrete binding's length, else 1.
pub(crate) fn level_extent<A: StridedOperand>(
    operands: &[A],
    orders: &[LoopOrder],
    level: usize,
) -> usize {
    operands
        .iter()
        .zip(orders)
        .find_map(|(op, order)| order.get(level).dim().map(|d| op.dim(d)))
        .unwrap_or(1)
}

/// Produce a destination of `shape`.
///
/// Without an existing buffer, fresh storage is allocated in `layout`. An
/// existing buffer is resized in place when possible; otherwise it is dropped
/// and fresh storage is allocated. Allocation failure is returned as
/// [`LoopError::AllocationError`] and never retried.
pub fn allocate_or_resize<B: OutputBuffer>(
    existing: Option<B>,
    shape: &[usize],
    layout: Layout,
) -> Result<B> {
    match existing {
        None => B::allocate(shape, layout),
        Some(mut buf) => {
            if buf.try_resize(shape, layout) {
                return Ok(buf);
            }
            tracing::debug!(?shape, ?layout, "in-place resize failed, allocating fresh output");
            drop(buf);
            B::allocate(shape, layout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OperandDesc, StridedArray};

    #[test]
    fn test_shape_with_declared_broadcast() {
        let a = OperandDesc::row_major(&[3, 1, 5]);
        let b = OperandDesc::row_major(&[3, 4, 5]);
        let orders = [
            LoopOrder::parse("0,x,2").unwrap(),
            LoopOrder::identity(3),
        ];
        assert_eq!(resolve_output_shape(&[a, b], &orders).unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn test_shape_fully_broadcast_level_is_one() {
        let a = OperandDesc::row_major(&[2]);
        let b = OperandDesc::row_major(&[2]);
        let orders = [
            LoopOrder::parse("0,x").unwrap(),
            LoopOrder::parse("0,x").unwrap(),
        ];
        assert_eq!(resolve_output_shape(&[a, b], &orders).unwrap(), vec![2, 1]);
    }

    #[test]
    fn test_shape_first_bound_operand_wins() {
        let a = OperandDesc::row_major(&[2, 7]);
        let b = OperandDesc::row_major(&[7]);
        let orders = [LoopOrder::parse("x,1").unwrap(), LoopOrder::parse("x,0").unwrap()];
        assert_eq!(resolve_output_shape(&[a, b], &orders).unwrap(), vec![1, 7]);
    }

    #[test]
    fn test_allocate_fresh() {
        let out: StridedArray<f64> = allocate_or_resize(None, &[2, 3], Layout::ColMajor).unwrap();
        assert_eq!(out.dims(), &[2, 3]);
        assert_eq!(out.strides(), &[1, 2]);
    }

    #[test]
    fn test_resize_in_place() {
        let existing = StridedArray::<f64>::row_major(&[4]);
        let out = allocate_or_resize(Some(existing), &[2, 2], Layout::RowMajor).unwrap();
        assert_eq!(out.dims(), &[2, 2]);
        assert_eq!(out.strides(), &[2, 1]);
    }

    #[test]
    fn test_resize_failure_falls_back_to_allocation() {
        let existing = StridedArray::<f64>::row_major(&[2, 3, 4]).permute(&[2, 0, 1]);
        let out = allocate_or_resize(Some(existing), &[5, 6], Layout::RowMajor).unwrap();
        assert_eq!(out.dims(), &[5, 6]);
        assert_eq!(out.strides(), &[6, 1]);
    }

    #[test]
    fn test_allocation_error_propagates() {
        let err = allocate_or_resize::<StridedArray<u8>>(None, &[usize::MAX, 3], Layout::RowMajor)
            .unwrap_err();
        assert!(matches!(err, LoopError::AllocationError { .. }));
    }
}

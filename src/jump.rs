//! Per-level pointer jumps for flat-pointer iteration.
//!
//! Walking the levels from innermost to outermost with `adjust = 0`:
//! - concrete level with stride `s`, length `n`: `jump = s - adjust`, then `adjust = n * s`;
//! - broadcast level: `jump = -adjust`, then `adjust = 0`.
//!
//! After the levels nested inside level `i` complete a full cycle the pointer
//! sits `adjust` past where level `i`'s iteration began, so adding `jump_i`
//! lands it exactly one stride (or zero, if broadcast) further along.

use crate::loop_order::LoopOrder;
use crate::operand::StridedOperand;

/// Jump, length and stride of every level for one operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTable {
    jumps: Vec<isize>,
    lens: Vec<Option<usize>>,
    strides: Vec<isize>,
}

impl JumpTable {
    /// Number of levels covered.
    pub fn levels(&self) -> usize {
        self.jumps.len()
    }

    /// Pointer delta applied after each iteration of `level`.
    #[inline]
    pub fn jump(&self, level: usize) -> isize {
        self.jumps[level]
    }

    /// Length of the bound physical dimension, `None` when broadcast.
    #[inline]
    pub fn len(&self, level: usize) -> Option<usize> {
        self.lens[level]
    }

    /// Net pointer step for one iteration of `level` (0 when broadcast).
    #[inline]
    pub fn stride(&self, level: usize) -> isize {
        self.strides[level]
    }

    pub fn jumps(&self) -> &[isize] {
        &self.jumps
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// `true` if the table covers no levels.
    pub fn is_empty(&self) -> bool {
        self.jumps.is_empty()
    }
}

/// Derive the jump table of `operand` under `order`.
///
/// The operand must already have passed [`crate::validate`] against `order`.
pub fn plan_jumps<A: StridedOperand + ?Sized>(operand: &A, order: &LoopOrder) -> JumpTable {
    let nlevels = order.len();
    let mut jumps = vec![0isize; nlevels];
    let mut lens = vec![None; nlevels];
    let mut strides = vec![0isize; nlevels];

    let mut adjust = 0isize;
    for (level, idx) in order.iter().enumerate().rev() {
        match idx.dim() {
            Some(d) => {
                let n = operand.dim(d);
                let s = operand.stride(d);
                jumps[level] = s - adjust;
                lens[level] = Some(n);
                strides[level] = s;
                adjust = n as isize * s;
            }
            None => {
                jumps[level] = -adjust;
                adjust = 0;
            }
        }
    }

    let table = JumpTable {
        jumps,
        lens,
        strides,
    };
    tracing::trace!(order = %order, jumps = ?table.jumps, "planned jump table");
    table
}

/// [`plan_jumps`] for every operand, in operand order.
pub fn plan_all_jumps<A: StridedOperand>(operands: &[A], orders: &[LoopOrder]) -> Vec<JumpTable> {
    operands
        .iter()
        .zip(orders)
        .map(|(op, order)| plan_jumps(op, order))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DType, OperandDesc};

    #[test]
    fn test_contiguous_row_major_outer_jumps_vanish() {
        let op = OperandDesc::row_major(&[3, 4, 5]);
        let table = plan_jumps(&op, &LoopOrder::identity(3));
        assert_eq!(table.jumps(), &[0, 0, 1]);
        assert_eq!(table.strides(), &[20, 5, 1]);
        assert_eq!(table.len(0), Some(3));
    }

    #[test]
    fn test_column_major_in_row_order() {
        let op = OperandDesc::col_major(&[3, 4]);
        let table = plan_jumps(&op, &LoopOrder::identity(2));
        // inner: stride 3, n 4 -> jump 3, adjust 12; outer: 1 - 12
        assert_eq!(table.jumps(), &[-11, 3]);
    }

    #[test]
    fn test_broadcast_levels() {
        let op = OperandDesc::row_major(&[4]);
        let table = plan_jumps(&op, &LoopOrder::parse("x,0").unwrap());
        assert_eq!(table.jumps(), &[-4, 1]);
        assert_eq!(table.len(0), None);
        assert_eq!(table.stride(0), 0);

        let table = plan_jumps(&op, &LoopOrder::parse("0,x").unwrap());
        // innermost broadcast: no movement, and nothing to undo at the outer level
        assert_eq!(table.jumps(), &[1, 0]);
    }

    #[test]
    fn test_broadcast_resets_adjust() {
        let op = OperandDesc::row_major(&[2, 3]);
        let table = plan_jumps(&op, &LoopOrder::parse("0,x,1").unwrap());
        // level 2: jump 1, adjust 3; level 1 (x): jump -3, adjust 0; level 0: jump 3
        assert_eq!(table.jumps(), &[3, -3, 1]);
    }

    #[test]
    fn test_negative_strides() {
        let op = OperandDesc::new(&[3], &[-2], DType::F32);
        let table = plan_jumps(&op, &LoopOrder::identity(1));
        assert_eq!(table.jumps(), &[-2]);
    }

    #[test]
    fn test_rank_zero() {
        let op = OperandDesc::row_major(&[]);
        let table = plan_jumps(&op, &LoopOrder::identity(0));
        assert!(table.is_empty());
    }
}

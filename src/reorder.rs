//! Locality-driven loop reordering.
//!
//! Loops are sorted by decreasing absolute stride of a reference operand
//! (usually the output), so its smallest stride ends up innermost. Ties go to
//! the higher logical dimension first.

use crate::config::LoopConfig;
use crate::jump::plan_jumps;
use crate::loop_order::{LoopIndex, LoopOrder};
use crate::operand::StridedOperand;
use crate::plan::{IterationPlan, LoopLevel, PlanKind};
use crate::shape::level_extent;
use crate::validate::validate;
use crate::{LoopError, Result};

/// Nesting order (outermost first) of the logical dimensions of `order`,
/// sorted by decreasing `|stride|` of `operand`; broadcast dimensions count as
/// stride 0. Equal strides are ordered by decreasing logical index.
pub fn reorder_permutation<A: StridedOperand + ?Sized>(operand: &A, order: &LoopOrder) -> Vec<usize> {
    let mut keyed: Vec<(usize, usize)> = order
        .iter()
        .enumerate()
        .map(|(i, idx)| {
            let stride = idx.dim().map_or(0, |d| operand.stride(d).unsigned_abs());
            (stride, i)
        })
        .collect();
    keyed.sort_unstable_by(|a, b| b.cmp(a));
    keyed.into_iter().map(|(_, i)| i).collect()
}

fn permute_order(order: &LoopOrder, perm: &[usize]) -> LoopOrder {
    LoopOrder::new(perm.iter().map(|&p| order.get(p)).collect())
}

/// Emit a loop nest reordered for the memory locality of operand `reference`.
///
/// Only `inner_task` is spliced in, at the innermost level; every operand's
/// element offset there is the sum of its per-level `stride * iteration`
/// contributions. The outermost level carries a parallel hint when its extent
/// reaches the configured minimum.
pub fn reorder_loop<A: StridedOperand, S>(
    operands: &[A],
    orders: &[LoopOrder],
    reference: usize,
    inner_task: S,
    config: &LoopConfig,
) -> Result<IterationPlan<S>> {
    validate(operands, orders)?;
    if reference >= operands.len() {
        return Err(LoopError::InvalidReference {
            index: reference,
            count: operands.len(),
        });
    }
    let depth = orders[reference].len();
    let perm = reorder_permutation(&operands[reference], &orders[reference]);

    let totals: Vec<usize> = (0..depth)
        .map(|level| level_extent(operands, orders, level))
        .collect();

    let init_strides: Vec<Vec<isize>> = operands
        .iter()
        .zip(orders)
        .map(|(op, order)| {
            order
                .iter()
                .map(|idx| match idx {
                    LoopIndex::Concrete(d) => op.stride(d),
                    LoopIndex::Broadcast => 0,
                })
                .collect()
        })
        .collect();

    let tables: Vec<_> = operands
        .iter()
        .zip(orders)
        .map(|(op, order)| plan_jumps(op, &permute_order(order, &perm)))
        .collect();

    let mut inner_task = Some(inner_task);
    let levels: Vec<LoopLevel<S>> = perm
        .iter()
        .enumerate()
        .map(|(level, &src)| {
            let extent = totals[src];
            LoopLevel {
                extent,
                parallel: level == 0 && config.parallel_for(extent),
                source: src,
                pre: None,
                task: if level + 1 == depth {
                    inner_task.take()
                } else {
                    None
                },
                pointer_inits: if level == 0 {
                    (0..operands.len()).collect()
                } else {
                    Vec::new()
                },
                jumps: tables.iter().map(|t| t.jump(level)).collect(),
                strides: init_strides.iter().map(|s| s[src]).collect(),
            }
        })
        .collect();

    tracing::debug!(
        reference,
        permutation = ?perm,
        extents = ?levels.iter().map(|l| l.extent).collect::<Vec<_>>(),
        "reordered loop nest"
    );

    Ok(IterationPlan {
        kind: PlanKind::Reordered,
        noperands: operands.len(),
        levels,
        // Depth 0: the task runs exactly once, with nothing to loop over.
        epilogue: inner_task,
        min_parallel_len: config.min_parallel_len,
    })
}

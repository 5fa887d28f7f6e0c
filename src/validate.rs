//! Shape validation under broadcasting rules.

use crate::loop_order::{common_len, LoopOrder};
use crate::operand::StridedOperand;
use crate::{LoopError, Result};

/// Validate `operands` against their `orders`.
///
/// Checks, in this order, so the reported error is deterministic:
/// 1. one loop order per operand, all of the same length;
/// 2. every operand has rank `>= 1 + max(concrete index)` (operands in declaration order);
/// 3. per logical dimension (outermost first), the first operand with a concrete
///    binding agrees in length with every later one.
///
/// A length-1 concrete binding that disagrees with another operand is rejected
/// as [`LoopError::DisallowedRuntimeBroadcast`]: broadcasting must be declared with
/// [`crate::LoopIndex::Broadcast`].
pub fn validate<A: StridedOperand>(operands: &[A], orders: &[LoopOrder]) -> Result<()> {
    let result = validate_inner(operands, orders);
    if let Err(err) = &result {
        tracing::debug!(error = %err, "operand validation failed");
    }
    result
}

fn validate_inner<A: StridedOperand>(operands: &[A], orders: &[LoopOrder]) -> Result<()> {
    if operands.len() != orders.len() {
        return Err(LoopError::OperandCountMismatch {
            expected: operands.len(),
            found: orders.len(),
        });
    }
    let nlevels = common_len(orders)?;

    for (operand, (op, order)) in operands.iter().zip(orders).enumerate() {
        if let Some(required) = order.required_rank() {
            if op.rank() < required {
                return Err(LoopError::InsufficientRank {
                    operand,
                    required,
                    actual: op.rank(),
                });
            }
        }
    }

    for level in 0..nlevels {
        let mut bound = orders
            .iter()
            .enumerate()
            .filter_map(|(j, order)| order.get(level).dim().map(|d| (j, d)));

        let Some((j0, d0)) = bound.next() else {
            continue;
        };
        let n0 = operands[j0].dim(d0);
        for (j, d) in bound {
            let n = operands[j].dim(d);
            if n == n0 {
                continue;
            }
            return Err(if n0 == 1 || n == 1 {
                LoopError::DisallowedRuntimeBroadcast {
                    operand_a: j0,
                    dim_a: d0,
                    len_a: n0,
                    operand_b: j,
                    dim_b: d,
                    len_b: n,
                }
            } else {
                LoopError::DimensionMismatch {
                    operand_a: j0,
                    dim_a: d0,
                    len_a: n0,
                    operand_b: j,
                    dim_b: d,
                    len_b: n,
                }
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperandDesc;

    fn orders(specs: &[&str]) -> Vec<LoopOrder> {
        specs.iter().map(|s| LoopOrder::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_declared_broadcast_passes() {
        let a = OperandDesc::row_major(&[3, 1, 5]);
        let b = OperandDesc::row_major(&[3, 4, 5]);
        assert_eq!(validate(&[a, b], &orders(&["0,x,2", "0,1,2"])), Ok(()));
    }

    #[test]
    fn test_undeclared_length_one_is_runtime_broadcast() {
        let a = OperandDesc::row_major(&[3, 1, 5]);
        let b = OperandDesc::row_major(&[3, 4, 5]);
        let err = validate(&[a, b], &orders(&["0,1,2", "0,1,2"])).unwrap_err();
        assert_eq!(
            err,
            LoopError::DisallowedRuntimeBroadcast {
                operand_a: 0,
                dim_a: 1,
                len_a: 1,
                operand_b: 1,
                dim_b: 1,
                len_b: 4,
            }
        );
        assert!(err.to_string().contains("runtime broadcasting not allowed"));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = OperandDesc::row_major(&[3, 5]);
        let b = OperandDesc::row_major(&[4, 5]);
        let err = validate(&[a, b], &orders(&["0,1", "0,1"])).unwrap_err();
        assert_eq!(
            err,
            LoopError::DimensionMismatch {
                operand_a: 0,
                dim_a: 0,
                len_a: 3,
                operand_b: 1,
                dim_b: 0,
                len_b: 4,
            }
        );
    }

    #[test]
    fn test_insufficient_rank_reported_before_shapes() {
        let a = OperandDesc::row_major(&[3, 5]);
        let b = OperandDesc::row_major(&[4]);
        let err = validate(&[a, b], &orders(&["0,1", "1,0"])).unwrap_err();
        assert_eq!(
            err,
            LoopError::InsufficientRank {
                operand: 1,
                required: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_all_broadcast_operand_has_no_rank_requirement() {
        let a = OperandDesc::row_major(&[2, 3]);
        let s = OperandDesc::row_major(&[]);
        assert_eq!(validate(&[a, s], &orders(&["0,1", "x,x"])), Ok(()));
    }

    #[test]
    fn test_first_failing_level_wins() {
        // Level 0 has a plain mismatch, level 1 a runtime broadcast; level 0 is reported.
        let a = OperandDesc::row_major(&[3, 1]);
        let b = OperandDesc::row_major(&[4, 6]);
        let err = validate(&[a, b], &orders(&["0,1", "0,1"])).unwrap_err();
        assert!(matches!(err, LoopError::DimensionMismatch { dim_a: 0, .. }));
    }

    #[test]
    fn test_compares_against_first_bound_operand() {
        let a = OperandDesc::row_major(&[4]);
        let b = OperandDesc::row_major(&[4]);
        let c = OperandDesc::row_major(&[7]);
        let err = validate(&[a, b, c], &orders(&["0", "x", "0"])).unwrap_err();
        assert!(matches!(
            err,
            LoopError::DimensionMismatch {
                operand_a: 0,
                operand_b: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_transposed_binding() {
        let a = OperandDesc::row_major(&[3, 4]);
        let b = OperandDesc::row_major(&[4, 3]);
        assert_eq!(validate(&[a, b], &orders(&["0,1", "1,0"])), Ok(()));
    }

    #[test]
    fn test_count_and_length_mismatch() {
        let a = OperandDesc::row_major(&[3]);
        assert!(matches!(
            validate(&[a.clone()], &[]),
            Err(LoopError::OperandCountMismatch { expected: 1, found: 0 })
        ));
        assert!(matches!(
            validate(&[a.clone(), a], &orders(&["0", "0,x"])),
            Err(LoopError::LoopOrderLengthMismatch { operand: 1, .. })
        ));
    }
}

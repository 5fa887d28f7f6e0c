//! Strided broadcast-loop planner and code generator.
//!
//! Given N strided operands and, for each of them, a [`LoopOrder`] binding every
//! logical output dimension either to a physical dimension or to a broadcast
//! marker, this crate
//!
//! 1. validates that the operands agree on every shared logical dimension ([`validate`]),
//! 2. infers the output shape and allocates or resizes the destination ([`resolve_output_shape`],
//!    [`allocate_or_resize`]),
//! 3. derives per-level pointer jumps so iteration never recomputes a multi-index
//!    address ([`plan_jumps`]),
//! 4. emits a nested loop plan over opaque caller-supplied statements, either in the
//!    declared loop order ([`emit_loop`], [`emit_reduction_loop`]) or reordered for
//!    memory locality ([`reorder_loop`]).
//!
//! The resulting [`IterationPlan`] can be walked directly ([`IterationPlan::execute`],
//! [`IterationPlan::for_each_element`]) or rendered as C source ([`render_c`]).
//!
//! # Example
//!
//! ```rust
//! use strided_loops::{emit_loop, LevelTasks, LoopConfig, LoopOrder, OperandDesc};
//!
//! // out[i, j] = a[i, j] + b[j]; `b` is broadcast along the first logical dimension.
//! let out = OperandDesc::row_major(&[3, 4]);
//! let a = OperandDesc::row_major(&[3, 4]);
//! let b = OperandDesc::row_major(&[4]);
//! let orders = [
//!     LoopOrder::identity(2),
//!     LoopOrder::identity(2),
//!     LoopOrder::parse("x,0").unwrap(),
//! ];
//!
//! let tasks: LevelTasks<&str> = LevelTasks::inner_only(2, "out_i = a_i + b_i;");
//! let plan = emit_loop(&[&out, &a, &b], &orders, tasks, &LoopConfig::default()).unwrap();
//! assert_eq!(plan.extents(), vec![3, 4]);
//!
//! let mut visited = Vec::new();
//! plan.for_each_element(|offsets| visited.push(offsets[2]));
//! assert_eq!(&visited[..4], &[0, 1, 2, 3]);
//! assert_eq!(&visited[4..8], &[0, 1, 2, 3]);
//! ```
//!
//! # Parallel execution
//!
//! With the `parallel` feature, the outermost level of a plan may carry a
//! parallel hint when its extent reaches [`LoopConfig::min_parallel_len`]. Only
//! the outermost level is ever hinted, and reduction plans never are. See [`IterationPlan::par_for_each_element`].

mod array;
mod codegen;
mod config;
mod emit;
mod jump;
mod loop_order;
mod operand;
mod plan;
mod reorder;
mod shape;
#[cfg(feature = "parallel")]
mod threading;
mod validate;

pub use array::{col_major_strides, row_major_strides, Layout, OutputBuffer, StridedArray};
pub use codegen::{render_c, CodegenContext};
pub use config::{LoopConfig, DEFAULT_MIN_PARALLEL_LEN};
pub use emit::{emit_loop, emit_reduction_loop, LevelTasks};
pub use jump::{plan_all_jumps, plan_jumps, JumpTable};
pub use loop_order::{LoopIndex, LoopOrder};
pub use operand::{DType, Element, OperandDesc, StridedOperand};
pub use plan::{Cursor, IterationPlan, LoopLevel, PlanKind, PlanVisitor};
pub use reorder::{reorder_loop, reorder_permutation};
pub use shape::{allocate_or_resize, resolve_output_shape};
pub use validate::validate;

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while validating operands or building an iteration plan.
///
/// Every error is detected before any loop runs; nothing is written to the
/// output buffer when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoopError {
    /// An operand has fewer dimensions than its loop order references.
    #[error("not enough dimensions on input {operand}: loop order needs rank >= {required}, got {actual}")]
    InsufficientRank {
        operand: usize,
        required: usize,
        actual: usize,
    },

    /// Two operands disagree on a shared logical dimension and neither length is 1.
    #[error(
        "input dimension mismatch: (input[{operand_a}].shape[{dim_a}] = {len_a}, \
         input[{operand_b}].shape[{dim_b}] = {len_b})"
    )]
    DimensionMismatch {
        operand_a: usize,
        dim_a: usize,
        len_a: usize,
        operand_b: usize,
        dim_b: usize,
        len_b: usize,
    },

    /// Two operands disagree on a shared logical dimension and one side has
    /// length 1 without being declared broadcastable.
    #[error(
        "runtime broadcasting not allowed: one input had a distinct dimension length of 1 \
         but was not marked as broadcastable: (input[{operand_a}].shape[{dim_a}] = {len_a}, \
         input[{operand_b}].shape[{dim_b}] = {len_b}); bind that dimension to \
         LoopIndex::Broadcast if broadcasting was intended"
    )]
    DisallowedRuntimeBroadcast {
        operand_a: usize,
        dim_a: usize,
        len_a: usize,
        operand_b: usize,
        dim_b: usize,
        len_b: usize,
    },

    /// The output buffer could not be allocated or resized.
    #[error("failed to allocate output of shape {shape:?}: {reason}")]
    AllocationError { shape: Vec<usize>, reason: String },

    /// The number of loop orders (or dtypes, names) does not match the number of operands.
    #[error("operand count mismatch: expected {expected}, found {found}")]
    OperandCountMismatch { expected: usize, found: usize },

    /// A loop order does not cover the same number of logical dimensions as the others.
    #[error("loop order of input {operand} has length {found}, expected {expected}")]
    LoopOrderLengthMismatch {
        operand: usize,
        expected: usize,
        found: usize,
    },

    /// The per-level task list does not have one entry per logical dimension.
    #[error("task count mismatch: expected {expected} levels, found {found}")]
    TaskCountMismatch { expected: usize, found: usize },

    /// The reference operand index for reordering is out of range.
    #[error("reference operand {index} out of range for {count} operands")]
    InvalidReference { index: usize, count: usize },

    /// A loop-order string could not be parsed.
    #[error("invalid loop order: {0}")]
    InvalidLoopOrder(String),

    /// A configuration override could not be parsed.
    #[error("invalid configuration value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, LoopError>;

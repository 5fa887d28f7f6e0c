//! Canonical loop-nest emission in the declared loop order.

use crate::config::LoopConfig;
use crate::jump::plan_all_jumps;
use crate::loop_order::LoopOrder;
use crate::operand::StridedOperand;
use crate::plan::{IterationPlan, LoopLevel, PlanKind};
use crate::shape::level_extent;
use crate::validate::validate;
use crate::{LoopError, Result};

/// Caller-supplied statements for each nesting level plus a trailing one.
///
/// Level `i` holds a `(pre, task)` pair: `pre` runs before the level's loop
/// starts, `task` runs once per iteration after every nested level has run.
/// The epilogue runs once after the whole nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTasks<S> {
    levels: Vec<(Option<S>, Option<S>)>,
    epilogue: Option<S>,
}

impl<S> LevelTasks<S> {
    pub fn new(levels: Vec<(Option<S>, Option<S>)>, epilogue: Option<S>) -> Self {
        Self { levels, epilogue }
    }

    /// `depth` levels without any statements.
    pub fn empty(depth: usize) -> Self {
        Self {
            levels: (0..depth).map(|_| (None, None)).collect(),
            epilogue: None,
        }
    }

    /// A single statement run at every point of the iteration space.
    ///
    /// With `depth == 0` the statement becomes the epilogue, which runs exactly once.
    pub fn inner_only(depth: usize, task: S) -> Self {
        let mut tasks = Self::empty(depth);
        match tasks.levels.last_mut() {
            Some(last) => last.1 = Some(task),
            None => tasks.epilogue = Some(task),
        }
        tasks
    }

    /// Set the statement run before `level`'s loop starts.
    ///
    /// # Panics
    ///
    /// Panics if `level >= self.depth()`.
    pub fn with_pre(mut self, level: usize, stmt: S) -> Self {
        self.levels[level].0 = Some(stmt);
        self
    }

    /// Set the statement run once per iteration of `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level >= self.depth()`.
    pub fn with_task(mut self, level: usize, stmt: S) -> Self {
        self.levels[level].1 = Some(stmt);
        self
    }

    pub fn with_epilogue(mut self, stmt: S) -> Self {
        self.epilogue = Some(stmt);
        self
    }

    /// Number of levels covered.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}

/// Emit the elementwise loop nest for `operands` in their declared loop order.
///
/// Levels count upward; each iteration runs the nested levels, then the
/// level's task, then advances every operand pointer by the level's jump.
pub fn emit_loop<A: StridedOperand, S>(
    operands: &[A],
    orders: &[LoopOrder],
    tasks: LevelTasks<S>,
    config: &LoopConfig,
) -> Result<IterationPlan<S>> {
    build_canonical(PlanKind::Elementwise, operands, orders, tasks, config)
}

/// Emit the accumulation variant of [`emit_loop`].
///
/// The visitation order and element set are identical to [`emit_loop`]; only
/// the emission shape differs (downward counting, `+= jump` stepping). The
/// outermost level never carries a parallel hint, since accumulation targets
/// repeat across its iterations.
pub fn emit_reduction_loop<A: StridedOperand, S>(
    operands: &[A],
    orders: &[LoopOrder],
    tasks: LevelTasks<S>,
    config: &LoopConfig,
) -> Result<IterationPlan<S>> {
    build_canonical(PlanKind::Reduction, operands, orders, tasks, config)
}

fn build_canonical<A: StridedOperand, S>(
    kind: PlanKind,
    operands: &[A],
    orders: &[LoopOrder],
    tasks: LevelTasks<S>,
    config: &LoopConfig,
) -> Result<IterationPlan<S>> {
    validate(operands, orders)?;
    let depth = orders.first().map_or(0, LoopOrder::len);
    if tasks.depth() != depth {
        return Err(LoopError::TaskCountMismatch {
            expected: depth,
            found: tasks.depth(),
        });
    }

    let tables = plan_all_jumps(operands, orders);

    // Each pointer is (re)initialised where its operand first has a concrete
    // binding; fully broadcast operands start at the outermost level.
    let mut inits: Vec<Vec<usize>> = vec![Vec::new(); depth];
    if depth > 0 {
        for (op, order) in orders.iter().enumerate() {
            inits[order.first_concrete_level().unwrap_or(0)].push(op);
        }
    }

    let levels: Vec<LoopLevel<S>> = tasks
        .levels
        .into_iter()
        .zip(inits)
        .enumerate()
        .map(|(level, ((pre, task), pointer_inits))| {
            let extent = level_extent(operands, orders, level);
            LoopLevel {
                extent,
                // Reductions revisit output elements across outer iterations.
                parallel: level == 0 && kind != PlanKind::Reduction && config.parallel_for(extent),
                source: level,
                pre,
                task,
                pointer_inits,
                jumps: tables.iter().map(|t| t.jump(level)).collect(),
                strides: tables.iter().map(|t| t.stride(level)).collect(),
            }
        })
        .collect();

    let plan = IterationPlan {
        kind,
        noperands: operands.len(),
        levels,
        epilogue: tasks.epilogue,
        min_parallel_len: config.min_parallel_len,
    };
    tracing::debug!(
        ?kind,
        depth,
        operands = plan.noperands,
        extents = ?plan.extents(),
        parallel = ?plan.parallel_levels(),
        "emitted loop nest"
    );
    Ok(plan)
}

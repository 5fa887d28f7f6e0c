//! The iteration plan artifact and its sequential executor.
//!
//! A plan is a nest of [`LoopLevel`]s, outermost first. Each level carries its
//! extent, the per-operand pointer jump and net stride, the opaque statements
//! spliced into it, and the operands whose running pointer is (re)initialised
//! when the level is entered.

use smallvec::SmallVec;

/// Stack-allocated Vec for per-level / per-operand scratch.
pub(crate) type SVec<T> = SmallVec<[T; 8]>;

/// How the plan was produced; decides the emission shape of its loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanKind {
    /// Declared loop order, counting up, per-level pre/per-iteration statements.
    Elementwise,
    /// Declared loop order, counting down, `+= jump` pointer stepping.
    Reduction,
    /// Levels permuted for locality; one statement at the innermost level.
    Reordered,
}

/// One level of the loop nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopLevel<S> {
    pub(crate) extent: usize,
    pub(crate) parallel: bool,
    pub(crate) source: usize,
    pub(crate) pre: Option<S>,
    pub(crate) task: Option<S>,
    pub(crate) pointer_inits: Vec<usize>,
    pub(crate) jumps: Vec<isize>,
    pub(crate) strides: Vec<isize>,
}

impl<S> LoopLevel<S> {
    /// Iteration count of this level.
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Whether this level carries a parallel-execution hint.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Logical output dimension this level walks.
    pub fn source_dim(&self) -> usize {
        self.source
    }

    /// Statement run before the level's loop starts.
    pub fn pre(&self) -> Option<&S> {
        self.pre.as_ref()
    }

    /// Statement run once per iteration, after the nested levels.
    pub fn task(&self) -> Option<&S> {
        self.task.as_ref()
    }

    /// Operands whose running pointer is reset to their data base on entry.
    pub fn pointer_inits(&self) -> &[usize] {
        &self.pointer_inits
    }

    /// Per-operand pointer delta applied after each iteration.
    pub fn jumps(&self) -> &[isize] {
        &self.jumps
    }

    /// Per-operand net step of one iteration (0 for broadcast operands).
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    fn map<T>(self, f: &mut impl FnMut(S) -> T) -> LoopLevel<T> {
        LoopLevel {
            extent: self.extent,
            parallel: self.parallel,
            source: self.source,
            pre: self.pre.map(&mut *f),
            task: self.task.map(&mut *f),
            pointer_inits: self.pointer_inits,
            jumps: self.jumps,
            strides: self.strides,
        }
    }
}

/// A complete nested-loop plan over opaque statements `S`.
///
/// Plans are immutable once emitted; emitting twice from identical inputs
/// yields equal plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationPlan<S> {
    pub(crate) kind: PlanKind,
    pub(crate) noperands: usize,
    pub(crate) levels: Vec<LoopLevel<S>>,
    pub(crate) epilogue: Option<S>,
    pub(crate) min_parallel_len: usize,
}

impl<S> IterationPlan<S> {
    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    /// Number of operands the plan advances.
    pub fn noperands(&self) -> usize {
        self.noperands
    }

    /// Levels, outermost first.
    pub fn levels(&self) -> &[LoopLevel<S>] {
        &self.levels
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Statement run once after the whole nest completes.
    pub fn epilogue(&self) -> Option<&S> {
        self.epilogue.as_ref()
    }

    /// Extents in nesting order.
    pub fn extents(&self) -> Vec<usize> {
        self.levels.iter().map(|l| l.extent).collect()
    }

    /// Logical dimension walked at each nesting level.
    pub fn permutation(&self) -> Vec<usize> {
        self.levels.iter().map(|l| l.source).collect()
    }

    /// Number of innermost iterations: the product of all extents (1 for depth 0).
    pub fn total_len(&self) -> usize {
        self.levels.iter().map(|l| l.extent).product()
    }

    /// Threshold the parallel hints were gated on.
    pub fn min_parallel_len(&self) -> usize {
        self.min_parallel_len
    }

    /// Indices of the levels carrying a parallel hint.
    pub fn parallel_levels(&self) -> Vec<usize> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.parallel)
            .map(|(i, _)| i)
            .collect()
    }

    /// Replace every statement, keeping the loop structure.
    pub fn map_statements<T>(self, mut f: impl FnMut(S) -> T) -> IterationPlan<T> {
        IterationPlan {
            kind: self.kind,
            noperands: self.noperands,
            levels: self.levels.into_iter().map(|l| l.map(&mut f)).collect(),
            epilogue: self.epilogue.map(&mut f),
            min_parallel_len: self.min_parallel_len,
        }
    }

    /// Run the plan sequentially, handing each statement to `visitor` at its
    /// splice point.
    ///
    /// Elementwise and reduction plans step pointers by their jumps; reordered
    /// plans compute each innermost offset from the accumulated
    /// `stride * iteration` contributions.
    pub fn execute<V: PlanVisitor<S>>(&self, visitor: &mut V) {
        let mut offsets: SVec<isize> = SmallVec::from_elem(0, self.noperands);
        let mut index: SVec<usize> = SmallVec::from_elem(0, self.levels.len());
        let sources = self.permutation();
        if !self.levels.is_empty() {
            self.run_level(0, &mut offsets, &mut index, &sources, visitor);
        }
        if let Some(stmt) = &self.epilogue {
            let cursor = Cursor {
                offsets: &offsets,
                index: &index,
                sources: &sources,
            };
            visitor.epilogue(stmt, &cursor);
        }
    }

    fn run_level<V: PlanVisitor<S>>(
        &self,
        level: usize,
        offsets: &mut [isize],
        index: &mut [usize],
        sources: &[usize],
        visitor: &mut V,
    ) {
        let lvl = &self.levels[level];
        for &op in &lvl.pointer_inits {
            offsets[op] = 0;
        }
        if let Some(pre) = &lvl.pre {
            let cursor = Cursor {
                offsets,
                index,
                sources,
            };
            visitor.pre_loop(level, pre, &cursor);
        }
        let innermost = level + 1 == self.levels.len();
        for it in 0..lvl.extent {
            index[level] = it;
            if innermost && self.kind == PlanKind::Reordered {
                self.stride_sum_offsets(index, offsets);
            }
            if !innermost {
                self.run_level(level + 1, offsets, index, sources, visitor);
            }
            if let Some(task) = &lvl.task {
                let cursor = Cursor {
                    offsets,
                    index,
                    sources,
                };
                visitor.task(level, task, &cursor);
            }
            if self.kind != PlanKind::Reordered {
                for (o, &j) in offsets.iter_mut().zip(&lvl.jumps) {
                    *o += j;
                }
            }
        }
        index[level] = 0;
    }

    fn stride_sum_offsets(&self, index: &[usize], offsets: &mut [isize]) {
        for (op, o) in offsets.iter_mut().enumerate() {
            *o = self
                .levels
                .iter()
                .zip(index)
                .map(|(l, &i)| l.strides[op] * i as isize)
                .sum();
        }
    }

    /// Call `f` with every operand's element offset, once per point of the
    /// iteration space, in nesting order.
    pub fn for_each_element<F: FnMut(&[isize])>(&self, mut f: F) {
        let start: SVec<isize> = SmallVec::from_elem(0, self.noperands);
        match self.kind {
            PlanKind::Reordered => walk_stride_sum(&self.levels, &start, &mut f),
            PlanKind::Elementwise | PlanKind::Reduction => walk_jumps(&self.levels, &start, &mut f),
        }
    }
}

/// Odometer walk of `levels` stepping pointers by their jumps.
pub(crate) fn walk_jumps<S, F: FnMut(&[isize])>(levels: &[LoopLevel<S>], start: &[isize], f: &mut F) {
    if levels.iter().any(|l| l.extent == 0) {
        return;
    }
    let mut offsets: SVec<isize> = SmallVec::from_slice(start);
    let mut idx: SVec<usize> = SmallVec::from_elem(0, levels.len());
    loop {
        f(&offsets);
        // Carry-style increment from the innermost level outward.
        let mut level = levels.len();
        loop {
            if level == 0 {
                return;
            }
            level -= 1;
            for (o, &j) in offsets.iter_mut().zip(&levels[level].jumps) {
                *o += j;
            }
            idx[level] += 1;
            if idx[level] < levels[level].extent {
                break;
            }
            idx[level] = 0;
        }
    }
}

/// Odometer walk of `levels` recomputing each offset from the multi-index.
pub(crate) fn walk_stride_sum<S, F: FnMut(&[isize])>(
    levels: &[LoopLevel<S>],
    start: &[isize],
    f: &mut F,
) {
    if levels.iter().any(|l| l.extent == 0) {
        return;
    }
    let mut offsets: SVec<isize> = SmallVec::from_slice(start);
    let mut idx: SVec<usize> = SmallVec::from_elem(0, levels.len());
    loop {
        for (op, o) in offsets.iter_mut().enumerate() {
            *o = start[op]
                + levels
                    .iter()
                    .zip(idx.iter())
                    .map(|(l, &i)| l.strides[op] * i as isize)
                    .sum::<isize>();
        }
        f(&offsets);
        let mut level = levels.len();
        loop {
            if level == 0 {
                return;
            }
            level -= 1;
            idx[level] += 1;
            if idx[level] < levels[level].extent {
                break;
            }
            idx[level] = 0;
        }
    }
}

/// Position handed to a [`PlanVisitor`] at a splice point.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    offsets: &'a [isize],
    index: &'a [usize],
    sources: &'a [usize],
}

impl<'a> Cursor<'a> {
    /// Every operand's running pointer, as an element offset from its data base.
    pub fn offsets(&self) -> &'a [isize] {
        self.offsets
    }

    /// Running pointer of one operand.
    pub fn offset(&self, operand: usize) -> isize {
        self.offsets[operand]
    }

    /// Current iteration of every level, in nesting order. Levels not yet
    /// entered read 0.
    pub fn index(&self) -> &'a [usize] {
        self.index
    }

    /// The iteration indices rearranged into logical output dimension order.
    pub fn logical_index(&self) -> Vec<usize> {
        let mut out = vec![0usize; self.index.len()];
        for (&i, &src) in self.index.iter().zip(self.sources) {
            out[src] = i;
        }
        out
    }
}

/// Receiver of the statements of an executing plan.
pub trait PlanVisitor<S> {
    /// Called before the loop of `level` starts, each time it is entered.
    fn pre_loop(&mut self, _level: usize, _stmt: &S, _cursor: &Cursor<'_>) {}

    /// Called once per iteration of `level`, after all nested levels ran.
    fn task(&mut self, level: usize, stmt: &S, cursor: &Cursor<'_>);

    /// Called once after the whole nest completed.
    fn epilogue(&mut self, _stmt: &S, _cursor: &Cursor<'_>) {}
}

//! Rayon-backed execution of a plan's parallel-hinted outermost level.
//!
//! Each outer iteration seeds its own pointer state from the level's net
//! strides and walks the nested levels sequentially; only the immutable jump
//! and stride tables are shared between workers.

use rayon::prelude::*;
use smallvec::SmallVec;

use crate::plan::{walk_jumps, IterationPlan, SVec};

impl<S: Sync> IterationPlan<S> {
    /// Like [`IterationPlan::for_each_element`], but runs the outermost level
    /// across the rayon thread pool when it carries a parallel hint.
    ///
    /// Without a hint on level 0 this is sequential. Elements are visited
    /// exactly once, in unspecified order across outer iterations; within one
    /// outer iteration they follow nesting order. `f` must only write through
    /// offsets that are disjoint between outer iterations.
    pub fn par_for_each_element<F>(&self, f: F)
    where
        F: Fn(&[isize]) + Sync + Send,
    {
        let Some((outer, inner)) = self.levels.split_first() else {
            let zeros: SVec<isize> = SmallVec::from_elem(0, self.noperands);
            f(&zeros);
            return;
        };
        if !outer.parallel {
            self.for_each_element(&f);
            return;
        }

        tracing::debug!(extent = outer.extent, "running outermost level in parallel");
        (0..outer.extent).into_par_iter().for_each(|i| {
            let start: SVec<isize> = outer.strides.iter().map(|&s| s * i as isize).collect();
            walk_jumps(inner, &start, &mut |offsets: &[isize]| f(offsets));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::{emit_loop, reorder_loop, LevelTasks, LoopConfig, LoopOrder, OperandDesc};

    #[test]
    fn test_parallel_visits_match_sequential() {
        let out = OperandDesc::row_major(&[64, 9]);
        let inp = OperandDesc::col_major(&[64, 9]);
        let orders = [LoopOrder::identity(2), LoopOrder::identity(2)];
        let config = LoopConfig::default()
            .with_parallel(true)
            .with_min_parallel_len(16);
        let plan = emit_loop(&[&out, &inp], &orders, LevelTasks::inner_only(2, ()), &config).unwrap();
        assert_eq!(plan.parallel_levels(), vec![0]);

        let mut expected = Vec::new();
        plan.for_each_element(|o| expected.push(o.to_vec()));
        let seen = Mutex::new(Vec::new());
        plan.par_for_each_element(|o| seen.lock().unwrap().push(o.to_vec()));
        let mut seen = seen.into_inner().unwrap();
        expected.sort();
        seen.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_parallel_reordered_counts() {
        let out = OperandDesc::col_major(&[32, 40]);
        let config = LoopConfig::default()
            .with_parallel(true)
            .with_min_parallel_len(1);
        let plan = reorder_loop(&[out], &[LoopOrder::identity(2)], 0, (), &config).unwrap();
        let count = AtomicUsize::new(0);
        plan.par_for_each_element(|_| {
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(count.into_inner(), 32 * 40);
    }
}

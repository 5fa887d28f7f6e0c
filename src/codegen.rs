//! C/C++ source rendering of an [`IterationPlan`].
//!
//! Statements are spliced verbatim through their `Display` impl. Each operand
//! `name` gets a running pointer `name_iter`; elementwise and reordered plans
//! also bind `name_i` to the current element at the innermost level.
//!
//! A parallel-hinted outermost level is rendered with an OpenMP pragma and
//! re-derives every running pointer from the iteration counter inside the loop
//! body, so each thread owns its pointer state.

use std::fmt::Display;

use crate::operand::DType;
use crate::plan::{IterationPlan, LoopLevel, PlanKind};
use crate::{LoopError, Result};

/// Operand names, element types and data-pointer accessor for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenContext {
    names: Vec<String>,
    dtypes: Vec<DType>,
    data_fn: Option<String>,
}

impl CodegenContext {
    pub fn new<N: Into<String>>(names: impl IntoIterator<Item = N>, dtypes: &[DType]) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            dtypes: dtypes.to_vec(),
            data_fn: None,
        }
    }

    /// Read data pointers as `data_fn(name)` instead of the default `name_data`.
    pub fn with_data_fn(mut self, data_fn: impl Into<String>) -> Self {
        self.data_fn = Some(data_fn.into());
        self
    }

    fn data(&self, op: usize) -> String {
        let name = &self.names[op];
        let ty = self.dtypes[op].c_name();
        match &self.data_fn {
            Some(f) => format!("({ty}*)({f}({name}))"),
            None => format!("({ty}*)({name}_data)"),
        }
    }
}

struct CodeWriter {
    out: String,
    indent: usize,
}

impl CodeWriter {
    fn line(&mut self, text: impl AsRef<str>) {
        for l in text.as_ref().lines() {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.out.push_str(l);
            self.out.push('\n');
        }
    }

    fn open(&mut self, header: impl AsRef<str>) {
        match header.as_ref() {
            "" => self.line("{"),
            h => self.line(format!("{h} {{")),
        }
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent -= 1;
        self.line("}");
    }
}

/// Render `plan` as a self-contained C++ block.
///
/// Fails with [`LoopError::OperandCountMismatch`] if `ctx` does not name every operand.
pub fn render_c<S: Display>(plan: &IterationPlan<S>, ctx: &CodegenContext) -> Result<String> {
    let n = plan.noperands();
    for found in [ctx.names.len(), ctx.dtypes.len()] {
        if found != n {
            return Err(LoopError::OperandCountMismatch { expected: n, found });
        }
    }

    let mut w = CodeWriter {
        out: String::new(),
        indent: 0,
    };
    w.open("");
    for op in 0..n {
        w.line(format!("{}* {}_iter;", ctx.dtypes[op].c_name(), ctx.names[op]));
    }
    if plan.levels().is_empty() {
        for op in 0..n {
            w.line(format!("{}_iter = {};", ctx.names[op], ctx.data(op)));
        }
    } else {
        render_level(plan, 0, ctx, &mut w);
    }
    if let Some(stmt) = plan.epilogue() {
        w.line(stmt.to_string());
    }
    w.close();
    Ok(w.out)
}

fn render_level<S: Display>(
    plan: &IterationPlan<S>,
    level: usize,
    ctx: &CodegenContext,
    w: &mut CodeWriter,
) {
    let lvl: &LoopLevel<S> = &plan.levels()[level];
    let innermost = level + 1 == plan.depth();
    let private_pointers = level == 0 && lvl.is_parallel();
    let iter = format!("ITER_{level}");

    if !private_pointers {
        for &op in lvl.pointer_inits() {
            w.line(format!("{}_iter = {};", ctx.names[op], ctx.data(op)));
        }
    }
    if let Some(pre) = lvl.pre() {
        w.line(pre.to_string());
    }
    if lvl.is_parallel() {
        w.line(format!(
            "#pragma omp parallel for if({} >= {})",
            lvl.extent(),
            plan.min_parallel_len()
        ));
    }
    match plan.kind() {
        PlanKind::Reduction => w.open(format!(
            "for (npy_intp {iter} = {}; {iter}; {iter}--)",
            lvl.extent()
        )),
        PlanKind::Elementwise | PlanKind::Reordered => w.open(format!(
            "for (npy_intp {iter} = 0; {iter} < {}; {iter}++)",
            lvl.extent()
        )),
    }

    if private_pointers {
        for op in 0..plan.noperands() {
            // Reordered pointers never move; offsets come from the counters.
            let step = match plan.kind() {
                PlanKind::Reordered => String::new(),
                _ => format!(" + {iter} * ({})", lvl.strides()[op]),
            };
            w.line(format!(
                "{}* {}_iter = {}{step};",
                ctx.dtypes[op].c_name(),
                ctx.names[op],
                ctx.data(op)
            ));
        }
    }

    if innermost {
        render_element_refs(plan, ctx, w);
    } else {
        render_level(plan, level + 1, ctx, w);
    }
    if let Some(task) = lvl.task() {
        w.line(task.to_string());
    }
    if plan.kind() != PlanKind::Reordered && !private_pointers {
        for (op, &jump) in lvl.jumps().iter().enumerate() {
            if jump != 0 {
                w.line(format!("{}_iter += {jump};", ctx.names[op]));
            }
        }
    }
    w.close();
}

fn render_element_refs<S>(plan: &IterationPlan<S>, ctx: &CodegenContext, w: &mut CodeWriter) {
    match plan.kind() {
        PlanKind::Reduction => {}
        PlanKind::Elementwise => {
            for op in 0..plan.noperands() {
                w.line(format!(
                    "{}& {name}_i = *{name}_iter;",
                    ctx.dtypes[op].c_name(),
                    name = ctx.names[op]
                ));
            }
        }
        PlanKind::Reordered => {
            for op in 0..plan.noperands() {
                let mut expr = format!("{}_iter", ctx.names[op]);
                for (level, lvl) in plan.levels().iter().enumerate() {
                    let s = lvl.strides()[op];
                    if s != 0 {
                        expr.push_str(&format!(" + ({s}) * ITER_{level}"));
                    }
                }
                w.line(format!(
                    "{}& {}_i = *({expr});",
                    ctx.dtypes[op].c_name(),
                    ctx.names[op]
                ));
            }
        }
    }
}

//! Query tracing. A [`Ranger`] built in tracing mode logs every query it
//! answers, nested ones included, with a call counter and indentation that
//! follows the recursion depth; [`TraceRanger`] is the public face of that
//! mode.

use crate::cfg::{BlockId, Cfg, EdgeId, Operand, StmtLoc, VarId};
use crate::range::ranger::{RangeQuery, Ranger};
use crate::range::Range;

pub struct TraceRanger {
    inner: Ranger,
}

impl TraceRanger {
    pub fn new() -> Self {
        TraceRanger { inner: Ranger::with_trace() }
    }

    pub fn log(&self) -> &str {
        self.inner.trace_log()
    }

    pub fn take_log(&mut self) -> String {
        self.inner.take_trace_log()
    }

    pub fn into_inner(self) -> Ranger {
        self.inner
    }
}

impl Default for TraceRanger {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeQuery for TraceRanger {
    fn range_of_expr(&mut self, cfg: &Cfg, op: &Operand, stmt: Option<StmtLoc>) -> Range {
        self.inner.range_of_expr(cfg, op, stmt)
    }

    fn range_of_stmt(&mut self, cfg: &Cfg, loc: StmtLoc) -> Range {
        self.inner.range_of_stmt(cfg, loc)
    }

    fn range_on_entry(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range {
        self.inner.range_on_entry(cfg, block, var)
    }

    fn range_on_exit(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range {
        self.inner.range_on_exit(cfg, block, var)
    }

    fn range_on_edge(&mut self, cfg: &Cfg, edge: EdgeId, var: VarId) -> Range {
        self.inner.range_on_edge(cfg, edge, var)
    }
}

/// Build a query engine, optionally wrapped in tracing.
pub fn enable_ranger(trace: bool) -> Box<dyn RangeQuery> {
    if trace {
        Box::new(TraceRanger::new())
    } else {
        Box::new(Ranger::new())
    }
}

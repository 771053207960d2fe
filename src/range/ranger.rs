//! On-demand range queries over a CFG.
//!
//! The entry points mirror the places a client can ask about a value: at a
//! statement, entering or leaving a block, or on one outgoing edge. Edge
//! queries fold the block's conditional backwards through the operator's
//! solvers, which is where branch knowledge turns into narrower ranges.

use std::collections::HashSet;

use serde::Serialize;

use crate::cfg::{BlockId, Cfg, CfgStmt, EdgeId, Operand, StmtLoc, VarId};
use crate::range::cache::RangeCache;
use crate::range::fold::fold_stmt;
use crate::range::ops::{range_false, range_true};
use crate::range::source::SourceDepend;
use crate::range::table::binary_handler;
use crate::range::Range;

pub trait RangeQuery {
    /// Range of an operand, optionally as of a particular statement.
    fn range_of_expr(&mut self, cfg: &Cfg, op: &Operand, stmt: Option<StmtLoc>) -> Range;

    /// Range produced by a statement's definition.
    fn range_of_stmt(&mut self, cfg: &Cfg, loc: StmtLoc) -> Range;

    fn range_on_entry(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range;

    fn range_on_exit(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range;

    fn range_on_edge(&mut self, cfg: &Cfg, edge: EdgeId, var: VarId) -> Range;
}

/// One variable's range as written out by the export pass.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalRangeFact {
    pub var: String,
    pub range: Range,
}

/// Numbered, indentation-nested query log kept by an engine built in
/// tracing mode.
#[derive(Default)]
struct TraceLog {
    depth: usize,
    counter: u64,
    out: String,
}

impl TraceLog {
    fn enter(&mut self, what: &str) -> u64 {
        self.counter += 1;
        let id = self.counter;
        self.out.push_str(&format!("{:indent$}{id} {what}\n", "", indent = self.depth * 2));
        self.depth += 1;
        id
    }

    fn leave(&mut self, id: u64, r: &Range) {
        self.depth -= 1;
        self.out.push_str(&format!("{:indent$}{id} = {r}\n", "", indent = self.depth * 2));
    }
}

fn describe_operand(cfg: &Cfg, op: &Operand) -> String {
    match op {
        Operand::Var(v) => cfg.var(*v).name.clone(),
        Operand::Const { value, .. } => format!("{value}"),
    }
}

#[derive(Default)]
pub struct Ranger {
    cache: RangeCache,
    /// Definitions currently being folded; a revisit is a cycle.
    active_defs: HashSet<VarId>,
    /// Entry computations in flight, for back-edge cutoff.
    active_entries: HashSet<(BlockId, VarId)>,
    /// Present in tracing mode. The recursion funnels through the trait
    /// methods, so nested queries land here too.
    trace: Option<TraceLog>,
}

impl Ranger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_trace() -> Self {
        Ranger { trace: Some(TraceLog::default()), ..Self::default() }
    }

    pub(crate) fn trace_log(&self) -> &str {
        self.trace.as_ref().map_or("", |t| t.out.as_str())
    }

    pub(crate) fn take_trace_log(&mut self) -> String {
        self.trace.as_mut().map(|t| std::mem::take(&mut t.out)).unwrap_or_default()
    }

    fn trace_enter(&mut self, what: impl FnOnce() -> String) -> Option<u64> {
        self.trace.as_mut().map(|t| t.enter(&what()))
    }

    fn trace_leave(&mut self, id: Option<u64>, r: &Range) {
        if let (Some(t), Some(id)) = (self.trace.as_mut(), id) {
            t.leave(id, r);
        }
    }

    fn known_range(&self, cfg: &Cfg, var: VarId) -> Range {
        cfg.var(var)
            .global_range
            .clone()
            .unwrap_or_else(|| Range::varying(cfg.var(var).ty))
    }

    /// Refine `r` with what taking `edge` says about `var`, if the source
    /// block ends in a conditional mentioning it.
    fn refine_on_edge(&mut self, cfg: &Cfg, edge: EdgeId, var: VarId, r: &mut Range) {
        let src = cfg.edge(edge).src;
        let Some(last) = cfg.last_stmt_loc(src) else {
            return;
        };
        let CfgStmt::Cond { op, op1, op2, true_edge, false_edge } = cfg.stmt(last).clone() else {
            return;
        };
        let outcome = if edge == true_edge {
            range_true()
        } else if edge == false_edge {
            range_false()
        } else {
            return;
        };
        let Some(handler) = binary_handler(op) else {
            return;
        };
        let ty = cfg.var(var).ty;
        if op1 == Operand::Var(var) {
            let other = self.range_of_expr(cfg, &op2, Some(last));
            if let Some(refined) = handler.op1_range(ty, &outcome, &other) {
                r.intersect_with(&refined);
            }
        }
        if op2 == Operand::Var(var) {
            let other = self.range_of_expr(cfg, &op1, Some(last));
            if let Some(refined) = handler.op2_range(ty, &outcome, &other) {
                r.intersect_with(&refined);
            }
        }
    }
}

impl RangeQuery for Ranger {
    fn range_of_expr(&mut self, cfg: &Cfg, op: &Operand, stmt: Option<StmtLoc>) -> Range {
        let id = self.trace_enter(|| format!("range_of_expr ({})", describe_operand(cfg, op)));
        let r = self.expr_range(cfg, op, stmt);
        self.trace_leave(id, &r);
        r
    }

    fn range_of_stmt(&mut self, cfg: &Cfg, loc: StmtLoc) -> Range {
        let id = self.trace_enter(|| format!("range_of_stmt (bb{}.{})", loc.block.0, loc.index));
        let r = self.stmt_range(cfg, loc);
        self.trace_leave(id, &r);
        r
    }

    fn range_on_entry(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range {
        let id = self
            .trace_enter(|| format!("range_on_entry (bb{}, {})", block.0, cfg.var(var).name));
        let r = self.entry_range(cfg, block, var);
        self.trace_leave(id, &r);
        r
    }

    fn range_on_exit(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range {
        let id =
            self.trace_enter(|| format!("range_on_exit (bb{}, {})", block.0, cfg.var(var).name));
        let r = self.exit_range(cfg, block, var);
        self.trace_leave(id, &r);
        r
    }

    fn range_on_edge(&mut self, cfg: &Cfg, edge: EdgeId, var: VarId) -> Range {
        let id = self.trace_enter(|| {
            let e = cfg.edge(edge);
            format!("range_on_edge (bb{}->bb{}, {})", e.src.0, e.dst.0, cfg.var(var).name)
        });
        let r = self.edge_range(cfg, edge, var);
        self.trace_leave(id, &r);
        r
    }
}

impl Ranger {
    fn expr_range(&mut self, cfg: &Cfg, op: &Operand, stmt: Option<StmtLoc>) -> Range {
        match op {
            Operand::Const { value, ty } => Range::singleton_value(*ty, *value),
            Operand::Var(v) => {
                let Some(def) = cfg.def_of(*v) else {
                    // parameters and the like: metadata or nothing
                    return self.known_range(cfg, *v);
                };
                match stmt {
                    None => self.range_of_stmt(cfg, def),
                    Some(s) if def.block == s.block => self.range_of_stmt(cfg, def),
                    Some(s) => self.range_on_entry(cfg, s.block, *v),
                }
            }
        }
    }

    fn stmt_range(&mut self, cfg: &Cfg, loc: StmtLoc) -> Range {
        let stmt = cfg.stmt(loc);
        let Some(lhs) = stmt.lhs() else {
            // a conditional's value is its boolean outcome
            let mut src = SourceDepend::new(self, loc);
            return fold_stmt(cfg, &mut src, loc);
        };
        if self.cache.global_is_current(lhs) {
            if let Some(r) = self.cache.get_global(lhs) {
                return r.clone();
            }
        }
        let ty = cfg.var(lhs).ty;
        if !self.active_defs.insert(lhs) {
            // cycle through a back edge: contribute no information
            return Range::varying(ty);
        }
        let mut src = SourceDepend::new(self, loc);
        let mut r = fold_stmt(cfg, &mut src, loc);
        let deps = src.into_deps();
        if let Some(global) = &cfg.var(lhs).global_range {
            r.intersect_with(global);
        }
        self.active_defs.remove(&lhs);
        self.cache.deps.merge(deps);
        self.cache.set_global(lhs, r.clone());
        r
    }

    fn entry_range(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range {
        if let Some(r) = self.cache.get_entry(block, var) {
            return r.clone();
        }
        if !self.active_entries.insert((block, var)) {
            return Range::varying(cfg.var(var).ty);
        }
        let r = if block == cfg.entry || cfg.block(block).preds.is_empty() {
            self.known_range(cfg, var)
        } else {
            let ty = cfg.var(var).ty;
            let mut r = Range::undefined(ty);
            for e in cfg.block(block).preds.clone() {
                r.union_with(&self.range_on_edge(cfg, e, var));
                if r.is_varying() {
                    break;
                }
            }
            r
        };
        self.active_entries.remove(&(block, var));
        self.cache.set_entry(block, var, r.clone());
        r
    }

    fn exit_range(&mut self, cfg: &Cfg, block: BlockId, var: VarId) -> Range {
        match cfg.def_of(var) {
            Some(def) if def.block == block => self.range_of_stmt(cfg, def),
            _ => self.range_on_entry(cfg, block, var),
        }
    }

    fn edge_range(&mut self, cfg: &Cfg, edge: EdgeId, var: VarId) -> Range {
        let mut r = self.range_on_exit(cfg, cfg.edge(edge).src, var);
        self.refine_on_edge(cfg, edge, var, &mut r);
        r
    }
}

impl Ranger {
    /// Evaluate every definition and persist what was learned into the
    /// variables' global metadata. Returns the learned facts.
    pub fn export_global_ranges(&mut self, cfg: &mut Cfg) -> Vec<GlobalRangeFact> {
        let mut facts = Vec::new();
        for v in (0..cfg.var_count() as u32).map(VarId) {
            let Some(def) = cfg.def_of(v) else {
                continue;
            };
            let r = self.range_of_stmt(cfg, def);
            if r.is_varying() || r.is_undefined() {
                continue;
            }
            facts.push(GlobalRangeFact { var: cfg.var(v).name.clone(), range: r.clone() });
            cfg.var_mut(v).global_range = Some(r);
        }
        facts
    }

    /// Machine-readable form of the exported facts.
    pub fn export_json(&mut self, cfg: &mut Cfg) -> serde_json::Result<String> {
        let facts = self.export_global_ranges(cfg);
        serde_json::to_string_pretty(&facts)
    }

    /// Human-readable listing of every definition's computed range.
    pub fn dump(&mut self, cfg: &Cfg) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for b in (0..cfg.block_count() as u32).map(BlockId) {
            let _ = writeln!(out, "bb{}:", b.0);
            for i in 0..cfg.block(b).stmts.len() {
                let loc = StmtLoc { block: b, index: i };
                match cfg.stmt(loc).lhs() {
                    Some(lhs) => {
                        let r = self.range_of_stmt(cfg, loc);
                        let _ = writeln!(out, "  {} : {}", cfg.var(lhs).name, r);
                    }
                    None => {
                        if let CfgStmt::Cond { .. } = cfg.stmt(loc) {
                            let r = self.range_of_stmt(cfg, loc);
                            let _ = writeln!(out, "  <branch> : {}", r);
                        }
                    }
                }
            }
        }
        out
    }
}

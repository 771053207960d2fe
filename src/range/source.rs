//! Operand sources: where a statement fold gets its incoming ranges.
//!
//! The folder never talks to the query engine directly; it pulls operand
//! ranges through [`OperandSource`], so the same fold code serves supplied
//! range lists, in-context statement queries, and edge-restricted queries.

use crate::cfg::{Cfg, EdgeId, Operand, StmtLoc, VarId};
use crate::range::cache::DependencyMap;
use crate::range::ranger::RangeQuery;
use crate::range::Range;

/// Range of a constant operand.
pub fn const_range(op: &Operand) -> Option<Range> {
    match op {
        Operand::Const { value, ty } => Some(Range::singleton_value(*ty, *value)),
        Operand::Var(_) => None,
    }
}

pub trait OperandSource {
    fn get_operand(&mut self, cfg: &Cfg, op: &Operand) -> Option<Range>;

    /// Range of a phi argument as it flows across its edge.
    fn get_phi_operand(&mut self, cfg: &Cfg, op: &Operand, edge: EdgeId) -> Option<Range>;

    /// Note that `lhs` was computed from `rhs`. Default ignores it.
    fn register_dependency(&mut self, _lhs: VarId, _rhs: VarId) {}
}

/// Feeds a fold from a fixed list of ranges, one per operand in order.
/// Constants past the end of the list still resolve.
pub struct SourceList<'a> {
    ranges: &'a [Range],
    next: usize,
}

impl<'a> SourceList<'a> {
    pub fn new(ranges: &'a [Range]) -> Self {
        SourceList { ranges, next: 0 }
    }
}

impl OperandSource for SourceList<'_> {
    fn get_operand(&mut self, _cfg: &Cfg, op: &Operand) -> Option<Range> {
        if self.next < self.ranges.len() {
            let r = self.ranges[self.next].clone();
            self.next += 1;
            Some(r)
        } else {
            const_range(op)
        }
    }

    fn get_phi_operand(&mut self, cfg: &Cfg, op: &Operand, _edge: EdgeId) -> Option<Range> {
        self.get_operand(cfg, op)
    }
}

/// Resolves operands as of a statement, through the query engine.
pub struct SourceStmt<'a> {
    query: &'a mut dyn RangeQuery,
    stmt: StmtLoc,
}

impl<'a> SourceStmt<'a> {
    pub fn new(query: &'a mut dyn RangeQuery, stmt: StmtLoc) -> Self {
        SourceStmt { query, stmt }
    }
}

impl OperandSource for SourceStmt<'_> {
    fn get_operand(&mut self, cfg: &Cfg, op: &Operand) -> Option<Range> {
        match op {
            Operand::Const { .. } => const_range(op),
            Operand::Var(_) => Some(self.query.range_of_expr(cfg, op, Some(self.stmt))),
        }
    }

    fn get_phi_operand(&mut self, cfg: &Cfg, op: &Operand, edge: EdgeId) -> Option<Range> {
        match op {
            Operand::Const { .. } => const_range(op),
            Operand::Var(v) => Some(self.query.range_on_edge(cfg, edge, *v)),
        }
    }
}

/// Resolves operands as they are on one specific edge.
pub struct SourceEdge<'a> {
    query: &'a mut dyn RangeQuery,
    edge: EdgeId,
}

impl<'a> SourceEdge<'a> {
    pub fn new(query: &'a mut dyn RangeQuery, edge: EdgeId) -> Self {
        SourceEdge { query, edge }
    }
}

impl OperandSource for SourceEdge<'_> {
    fn get_operand(&mut self, cfg: &Cfg, op: &Operand) -> Option<Range> {
        match op {
            Operand::Const { .. } => const_range(op),
            Operand::Var(v) => Some(self.query.range_on_edge(cfg, self.edge, *v)),
        }
    }

    fn get_phi_operand(&mut self, cfg: &Cfg, op: &Operand, edge: EdgeId) -> Option<Range> {
        match op {
            Operand::Const { .. } => const_range(op),
            Operand::Var(v) => Some(self.query.range_on_edge(cfg, edge, *v)),
        }
    }
}

/// Statement source that also records def-use dependencies for the
/// staleness tracking in the cache.
pub struct SourceDepend<'a> {
    inner: SourceStmt<'a>,
    deps: DependencyMap,
}

impl<'a> SourceDepend<'a> {
    pub fn new(query: &'a mut dyn RangeQuery, stmt: StmtLoc) -> Self {
        SourceDepend { inner: SourceStmt::new(query, stmt), deps: DependencyMap::default() }
    }

    pub fn into_deps(self) -> DependencyMap {
        self.deps
    }
}

impl OperandSource for SourceDepend<'_> {
    fn get_operand(&mut self, cfg: &Cfg, op: &Operand) -> Option<Range> {
        self.inner.get_operand(cfg, op)
    }

    fn get_phi_operand(&mut self, cfg: &Cfg, op: &Operand, edge: EdgeId) -> Option<Range> {
        self.inner.get_phi_operand(cfg, op, edge)
    }

    fn register_dependency(&mut self, lhs: VarId, rhs: VarId) {
        self.deps.record(lhs, rhs);
    }
}

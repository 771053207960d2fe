//! Index-based control-flow graph the range engine queries.
//!
//! Blocks, edges, and variables are entity indices into the owning `Cfg`;
//! statements are SSA-flavored (one definition per variable) and sit in
//! block-local order. Tests assemble graphs directly with the builder
//! methods.

use std::collections::HashMap;

use serde::Serialize;

use crate::hir::{BinOp, IntType, UnOp};
use crate::range::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VarId(pub u32);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeId(pub u32);

/// Identity of one statement: its block and position inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StmtLoc {
    pub block: BlockId,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub ty: IntType,
    /// Metadata slot the engine's export pass writes back into.
    pub global_range: Option<Range>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Var(VarId),
    Const { value: u128, ty: IntType },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CfgStmt {
    Binary { lhs: VarId, op: BinOp, op1: Operand, op2: Operand },
    Unary { lhs: VarId, op: UnOp, op1: Operand },
    Phi { lhs: VarId, args: Vec<(EdgeId, Operand)> },
    Call { lhs: Option<VarId>, callee: String, args: Vec<Operand> },
    /// Block terminator branching on a comparison.
    Cond { op: BinOp, op1: Operand, op2: Operand, true_edge: EdgeId, false_edge: EdgeId },
    /// Conditional move.
    Select { lhs: VarId, cond: Operand, then_val: Operand, else_val: Operand },
}

impl CfgStmt {
    pub fn lhs(&self) -> Option<VarId> {
        match self {
            CfgStmt::Binary { lhs, .. }
            | CfgStmt::Unary { lhs, .. }
            | CfgStmt::Phi { lhs, .. }
            | CfgStmt::Select { lhs, .. } => Some(*lhs),
            CfgStmt::Call { lhs, .. } => *lhs,
            CfgStmt::Cond { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub src: BlockId,
    pub dst: BlockId,
}

#[derive(Debug, Default)]
pub struct Block {
    pub stmts: Vec<CfgStmt>,
    pub preds: Vec<EdgeId>,
    pub succs: Vec<EdgeId>,
}

#[derive(Debug, Default)]
pub struct Cfg {
    vars: Vec<Var>,
    blocks: Vec<Block>,
    edges: Vec<Edge>,
    defs: HashMap<VarId, StmtLoc>,
    pub entry: BlockId,
}

impl Cfg {
    pub fn new() -> Self {
        let mut cfg = Self::default();
        cfg.entry = cfg.add_block();
        cfg
    }

    pub fn add_var(&mut self, name: impl Into<String>, ty: IntType) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Var { name: name.into(), ty, global_range: None });
        id
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        id
    }

    pub fn add_edge(&mut self, src: BlockId, dst: BlockId) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge { src, dst });
        self.blocks[src.0 as usize].succs.push(id);
        self.blocks[dst.0 as usize].preds.push(id);
        id
    }

    /// Append a statement and record the definition point of its lhs.
    pub fn push_stmt(&mut self, block: BlockId, stmt: CfgStmt) -> StmtLoc {
        let loc = StmtLoc { block, index: self.blocks[block.0 as usize].stmts.len() };
        if let Some(lhs) = stmt.lhs() {
            self.defs.insert(lhs, loc);
        }
        self.blocks[block.0 as usize].stmts.push(stmt);
        loc
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Var {
        &mut self.vars[id.0 as usize]
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn edge(&self, id: EdgeId) -> Edge {
        self.edges[id.0 as usize]
    }

    pub fn stmt(&self, loc: StmtLoc) -> &CfgStmt {
        &self.blocks[loc.block.0 as usize].stmts[loc.index]
    }

    pub fn def_of(&self, var: VarId) -> Option<StmtLoc> {
        self.defs.get(&var).copied()
    }

    pub fn last_stmt_loc(&self, block: BlockId) -> Option<StmtLoc> {
        let n = self.blocks[block.0 as usize].stmts.len();
        if n == 0 {
            None
        } else {
            Some(StmtLoc { block, index: n - 1 })
        }
    }

    pub fn operand_ty(&self, op: &Operand) -> IntType {
        match op {
            Operand::Var(v) => self.var(*v).ty,
            Operand::Const { ty, .. } => *ty,
        }
    }
}

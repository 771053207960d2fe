//! Statement folding: compute the range a statement's result can take
//! given operand ranges pulled from an [`OperandSource`].

use crate::cfg::{Cfg, CfgStmt, Operand, StmtLoc};
use crate::hir::IntType;
use crate::range::source::OperandSource;
use crate::range::table::{binary_handler, range_cast, unary_handler};
use crate::range::wide;
use crate::range::Range;

/// Library calls known to produce nonnegative results.
const NONNEGATIVE_CALLEES: &[&str] = &[
    "__builtin_popcount",
    "__builtin_clz",
    "__builtin_ctz",
    "__builtin_ffs",
    "__builtin_parity",
    "abs",
    "labs",
    "strlen",
];

fn operand_range(cfg: &Cfg, src: &mut dyn OperandSource, op: &Operand) -> Range {
    src.get_operand(cfg, op)
        .unwrap_or_else(|| Range::varying(cfg.operand_ty(op)))
}

/// Fold one statement. Statements without a computed value (a bare call,
/// for instance) fold to undefined; a conditional folds to its boolean
/// outcome range.
pub fn fold_stmt(cfg: &Cfg, src: &mut dyn OperandSource, loc: StmtLoc) -> Range {
    match cfg.stmt(loc).clone() {
        CfgStmt::Binary { lhs, op, op1, op2 } => {
            let ty = cfg.var(lhs).ty;
            for o in [&op1, &op2] {
                if let Operand::Var(v) = o {
                    src.register_dependency(lhs, *v);
                }
            }
            let Some(handler) = binary_handler(op) else {
                return Range::varying(ty);
            };
            let r1 = operand_range(cfg, src, &op1);
            let r2 = operand_range(cfg, src, &op2);
            handler.fold_range(ty, &r1, &r2)
        }
        CfgStmt::Unary { lhs, op, op1 } => {
            let ty = cfg.var(lhs).ty;
            if let Operand::Var(v) = op1 {
                src.register_dependency(lhs, v);
            }
            let Some(handler) = unary_handler(op) else {
                return Range::varying(ty);
            };
            let r1 = operand_range(cfg, src, &op1);
            handler.fold_range(ty, &r1, &Range::varying(ty))
        }
        CfgStmt::Phi { lhs, args } => {
            let ty = cfg.var(lhs).ty;
            let mut r = Range::undefined(ty);
            for (edge, op) in &args {
                if let Operand::Var(v) = op {
                    src.register_dependency(lhs, *v);
                }
                let mut arg = src
                    .get_phi_operand(cfg, op, *edge)
                    .unwrap_or_else(|| Range::varying(cfg.operand_ty(op)));
                if arg.ty() != ty {
                    arg = range_cast(&arg, ty);
                }
                r.union_with(&arg);
                if r.is_varying() {
                    break;
                }
            }
            r
        }
        CfgStmt::Call { lhs: Some(lhs), callee, .. } => {
            let ty = cfg.var(lhs).ty;
            let mut r = if ty.signed && NONNEGATIVE_CALLEES.contains(&callee.as_str()) {
                Range::new(ty, 0, wide::max_value(ty))
            } else {
                Range::varying(ty)
            };
            if let Some(global) = &cfg.var(lhs).global_range {
                r.intersect_with(global);
            }
            r
        }
        CfgStmt::Call { lhs: None, .. } => Range::undefined(IntType::BOOL),
        CfgStmt::Cond { op, op1, op2, .. } => {
            let Some(handler) = binary_handler(op) else {
                return Range::varying(IntType::BOOL);
            };
            let r1 = operand_range(cfg, src, &op1);
            let r2 = operand_range(cfg, src, &op2);
            handler.fold_range(IntType::BOOL, &r1, &r2)
        }
        CfgStmt::Select { lhs, cond, then_val, else_val } => {
            let ty = cfg.var(lhs).ty;
            for o in [&cond, &then_val, &else_val] {
                if let Operand::Var(v) = o {
                    src.register_dependency(lhs, *v);
                }
            }
            let c = operand_range(cfg, src, &cond);
            let pick = |cfg: &Cfg, src: &mut dyn OperandSource, op: &Operand| {
                let mut r = operand_range(cfg, src, op);
                if r.ty() != ty {
                    r = range_cast(&r, ty);
                }
                r
            };
            match c.singleton() {
                Some(0) => pick(cfg, src, &else_val),
                Some(_) => pick(cfg, src, &then_val),
                None => {
                    let mut r = pick(cfg, src, &then_val);
                    r.union_with(&pick(cfg, src, &else_val));
                    r
                }
            }
        }
    }
}

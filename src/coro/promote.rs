//! Captured-temporary promotion.
//!
//! A materialized temporary bound by reference inside a full expression
//! ordinarily lives to the end of that expression. When the expression
//! also contains a suspend point, the suspension boundary falls inside
//! that lifetime, so the temporary must move into a named frame-resident
//! local before planning. The statement is wrapped in a synthesized scope
//! holding the hoisted initializations, and every original occurrence is
//! substituted.

use crate::hir::visit::{walk_expr, Visitor};
use crate::hir::{Block, Expr, Stmt, TypeId};
use crate::span::Spanned;

use super::LowerCtx;

struct SuspendFinder {
    found: bool,
}

impl Visitor for SuspendFinder {
    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        if self.found {
            return;
        }
        match &expr.node {
            Expr::Await { .. } | Expr::Yield { .. } => self.found = true,
            _ => walk_expr(self, expr),
        }
    }
}

fn stmt_suspends(stmt: &Stmt) -> bool {
    let mut f = SuspendFinder { found: false };
    f.visit_stmt(stmt);
    f.found
}

pub fn promote_captured_temps(ctx: &mut LowerCtx<'_>, block: &mut Block) {
    for stmt in &mut block.stmts {
        promote_in_stmt(ctx, stmt);
    }
}

fn promote_in_stmt(ctx: &mut LowerCtx<'_>, stmt: &mut Stmt) {
    // Recurse into nested statement structure first; promotion applies at
    // the granularity of the full expression, i.e. one leaf statement.
    match stmt {
        Stmt::If { then_block, else_block, .. } => {
            promote_captured_temps(ctx, then_block);
            if let Some(b) = else_block {
                promote_captured_temps(ctx, b);
            }
            // The condition is handled below as part of this statement.
        }
        Stmt::While { body, .. } => promote_captured_temps(ctx, body),
        Stmt::Scope(b) => {
            promote_captured_temps(ctx, b);
            return;
        }
        Stmt::TryCatchAll { body, .. } => {
            promote_captured_temps(ctx, body);
            return;
        }
        _ => {}
    }

    if !stmt_suspends(stmt) {
        return;
    }
    let site = ctx.next_promote_site();
    let mut hoisted: Vec<(String, TypeId, Spanned<Expr>)> = Vec::new();
    for_each_expr(stmt, &mut |expr| hoist_temps(ctx, site, expr, &mut hoisted));
    if hoisted.is_empty() {
        return;
    }

    let mut stmts: Vec<Stmt> = hoisted
        .into_iter()
        .map(|(name, ty, init)| Stmt::Let { name, ty, init: Some(init) })
        .collect();
    let old = std::mem::replace(stmt, Stmt::Trap);
    stmts.push(old);
    *stmt = Stmt::Scope(Block::new(stmts));
}

/// Apply `f` to each top-level expression owned directly by `stmt`.
fn for_each_expr(stmt: &mut Stmt, f: &mut impl FnMut(&mut Spanned<Expr>)) {
    match stmt {
        Stmt::Let { init: Some(e), .. }
        | Stmt::Expr(e)
        | Stmt::DtorCall(e)
        | Stmt::FreeFrame(e)
        | Stmt::Return(Some(e))
        | Stmt::CoReturn(Some(e)) => f(e),
        Stmt::Assign { target, value } => {
            f(target);
            f(value);
        }
        Stmt::If { cond, .. } | Stmt::While { cond, .. } => f(cond),
        Stmt::Switch { scrutinee, .. } => f(scrutinee),
        _ => {}
    }
}

/// Replace every `&<materialized temporary>` in `expr` with a reference to
/// a hoisted named local, recording the initializer for the caller.
fn hoist_temps(
    ctx: &mut LowerCtx<'_>,
    site: u32,
    expr: &mut Spanned<Expr>,
    out: &mut Vec<(String, TypeId, Spanned<Expr>)>,
) {
    if let Expr::AddrOf(inner) = &mut expr.node {
        if let Expr::Materialize { init, ty } = &mut inner.node {
            let name = format!("__aw_{site}.tmp.{}", out.len());
            let ty = *ty;
            let hoisted_init = (**init).clone();
            ctx.record_promoted(name.clone(), ty);
            inner.node = Expr::Name(name.clone());
            out.push((name, ty, hoisted_init));
            return;
        }
    }
    match &mut expr.node {
        Expr::Materialize { init, .. } => hoist_temps(ctx, site, init, out),
        Expr::AddrOf(e) | Expr::Deref(e) => hoist_temps(ctx, site, e, out),
        Expr::Unary { operand, .. } => hoist_temps(ctx, site, operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            hoist_temps(ctx, site, lhs, out);
            hoist_temps(ctx, site, rhs, out);
        }
        Expr::Call { args, .. } | Expr::Construct { args, .. } => {
            for a in args {
                hoist_temps(ctx, site, a, out);
            }
        }
        Expr::MethodCall { recv, args, .. } => {
            hoist_temps(ctx, site, recv, out);
            for a in args {
                hoist_temps(ctx, site, a, out);
            }
        }
        Expr::Await { operand, .. } | Expr::Yield { operand } => {
            hoist_temps(ctx, site, operand, out)
        }
        _ => {}
    }
}

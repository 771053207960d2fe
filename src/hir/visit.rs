//! Body traversal and the substitution rewriter the lowering passes share.
//!
//! Implement `Visitor` for collection passes, overriding only the methods
//! you need and calling the matching `walk_*` to keep recursing. Rewrites
//! go through `replace_exprs`, which applies an owned substitution in one
//! pre-order pass instead of mutating through live references.

use std::collections::HashMap;

use crate::span::Spanned;
use super::expr::{Block, Expr, ProxyId, Stmt};

pub trait Visitor: Sized {
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        walk_expr(self, expr);
    }
}

pub fn walk_block<V: Visitor>(v: &mut V, block: &Block) {
    for stmt in &block.stmts {
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Let { init, .. } => {
            if let Some(e) = init {
                v.visit_expr(e);
            }
        }
        Stmt::Assign { target, value } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        Stmt::Expr(e) | Stmt::DtorCall(e) | Stmt::FreeFrame(e) => v.visit_expr(e),
        Stmt::If { cond, then_block, else_block } => {
            v.visit_expr(cond);
            v.visit_block(then_block);
            if let Some(b) = else_block {
                v.visit_block(b);
            }
        }
        Stmt::While { cond, body } => {
            v.visit_expr(cond);
            v.visit_block(body);
        }
        Stmt::Scope(b) => v.visit_block(b),
        Stmt::Return(e) | Stmt::CoReturn(e) => {
            if let Some(e) = e {
                v.visit_expr(e);
            }
        }
        Stmt::Switch { scrutinee, arms, default } => {
            v.visit_expr(scrutinee);
            for (_, stmts) in arms {
                for s in stmts {
                    v.visit_stmt(s);
                }
            }
            for s in default {
                v.visit_stmt(s);
            }
        }
        Stmt::TryCatchAll { body, handler } => {
            v.visit_block(body);
            for s in handler {
                v.visit_stmt(s);
            }
        }
        Stmt::Label(_) | Stmt::Goto(_) | Stmt::Trap | Stmt::Park => {}
    }
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &Spanned<Expr>) {
    match &expr.node {
        Expr::Materialize { init, .. } => v.visit_expr(init),
        Expr::AddrOf(e) | Expr::Deref(e) | Expr::Move(e) => v.visit_expr(e),
        Expr::Unary { operand, .. } => v.visit_expr(operand),
        Expr::Binary { lhs, rhs, .. } => {
            v.visit_expr(lhs);
            v.visit_expr(rhs);
        }
        Expr::Call { args, .. } | Expr::Construct { args, .. } => {
            for a in args {
                v.visit_expr(a);
            }
        }
        Expr::MethodCall { recv, args, .. } => {
            v.visit_expr(recv);
            for a in args {
                v.visit_expr(a);
            }
        }
        Expr::Await { operand, .. } | Expr::Yield { operand } => v.visit_expr(operand),
        Expr::IntLit { .. }
        | Expr::BoolLit(_)
        | Expr::NullPtr
        | Expr::Name(_)
        | Expr::Proxy(_)
        | Expr::FrameRef(_)
        | Expr::SuspendPoint(_) => {}
    }
}

/// Pre-order expression rewriter. When `subst` returns `Some`, the node is
/// replaced (keeping its span) and the replacement is not re-visited; when
/// it returns `None`, the walk recurses into children.
pub fn replace_exprs(block: &mut Block, subst: &impl Fn(&Expr) -> Option<Expr>) {
    for stmt in &mut block.stmts {
        replace_in_stmt(stmt, subst);
    }
}

fn replace_in_stmt(stmt: &mut Stmt, subst: &impl Fn(&Expr) -> Option<Expr>) {
    match stmt {
        Stmt::Let { init, .. } => {
            if let Some(e) = init {
                replace_in_expr(e, subst);
            }
        }
        Stmt::Assign { target, value } => {
            replace_in_expr(target, subst);
            replace_in_expr(value, subst);
        }
        Stmt::Expr(e) | Stmt::DtorCall(e) | Stmt::FreeFrame(e) => replace_in_expr(e, subst),
        Stmt::If { cond, then_block, else_block } => {
            replace_in_expr(cond, subst);
            replace_exprs(then_block, subst);
            if let Some(b) = else_block {
                replace_exprs(b, subst);
            }
        }
        Stmt::While { cond, body } => {
            replace_in_expr(cond, subst);
            replace_exprs(body, subst);
        }
        Stmt::Scope(b) => replace_exprs(b, subst),
        Stmt::Return(e) | Stmt::CoReturn(e) => {
            if let Some(e) = e {
                replace_in_expr(e, subst);
            }
        }
        Stmt::Switch { scrutinee, arms, default } => {
            replace_in_expr(scrutinee, subst);
            for (_, stmts) in arms {
                for s in stmts {
                    replace_in_stmt(s, subst);
                }
            }
            for s in default {
                replace_in_stmt(s, subst);
            }
        }
        Stmt::TryCatchAll { body, handler } => {
            replace_exprs(body, subst);
            for s in handler {
                replace_in_stmt(s, subst);
            }
        }
        Stmt::Label(_) | Stmt::Goto(_) | Stmt::Trap | Stmt::Park => {}
    }
}

pub fn replace_in_expr(expr: &mut Spanned<Expr>, subst: &impl Fn(&Expr) -> Option<Expr>) {
    if let Some(replacement) = subst(&expr.node) {
        expr.node = replacement;
        return;
    }
    match &mut expr.node {
        Expr::Materialize { init, .. } => replace_in_expr(init, subst),
        Expr::AddrOf(e) | Expr::Deref(e) | Expr::Move(e) => replace_in_expr(e, subst),
        Expr::Unary { operand, .. } => replace_in_expr(operand, subst),
        Expr::Binary { lhs, rhs, .. } => {
            replace_in_expr(lhs, subst);
            replace_in_expr(rhs, subst);
        }
        Expr::Call { args, .. } | Expr::Construct { args, .. } => {
            for a in args {
                replace_in_expr(a, subst);
            }
        }
        Expr::MethodCall { recv, args, .. } => {
            replace_in_expr(recv, subst);
            for a in args {
                replace_in_expr(a, subst);
            }
        }
        Expr::Await { operand, .. } | Expr::Yield { operand } => replace_in_expr(operand, subst),
        Expr::IntLit { .. }
        | Expr::BoolLit(_)
        | Expr::NullPtr
        | Expr::Name(_)
        | Expr::Proxy(_)
        | Expr::FrameRef(_)
        | Expr::SuspendPoint(_) => {}
    }
}

/// Replace every `Expr::Name` occurrence per the map.
pub fn substitute_names(block: &mut Block, map: &HashMap<String, Expr>) {
    replace_exprs(block, &|e| match e {
        Expr::Name(n) => map.get(n).cloned(),
        _ => None,
    });
}

/// Replace every `Expr::Proxy` occurrence per the map.
pub fn substitute_proxies(block: &mut Block, map: &HashMap<ProxyId, Expr>) {
    replace_exprs(block, &|e| match e {
        Expr::Proxy(p) => map.get(p).cloned(),
        _ => None,
    });
}

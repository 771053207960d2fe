//! Function-body HIR consumed by the coroutine lowering pass.
//!
//! The front end producing this tree is out of scope; tests construct it
//! directly. Await/yield/co-return appear as marker nodes, and the
//! lowering pipeline rewrites them into explicit state-machine control
//! flow expressed with the lowered-only statement kinds.

pub mod expr;
pub mod types;
pub mod visit;

pub use expr::{BinOp, Block, Expr, FieldId, LabelId, ProxyId, Stmt, SuspendKind, UnOp};
pub use types::{ClassType, IntType, Method, Type, TypeId, TypeTable};

use crate::span::{Span, Spanned};

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
}

/// Properties of the enclosing declaration that gate coroutine lowering.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FnFlags {
    pub is_entry_point: bool,
    pub is_constexpr: bool,
    pub has_deduced_return: bool,
    pub is_varargs: bool,
    pub is_ctor: bool,
    pub is_dtor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: TypeId,
    pub body: Block,
    pub flags: FnFlags,
    pub span: Span,
}

impl Function {
    pub fn new(name: impl Into<String>, ret: TypeId, body: Block) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret,
            body,
            flags: FnFlags::default(),
            span: Span::dummy(),
        }
    }
}

/// Span of the first suspend keyword in a body, if any. Drives both the
/// "is this a coroutine at all" test and diagnostic placement.
pub fn first_suspend_span(body: &Block) -> Option<Span> {
    struct Finder {
        found: Option<Span>,
    }
    impl visit::Visitor for Finder {
        fn visit_expr(&mut self, expr: &Spanned<Expr>) {
            if self.found.is_some() {
                return;
            }
            match &expr.node {
                Expr::Await { .. } | Expr::Yield { .. } => self.found = Some(expr.span),
                _ => visit::walk_expr(self, expr),
            }
        }
        fn visit_stmt(&mut self, stmt: &Stmt) {
            if self.found.is_some() {
                return;
            }
            if let Stmt::CoReturn(_) = stmt {
                // The keyword itself has no stored span; fall back to the
                // returned expression's when present.
                if let Stmt::CoReturn(Some(e)) = stmt {
                    self.found = Some(e.span);
                } else {
                    self.found = Some(Span::dummy());
                }
                return;
            }
            visit::walk_stmt(self, stmt);
        }
    }
    let mut f = Finder { found: None };
    visit::walk_block(&mut f, body);
    f.found
}

/// Does the body contain any suspend keyword (await, yield, co_return)?
pub fn uses_suspend_keywords(body: &Block) -> bool {
    first_suspend_span(body).is_some()
}

//! Suspend-point construction.
//!
//! Turns each `await`/`yield` occurrence (and the synthesized initial and
//! final suspends) into a registered [`SuspendPoint`]: the awaitable
//! initializer plus the three protocol calls built against a proxy that
//! the frame planner later pins to a slot. Nothing is registered when any
//! step fails.

use std::collections::HashMap;

use crate::diagnostics::CompileError;
use crate::hir::{Block, Expr, ProxyId, Stmt, SuspendKind, Type, TypeId, TypeTable};
use crate::session::names;
use crate::span::{Span, Spanned};

use super::LowerCtx;

/// Classification of `await_suspend`'s return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReturnKind {
    Void,
    Bool,
    Handle,
}

/// A fully-built suspend point. `init` constructs the awaitable into the
/// slot `awaiter_proxy` stands for; the three calls all go through that
/// proxy.
#[derive(Debug, Clone)]
pub struct SuspendPoint {
    pub kind: SuspendKind,
    pub span: Span,
    pub awaitable_ty: TypeId,
    pub init: Spanned<Expr>,
    pub ready_call: Spanned<Expr>,
    pub suspend_call: Spanned<Expr>,
    pub resume_call: Spanned<Expr>,
    pub awaiter_proxy: ProxyId,
    pub suspend_return: SuspendReturnKind,
}

/// Lexically-scoped name -> type bindings used while walking a body.
#[derive(Debug, Default)]
pub struct TypeEnv {
    scopes: Vec<HashMap<String, TypeId>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self { scopes: vec![HashMap::new()] }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: TypeId) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name.into(), ty);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }
}

/// Best-effort expression typing against the oracle. Only the shapes an
/// awaitable operand can take need to resolve.
pub fn type_of(
    tt: &TypeTable,
    proxies: &HashMap<ProxyId, TypeId>,
    env: &TypeEnv,
    expr: &Expr,
) -> Option<TypeId> {
    match expr {
        Expr::IntLit { ty, .. } => Some(*ty),
        Expr::Materialize { ty, .. } => Some(*ty),
        Expr::Construct { ty, .. } => Some(*ty),
        Expr::Name(n) => env.lookup(n),
        Expr::Proxy(p) => proxies.get(p).copied(),
        Expr::Unary { ty, .. } => Some(*ty),
        Expr::Binary { lhs, .. } => type_of(tt, proxies, env, &lhs.node),
        Expr::MethodCall { recv, method, .. } => {
            let recv_ty = type_of(tt, proxies, env, &recv.node)?;
            tt.lookup_method(recv_ty, method).map(|m| m.ret)
        }
        Expr::Deref(inner) => match tt.get(type_of(tt, proxies, env, &inner.node)?) {
            Type::Pointer(to) => Some(*to),
            _ => None,
        },
        _ => None,
    }
}

impl<'s> LowerCtx<'s> {
    /// Steps 1-5 of the awaitable protocol: optional promise transform,
    /// optional awaitable operator rewrite, completeness check, member
    /// checks, suspend-kind classification. Registers and returns the
    /// suspend point index.
    pub fn build_co_await(
        &mut self,
        env: &TypeEnv,
        operand: Spanned<Expr>,
        kind: SuspendKind,
    ) -> Result<u32, CompileError> {
        let span = operand.span;
        let mut a = operand;

        // Promise-provided transform applies to explicit awaits only.
        if kind == SuspendKind::Await
            && self.session.types.lookup_method(self.info.promise, names::AWAIT_TRANSFORM).is_some()
        {
            a = Spanned::new(
                Expr::MethodCall {
                    recv: Box::new(Spanned::new(Expr::Proxy(self.info.promise_proxy), span)),
                    method: names::AWAIT_TRANSFORM.into(),
                    args: vec![a],
                },
                span,
            );
        }

        let mut o = a;
        let mut o_ty = type_of(&self.session.types, &self.proxy_types, env, &o.node)
            .ok_or_else(|| {
                CompileError::awaitable("cannot determine the type of the awaitable expression", span)
            })?;

        // Operator rewrite to obtain the awaitable object.
        if let Some(m) = self.session.types.lookup_method(o_ty, "operator co_await") {
            let ret = m.ret;
            o = Spanned::new(
                Expr::MethodCall { recv: Box::new(o), method: "operator co_await".into(), args: vec![] },
                span,
            );
            o_ty = ret;
        }
        let o_ty = self.session.types.strip_refs(o_ty);

        if !self.session.types.is_complete_class(o_ty) {
            return Err(CompileError::awaitable(
                format!(
                    "awaitable type '{}' is not a complete class type",
                    self.session.types.name_of(o_ty)
                ),
                span,
            ));
        }

        for required in [names::AWAIT_READY, names::AWAIT_SUSPEND, names::AWAIT_RESUME] {
            if self.session.types.lookup_method(o_ty, required).is_none() {
                return Err(CompileError::awaitable(
                    format!(
                        "no member named '{}' in '{}'",
                        required,
                        self.session.types.name_of(o_ty)
                    ),
                    span,
                ));
            }
        }

        let suspend_ret = self
            .session
            .types
            .lookup_method(o_ty, names::AWAIT_SUSPEND)
            .map(|m| m.ret)
            .ok_or_else(|| CompileError::lowering("await_suspend vanished during lookup"))?;
        let suspend_return = self.classify_suspend_return(suspend_ret).ok_or_else(|| {
            CompileError::awaitable(
                "await_suspend must return void, bool, or a coroutine handle",
                span,
            )
        })?;

        let e_proxy = self.fresh_proxy(o_ty);
        let recv = |p: ProxyId| Box::new(Spanned::new(Expr::Proxy(p), span));
        let ready_call = Spanned::new(
            Expr::MethodCall { recv: recv(e_proxy), method: names::AWAIT_READY.into(), args: vec![] },
            span,
        );
        let suspend_call = Spanned::new(
            Expr::MethodCall {
                recv: recv(e_proxy),
                method: names::AWAIT_SUSPEND.into(),
                args: vec![Spanned::new(Expr::Proxy(self.info.self_h_proxy), span)],
            },
            span,
        );
        let resume_call = Spanned::new(
            Expr::MethodCall { recv: recv(e_proxy), method: names::AWAIT_RESUME.into(), args: vec![] },
            span,
        );

        self.register_suspend(SuspendPoint {
            kind,
            span,
            awaitable_ty: o_ty,
            init: o,
            ready_call,
            suspend_call,
            resume_call,
            awaiter_proxy: e_proxy,
            suspend_return,
        })
    }

    fn classify_suspend_return(&self, ret: TypeId) -> Option<SuspendReturnKind> {
        match self.session.types.get(ret) {
            Type::Void => Some(SuspendReturnKind::Void),
            Type::Bool => Some(SuspendReturnKind::Bool),
            _ if self.session.types.is_handle_type(ret) => Some(SuspendReturnKind::Handle),
            _ => None,
        }
    }

    /// `co_yield e` is `co_await promise.yield_value(e)`.
    pub fn build_co_yield(
        &mut self,
        env: &TypeEnv,
        operand: Spanned<Expr>,
    ) -> Result<u32, CompileError> {
        let span = operand.span;
        if self.session.types.lookup_method(self.info.promise, names::YIELD_VALUE).is_none() {
            return Err(CompileError::awaitable(
                format!(
                    "no member named '{}' in promise type '{}'",
                    names::YIELD_VALUE,
                    self.session.types.name_of(self.info.promise)
                ),
                span,
            ));
        }
        let call = Spanned::new(
            Expr::MethodCall {
                recv: Box::new(Spanned::new(Expr::Proxy(self.info.promise_proxy), span)),
                method: names::YIELD_VALUE.into(),
                args: vec![operand],
            },
            span,
        );
        self.build_co_await(env, call, SuspendKind::Yield)
    }

    /// The initial/final suspends come from the promise, not user syntax.
    pub fn build_init_or_final(&mut self, kind: SuspendKind) -> Result<u32, CompileError> {
        let method = match kind {
            SuspendKind::Initial => names::INITIAL_SUSPEND,
            SuspendKind::Final => names::FINAL_SUSPEND,
            _ => return Err(CompileError::lowering("build_init_or_final on a body suspend")),
        };
        let span = self.info.first_keyword;
        if self.session.types.lookup_method(self.info.promise, method).is_none() {
            return Err(CompileError::awaitable(
                format!(
                    "no member named '{}' in promise type '{}'",
                    method,
                    self.session.types.name_of(self.info.promise)
                ),
                span,
            ));
        }
        let call = Spanned::new(
            Expr::MethodCall {
                recv: Box::new(Spanned::new(Expr::Proxy(self.info.promise_proxy), span)),
                method: method.into(),
                args: vec![],
            },
            span,
        );
        let env = TypeEnv::new();
        self.build_co_await(&env, call, kind)
    }
}

/// Rewrite every await/yield marker in `block` into a registered suspend
/// point, leaving `Expr::SuspendPoint(idx)` at the syntactic position.
/// Also validates each `co_return` against the promise's members.
pub fn rewrite_suspend_markers(
    ctx: &mut LowerCtx<'_>,
    env: &mut TypeEnv,
    block: &mut Block,
) -> Result<(), CompileError> {
    env.push();
    for stmt in &mut block.stmts {
        rewrite_stmt(ctx, env, stmt)?;
    }
    env.pop();
    Ok(())
}

fn rewrite_stmt(
    ctx: &mut LowerCtx<'_>,
    env: &mut TypeEnv,
    stmt: &mut Stmt,
) -> Result<(), CompileError> {
    match stmt {
        Stmt::Let { name, ty, init } => {
            if let Some(e) = init {
                rewrite_expr(ctx, env, e)?;
            }
            env.insert(name.clone(), *ty);
        }
        Stmt::Assign { target, value } => {
            rewrite_expr(ctx, env, target)?;
            rewrite_expr(ctx, env, value)?;
        }
        Stmt::Expr(e) | Stmt::DtorCall(e) | Stmt::FreeFrame(e) => rewrite_expr(ctx, env, e)?,
        Stmt::If { cond, then_block, else_block } => {
            rewrite_expr(ctx, env, cond)?;
            rewrite_suspend_markers(ctx, env, then_block)?;
            if let Some(b) = else_block {
                rewrite_suspend_markers(ctx, env, b)?;
            }
        }
        Stmt::While { cond, body } => {
            rewrite_expr(ctx, env, cond)?;
            rewrite_suspend_markers(ctx, env, body)?;
        }
        Stmt::Scope(b) => rewrite_suspend_markers(ctx, env, b)?,
        Stmt::Return(e) => {
            let span = e.as_ref().map(|e| e.span).unwrap_or(ctx.info.first_keyword);
            return Err(CompileError::context(
                "a plain 'return' is not allowed in a coroutine body",
                span,
            ));
        }
        Stmt::CoReturn(value) => {
            // A value flows through return_value; a void-valued operand or
            // a bare co_return through return_void.
            let (required, span) = match value {
                Some(e) => {
                    rewrite_expr(ctx, env, e)?;
                    (names::RETURN_VALUE, e.span)
                }
                None => (names::RETURN_VOID, ctx.info.first_keyword),
            };
            let tt = &ctx.session.types;
            let ok = tt.lookup_method(ctx.info.promise, required).is_some()
                || (required == names::RETURN_VALUE
                    && tt.lookup_method(ctx.info.promise, names::RETURN_VOID).is_some());
            if !ok {
                return Err(CompileError::awaitable(
                    format!(
                        "no member named '{}' in promise type '{}'",
                        required,
                        tt.name_of(ctx.info.promise)
                    ),
                    span,
                ));
            }
        }
        Stmt::Switch { scrutinee, arms, default } => {
            rewrite_expr(ctx, env, scrutinee)?;
            for (_, stmts) in arms {
                for s in stmts {
                    rewrite_stmt(ctx, env, s)?;
                }
            }
            for s in default {
                rewrite_stmt(ctx, env, s)?;
            }
        }
        Stmt::TryCatchAll { body, handler } => {
            rewrite_suspend_markers(ctx, env, body)?;
            for s in handler {
                rewrite_stmt(ctx, env, s)?;
            }
        }
        Stmt::Label(_) | Stmt::Goto(_) | Stmt::Trap | Stmt::Park => {}
    }
    Ok(())
}

fn rewrite_expr(
    ctx: &mut LowerCtx<'_>,
    env: &mut TypeEnv,
    expr: &mut Spanned<Expr>,
) -> Result<(), CompileError> {
    // Inner awaits are built first so nested awaitables register in
    // evaluation order.
    match &mut expr.node {
        Expr::Materialize { init, .. } => rewrite_expr(ctx, env, init)?,
        Expr::AddrOf(e) | Expr::Deref(e) => rewrite_expr(ctx, env, e)?,
        Expr::Unary { operand, .. } => rewrite_expr(ctx, env, operand)?,
        Expr::Binary { lhs, rhs, .. } => {
            rewrite_expr(ctx, env, lhs)?;
            rewrite_expr(ctx, env, rhs)?;
        }
        Expr::Call { args, .. } | Expr::Construct { args, .. } => {
            for a in args {
                rewrite_expr(ctx, env, a)?;
            }
        }
        Expr::MethodCall { recv, args, .. } => {
            rewrite_expr(ctx, env, recv)?;
            for a in args {
                rewrite_expr(ctx, env, a)?;
            }
        }
        Expr::Await { operand, .. } | Expr::Yield { operand } => rewrite_expr(ctx, env, operand)?,
        _ => {}
    }

    let replacement = match &expr.node {
        Expr::Await { operand, kind } => {
            let idx = ctx.build_co_await(env, (**operand).clone(), *kind)?;
            Some(Expr::SuspendPoint(idx))
        }
        Expr::Yield { operand } => {
            let idx = ctx.build_co_yield(env, (**operand).clone())?;
            Some(Expr::SuspendPoint(idx))
        }
        _ => None,
    };
    if let Some(node) = replacement {
        expr.node = node;
    }
    Ok(())
}

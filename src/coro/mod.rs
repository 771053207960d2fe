//! Coroutine lowering: rewrite a function containing suspend markers into
//! a heap-allocated frame plus three routines (ramp, actor, destroy).
//!
//! The stages run strictly in order: context gate and promise/handle
//! resolution, captured-temporary promotion, suspend-point construction,
//! frame layout, then the actor and ramp/destroy emitters. A failure at
//! any stage surfaces as a `CompileError` and produces no routines.

pub mod actor;
pub mod await_build;
pub mod frame;
pub mod promote;
pub mod ramp;
pub mod resolve;

use std::collections::HashMap;

use crate::diagnostics::CompileError;
use crate::hir::{
    first_suspend_span, Expr, Function, LabelId, ProxyId, Stmt, SuspendKind, TypeId, TypeTable,
};
use crate::session::CompilerSession;
use crate::span::{Span, Spanned};

use await_build::{SuspendPoint, TypeEnv};
use frame::FrameLayout;
use ramp::AllocInfo;

/// Per-function lowering bookkeeping: resolved promise/handle types, the
/// two distinguished proxies, and where the first suspend keyword was.
#[derive(Debug, Clone)]
pub struct CoroutineInfo {
    pub function_name: String,
    pub promise: TypeId,
    pub handle: TypeId,
    pub self_h_proxy: ProxyId,
    pub promise_proxy: ProxyId,
    pub first_keyword: Span,
}

/// Scratch state for one lowering invocation; discarded once the three
/// routines exist.
pub struct LowerCtx<'s> {
    pub session: &'s mut CompilerSession,
    pub info: CoroutineInfo,
    pub suspends: Vec<SuspendPoint>,
    pub proxy_types: HashMap<ProxyId, TypeId>,
    pub promoted: HashMap<String, TypeId>,
    next_proxy: u32,
    next_label: u32,
    promote_sites: u32,
}

impl<'s> LowerCtx<'s> {
    fn new(session: &'s mut CompilerSession, info: CoroutineInfo) -> Self {
        let mut proxy_types = HashMap::new();
        proxy_types.insert(info.self_h_proxy, info.handle);
        proxy_types.insert(info.promise_proxy, info.promise);
        Self {
            session,
            info,
            suspends: Vec::new(),
            proxy_types,
            promoted: HashMap::new(),
            next_proxy: 2,
            next_label: 0,
            promote_sites: 0,
        }
    }

    pub fn fresh_proxy(&mut self, ty: TypeId) -> ProxyId {
        let p = ProxyId(self.next_proxy);
        self.next_proxy += 1;
        self.proxy_types.insert(p, ty);
        p
    }

    pub fn fresh_label(&mut self) -> LabelId {
        let l = LabelId(self.next_label);
        self.next_label += 1;
        l
    }

    pub fn next_promote_site(&mut self) -> u32 {
        let s = self.promote_sites;
        self.promote_sites += 1;
        s
    }

    pub fn record_promoted(&mut self, name: String, ty: TypeId) {
        self.promoted.insert(name, ty);
    }

    /// Registering the same source node twice is a pipeline bug, caught by
    /// the proxy each point uniquely owns.
    pub fn register_suspend(&mut self, sp: SuspendPoint) -> Result<u32, CompileError> {
        if self.suspends.iter().any(|s| s.awaiter_proxy == sp.awaiter_proxy) {
            return Err(CompileError::lowering("suspend point registered twice"));
        }
        let idx = self.suspends.len() as u32;
        self.suspends.push(sp);
        Ok(idx)
    }
}

/// The complete lowering output. The frame type also now lives in the
/// session's type table for the rest of the compilation.
#[derive(Debug)]
pub struct LoweredCoroutine {
    pub info: CoroutineInfo,
    pub frame: FrameLayout,
    pub ramp: Function,
    pub actor: Function,
    pub destroy: Function,
    pub alloc: AllocInfo,
}

/// Lower `func` into ramp/actor/destroy. Fails (without emitting anything)
/// when the function is not a coroutine, its declaration cannot host
/// suspend keywords, resolution fails, or any awaitable is malformed.
pub fn lower_coroutine(
    session: &mut CompilerSession,
    func: &Function,
) -> Result<LoweredCoroutine, CompileError> {
    let kw = first_suspend_span(&func.body).ok_or_else(|| {
        CompileError::context(
            format!("'{}' has no suspend points and is not a coroutine", func.name),
            func.span,
        )
    })?;
    resolve::check_context(func, kw)?;
    let (promise, handle) = resolve::resolve_promise_and_handle(session, func, kw)?;

    let info = CoroutineInfo {
        function_name: func.name.clone(),
        promise,
        handle,
        self_h_proxy: ProxyId(0),
        promise_proxy: ProxyId(1),
        first_keyword: kw,
    };
    let mut ctx = LowerCtx::new(session, info);

    let mut body = func.body.clone();
    promote::promote_captured_temps(&mut ctx, &mut body);

    ctx.build_init_or_final(SuspendKind::Initial)?;
    let mut env = TypeEnv::new();
    for p in &func.params {
        env.insert(p.name.clone(), p.ty);
    }
    await_build::rewrite_suspend_markers(&mut ctx, &mut env, &mut body)?;
    ctx.build_init_or_final(SuspendKind::Final)?;

    let frame = frame::plan_frame(&mut ctx, func, &body)?;

    let actor_name = format!("{}.actor", func.name);
    let destroy_name = format!("{}.destroy", func.name);
    let actor = actor::build_actor(&mut ctx, func, &frame, body, &actor_name)?;
    let (ramp, alloc) = ramp::build_ramp(&mut ctx, func, &frame, &actor_name, &destroy_name)?;
    let destroy = ramp::build_destroy(&mut ctx, &frame, &actor_name, &destroy_name);

    let info = ctx.info.clone();
    Ok(LoweredCoroutine { info, frame, ramp, actor, destroy, alloc })
}

impl LoweredCoroutine {
    /// Human-readable dump of the frame and the three routines.
    pub fn dump(&self, tt: &TypeTable) -> String {
        let mut out = String::new();
        out.push_str(&format!("frame {}:\n", tt.name_of(self.frame.frame_type)));
        out.push_str(&self.frame.dump(tt));
        for f in [&self.ramp, &self.actor, &self.destroy] {
            out.push_str(&format!("\nfn {} {{\n", f.name));
            for stmt in &f.body.stmts {
                print_stmt(&mut out, stmt, 1, &self.frame);
            }
            out.push_str("}\n");
        }
        out
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn print_stmt(out: &mut String, stmt: &Stmt, depth: usize, frame: &FrameLayout) {
    match stmt {
        Stmt::Label(l) => {
            indent(out, depth.saturating_sub(1));
            out.push_str(&format!("L{}:\n", l.0));
        }
        Stmt::Goto(l) => {
            indent(out, depth);
            out.push_str(&format!("goto L{};\n", l.0));
        }
        Stmt::Trap => {
            indent(out, depth);
            out.push_str("trap;\n");
        }
        Stmt::Park => {
            indent(out, depth);
            out.push_str("park;\n");
        }
        Stmt::Let { name, init, .. } => {
            indent(out, depth);
            match init {
                Some(e) => out.push_str(&format!("let {} = {};\n", name, print_expr(e, frame))),
                None => out.push_str(&format!("let {};\n", name)),
            }
        }
        Stmt::Assign { target, value } => {
            indent(out, depth);
            out.push_str(&format!(
                "{} = {};\n",
                print_expr(target, frame),
                print_expr(value, frame)
            ));
        }
        Stmt::Expr(e) => {
            indent(out, depth);
            out.push_str(&format!("{};\n", print_expr(e, frame)));
        }
        Stmt::DtorCall(e) => {
            indent(out, depth);
            out.push_str(&format!("dtor {};\n", print_expr(e, frame)));
        }
        Stmt::FreeFrame(e) => {
            indent(out, depth);
            out.push_str(&format!("free {};\n", print_expr(e, frame)));
        }
        Stmt::Return(e) => {
            indent(out, depth);
            match e {
                Some(e) => out.push_str(&format!("return {};\n", print_expr(e, frame))),
                None => out.push_str("return;\n"),
            }
        }
        Stmt::CoReturn(e) => {
            indent(out, depth);
            match e {
                Some(e) => out.push_str(&format!("co_return {};\n", print_expr(e, frame))),
                None => out.push_str("co_return;\n"),
            }
        }
        Stmt::If { cond, then_block, else_block } => {
            indent(out, depth);
            out.push_str(&format!("if {} {{\n", print_expr(cond, frame)));
            for s in &then_block.stmts {
                print_stmt(out, s, depth + 1, frame);
            }
            if let Some(b) = else_block {
                indent(out, depth);
                out.push_str("} else {\n");
                for s in &b.stmts {
                    print_stmt(out, s, depth + 1, frame);
                }
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::While { cond, body } => {
            indent(out, depth);
            out.push_str(&format!("while {} {{\n", print_expr(cond, frame)));
            for s in &body.stmts {
                print_stmt(out, s, depth + 1, frame);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::Scope(b) => {
            indent(out, depth);
            out.push_str("{\n");
            for s in &b.stmts {
                print_stmt(out, s, depth + 1, frame);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::Switch { scrutinee, arms, default } => {
            indent(out, depth);
            out.push_str(&format!("switch {} {{\n", print_expr(scrutinee, frame)));
            for (v, stmts) in arms {
                indent(out, depth + 1);
                out.push_str(&format!("case {v}:\n"));
                for s in stmts {
                    print_stmt(out, s, depth + 2, frame);
                }
            }
            indent(out, depth + 1);
            out.push_str("default:\n");
            for s in default {
                print_stmt(out, s, depth + 2, frame);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::TryCatchAll { body, handler } => {
            indent(out, depth);
            out.push_str("try {\n");
            for s in &body.stmts {
                print_stmt(out, s, depth + 1, frame);
            }
            indent(out, depth);
            out.push_str("} catch (...) {\n");
            for s in handler {
                print_stmt(out, s, depth + 1, frame);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
    }
}

fn print_expr(expr: &Spanned<Expr>, frame: &FrameLayout) -> String {
    match &expr.node {
        Expr::IntLit { value, .. } => value.to_string(),
        Expr::BoolLit(b) => b.to_string(),
        Expr::NullPtr => "null".into(),
        Expr::Name(n) => n.clone(),
        Expr::Proxy(p) => format!("<proxy {}>", p.0),
        Expr::FrameRef(f) => format!("frame->{}", frame.field(*f).name),
        Expr::Materialize { init, .. } => format!("materialize({})", print_expr(init, frame)),
        Expr::AddrOf(e) => format!("&{}", print_expr(e, frame)),
        Expr::Deref(e) => format!("*{}", print_expr(e, frame)),
        Expr::Move(e) => format!("move({})", print_expr(e, frame)),
        Expr::Unary { op, operand, .. } => {
            format!("{:?}({})", op, print_expr(operand, frame))
        }
        Expr::Binary { op, lhs, rhs } => {
            format!("({} {:?} {})", print_expr(lhs, frame), op, print_expr(rhs, frame))
        }
        Expr::Call { callee, args } => {
            let args: Vec<_> = args.iter().map(|a| print_expr(a, frame)).collect();
            format!("{}({})", callee, args.join(", "))
        }
        Expr::MethodCall { recv, method, args } => {
            let args: Vec<_> = args.iter().map(|a| print_expr(a, frame)).collect();
            format!("{}.{}({})", print_expr(recv, frame), method, args.join(", "))
        }
        Expr::Construct { ty, args } => {
            let args: Vec<_> = args.iter().map(|a| print_expr(a, frame)).collect();
            format!("construct<{}>({})", ty.0, args.join(", "))
        }
        Expr::Await { operand, .. } => format!("co_await {}", print_expr(operand, frame)),
        Expr::Yield { operand } => format!("co_yield {}", print_expr(operand, frame)),
        Expr::SuspendPoint(i) => format!("<suspend {i}>"),
    }
}

//! State-machine expansion: the actor routine.
//!
//! The actor owns both dispatch switches (resume when the stored index is
//! even, destroy when the low bit is set), the rewritten body with every
//! suspend marker expanded in place, and the teardown tail shared by the
//! final suspend and all destroy cases.

use crate::diagnostics::{CompileError, Warning};
use crate::hir::visit::{self, walk_expr, Visitor};
use crate::hir::{Block, Expr, FieldId, Function, LabelId, Param, Stmt, Type, TypeId};
use crate::session::names;
use crate::span::Spanned;

use super::await_build::SuspendReturnKind;
use super::frame::FrameLayout;
use super::LowerCtx;

struct ActorBuilder<'a, 'b, 's> {
    ctx: &'a mut LowerCtx<'s>,
    frame: &'b FrameLayout,
    bool_ty: TypeId,
    resume_labels: Vec<LabelId>,
    destroy_labels: Vec<LabelId>,
    final_label: LabelId,
    teardown_label: LabelId,
}

pub fn build_actor(
    ctx: &mut LowerCtx<'_>,
    func: &Function,
    frame: &FrameLayout,
    body: Block,
    actor_name: &str,
) -> Result<Function, CompileError> {
    let n = ctx.suspends.len();
    let resume_labels: Vec<LabelId> = (0..n).map(|_| ctx.fresh_label()).collect();
    let destroy_labels: Vec<LabelId> = (0..n).map(|_| ctx.fresh_label()).collect();
    let final_label = ctx.fresh_label();
    let teardown_label = ctx.fresh_label();
    let begin_label = ctx.fresh_label();

    let bool_ty = ctx.session.types.add(Type::Bool);
    let mut b = ActorBuilder {
        ctx,
        frame,
        bool_ty,
        resume_labels,
        destroy_labels,
        final_label,
        teardown_label,
    };

    let mut stmts = Vec::new();
    stmts.push(b.dispatch(begin_label));
    stmts.push(Stmt::Label(begin_label));
    stmts.extend(b.expand_suspend(0));

    // The rewritten user body, with the fall-off-the-end notification when
    // the promise supports it. A promise without return_void flows to the
    // final suspend with no notification.
    let mut user = b.rewrite_block(body)?;
    if b.promise_has(names::RETURN_VOID) {
        user.push(Stmt::Expr(b.promise_call(names::RETURN_VOID, vec![])));
    }
    user.push(Stmt::Goto(final_label));

    let has_unhandled = b.promise_has(names::UNHANDLED_EXCEPTION);
    if b.ctx.session.config.exceptions && has_unhandled {
        let handler = vec![
            Stmt::Expr(b.promise_call(names::UNHANDLED_EXCEPTION, vec![])),
            Stmt::Goto(final_label),
        ];
        stmts.push(Stmt::TryCatchAll { body: Block::new(user), handler });
    } else {
        if has_unhandled {
            let span = b.ctx.info.first_keyword;
            b.ctx.session.warn(Warning::new(
                "promise declares unhandled_exception but exception support is disabled",
                span,
            ));
        }
        stmts.extend(user);
    }

    stmts.push(Stmt::Label(final_label));
    stmts.push(Stmt::Assign {
        target: Spanned::dummy(Expr::FrameRef(FrameLayout::RESUME_FN)),
        value: Spanned::dummy(Expr::NullPtr),
    });
    stmts.extend(b.expand_suspend((n - 1) as u32));

    stmts.push(Stmt::Label(teardown_label));
    stmts.push(Stmt::DtorCall(Spanned::dummy(Expr::FrameRef(FrameLayout::PROMISE))));
    let mut free_branch = Vec::new();
    for &pf in b.frame.param_fields.iter().rev() {
        free_branch.push(Stmt::DtorCall(Spanned::dummy(Expr::FrameRef(pf))));
    }
    free_branch.push(Stmt::FreeFrame(Spanned::dummy(Expr::Name("frame".into()))));
    stmts.push(Stmt::If {
        cond: Spanned::dummy(Expr::FrameRef(FrameLayout::NEEDS_FREE)),
        then_block: Block::new(free_branch),
        else_block: None,
    });
    stmts.push(Stmt::Park);

    let mut block = Block::new(stmts);
    b.apply_substitutions(&mut block);

    let frame_ptr = b.ctx.session.types.add(Type::Pointer(frame.frame_type));
    let void = b.ctx.session.types.add(Type::Void);
    let mut actor = Function::new(actor_name, void, block);
    actor.params = vec![Param { name: "frame".into(), ty: frame_ptr }];
    actor.span = func.span;
    Ok(actor)
}

impl<'a, 'b, 's> ActorBuilder<'a, 'b, 's> {
    fn promise_has(&self, member: &str) -> bool {
        self.ctx.session.types.lookup_method(self.ctx.info.promise, member).is_some()
    }

    fn promise_call(&self, method: &str, args: Vec<Spanned<Expr>>) -> Spanned<Expr> {
        Spanned::dummy(Expr::MethodCall {
            recv: Box::new(Spanned::dummy(Expr::FrameRef(FrameLayout::PROMISE))),
            method: method.into(),
            args,
        })
    }

    /// The two dispatch switches. Resume selects on even indices (0 is
    /// "from start"); destroy on odd, with 1 covering destroy-before-start
    /// which runs zero body destructors.
    fn dispatch(&self, begin: LabelId) -> Stmt {
        let n = self.ctx.suspends.len();
        let resume_at = || Spanned::dummy(Expr::FrameRef(FrameLayout::RESUME_AT));
        let one = Spanned::dummy(Expr::IntLit { value: 1, ty: self.resume_at_ty() });
        let zero = Spanned::dummy(Expr::IntLit { value: 0, ty: self.resume_at_ty() });

        let mut destroy_arms: Vec<(u64, Vec<Stmt>)> =
            vec![(1, vec![Stmt::Goto(self.teardown_label)])];
        for i in 0..n {
            destroy_arms.push((
                self.frame.destroy_index(i as u32),
                vec![Stmt::Goto(self.destroy_labels[i])],
            ));
        }

        let mut resume_arms: Vec<(u64, Vec<Stmt>)> = vec![(0, vec![Stmt::Goto(begin)])];
        // Resuming at the final suspend is undefined; no case for it.
        for i in 0..n - 1 {
            resume_arms.push((
                self.frame.resume_index(i as u32),
                vec![Stmt::Goto(self.resume_labels[i])],
            ));
        }

        Stmt::If {
            cond: Spanned::dummy(Expr::Binary {
                op: crate::hir::BinOp::Ne,
                lhs: Box::new(Spanned::dummy(Expr::Binary {
                    op: crate::hir::BinOp::BitAnd,
                    lhs: Box::new(resume_at()),
                    rhs: Box::new(one),
                })),
                rhs: Box::new(zero),
            }),
            then_block: Block::new(vec![Stmt::Switch {
                scrutinee: resume_at(),
                arms: destroy_arms,
                default: vec![Stmt::Trap],
            }]),
            else_block: Some(Block::new(vec![Stmt::Switch {
                scrutinee: resume_at(),
                arms: resume_arms,
                default: vec![Stmt::Trap],
            }])),
        }
    }

    fn resume_at_ty(&self) -> crate::hir::TypeId {
        self.frame.field(FrameLayout::RESUME_AT).ty
    }

    /// Inline expansion of suspend point `i`: construct the awaiter, test
    /// ready, and on the slow path record the resume index, perform the
    /// kind-specific suspend step, and park. The ready fast path skips the
    /// index store entirely.
    fn expand_suspend(&mut self, i: u32) -> Vec<Stmt> {
        let sp = self.ctx.suspends[i as usize].clone();
        let slots = self.frame.suspend_slots[i as usize];
        let aw = || Spanned::dummy(Expr::FrameRef(slots.awaiter));
        let resume_label = self.resume_labels[i as usize];
        let destroy_label = self.destroy_labels[i as usize];

        let mut not_ready = vec![Stmt::Assign {
            target: Spanned::dummy(Expr::FrameRef(FrameLayout::RESUME_AT)),
            value: Spanned::dummy(Expr::IntLit {
                value: self.frame.resume_index(i) as i128,
                ty: self.resume_at_ty(),
            }),
        }];
        match sp.suspend_return {
            SuspendReturnKind::Void => not_ready.push(Stmt::Expr(sp.suspend_call.clone())),
            SuspendReturnKind::Bool => not_ready.push(Stmt::If {
                cond: Spanned::dummy(Expr::Unary {
                    op: crate::hir::UnOp::LogicalNot,
                    operand: Box::new(sp.suspend_call.clone()),
                    ty: self.bool_ty,
                }),
                then_block: Block::new(vec![Stmt::Goto(resume_label)]),
                else_block: None,
            }),
            SuspendReturnKind::Handle => {
                let h = slots.handle.unwrap_or(slots.awaiter);
                not_ready.push(Stmt::Assign {
                    target: Spanned::dummy(Expr::FrameRef(h)),
                    value: sp.suspend_call.clone(),
                });
                not_ready.push(Stmt::Expr(Spanned::dummy(Expr::MethodCall {
                    recv: Box::new(Spanned::dummy(Expr::FrameRef(h))),
                    method: "resume".into(),
                    args: vec![],
                })));
            }
        }
        not_ready.push(Stmt::Park);

        let mut out = vec![
            Stmt::Assign { target: aw(), value: sp.init.clone() },
            Stmt::If {
                cond: Spanned::dummy(Expr::Unary {
                    op: crate::hir::UnOp::LogicalNot,
                    operand: Box::new(sp.ready_call.clone()),
                    ty: self.bool_ty,
                }),
                then_block: Block::new(not_ready),
                else_block: None,
            },
            Stmt::Goto(resume_label),
            Stmt::Label(destroy_label),
            Stmt::DtorCall(aw()),
        ];
        for &lv in self.frame.live_locals[i as usize].iter().rev() {
            out.push(Stmt::DtorCall(Spanned::dummy(Expr::FrameRef(lv))));
        }
        out.push(Stmt::Goto(self.teardown_label));
        out.push(Stmt::Label(resume_label));
        out
    }

    fn rewrite_block(&mut self, block: Block) -> Result<Vec<Stmt>, CompileError> {
        let mut out = Vec::new();
        for stmt in block.stmts {
            self.rewrite_stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    fn rewrite_stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) -> Result<(), CompileError> {
        match stmt {
            Stmt::While { cond, body } if expr_suspends(&cond) => {
                // Conditions that suspend cannot stay inside a loop header;
                // the loop is rewritten into label/goto form with the
                // expansion at the top of each iteration.
                let top = self.ctx.fresh_label();
                let end = self.ctx.fresh_label();
                out.push(Stmt::Label(top));
                let mut cond = cond;
                self.expand_in_expr(&mut cond, out);
                let span = cond.span;
                out.push(Stmt::If {
                    cond: Spanned::new(
                        Expr::Unary {
                            op: crate::hir::UnOp::LogicalNot,
                            operand: Box::new(cond),
                            ty: self.bool_ty,
                        },
                        span,
                    ),
                    then_block: Block::new(vec![Stmt::Goto(end)]),
                    else_block: None,
                });
                out.extend(self.rewrite_block(body)?);
                out.push(Stmt::Goto(top));
                out.push(Stmt::Label(end));
            }
            Stmt::While { cond, body } => {
                out.push(Stmt::While { cond, body: Block::new(self.rewrite_block(body)?) });
            }
            Stmt::If { mut cond, then_block, else_block } => {
                self.expand_in_expr(&mut cond, out);
                let then_block = Block::new(self.rewrite_block(then_block)?);
                let else_block = match else_block {
                    Some(b) => Some(Block::new(self.rewrite_block(b)?)),
                    None => None,
                };
                out.push(Stmt::If { cond, then_block, else_block });
            }
            Stmt::Scope(b) => {
                let stmts = self.rewrite_block(b)?;
                out.push(Stmt::Scope(Block::new(stmts)));
            }
            Stmt::TryCatchAll { body, handler } => {
                let body = Block::new(self.rewrite_block(body)?);
                out.push(Stmt::TryCatchAll { body, handler });
            }
            Stmt::CoReturn(value) => {
                let use_return_value = self.promise_has(names::RETURN_VALUE);
                match value {
                    Some(mut e) => {
                        self.expand_in_expr(&mut e, out);
                        if use_return_value {
                            out.push(Stmt::Expr(
                                self.promise_call(names::RETURN_VALUE, vec![e]),
                            ));
                        } else {
                            // A void-valued operand: evaluate, then notify.
                            out.push(Stmt::Expr(e));
                            out.push(Stmt::Expr(self.promise_call(names::RETURN_VOID, vec![])));
                        }
                    }
                    None => {
                        out.push(Stmt::Expr(self.promise_call(names::RETURN_VOID, vec![])));
                    }
                }
                out.push(Stmt::Goto(self.final_label));
            }
            Stmt::Let { name, ty, init } => {
                // Locals live in the frame; a declaration becomes at most a
                // slot initialization.
                let field = self.frame.field_for_name(&name);
                match (field, init) {
                    (Some(f), Some(mut e)) => {
                        self.expand_in_expr(&mut e, out);
                        out.push(Stmt::Assign {
                            target: Spanned::dummy(Expr::FrameRef(f)),
                            value: e,
                        });
                    }
                    (Some(_), None) => {}
                    (None, _) => {
                        return Err(CompileError::lowering(format!(
                            "local '{name}' has no frame slot"
                        )));
                    }
                }
                let _ = ty;
            }
            Stmt::Assign { target, mut value } => {
                let mut target = target;
                self.expand_in_expr(&mut target, out);
                self.expand_in_expr(&mut value, out);
                out.push(Stmt::Assign { target, value });
            }
            Stmt::Expr(mut e) => {
                self.expand_in_expr(&mut e, out);
                out.push(Stmt::Expr(e));
            }
            Stmt::Switch { mut scrutinee, arms, default } => {
                self.expand_in_expr(&mut scrutinee, out);
                let mut new_arms = Vec::new();
                for (v, stmts) in arms {
                    new_arms.push((v, self.rewrite_block(Block::new(stmts))?));
                }
                let default = self.rewrite_block(Block::new(default))?;
                out.push(Stmt::Switch { scrutinee, arms: new_arms, default });
            }
            other => out.push(other),
        }
        Ok(())
    }

    /// Hoist the expansion of every suspend marker inside `expr` to `out`
    /// and substitute the marker with its `await_resume()` call.
    fn expand_in_expr(&mut self, expr: &mut Spanned<Expr>, out: &mut Vec<Stmt>) {
        for id in suspend_ids(expr) {
            out.extend(self.expand_suspend(id));
        }
        let resume_calls: std::collections::HashMap<u32, Expr> = self
            .ctx
            .suspends
            .iter()
            .enumerate()
            .map(|(i, sp)| (i as u32, sp.resume_call.node.clone()))
            .collect();
        visit::replace_in_expr(expr, &|e| match e {
            Expr::SuspendPoint(i) => resume_calls.get(i).cloned(),
            _ => None,
        });
    }

    fn apply_substitutions(&self, block: &mut Block) {
        let mut proxy_map = std::collections::HashMap::new();
        proxy_map.insert(self.ctx.info.promise_proxy, Expr::FrameRef(FrameLayout::PROMISE));
        proxy_map.insert(self.ctx.info.self_h_proxy, Expr::FrameRef(FrameLayout::SELF_HANDLE));
        for sp in &self.ctx.suspends {
            if let Some(f) = self.frame.field_for_proxy(sp.awaiter_proxy) {
                proxy_map.insert(sp.awaiter_proxy, Expr::FrameRef(f));
            }
        }
        visit::substitute_proxies(block, &proxy_map);

        let mut name_map = std::collections::HashMap::new();
        for f in 0..self.frame.field_count() {
            let id = FieldId(f as u32);
            match &self.frame.field(id).kind {
                super::frame::FieldKind::Param { original, .. }
                | super::frame::FieldKind::Local { original, .. } => {
                    name_map.insert(original.clone(), Expr::FrameRef(id));
                }
                _ => {}
            }
        }
        visit::substitute_names(block, &name_map);
    }
}

fn expr_suspends(expr: &Spanned<Expr>) -> bool {
    !suspend_ids(expr).is_empty()
}

fn suspend_ids(expr: &Spanned<Expr>) -> Vec<u32> {
    struct Marks {
        ids: Vec<u32>,
    }
    impl Visitor for Marks {
        fn visit_expr(&mut self, expr: &Spanned<Expr>) {
            if let Expr::SuspendPoint(i) = &expr.node {
                self.ids.push(*i);
            }
            walk_expr(self, expr);
        }
    }
    let mut m = Marks { ids: Vec::new() };
    m.visit_expr(expr);
    m.ids
}

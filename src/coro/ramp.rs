//! Ramp and destroy emitters.
//!
//! The ramp is the routine the original call site invokes: allocate the
//! frame (through the promise's own allocator when it has one), construct
//! the promise and parameter copies, fetch the return object, and kick the
//! actor once. The destroy routine only sets the low dispatch bit and
//! re-enters the actor.

use crate::diagnostics::CompileError;
use crate::hir::{Block, Expr, Function, Param, Stmt, Type};
use crate::session::names;
use crate::span::Spanned;

use super::frame::{FieldKind, FrameLayout};
use super::LowerCtx;

/// What the allocation/deallocation probes found; recorded on the lowered
/// output for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocInfo {
    pub custom_allocator: bool,
    pub custom_deleter: bool,
    pub alloc_failure_return: bool,
}

pub fn build_ramp(
    ctx: &mut LowerCtx<'_>,
    func: &Function,
    frame: &FrameLayout,
    actor_name: &str,
    destroy_name: &str,
) -> Result<(Function, AllocInfo), CompileError> {
    let promise = ctx.info.promise;
    let promise_name = ctx.session.types.name_of(promise);
    let has = |m: &str| ctx.session.types.lookup_method(promise, m).is_some();

    let info = AllocInfo {
        custom_allocator: has(names::OPERATOR_NEW),
        custom_deleter: has(names::OPERATOR_DELETE),
        alloc_failure_return: has(names::GRO_ON_ALLOC_FAIL),
    };

    let gro_method = ctx
        .session
        .types
        .lookup_method(promise, names::GET_RETURN_OBJECT)
        .ok_or_else(|| {
            CompileError::awaitable(
                format!(
                    "no member named '{}' in promise type '{}'",
                    names::GET_RETURN_OBJECT,
                    promise_name
                ),
                ctx.info.first_keyword,
            )
        })?;
    let gro_ty = gro_method.ret;

    let frame_ptr_ty = ctx.session.types.add(Type::Pointer(frame.frame_type));
    let mut stmts = Vec::new();

    // Zero-initialized frame pointer, then the allocation. The size is a
    // placeholder call so later optimization may shrink the frame.
    stmts.push(Stmt::Let {
        name: "frame".into(),
        ty: frame_ptr_ty,
        init: Some(Spanned::dummy(Expr::NullPtr)),
    });
    let size = Spanned::dummy(Expr::Call { callee: "__builtin_coro_frame_size".into(), args: vec![] });
    let mut alloc_args = vec![size];
    if info.alloc_failure_return {
        // Allocation must not throw when the failure handler exists.
        alloc_args.push(Spanned::dummy(Expr::Name("nothrow".into())));
    }
    let alloc_callee = if info.custom_allocator {
        format!("{promise_name}::{}", names::OPERATOR_NEW)
    } else {
        names::OPERATOR_NEW.to_string()
    };
    stmts.push(Stmt::Assign {
        target: Spanned::dummy(Expr::Name("frame".into())),
        value: Spanned::dummy(Expr::Call { callee: alloc_callee, args: alloc_args }),
    });

    if info.alloc_failure_return {
        stmts.push(Stmt::If {
            cond: Spanned::dummy(Expr::Binary {
                op: crate::hir::BinOp::Eq,
                lhs: Box::new(Spanned::dummy(Expr::Name("frame".into()))),
                rhs: Box::new(Spanned::dummy(Expr::NullPtr)),
            }),
            then_block: Block::new(vec![Stmt::Return(Some(Spanned::dummy(Expr::Call {
                callee: format!("{promise_name}::{}", names::GRO_ON_ALLOC_FAIL),
                args: vec![],
            })))]),
            else_block: None,
        });
    }

    let assign = |field, value| Stmt::Assign {
        target: Spanned::dummy(Expr::FrameRef(field)),
        value: Spanned::dummy(value),
    };
    stmts.push(assign(FrameLayout::NEEDS_FREE, Expr::BoolLit(true)));
    stmts.push(assign(
        FrameLayout::RESUME_FN,
        Expr::AddrOf(Box::new(Spanned::dummy(Expr::Name(actor_name.into())))),
    ));
    stmts.push(assign(
        FrameLayout::DESTROY_FN,
        Expr::AddrOf(Box::new(Spanned::dummy(Expr::Name(destroy_name.into())))),
    ));

    // Placement-construct the promise, preferring a constructor whose
    // parameter list matches the original function's.
    let param_tys: Vec<_> = func.params.iter().map(|p| p.ty).collect();
    let promise_args = match ctx.session.types.class(promise) {
        Some(c) if c.ctors.iter().any(|sig| *sig == param_tys) && !param_tys.is_empty() => func
            .params
            .iter()
            .map(|p| Spanned::dummy(Expr::Name(p.name.clone())))
            .collect(),
        _ => Vec::new(),
    };
    stmts.push(assign(FrameLayout::PROMISE, Expr::Construct { ty: promise, args: promise_args }));
    stmts.push(assign(
        FrameLayout::SELF_HANDLE,
        Expr::Construct {
            ty: ctx.info.handle,
            args: vec![Spanned::dummy(Expr::Name("frame".into()))],
        },
    ));

    // Copy/move used parameters into their slots. Reference parameters are
    // stored as pointers to the referent; class-typed value parameters are
    // constructed in place, moving from the original when the class has a
    // move constructor.
    for &pf in &frame.param_fields {
        let field = frame.field(pf);
        if let FieldKind::Param { original, by_ref, moved } = &field.kind {
            let src = Spanned::dummy(Expr::Name(original.clone()));
            let value = if *by_ref {
                Spanned::dummy(Expr::AddrOf(Box::new(src)))
            } else if matches!(ctx.session.types.get(field.ty), Type::Class(_)) {
                let arg = if *moved {
                    Spanned::dummy(Expr::Move(Box::new(src)))
                } else {
                    src
                };
                Spanned::dummy(Expr::Construct { ty: field.ty, args: vec![arg] })
            } else {
                src
            };
            stmts.push(Stmt::Assign {
                target: Spanned::dummy(Expr::FrameRef(pf)),
                value,
            });
        }
    }

    stmts.push(Stmt::Let {
        name: "gro".into(),
        ty: gro_ty,
        init: Some(Spanned::dummy(Expr::MethodCall {
            recv: Box::new(Spanned::dummy(Expr::FrameRef(FrameLayout::PROMISE))),
            method: names::GET_RETURN_OBJECT.into(),
            args: vec![],
        })),
    });

    stmts.push(assign(
        FrameLayout::RESUME_AT,
        Expr::IntLit { value: 0, ty: frame.field(FrameLayout::RESUME_AT).ty },
    ));
    stmts.push(Stmt::Expr(Spanned::dummy(Expr::Call {
        callee: actor_name.into(),
        args: vec![Spanned::dummy(Expr::Name("frame".into()))],
    })));

    // Return the already-constructed return object, converting when the
    // promise's type differs from the declared return type.
    let ret_expr = if gro_ty == func.ret {
        Expr::Name("gro".into())
    } else {
        Expr::Construct { ty: func.ret, args: vec![Spanned::dummy(Expr::Name("gro".into()))] }
    };
    stmts.push(Stmt::Return(Some(Spanned::dummy(ret_expr))));

    let mut ramp = Function::new(&func.name, func.ret, Block::new(stmts));
    ramp.params = func.params.clone();
    ramp.flags = func.flags;
    ramp.span = func.span;
    Ok((ramp, info))
}

pub fn build_destroy(
    ctx: &mut LowerCtx<'_>,
    frame: &FrameLayout,
    actor_name: &str,
    destroy_name: &str,
) -> Function {
    let resume_at_ty = frame.field(FrameLayout::RESUME_AT).ty;
    let stmts = vec![
        Stmt::Assign {
            target: Spanned::dummy(Expr::FrameRef(FrameLayout::RESUME_AT)),
            value: Spanned::dummy(Expr::Binary {
                op: crate::hir::BinOp::BitOr,
                lhs: Box::new(Spanned::dummy(Expr::FrameRef(FrameLayout::RESUME_AT))),
                rhs: Box::new(Spanned::dummy(Expr::IntLit { value: 1, ty: resume_at_ty })),
            }),
        },
        Stmt::Expr(Spanned::dummy(Expr::Call {
            callee: actor_name.into(),
            args: vec![Spanned::dummy(Expr::Name("frame".into()))],
        })),
    ];
    let frame_ptr = ctx.session.types.add(Type::Pointer(frame.frame_type));
    let void = ctx.session.types.add(Type::Void);
    let mut f = Function::new(destroy_name, void, Block::new(stmts));
    f.params = vec![Param { name: "frame".into(), ty: frame_ptr }];
    f
}

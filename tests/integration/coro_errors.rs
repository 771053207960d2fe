//! Diagnostics: every gate in the lowering pipeline that rejects a
//! function before any routine is emitted.

mod common;

use common::{await_stmt, coro_fn, world};
use mezzo::diagnostics::CompileError;
use mezzo::hir::{Block, ClassType, Expr, Function, Method, Stmt, SuspendKind, Type, TypeTable};
use mezzo::lower_coroutine;
use mezzo::session::CompilerSession;
use mezzo::span::{Span, Spanned};

fn msg(err: CompileError) -> String {
    err.to_string()
}

#[test]
fn a_function_without_suspends_is_not_a_coroutine() {
    let mut w = world();
    let f = coro_fn(&w, "plain", vec![Stmt::Return(None)]);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("'plain' has no suspend points"));
}

#[test]
fn declaration_gates_reject_before_resolution() {
    let cases: [(&str, fn(&mut Function), &str); 6] = [
        ("main", |f| f.flags.is_entry_point = true, "entry point"),
        ("ce", |f| f.flags.is_constexpr = true, "constant-evaluable"),
        ("auto_fn", |f| f.flags.has_deduced_return = true, "deduced return type"),
        ("va", |f| f.flags.is_varargs = true, "varargs"),
        ("ctor", |f| f.flags.is_ctor = true, "constructor"),
        ("dtor", |f| f.flags.is_dtor = true, "destructor"),
    ];
    for (name, set, needle) in cases {
        let mut w = world();
        let mut f = coro_fn(&w, name, vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
        set(&mut f);
        let err = lower_coroutine(&mut w.session, &f).unwrap_err();
        assert!(matches!(err, CompileError::Context { .. }), "{name}");
        assert!(msg(err).contains(needle), "{name}");
    }
}

#[test]
fn missing_traits_template_is_reported() {
    let mut tt = TypeTable::new();
    let task = tt.add_class(ClassType::new("task"));
    let aw = tt.add_class(ClassType::new("aw"));
    let mut session = CompilerSession::new(tt);
    let f = Function::new("f", task, Block::new(vec![await_stmt(aw, Span::new(5, 10))]));
    let err = lower_coroutine(&mut session, &f).unwrap_err();
    assert!(msg(err).contains("traits template not found"));
}

#[test]
fn unregistered_return_type_cannot_instantiate_traits() {
    let mut w = world();
    let other = w.session.types.add_class(ClassType::new("lazy"));
    let f = Function::new(
        "g",
        other,
        Block::new(vec![await_stmt(w.suspend_always, Span::new(5, 10))]),
    );
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("cannot instantiate coroutine traits for 'g'"));
}

#[test]
fn traits_instance_without_promise_type_is_reported() {
    let mut w = world();
    let bare = w.session.types.add_class(ClassType::new("coroutine_traits<task>"));
    w.session.types.register_traits_instance(w.task, vec![], bare);
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("no member named 'promise_type'"));
}

#[test]
fn incomplete_promise_type_is_reported() {
    let mut w = world();
    w.session.types.class_mut(w.promise).unwrap().complete = false;
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("is incomplete"));
}

#[test]
fn awaitable_missing_a_protocol_member_is_reported() {
    let mut w = world();
    let bool_ty = w.bool_ty;
    let mut c = ClassType::new("half_awaitable");
    c.methods = vec![Method { name: "await_ready".into(), params: vec![], ret: bool_ty }];
    let half = w.session.types.add_class(c);

    let f = coro_fn(&w, "f", vec![await_stmt(half, Span::new(5, 10))]);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(matches!(err, CompileError::Awaitable { .. }));
    assert!(msg(err).contains("no member named 'await_suspend' in 'half_awaitable'"));
}

#[test]
fn await_suspend_with_a_bad_return_type_is_reported() {
    let mut w = world();
    let bool_ty = w.bool_ty;
    let void = w.void_ty;
    let i32_ty = w.session.types.add(Type::Int(mezzo::hir::IntType::I32));
    let mut c = ClassType::new("bad_awaitable");
    c.methods = vec![
        Method { name: "await_ready".into(), params: vec![], ret: bool_ty },
        Method { name: "await_suspend".into(), params: vec![], ret: i32_ty },
        Method { name: "await_resume".into(), params: vec![], ret: void },
    ];
    let bad = w.session.types.add_class(c);

    let f = coro_fn(&w, "f", vec![await_stmt(bad, Span::new(5, 10))]);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("await_suspend must return void, bool, or a coroutine handle"));
}

#[test]
fn incomplete_awaitable_class_is_reported() {
    let mut w = world();
    let mut c = ClassType::new("fwd_declared");
    c.complete = false;
    let fwd = w.session.types.add_class(c);

    let f = coro_fn(&w, "f", vec![await_stmt(fwd, Span::new(5, 10))]);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("'fwd_declared' is not a complete class type"));
}

#[test]
fn untypable_awaitable_operand_is_reported() {
    let mut w = world();
    let body = vec![Stmt::Expr(Spanned::new(
        Expr::Await {
            operand: Box::new(Spanned::new(Expr::Name("mystery".into()), Span::new(5, 10))),
            kind: SuspendKind::Await,
        },
        Span::new(5, 10),
    ))];
    let f = coro_fn(&w, "f", body);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("cannot determine the type of the awaitable expression"));
}

#[test]
fn plain_return_is_rejected_in_a_coroutine_body() {
    let mut w = world();
    let f = coro_fn(
        &w,
        "f",
        vec![await_stmt(w.suspend_always, Span::new(5, 10)), Stmt::Return(None)],
    );
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("a plain 'return' is not allowed in a coroutine body"));
}

#[test]
fn co_return_value_with_no_receiver_member_is_reported() {
    let mut w = world();
    let i32_ty = w.session.types.add(Type::Int(mezzo::hir::IntType::I32));
    let promise = w.session.types.class_mut(w.promise).unwrap();
    promise.methods.retain(|m| m.name != "return_void");

    let body = vec![Stmt::CoReturn(Some(Spanned::new(
        Expr::IntLit { value: 1, ty: i32_ty },
        Span::new(5, 6),
    )))];
    let f = coro_fn(&w, "f", body);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("no member named 'return_value'"));
}

#[test]
fn co_yield_without_yield_value_is_reported() {
    let mut w = world();
    let i32_ty = w.session.types.add(Type::Int(mezzo::hir::IntType::I32));
    let body = vec![Stmt::Expr(Spanned::new(
        Expr::Yield {
            operand: Box::new(Spanned::new(Expr::IntLit { value: 7, ty: i32_ty }, Span::new(3, 4))),
        },
        Span::new(0, 4),
    ))];
    let f = coro_fn(&w, "gen", body);
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert!(msg(err).contains("no member named 'yield_value'"));
}

#[test]
fn errors_carry_the_keyword_span() {
    let mut w = world();
    let mut f = coro_fn(&w, "main", vec![await_stmt(w.suspend_always, Span::new(42, 50))]);
    f.flags.is_entry_point = true;
    let err = lower_coroutine(&mut w.session, &f).unwrap_err();
    assert_eq!(err.span(), Some(Span::new(42, 50)));
}

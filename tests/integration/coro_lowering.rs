//! End-to-end lowering: a suspending function goes in, the frame plus
//! ramp/actor/destroy routines come out.

mod common;

use common::{await_stmt, coro_fn, register_params, world};
use mezzo::hir::{ClassType, Expr, IntType, Method, Param, Stmt, SuspendKind, Type};
use mezzo::lower_coroutine;
use mezzo::span::{Span, Spanned};

#[test]
fn minimal_coroutine_lowers_to_three_routines() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    assert_eq!(lowered.ramp.name, "f");
    assert_eq!(lowered.actor.name, "f.actor");
    assert_eq!(lowered.destroy.name, "f.destroy");
    // Initial, the body await, final.
    assert_eq!(lowered.frame.suspend_count(), 3);
    assert_eq!(lowered.info.promise, w.promise);
    assert_eq!(lowered.info.handle, w.handle);
}

#[test]
fn ramp_allocates_and_kicks_the_actor_once() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    assert!(dump.contains("__builtin_coro_frame_size"));
    assert!(dump.contains("frame->__frame_needs_free = true;"));
    assert!(dump.contains("frame->__resume_at = 0;"));
    assert!(dump.contains("f.actor(frame);"));
    assert!(dump.contains("frame->__p.get_return_object()"));
    assert!(dump.contains("return gro;"));
    assert!(!lowered.alloc.custom_allocator);
    assert!(!lowered.alloc.alloc_failure_return);
}

#[test]
fn movable_class_parameters_are_move_constructed_into_the_frame() {
    let mut w = world();
    let mut widget = ClassType::new("widget");
    widget.has_move_ctor = true;
    let widget_ty = w.session.types.add_class(widget);
    let params = vec![Param { name: "arg".into(), ty: widget_ty }];
    register_params(&mut w, &params);

    let mut f = coro_fn(
        &w,
        "f",
        vec![
            Stmt::Expr(Spanned::dummy(Expr::Name("arg".into()))),
            await_stmt(w.suspend_always, Span::new(5, 10)),
        ],
    );
    f.params = params;
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    let ramp = dump.split("fn f.actor").next().unwrap();
    assert!(ramp.contains(&format!("frame->__parm.arg = construct<{}>(move(arg));", widget_ty.0)));
    assert!(!ramp.contains("frame->__parm.arg = arg;"));
}

#[test]
fn class_parameters_without_a_move_ctor_are_copy_constructed() {
    let mut w = world();
    let widget_ty = w.session.types.add_class(ClassType::new("widget"));
    let params = vec![Param { name: "arg".into(), ty: widget_ty }];
    register_params(&mut w, &params);

    let mut f = coro_fn(
        &w,
        "f",
        vec![
            Stmt::Expr(Spanned::dummy(Expr::Name("arg".into()))),
            await_stmt(w.suspend_always, Span::new(5, 10)),
        ],
    );
    f.params = params;
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    let ramp = dump.split("fn f.actor").next().unwrap();
    assert!(ramp.contains(&format!("frame->__parm.arg = construct<{}>(arg);", widget_ty.0)));
    assert!(!ramp.contains("move(arg)"));
}

#[test]
fn destroy_sets_the_low_bit_and_reenters_the_actor() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    let destroy = dump.split("fn f.destroy").nth(1).unwrap();
    assert!(destroy.contains("frame->__resume_at = (frame->__resume_at BitOr 1);"));
    assert!(destroy.contains("f.actor(frame);"));

    // Destroying before the first resume dispatches straight to teardown.
    let actor = dump.split("fn f.actor").nth(1).unwrap();
    assert!(actor.contains("case 1:"));
    assert!(actor.contains("case 0:"));
}

#[test]
fn actor_clears_the_resume_pointer_at_the_final_suspend() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    assert!(dump.contains("frame->__resume = null;"));
    // Falling off the end notifies the promise before the final suspend.
    assert!(dump.contains("frame->__p.return_void();"));
    // Teardown destroys the promise and frees only a heap frame.
    assert!(dump.contains("dtor frame->__p;"));
    assert!(dump.contains("if frame->__frame_needs_free {"));
    assert!(dump.contains("free frame;"));
}

#[test]
fn actor_body_is_wrapped_when_exceptions_are_enabled() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    assert!(dump.contains("try {"));
    assert!(dump.contains("} catch (...) {"));
    assert!(dump.contains("frame->__p.unhandled_exception();"));
    assert!(w.session.warnings().is_empty());
}

#[test]
fn disabling_exceptions_drops_the_wrapper_and_warns() {
    let mut w = world();
    w.session.config.exceptions = false;
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    assert!(!dump.contains("try {"));
    assert_eq!(w.session.warnings().len(), 1);
    assert!(w.session.warnings()[0].msg.contains("unhandled_exception"));
}

#[test]
fn bool_await_suspend_branches_straight_to_resume() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.bool_awaitable, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    // A false return means "do not suspend after all".
    assert!(dump.contains("if LogicalNot(frame->__aw_s.1.await_suspend(frame->__self_h)) {"));
}

#[test]
fn handle_await_suspend_resumes_the_returned_coroutine() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.handle_awaitable, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    assert!(dump.contains("frame->__aw_h.1 = frame->__aw_s.1.await_suspend(frame->__self_h);"));
    assert!(dump.contains("frame->__aw_h.1.resume();"));
}

#[test]
fn co_yield_goes_through_the_promise_yield_value() {
    let mut w = world();
    let ret = w.suspend_always;
    let i32_ty = w.session.types.add(Type::Int(IntType::I32));
    let promise = w.session.types.class_mut(w.promise).unwrap();
    promise
        .methods
        .push(Method { name: "yield_value".into(), params: vec![i32_ty], ret });

    let body = vec![Stmt::Expr(Spanned::new(
        Expr::Yield {
            operand: Box::new(Spanned::new(Expr::IntLit { value: 7, ty: i32_ty }, Span::new(3, 4))),
        },
        Span::new(0, 4),
    ))];
    let f = coro_fn(&w, "gen", body);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    // The yielded awaitable is the promise call's result.
    assert!(dump.contains("frame->__aw_s.1 = frame->__p.yield_value(7);"));
    assert_eq!(lowered.frame.suspend_count(), 3);
}

#[test]
fn co_return_value_calls_return_value() {
    let mut w = world();
    let void = w.void_ty;
    let i32_ty = w.session.types.add(Type::Int(IntType::I32));
    let promise = w.session.types.class_mut(w.promise).unwrap();
    promise
        .methods
        .push(Method { name: "return_value".into(), params: vec![i32_ty], ret: void });

    let body = vec![Stmt::CoReturn(Some(Spanned::new(
        Expr::IntLit { value: 5, ty: i32_ty },
        Span::new(10, 11),
    )))];
    let f = coro_fn(&w, "f", body);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    assert!(dump.contains("frame->__p.return_value(5);"));
}

#[test]
fn allocation_failure_handler_switches_to_nothrow_allocation() {
    let mut w = world();
    let task = w.task;
    let promise = w.session.types.class_mut(w.promise).unwrap();
    promise.methods.push(Method {
        name: "get_return_object_on_allocation_failure".into(),
        params: vec![],
        ret: task,
    });

    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    assert!(lowered.alloc.alloc_failure_return);
    assert!(dump.contains("nothrow"));
    assert!(dump.contains("get_return_object_on_allocation_failure"));
}

#[test]
fn body_await_stores_its_resume_index_before_parking() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    // Body suspend is point 1; its resume index is 2*1 + 2.
    assert_eq!(lowered.frame.resume_index(1), 4);
    assert!(dump.contains("frame->__resume_at = 4;"));
    assert!(dump.contains("park;"));
}

#[test]
fn await_transform_wraps_explicit_awaits_only() {
    let mut w = world();
    let bool_ty = w.bool_ty;
    let void = w.void_ty;
    let transformed = {
        let mut c = mezzo::hir::ClassType::new("transformed_awaitable");
        c.methods = vec![
            Method { name: "await_ready".into(), params: vec![], ret: bool_ty },
            Method { name: "await_suspend".into(), params: vec![], ret: void },
            Method { name: "await_resume".into(), params: vec![], ret: void },
        ];
        w.session.types.add_class(c)
    };
    let suspend_always = w.suspend_always;
    let promise = w.session.types.class_mut(w.promise).unwrap();
    promise.methods.push(Method {
        name: "await_transform".into(),
        params: vec![suspend_always],
        ret: transformed,
    });

    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    // The body slot holds the transformed type; initial/final keep the
    // promise's own awaitable untouched.
    let body_slot = lowered.frame.suspend_slots[1].awaiter;
    assert_eq!(lowered.frame.field(body_slot).ty, transformed);
    let initial_slot = lowered.frame.suspend_slots[0].awaiter;
    assert_eq!(lowered.frame.field(initial_slot).ty, w.suspend_always);
}

#[test]
fn suspending_while_condition_is_rewritten_to_gotos() {
    let mut w = world();
    let body = vec![Stmt::While {
        cond: Spanned::new(
            Expr::Await {
                operand: Box::new(Spanned::new(
                    Expr::Construct { ty: w.bool_awaitable, args: vec![] },
                    Span::new(5, 10),
                )),
                kind: SuspendKind::Await,
            },
            Span::new(5, 10),
        ),
        body: mezzo::hir::Block::new(vec![]),
    }];
    let f = coro_fn(&w, "f", body);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let dump = lowered.dump(&w.session.types);

    // No while survives; the loop runs on labels and gotos.
    assert!(!dump.contains("while "));
    assert!(dump.contains("goto L"));
}

//! Frame layout: control-field order, suspend slot naming, parameter and
//! local slots, and the dispatch index arithmetic.

mod common;

use common::{await_stmt, coro_fn, register_params, world};
use mezzo::hir::{Expr, IntType, Param, Stmt, Type};
use mezzo::lower_coroutine;
use mezzo::span::{Span, Spanned};

#[test]
fn control_fields_come_first_in_fixed_order() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    let names: Vec<&str> = lowered.frame.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        &names[..6],
        &["__resume", "__destroy", "__p", "__frame_needs_free", "__resume_at", "__self_h"]
    );
    // The promise slot holds the resolved promise type.
    assert_eq!(lowered.frame.field(mezzo::coro::frame::FrameLayout::PROMISE).ty, w.promise);
}

#[test]
fn suspend_slots_bracket_the_body_awaits() {
    let mut w = world();
    let f = coro_fn(
        &w,
        "f",
        vec![
            await_stmt(w.suspend_always, Span::new(5, 10)),
            await_stmt(w.suspend_always, Span::new(20, 25)),
        ],
    );
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    assert_eq!(lowered.frame.suspend_count(), 4);
    let slot_name = |i: usize| {
        lowered.frame.field(lowered.frame.suspend_slots[i].awaiter).name.clone()
    };
    assert_eq!(slot_name(0), "__aw_s.is");
    assert_eq!(slot_name(1), "__aw_s.1");
    assert_eq!(slot_name(2), "__aw_s.2");
    assert_eq!(slot_name(3), "__aw_s.fs");
}

#[test]
fn dispatch_indices_interleave_resume_and_destroy() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    assert_eq!(lowered.frame.resume_index(0), 2);
    assert_eq!(lowered.frame.destroy_index(0), 3);
    assert_eq!(lowered.frame.resume_index(1), 4);
    assert_eq!(lowered.frame.destroy_index(1), 5);
    assert_eq!(lowered.frame.resume_index(2), 6);
}

#[test]
fn only_handle_suspends_get_a_handle_slot() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.handle_awaitable, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    assert!(lowered.frame.suspend_slots[0].handle.is_none());
    let h = lowered.frame.suspend_slots[1].handle.unwrap();
    assert_eq!(lowered.frame.field(h).name, "__aw_h.1");
    assert_eq!(lowered.frame.field(h).ty, w.handle);
    assert!(lowered.frame.suspend_slots[2].handle.is_none());
}

#[test]
fn used_parameters_get_slots_and_unused_ones_do_not() {
    let mut w = world();
    let i32_ty = w.session.types.add(Type::Int(IntType::I32));
    let params = vec![
        Param { name: "used".into(), ty: i32_ty },
        Param { name: "ignored".into(), ty: i32_ty },
    ];
    register_params(&mut w, &params);

    let mut f = coro_fn(
        &w,
        "f",
        vec![
            Stmt::Expr(Spanned::dummy(Expr::Name("used".into()))),
            await_stmt(w.suspend_always, Span::new(5, 10)),
        ],
    );
    f.params = params;
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    let names: Vec<&str> = lowered.frame.fields.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"__parm.used"));
    assert!(!names.contains(&"__parm.ignored"));
}

#[test]
fn reference_parameters_are_stored_as_pointers() {
    let mut w = world();
    let i32_ty = w.session.types.add(Type::Int(IntType::I32));
    let ref_ty = w.session.types.add(Type::Reference { to: i32_ty, rvalue: false });
    let params = vec![Param { name: "r".into(), ty: ref_ty }];
    register_params(&mut w, &params);

    let mut f = coro_fn(
        &w,
        "f",
        vec![
            Stmt::Expr(Spanned::dummy(Expr::Name("r".into()))),
            await_stmt(w.suspend_always, Span::new(5, 10)),
        ],
    );
    f.params = params;
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    let slot = lowered.frame.field_for_name("r").unwrap();
    let field = lowered.frame.field(slot);
    assert_eq!(field.name, "__parm.r");
    assert!(matches!(w.session.types.get(field.ty), Type::Pointer(to) if *to == i32_ty));
}

#[test]
fn locals_get_depth_tagged_slots() {
    let mut w = world();
    let i32_ty = w.session.types.add(Type::Int(IntType::I32));
    let body = vec![
        Stmt::Let { name: "n".into(), ty: i32_ty, init: None },
        Stmt::Scope(mezzo::hir::Block::new(vec![Stmt::Let {
            name: "m".into(),
            ty: i32_ty,
            init: None,
        }])),
        await_stmt(w.suspend_always, Span::new(5, 10)),
    ];
    let f = coro_fn(&w, "f", body);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    let names: Vec<&str> = lowered.frame.fields.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"__lv.0.n"));
    assert!(names.contains(&"__lv.1.m"));
}

#[test]
fn layout_is_deterministic_across_lowerings() {
    let layout = || {
        let mut w = world();
        let i32_ty = w.session.types.add(Type::Int(IntType::I32));
        let body = vec![
            Stmt::Let { name: "n".into(), ty: i32_ty, init: None },
            await_stmt(w.suspend_always, Span::new(5, 10)),
            await_stmt(w.bool_awaitable, Span::new(20, 25)),
        ];
        let f = coro_fn(&w, "f", body);
        let lowered = lower_coroutine(&mut w.session, &f).unwrap();
        lowered.frame.fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(layout(), layout());
}

#[test]
fn frame_type_is_registered_in_the_type_table() {
    let mut w = world();
    let f = coro_fn(&w, "f", vec![await_stmt(w.suspend_always, Span::new(5, 10))]);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();

    assert_eq!(w.session.types.name_of(lowered.frame.frame_type), "f.frame");
    let dump = lowered.frame.dump(&w.session.types);
    assert!(dump.contains("__resume_at : u16"));
}

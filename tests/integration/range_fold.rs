//! Statement folding over hand-built graphs, feeding operand ranges in
//! through a fixed source list.

use mezzo::cfg::{Cfg, CfgStmt, Operand};
use mezzo::hir::{BinOp, IntType, UnOp};
use mezzo::range::fold::fold_stmt;
use mezzo::range::source::SourceList;
use mezzo::range::wide::from_i128;
use mezzo::range::Range;

fn r(ty: IntType, lo: i128, hi: i128) -> Range {
    Range::new(ty, from_i128(ty, lo), from_i128(ty, hi))
}

#[test]
fn constant_operands_resolve_without_a_source_entry() {
    let mut cfg = Cfg::new();
    let out = cfg.add_var("out", IntType::I32);
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Binary {
            lhs: out,
            op: BinOp::Add,
            op1: Operand::Const { value: 3, ty: IntType::I32 },
            op2: Operand::Const { value: 4, ty: IntType::I32 },
        },
    );
    let mut src = SourceList::new(&[]);
    // no supplied ranges at all, yet both constants still fold
    assert_eq!(fold_stmt(&cfg, &mut src, loc).singleton(), Some(7));
}

#[test]
fn phi_unions_and_casts_mixed_width_arguments() {
    let mut cfg = Cfg::new();
    let narrow = cfg.add_var("narrow", IntType::I8);
    let wide_var = cfg.add_var("wide", IntType::I32);
    let out = cfg.add_var("out", IntType::I32);
    let b1 = cfg.add_block();
    let b2 = cfg.add_block();
    let join = cfg.add_block();
    let e1 = cfg.add_edge(b1, join);
    let e2 = cfg.add_edge(b2, join);
    let loc = cfg.push_stmt(
        join,
        CfgStmt::Phi {
            lhs: out,
            args: vec![(e1, Operand::Var(narrow)), (e2, Operand::Var(wide_var))],
        },
    );
    let ranges = [r(IntType::I8, -5, 5), r(IntType::I32, 100, 200)];
    let mut src = SourceList::new(&ranges);
    let got = fold_stmt(&cfg, &mut src, loc);
    assert_eq!(got.ty(), IntType::I32);
    assert!(got.contains(from_i128(IntType::I32, -5)));
    assert!(got.contains(from_i128(IntType::I32, 150)));
    assert!(!got.contains(from_i128(IntType::I32, 50)));
}

#[test]
fn phi_stops_early_once_everything_is_possible() {
    let mut cfg = Cfg::new();
    let a = cfg.add_var("a", IntType::I32);
    let b = cfg.add_var("b", IntType::I32);
    let out = cfg.add_var("out", IntType::I32);
    let b1 = cfg.add_block();
    let b2 = cfg.add_block();
    let join = cfg.add_block();
    let e1 = cfg.add_edge(b1, join);
    let e2 = cfg.add_edge(b2, join);
    let loc = cfg.push_stmt(
        join,
        CfgStmt::Phi { lhs: out, args: vec![(e1, Operand::Var(a)), (e2, Operand::Var(b))] },
    );
    let ranges = [Range::varying(IntType::I32), r(IntType::I32, 0, 1)];
    let mut src = SourceList::new(&ranges);
    assert!(fold_stmt(&cfg, &mut src, loc).is_varying());
}

#[test]
fn known_nonnegative_calls_get_a_floor() {
    let mut cfg = Cfg::new();
    let n = cfg.add_var("n", IntType::I64);
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Call { lhs: Some(n), callee: "strlen".into(), args: vec![] },
    );
    let mut src = SourceList::new(&[]);
    let got = fold_stmt(&cfg, &mut src, loc);
    assert_eq!(got.lower_bound(), Some(0));
    assert!(!got.contains(from_i128(IntType::I64, -1)));
}

#[test]
fn unknown_calls_fold_to_varying() {
    let mut cfg = Cfg::new();
    let n = cfg.add_var("n", IntType::I32);
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Call { lhs: Some(n), callee: "opaque".into(), args: vec![] },
    );
    let mut src = SourceList::new(&[]);
    assert!(fold_stmt(&cfg, &mut src, loc).is_varying());
}

#[test]
fn value_less_calls_fold_to_undefined() {
    let mut cfg = Cfg::new();
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Call { lhs: None, callee: "printf".into(), args: vec![] },
    );
    let mut src = SourceList::new(&[]);
    assert!(fold_stmt(&cfg, &mut src, loc).is_undefined());
}

#[test]
fn conditionals_fold_to_their_boolean_outcome() {
    let mut cfg = Cfg::new();
    let x = cfg.add_var("x", IntType::I32);
    let t = cfg.add_block();
    let f = cfg.add_block();
    let te = cfg.add_edge(cfg.entry, t);
    let fe = cfg.add_edge(cfg.entry, f);
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Cond {
            op: BinOp::Lt,
            op1: Operand::Var(x),
            op2: Operand::Const { value: 10, ty: IntType::I32 },
            true_edge: te,
            false_edge: fe,
        },
    );
    let known = [r(IntType::I32, 0, 5)];
    let mut src = SourceList::new(&known);
    assert_eq!(fold_stmt(&cfg, &mut src, loc).singleton(), Some(1));

    let overlap = [r(IntType::I32, 0, 50)];
    let mut src = SourceList::new(&overlap);
    assert!(fold_stmt(&cfg, &mut src, loc).is_varying());
}

#[test]
fn select_casts_its_arms_to_the_result_type() {
    let mut cfg = Cfg::new();
    let c = cfg.add_var("c", IntType::BOOL);
    let small = cfg.add_var("small", IntType::I8);
    let out = cfg.add_var("out", IntType::I32);
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Select {
            lhs: out,
            cond: Operand::Var(c),
            then_val: Operand::Var(small),
            else_val: Operand::Const { value: 1000, ty: IntType::I32 },
        },
    );
    let ranges = [Range::varying(IntType::BOOL), r(IntType::I8, -3, 3)];
    let mut src = SourceList::new(&ranges);
    let got = fold_stmt(&cfg, &mut src, loc);
    assert_eq!(got.ty(), IntType::I32);
    assert!(got.contains(from_i128(IntType::I32, -3)));
    assert!(got.contains(from_i128(IntType::I32, 1000)));
    assert!(!got.contains(from_i128(IntType::I32, 10)));
}

#[test]
fn shift_fold_composes_through_the_dispatch_table() {
    let mut cfg = Cfg::new();
    let x = cfg.add_var("x", IntType::U32);
    let y = cfg.add_var("y", IntType::U32);
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Binary {
            lhs: y,
            op: BinOp::Shl,
            op1: Operand::Var(x),
            op2: Operand::Const { value: 4, ty: IntType::U32 },
        },
    );
    let ranges = [r(IntType::U32, 1, 3)];
    let mut src = SourceList::new(&ranges);
    assert_eq!(fold_stmt(&cfg, &mut src, loc), r(IntType::U32, 16, 48));
}

#[test]
fn unary_cast_statement_changes_the_type() {
    let mut cfg = Cfg::new();
    let a = cfg.add_var("a", IntType::I8);
    let b = cfg.add_var("b", IntType::U8);
    let loc = cfg.push_stmt(
        cfg.entry,
        CfgStmt::Unary { lhs: b, op: UnOp::Cast, op1: Operand::Var(a) },
    );
    let ranges = [r(IntType::I8, -5, 5)];
    let mut src = SourceList::new(&ranges);
    let got = fold_stmt(&cfg, &mut src, loc);
    assert_eq!(got.ty(), IntType::U8);
    assert_eq!(got.num_pairs(), 2);
}

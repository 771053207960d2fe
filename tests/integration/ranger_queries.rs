//! The query engine end to end: branch refinement feeding a phi, cache
//! behavior across queries, export, dump, and tracing.

use std::fs;
use std::io::Write as _;

use mezzo::cfg::{Cfg, CfgStmt, EdgeId, Operand, VarId};
use mezzo::hir::{BinOp, IntType};
use mezzo::range::ranger::{RangeQuery, Ranger};
use mezzo::range::trace::{enable_ranger, TraceRanger};
use mezzo::range::wide::from_i128;
use mezzo::range::Range;

fn r(ty: IntType, lo: i128, hi: i128) -> Range {
    Range::new(ty, from_i128(ty, lo), from_i128(ty, hi))
}

/// entry: x = abs(...); cond x < 10 -> then / else
/// then -> join, else: y = 100 -> join
/// join: m = phi(then: x, else: y)
fn diamond_with_phi() -> (Cfg, VarId, VarId, EdgeId, EdgeId) {
    let mut cfg = Cfg::new();
    let x = cfg.add_var("x", IntType::I32);
    let y = cfg.add_var("y", IntType::I32);
    let m = cfg.add_var("m", IntType::I32);
    let then_bb = cfg.add_block();
    let else_bb = cfg.add_block();
    let join = cfg.add_block();
    let te = cfg.add_edge(cfg.entry, then_bb);
    let fe = cfg.add_edge(cfg.entry, else_bb);
    let tj = cfg.add_edge(then_bb, join);
    let ej = cfg.add_edge(else_bb, join);

    cfg.push_stmt(cfg.entry, CfgStmt::Call { lhs: Some(x), callee: "abs".into(), args: vec![] });
    cfg.push_stmt(
        cfg.entry,
        CfgStmt::Cond {
            op: BinOp::Lt,
            op1: Operand::Var(x),
            op2: Operand::Const { value: 10, ty: IntType::I32 },
            true_edge: te,
            false_edge: fe,
        },
    );
    cfg.push_stmt(
        else_bb,
        CfgStmt::Binary {
            lhs: y,
            op: BinOp::Mul,
            op1: Operand::Const { value: 10, ty: IntType::I32 },
            op2: Operand::Const { value: 10, ty: IntType::I32 },
        },
    );
    cfg.push_stmt(
        join,
        CfgStmt::Phi { lhs: m, args: vec![(tj, Operand::Var(x)), (ej, Operand::Var(y))] },
    );
    (cfg, x, m, te, fe)
}

#[test]
fn branch_knowledge_narrows_a_call_result() {
    let (cfg, x, _, te, fe) = diamond_with_phi();
    let mut ranger = Ranger::new();
    // abs() gives [0, max]; the branch caps it on each side
    assert_eq!(ranger.range_on_edge(&cfg, te, x), r(IntType::I32, 0, 9));
    let on_false = ranger.range_on_edge(&cfg, fe, x);
    assert_eq!(on_false.lower_bound(), Some(10));
    assert!(!on_false.contains(from_i128(IntType::I32, -1)));
}

#[test]
fn phi_at_the_join_collects_both_arms() {
    let (cfg, _, m, _, _) = diamond_with_phi();
    let mut ranger = Ranger::new();
    let got = ranger.range_of_expr(&cfg, &Operand::Var(m), None);
    // [0, 9] from the then arm, the constant 100 from the else arm
    assert_eq!(got.num_pairs(), 2);
    assert!(got.contains(5));
    assert!(got.contains(100));
    assert!(!got.contains(50));
}

#[test]
fn repeated_queries_are_stable() {
    let (cfg, _, m, _, _) = diamond_with_phi();
    let mut ranger = Ranger::new();
    let first = ranger.range_of_expr(&cfg, &Operand::Var(m), None);
    let second = ranger.range_of_expr(&cfg, &Operand::Var(m), None);
    assert_eq!(first, second);
}

#[test]
fn export_persists_facts_into_variable_metadata() {
    let (mut cfg, x, m, _, _) = diamond_with_phi();
    let facts = mezzo::analyze_ranges(&mut cfg);

    let by_name = |n: &str| facts.iter().find(|f| f.var == n);
    assert!(by_name("x").is_some());
    assert!(by_name("y").is_some());
    assert!(by_name("m").is_some());
    assert_eq!(cfg.var(x).global_range, Some(r(IntType::I32, 0, i32::MAX as i128)));
    assert_eq!(cfg.var(m).global_range.as_ref().map(|r| r.num_pairs()), Some(2));
}

#[test]
fn exported_metadata_seeds_a_fresh_engine() {
    let (mut cfg, x, _, _, _) = diamond_with_phi();
    mezzo::analyze_ranges(&mut cfg);

    // a later pass sees the stored range without recomputing the branch
    let mut ranger = Ranger::new();
    let got = ranger.range_of_expr(&cfg, &Operand::Var(x), None);
    assert_eq!(got.lower_bound(), Some(0));
}

#[test]
fn json_export_roundtrips_through_a_file() {
    let (mut cfg, _, _, _, _) = diamond_with_phi();
    let mut ranger = Ranger::new();
    let json = ranger.export_json(&mut cfg).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ranges.json");
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(json.as_bytes()).unwrap();

    let loaded: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let arr = loaded.as_array().unwrap();
    assert!(arr.iter().any(|f| f["var"] == "m"));
    for fact in arr {
        assert!(fact["range"].is_object());
    }
}

#[test]
fn dump_lists_blocks_and_definition_ranges() {
    let (cfg, _, _, _, _) = diamond_with_phi();
    let mut ranger = Ranger::new();
    let dump = ranger.dump(&cfg);
    assert!(dump.contains("bb0:"));
    assert!(dump.contains("x : i32 "));
    assert!(dump.contains("m : i32 [0, 9] [100]"));
    assert!(dump.contains("<branch> : "));
}

#[test]
fn tracing_wraps_the_same_answers_with_a_log() {
    let (cfg, _, m, _, _) = diamond_with_phi();
    let mut plain = Ranger::new();
    let want = plain.range_of_expr(&cfg, &Operand::Var(m), None);

    let mut tracer = TraceRanger::new();
    let got = tracer.range_of_expr(&cfg, &Operand::Var(m), None);
    assert_eq!(got, want);

    let log = tracer.take_log();
    assert!(log.starts_with("1 range_of_expr (m)"));
    assert!(log.contains("range_on_edge"));
    assert!(log.contains("1 = "));
    assert!(tracer.log().is_empty());
}

#[test]
fn enable_ranger_answers_in_both_modes() {
    let (cfg, x, _, _, _) = diamond_with_phi();
    for trace in [false, true] {
        let mut q = enable_ranger(trace);
        let got = q.range_of_expr(&cfg, &Operand::Var(x), None);
        assert_eq!(got.lower_bound(), Some(0), "trace={trace}");
    }
}

#[test]
fn equality_branches_pin_a_variable_to_a_constant() {
    let mut cfg = Cfg::new();
    let x = cfg.add_var("x", IntType::I32);
    let eq_bb = cfg.add_block();
    let ne_bb = cfg.add_block();
    let te = cfg.add_edge(cfg.entry, eq_bb);
    let fe = cfg.add_edge(cfg.entry, ne_bb);
    cfg.push_stmt(
        cfg.entry,
        CfgStmt::Cond {
            op: BinOp::Eq,
            op1: Operand::Var(x),
            op2: Operand::Const { value: 42, ty: IntType::I32 },
            true_edge: te,
            false_edge: fe,
        },
    );
    let mut ranger = Ranger::new();
    assert_eq!(ranger.range_on_edge(&cfg, te, x).singleton(), Some(42));
    let on_false = ranger.range_on_edge(&cfg, fe, x);
    assert!(!on_false.contains(42));
    assert!(on_false.contains(41));
}

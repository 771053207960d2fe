//! Algebraic properties of the range lattice under randomized inputs.

use mezzo::hir::{BinOp, IntType};
use mezzo::range::table::{binary_handler, range_cast};
use mezzo::range::wide::from_i128;
use mezzo::range::Range;
use proptest::prelude::*;

fn arb_range(ty: IntType) -> impl Strategy<Value = Range> {
    let lo = ty.bits as u32 - 1;
    let span = if ty.signed {
        (-(1i128 << lo))..(1i128 << lo)
    } else {
        0i128..(1i128 << ty.bits)
    };
    prop::collection::vec((span.clone(), span), 0..4).prop_map(move |pairs| {
        Range::from_pairs(
            ty,
            pairs
                .into_iter()
                .map(|(a, b)| {
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    (from_i128(ty, lo), from_i128(ty, hi))
                })
                .collect(),
        )
    })
}

fn union(a: &Range, b: &Range) -> Range {
    let mut r = a.clone();
    r.union_with(b);
    r
}

fn intersect(a: &Range, b: &Range) -> Range {
    let mut r = a.clone();
    r.intersect_with(b);
    r
}

proptest! {
    #[test]
    fn union_is_commutative(a in arb_range(IntType::I32), b in arb_range(IntType::I32)) {
        prop_assert_eq!(union(&a, &b), union(&b, &a));
    }

    #[test]
    fn union_is_associative(
        a in arb_range(IntType::I32),
        b in arb_range(IntType::I32),
        c in arb_range(IntType::I32),
    ) {
        prop_assert_eq!(union(&union(&a, &b), &c), union(&a, &union(&b, &c)));
    }

    #[test]
    fn invert_is_an_involution(a in arb_range(IntType::I16)) {
        let mut twice = a.clone();
        twice.invert();
        twice.invert();
        prop_assert_eq!(twice, a);
    }

    #[test]
    fn intersection_is_a_lower_bound(a in arb_range(IntType::I32), b in arb_range(IntType::I32)) {
        let both = intersect(&a, &b);
        // a subset survives re-intersection with either operand
        prop_assert_eq!(intersect(&both, &a), both.clone());
        prop_assert_eq!(intersect(&both, &b), both);
    }

    #[test]
    fn union_contains_both_operands(a in arb_range(IntType::I8), b in arb_range(IntType::I8)) {
        let u = union(&a, &b);
        for &(lo, hi) in &a.to_pairs() {
            prop_assert!(u.contains(lo));
            prop_assert!(u.contains(hi));
        }
        for &(lo, hi) in &b.to_pairs() {
            prop_assert!(u.contains(lo));
            prop_assert!(u.contains(hi));
        }
    }

    #[test]
    fn widening_cast_roundtrips(a in arb_range(IntType::I8)) {
        let widened = range_cast(&a, IntType::I16);
        prop_assert_eq!(range_cast(&widened, IntType::I8), a);
    }

    #[test]
    fn narrowing_cast_keeps_every_value(v in any::<i8>()) {
        // each concrete i8 survives the trip through u8
        let one = Range::singleton_value(IntType::I8, from_i128(IntType::I8, v as i128));
        let narrowed = range_cast(&one, IntType::U8);
        prop_assert!(narrowed.contains(v as u8 as u128));
    }

    #[test]
    fn unsigned_addition_covers_the_wrapped_sum(a in any::<u8>(), b in any::<u8>()) {
        let ty = IntType::U8;
        let fold = binary_handler(BinOp::Add).unwrap().fold_range(
            ty,
            &Range::singleton_value(ty, a as u128),
            &Range::singleton_value(ty, b as u128),
        );
        prop_assert!(fold.contains(a.wrapping_add(b) as u128));
    }

    #[test]
    fn addition_fold_covers_concrete_sums(
        a in -1000i128..1000,
        b in -1000i128..1000,
        c in -1000i128..1000,
        d in -1000i128..1000,
    ) {
        let ty = IntType::I32;
        let (alo, ahi) = if a <= b { (a, b) } else { (b, a) };
        let (blo, bhi) = if c <= d { (c, d) } else { (d, c) };
        let lh = Range::new(ty, from_i128(ty, alo), from_i128(ty, ahi));
        let rh = Range::new(ty, from_i128(ty, blo), from_i128(ty, bhi));
        let fold = binary_handler(BinOp::Add).unwrap().fold_range(ty, &lh, &rh);
        // spot-check the corners and the midpoint
        for s in [alo + blo, ahi + bhi, (alo + blo + ahi + bhi) / 2] {
            prop_assert!(fold.contains(from_i128(ty, s)), "missing {s}");
        }
    }

    #[test]
    fn undefined_operands_stay_viral(a in arb_range(IntType::I32)) {
        let undef = Range::undefined(IntType::I32);
        for op in [BinOp::Add, BinOp::Mul, BinOp::BitXor] {
            let fold = binary_handler(op).unwrap().fold_range(IntType::I32, &undef, &a);
            prop_assert!(fold.is_undefined());
        }
    }

    #[test]
    fn varying_absorbs_union(a in arb_range(IntType::I32)) {
        let v = Range::varying(IntType::I32);
        prop_assert!(union(&v, &a).is_varying());
        prop_assert!(union(&a, &v).is_varying());
    }
}

//! Range operator protocol and the comparison operators.
//!
//! Every arithmetic, bitwise, and relational opcode gets one implementation
//! of [`RangeOperator`]. Forward folding defaults to the cross product of
//! the operands' sub-intervals over [`RangeOperator::wi_fold`]; backward
//! solving (`op1_range` / `op2_range`) defaults to declining.

use std::cmp::Ordering;

use crate::hir::IntType;
use crate::range::wide::{self, Overflow};
use crate::range::Range;

pub trait RangeOperator {
    /// Forward fold: the range of `op1 <op> op2`.
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if let Some(r) = empty_range_varying(ty, lh, rh) {
            return r;
        }
        let mut result = Range::undefined(ty);
        for &(llb, lub) in &lh.to_pairs() {
            for &(rlb, rub) in &rh.to_pairs() {
                result.union_with(&self.wi_fold(ty, llb, lub, rlb, rub));
                if result.is_varying() {
                    return result;
                }
            }
        }
        result
    }

    /// Fold one sub-interval pair. Operators that cannot do better return
    /// varying.
    fn wi_fold(&self, ty: IntType, _lh_lb: u128, _lh_ub: u128, _rh_lb: u128, _rh_ub: u128) -> Range {
        Range::varying(ty)
    }

    /// Backward solve for op1 given the result and op2. `None` declines.
    fn op1_range(&self, _ty: IntType, _lhs: &Range, _op2: &Range) -> Option<Range> {
        None
    }

    /// Backward solve for op2 given the result and op1.
    fn op2_range(&self, _ty: IntType, _lhs: &Range, _op1: &Range) -> Option<Range> {
        None
    }
}

/// Shortcut for the degenerate operand cases: any undefined operand makes
/// the result undefined, two varying operands make it varying.
pub fn empty_range_varying(ty: IntType, lh: &Range, rh: &Range) -> Option<Range> {
    if lh.is_undefined() || rh.is_undefined() {
        Some(Range::undefined(ty))
    } else if lh.is_varying() && rh.is_varying() {
        Some(Range::varying(ty))
    } else {
        None
    }
}

pub fn range_true() -> Range {
    Range::singleton_value(IntType::BOOL, 1)
}

pub fn range_false() -> Range {
    Range::singleton_value(IntType::BOOL, 0)
}

pub fn range_true_and_false() -> Range {
    Range::varying(IntType::BOOL)
}

/// What a boolean result range says about the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolState {
    Empty,
    True,
    False,
    Full,
}

pub fn get_bool_state(lhs: &Range) -> BoolState {
    if lhs.is_undefined() {
        BoolState::Empty
    } else if lhs.is_zero() {
        BoolState::False
    } else if !lhs.contains(0) {
        BoolState::True
    } else {
        BoolState::Full
    }
}

/// `[min, val - 1]`; empty when `val` is the type minimum.
pub fn build_lt(ty: IntType, val: u128) -> Range {
    let (ub, ovf) = wide::sub(ty, val, 1);
    if ovf != Overflow::None {
        Range::undefined(ty)
    } else {
        Range::new(ty, wide::min_value(ty), ub)
    }
}

pub fn build_le(ty: IntType, val: u128) -> Range {
    Range::new(ty, wide::min_value(ty), wide::trunc(ty, val))
}

/// `[val + 1, max]`; empty when `val` is the type maximum.
pub fn build_gt(ty: IntType, val: u128) -> Range {
    let (lb, ovf) = wide::add(ty, val, 1);
    if ovf != Overflow::None {
        Range::undefined(ty)
    } else {
        Range::new(ty, lb, wide::max_value(ty))
    }
}

pub fn build_ge(ty: IntType, val: u128) -> Range {
    Range::new(ty, wide::trunc(ty, val), wide::max_value(ty))
}

/// `[lo, hi]` when ordered, otherwise the wrapped interval covering both
/// ends of the span.
pub fn create_possibly_reversed_range(ty: IntType, lo: u128, hi: u128) -> Range {
    if wide::cmp(ty, lo, hi) != Ordering::Greater {
        Range::new(ty, lo, hi)
    } else {
        Range::from_pairs(
            ty,
            vec![(wide::min_value(ty), hi), (lo, wide::max_value(ty))],
        )
    }
}

/// Combine folded bounds with their overflow classification.
///
/// Unsigned types wrap: a single wrapped bound carves an anti-range out of
/// the span, divergent wrapping gives varying. Signed overflow saturates
/// the offending bound; both bounds off the same end is the empty range.
pub fn value_range_with_overflow(
    ty: IntType,
    lb: u128,
    lb_ovf: Overflow,
    ub: u128,
    ub_ovf: Overflow,
) -> Range {
    if !ty.signed {
        // wrapping type
        if (lb_ovf == Overflow::None) == (ub_ovf == Overflow::None) {
            if lb_ovf == ub_ovf && wide::cmp(ty, lb, ub) != Ordering::Greater {
                return Range::new(ty, lb, ub);
            }
            return Range::varying(ty);
        }
        // exactly one bound wrapped: everything except (ub, lb) exclusive
        let (gap_lo, lo_ovf) = wide::add(ty, ub, 1);
        let (gap_hi, hi_ovf) = wide::sub(ty, lb, 1);
        if lo_ovf != Overflow::None
            || hi_ovf != Overflow::None
            || wide::cmp(ty, gap_lo, gap_hi) == Ordering::Greater
        {
            return Range::varying(ty);
        }
        let mut r = Range::new(ty, gap_lo, gap_hi);
        r.invert();
        return r;
    }
    match (lb_ovf, ub_ovf) {
        (Overflow::None, Overflow::None) => Range::new(ty, lb, ub),
        (Overflow::Pos, Overflow::Pos) | (Overflow::Neg, Overflow::Neg) => Range::undefined(ty),
        _ => {
            let lb = if lb_ovf == Overflow::Neg { wide::min_value(ty) } else { lb };
            let ub = if ub_ovf == Overflow::Pos { wide::max_value(ty) } else { ub };
            Range::new(ty, lb, ub)
        }
    }
}

fn intersection_empty(a: &Range, b: &Range) -> bool {
    let mut t = a.clone();
    t.intersect_with(b);
    t.is_undefined()
}

pub struct OperatorEqual;

impl RangeOperator for OperatorEqual {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        debug_assert_eq!(ty, IntType::BOOL);
        if lh.is_undefined() || rh.is_undefined() {
            return Range::undefined(ty);
        }
        if let (Some(a), Some(b)) = (lh.singleton(), rh.singleton()) {
            return if a == b { range_true() } else { range_false() };
        }
        if intersection_empty(lh, rh) {
            range_false()
        } else {
            range_true_and_false()
        }
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        match get_bool_state(lhs) {
            BoolState::Empty => Some(Range::undefined(ty)),
            BoolState::True => Some(op2.clone()),
            BoolState::False => match op2.singleton() {
                Some(v) => {
                    let mut r = Range::singleton_value(ty, v);
                    r.invert();
                    Some(r)
                }
                None => Some(Range::varying(ty)),
            },
            BoolState::Full => Some(Range::varying(ty)),
        }
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorNotEqual;

impl RangeOperator for OperatorNotEqual {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        let mut r = OperatorEqual.fold_range(ty, lh, rh);
        if !r.is_undefined() && !r.is_varying() {
            r = match get_bool_state(&r) {
                BoolState::True => range_false(),
                BoolState::False => range_true(),
                _ => range_true_and_false(),
            };
        }
        r
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        let flipped = match get_bool_state(lhs) {
            BoolState::Empty => return Some(Range::undefined(ty)),
            BoolState::True => range_false(),
            BoolState::False => range_true(),
            BoolState::Full => range_true_and_false(),
        };
        OperatorEqual.op1_range(ty, &flipped, op2)
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

/// Bounds comparison shared by the four ordering operators.
fn order_fold(
    lh: &Range,
    rh: &Range,
    definitely: impl Fn(Ordering) -> bool,
    never: impl Fn(Ordering) -> bool,
) -> Range {
    let ty = lh.ty();
    let (llb, lub) = (lh.lower_bound(), lh.upper_bound());
    let (rlb, rub) = (rh.lower_bound(), rh.upper_bound());
    match (llb, lub, rlb, rub) {
        (Some(llb), Some(lub), Some(rlb), Some(rub)) => {
            // op holds for every element pair
            if definitely(wide::cmp(ty, lub, rlb)) && definitely(wide::cmp(ty, llb, rub)) {
                range_true()
            } else if never(wide::cmp(ty, llb, rub)) && never(wide::cmp(ty, lub, rlb)) {
                range_false()
            } else {
                range_true_and_false()
            }
        }
        _ => Range::undefined(IntType::BOOL),
    }
}

pub struct OperatorLt;

impl RangeOperator for OperatorLt {
    fn fold_range(&self, _ty: IntType, lh: &Range, rh: &Range) -> Range {
        order_fold(lh, rh, |o| o == Ordering::Less, |o| o != Ordering::Less)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        match get_bool_state(lhs) {
            BoolState::Empty => Some(Range::undefined(ty)),
            BoolState::True => Some(build_lt(ty, op2.upper_bound()?)),
            BoolState::False => Some(build_ge(ty, op2.lower_bound()?)),
            BoolState::Full => Some(Range::varying(ty)),
        }
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        match get_bool_state(lhs) {
            BoolState::Empty => Some(Range::undefined(ty)),
            BoolState::True => Some(build_gt(ty, op1.lower_bound()?)),
            BoolState::False => Some(build_le(ty, op1.upper_bound()?)),
            BoolState::Full => Some(Range::varying(ty)),
        }
    }
}

pub struct OperatorLe;

impl RangeOperator for OperatorLe {
    fn fold_range(&self, _ty: IntType, lh: &Range, rh: &Range) -> Range {
        order_fold(lh, rh, |o| o != Ordering::Greater, |o| o == Ordering::Greater)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        match get_bool_state(lhs) {
            BoolState::Empty => Some(Range::undefined(ty)),
            BoolState::True => Some(build_le(ty, op2.upper_bound()?)),
            BoolState::False => Some(build_gt(ty, op2.lower_bound()?)),
            BoolState::Full => Some(Range::varying(ty)),
        }
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        match get_bool_state(lhs) {
            BoolState::Empty => Some(Range::undefined(ty)),
            BoolState::True => Some(build_ge(ty, op1.lower_bound()?)),
            BoolState::False => Some(build_lt(ty, op1.upper_bound()?)),
            BoolState::Full => Some(Range::varying(ty)),
        }
    }
}

pub struct OperatorGt;

impl RangeOperator for OperatorGt {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        OperatorLt.fold_range(ty, rh, lh)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        OperatorLt.op2_range(ty, lhs, op2)
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        OperatorLt.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorGe;

impl RangeOperator for OperatorGe {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        OperatorLe.fold_range(ty, rh, lh)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        OperatorLe.op2_range(ty, lhs, op2)
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        OperatorLe.op1_range(ty, lhs, op1)
    }
}

/// Pass-through for copies; also the folding shim for no-op conversions.
pub struct OperatorIdentity;

impl RangeOperator for OperatorIdentity {
    fn fold_range(&self, _ty: IntType, lh: &Range, _rh: &Range) -> Range {
        lh.clone()
    }

    fn op1_range(&self, _ty: IntType, lhs: &Range, _op2: &Range) -> Option<Range> {
        Some(lhs.clone())
    }
}

/// Width or signedness conversion with two's-complement wraparound.
pub struct OperatorCast;

impl OperatorCast {
    fn fold_pair(&self, outer: IntType, inner: IntType, lb: u128, ub: u128) -> Range {
        let lo = wide::to_i128(inner, lb);
        let hi = wide::to_i128(inner, ub);
        let span = (hi - lo) as u128;
        if span >= wide::mask(outer.bits) {
            return Range::varying(outer);
        }
        let lb = wide::from_i128(outer, lo);
        let ub = wide::from_i128(outer, hi);
        create_possibly_reversed_range(outer, lb, ub)
    }
}

impl RangeOperator for OperatorCast {
    /// `lh` carries the inner (source) type; `ty` and `rh` the outer.
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if lh.is_undefined() || rh.is_undefined() {
            return Range::undefined(ty);
        }
        let inner = lh.ty();
        if inner == ty {
            return lh.clone();
        }
        let mut result = Range::undefined(ty);
        for &(lb, ub) in &lh.to_pairs() {
            result.union_with(&self.fold_pair(ty, inner, lb, ub));
            if result.is_varying() {
                break;
            }
        }
        result.intersect_with(rh);
        result
    }

    /// `ty` is the inner type here; refine what the source could have been.
    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        if lhs.is_undefined() {
            return Some(Range::undefined(ty));
        }
        let outer = lhs.ty();
        if outer.bits < ty.bits {
            // truncating cast: high source bits are gone
            return None;
        }
        let mut r = self.fold_range(ty, lhs, &Range::varying(ty));
        r.intersect_with(op2);
        Some(r)
    }
}

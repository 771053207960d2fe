//! Bitwise, logical, and shift range operators.
//!
//! The bitwise folds work off may-be-set / must-be-set masks derived from
//! the interval bounds; on boolean operands they delegate to the logical
//! operators.

use std::cmp::Ordering;

use crate::hir::IntType;
use crate::range::ops::{
    empty_range_varying, get_bool_state, range_false, range_true, range_true_and_false, BoolState,
    RangeOperator,
};
use crate::range::ops_arith::OperatorMinus;
use crate::range::wide::{self, Overflow};
use crate::range::Range;

pub struct OperatorLogicalAnd;

impl RangeOperator for OperatorLogicalAnd {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if lh.is_undefined() || rh.is_undefined() {
            return Range::undefined(ty);
        }
        match (get_bool_state(lh), get_bool_state(rh)) {
            (BoolState::True, BoolState::True) => range_true(),
            (BoolState::False, _) | (_, BoolState::False) => range_false(),
            _ => range_true_and_false(),
        }
    }

    fn op1_range(&self, _ty: IntType, lhs: &Range, _op2: &Range) -> Option<Range> {
        match get_bool_state(lhs) {
            BoolState::Empty => Some(Range::undefined(IntType::BOOL)),
            // both operands must have been true
            BoolState::True => Some(range_true()),
            // either could have been the false one
            _ => Some(range_true_and_false()),
        }
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorLogicalOr;

impl RangeOperator for OperatorLogicalOr {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if lh.is_undefined() || rh.is_undefined() {
            return Range::undefined(ty);
        }
        match (get_bool_state(lh), get_bool_state(rh)) {
            (BoolState::False, BoolState::False) => range_false(),
            (BoolState::True, _) | (_, BoolState::True) => range_true(),
            _ => range_true_and_false(),
        }
    }

    fn op1_range(&self, _ty: IntType, lhs: &Range, _op2: &Range) -> Option<Range> {
        match get_bool_state(lhs) {
            BoolState::Empty => Some(Range::undefined(IntType::BOOL)),
            BoolState::False => Some(range_false()),
            _ => Some(range_true_and_false()),
        }
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorLogicalNot;

impl RangeOperator for OperatorLogicalNot {
    fn fold_range(&self, ty: IntType, lh: &Range, _rh: &Range) -> Range {
        if lh.is_undefined() {
            return Range::undefined(ty);
        }
        match get_bool_state(lh) {
            BoolState::True => range_false(),
            BoolState::False => range_true(),
            _ => range_true_and_false(),
        }
    }

    /// Logical not is an involution.
    fn op1_range(&self, ty: IntType, lhs: &Range, _op2: &Range) -> Option<Range> {
        Some(self.fold_range(ty, lhs, &Range::varying(IntType::BOOL)))
    }
}

/// May-be / must-be masks for both operands of a bitwise fold.
fn operand_masks(ty: IntType, lb: u128, ub: u128) -> (u128, u128) {
    wide::zero_nonzero_bits(ty, lb, ub)
}

pub struct OperatorBitwiseAnd;

impl RangeOperator for OperatorBitwiseAnd {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if ty == IntType::BOOL {
            return OperatorLogicalAnd.fold_range(ty, lh, rh);
        }
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

    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let (lmaybe, lmust) = operand_masks(ty, lh_lb, lh_ub);
        let (rmaybe, rmust) = operand_masks(ty, rh_lb, rh_ub);
        let mut lb = lmust & rmust;
        let mut ub = lmaybe & rmaybe;
        if !ty.signed {
            // an unsigned AND never exceeds either operand
            let cap = wide::to_i128(ty, lh_ub).min(wide::to_i128(ty, rh_ub));
            ub = wide::to_i128(ty, ub).min(cap) as u128;
            lb = wide::to_i128(ty, lb).min(wide::to_i128(ty, ub)) as u128;
        }
        if wide::cmp(ty, lb, ub) == Ordering::Greater {
            return Range::varying(ty);
        }
        Range::new(ty, lb, ub)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        if ty == IntType::BOOL {
            return OperatorLogicalAnd.op1_range(ty, lhs, op2);
        }
        // a nonzero masked value implies a nonzero operand
        if lhs.is_nonzero() {
            return Some(Range::nonzero(ty));
        }
        None
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorBitwiseOr;

impl RangeOperator for OperatorBitwiseOr {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if ty == IntType::BOOL {
            return OperatorLogicalOr.fold_range(ty, lh, rh);
        }
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

    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let (lmaybe, lmust) = operand_masks(ty, lh_lb, lh_ub);
        let (rmaybe, rmust) = operand_masks(ty, rh_lb, rh_ub);
        let mut lb = lmust | rmust;
        let ub = lmaybe | rmaybe;
        if !ty.signed {
            // an unsigned OR is at least either operand
            let floor = wide::to_i128(ty, lh_lb).max(wide::to_i128(ty, rh_lb));
            lb = wide::to_i128(ty, lb).max(floor) as u128;
        }
        if wide::cmp(ty, lb, ub) == Ordering::Greater {
            return Range::varying(ty);
        }
        Range::new(ty, lb, ub)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        if ty == IntType::BOOL {
            return OperatorLogicalOr.op1_range(ty, lhs, op2);
        }
        // a zero OR forces both operands to zero
        if lhs.is_zero() {
            return Some(Range::zero(ty));
        }
        None
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorBitwiseXor;

impl RangeOperator for OperatorBitwiseXor {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let (lmaybe, lmust) = operand_masks(ty, lh_lb, lh_ub);
        let (rmaybe, rmust) = operand_masks(ty, rh_lb, rh_ub);
        let m = wide::mask(ty.bits);
        // bits fixed equal in both operands come out zero
        let must_zero = (lmust & rmust) | (!lmaybe & !rmaybe & m);
        let ub = m & !must_zero;
        let sign_bit = 1u128 << (ty.bits - 1);
        if !ty.signed || must_zero & sign_bit != 0 {
            Range::new(ty, 0, ub)
        } else {
            Range::varying(ty)
        }
    }

    fn op1_range(&self, _ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        // x ^ y == 0 forces x == y
        if lhs.is_zero() {
            return Some(op2.clone());
        }
        // x ^ y != 0 with a singleton y excludes exactly that value
        if lhs.is_nonzero() && op2.singleton().is_some() {
            let mut r = op2.clone();
            r.invert();
            return Some(r);
        }
        None
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorBitwiseNot;

impl RangeOperator for OperatorBitwiseNot {
    /// `~x` folds as `-1 - x`.
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if let Some(r) = empty_range_varying(ty, lh, rh) {
            return r;
        }
        let minus_one = Range::singleton_value(ty, wide::mask(ty.bits));
        OperatorMinus.fold_range(ty, &minus_one, lh)
    }

    /// Bitwise not is an involution.
    fn op1_range(&self, ty: IntType, lhs: &Range, _op2: &Range) -> Option<Range> {
        Some(self.fold_range(ty, lhs, &Range::varying(ty)))
    }
}

/// Reject shift amounts outside `[0, bits - 1]`.
fn shift_in_range(ty: IntType, rh: &Range) -> Option<(u32, u32)> {
    let lo = wide::to_i128(rh.ty(), rh.lower_bound()?);
    let hi = wide::to_i128(rh.ty(), rh.upper_bound()?);
    if lo < 0 || hi >= ty.bits as i128 {
        None
    } else {
        Some((lo as u32, hi as u32))
    }
}

pub struct OperatorLshift;

impl RangeOperator for OperatorLshift {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if lh.is_undefined() || rh.is_undefined() {
            return Range::undefined(ty);
        }
        let Some((s_lo, s_hi)) = shift_in_range(ty, rh) else {
            return Range::varying(ty);
        };
        let mut result = Range::undefined(ty);
        for &(lb, ub) in &lh.to_pairs() {
            let corners = [
                wide::shl(ty, lb, s_lo),
                wide::shl(ty, lb, s_hi),
                wide::shl(ty, ub, s_lo),
                wide::shl(ty, ub, s_hi),
            ];
            let mut lo = i128::MAX;
            let mut hi = i128::MIN;
            for (v, ovf) in corners {
                if ovf != Overflow::None {
                    return Range::varying(ty);
                }
                let v = wide::to_i128(ty, v);
                lo = lo.min(v);
                hi = hi.max(v);
            }
            result.union_with(&Range::new(ty, wide::from_i128(ty, lo), wide::from_i128(ty, hi)));
            if result.is_varying() {
                break;
            }
        }
        result
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        let s = wide::to_i128(op2.ty(), op2.singleton()?) as u32;
        if s as i128 >= ty.bits as i128 {
            return None;
        }
        // low `s` bits of the result are zero; the shifted-out high bits
        // of the operand are unconstrained
        let lb = wide::shr(ty, lhs.lower_bound()?, s);
        let high_fill = if s == 0 { 0 } else { wide::trunc(ty, wide::mask(s as u8) << (ty.bits as u32 - s)) };
        let ub = wide::trunc(ty, wide::shr(ty, lhs.upper_bound()?, s) | high_fill);
        if wide::cmp(ty, lb, ub) == Ordering::Greater {
            return Some(Range::varying(ty));
        }
        Some(Range::new(ty, lb, ub))
    }
}

pub struct OperatorRshift;

impl RangeOperator for OperatorRshift {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if lh.is_undefined() || rh.is_undefined() {
            return Range::undefined(ty);
        }
        let Some((s_lo, s_hi)) = shift_in_range(ty, rh) else {
            return Range::varying(ty);
        };
        let mut result = Range::undefined(ty);
        for &(lb, ub) in &lh.to_pairs() {
            let corners = [
                wide::shr(ty, lb, s_lo),
                wide::shr(ty, lb, s_hi),
                wide::shr(ty, ub, s_lo),
                wide::shr(ty, ub, s_hi),
            ];
            let mut lo = i128::MAX;
            let mut hi = i128::MIN;
            for v in corners {
                let v = wide::to_i128(ty, v);
                lo = lo.min(v);
                hi = hi.max(v);
            }
            result.union_with(&Range::new(ty, wide::from_i128(ty, lo), wide::from_i128(ty, hi)));
            if result.is_varying() {
                break;
            }
        }
        result
    }

    /// Deliberately loose: the result's low bits are lost, so the operand
    /// is only pinned down to `[lb << s, (ub << s) | (2^s - 1)]`.
    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        let s = wide::to_i128(op2.ty(), op2.singleton()?) as u32;
        if s as i128 >= ty.bits as i128 {
            return None;
        }
        let (lb, lb_ovf) = wide::shl(ty, lhs.lower_bound()?, s);
        let (ub_base, ub_ovf) = wide::shl(ty, lhs.upper_bound()?, s);
        if lb_ovf != Overflow::None || ub_ovf != Overflow::None {
            return Some(Range::varying(ty));
        }
        let low_fill = if s == 0 { 0 } else { wide::mask(s as u8) };
        let (ub, fill_ovf) = wide::add(ty, ub_base, low_fill);
        if fill_ovf != Overflow::None || wide::cmp(ty, lb, ub) == Ordering::Greater {
            return Some(Range::varying(ty));
        }
        Some(Range::new(ty, lb, ub))
    }
}

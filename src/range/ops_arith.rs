//! Arithmetic range operators.
//!
//! Signed types treat overflow as undefined behavior and saturate or drop
//! the offending bound; unsigned types wrap, which shows up as the
//! anti-range path in `value_range_with_overflow` and as widened exact
//! math in multiplication.

use std::cmp::Ordering;

use crate::hir::IntType;
use crate::range::ops::{
    create_possibly_reversed_range, empty_range_varying, value_range_with_overflow, RangeOperator,
};
use crate::range::wide::{self, DivRounding, Overflow};
use crate::range::Range;

/// Min/max of the four corner results, declining to varying if any corner
/// overflowed.
fn wi_cross_product(
    ty: IntType,
    op: impl Fn(u128, u128) -> (u128, Overflow),
    lh_lb: u128,
    lh_ub: u128,
    rh_lb: u128,
    rh_ub: u128,
) -> Range {
    let corners = [
        op(lh_lb, rh_lb),
        op(lh_lb, rh_ub),
        op(lh_ub, rh_lb),
        op(lh_ub, rh_ub),
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
    Range::new(ty, wide::from_i128(ty, lo), wide::from_i128(ty, hi))
}

pub struct OperatorPlus;

impl RangeOperator for OperatorPlus {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let (lb, lb_ovf) = wide::add(ty, lh_lb, rh_lb);
        let (ub, ub_ovf) = wide::add(ty, lh_ub, rh_ub);
        value_range_with_overflow(ty, lb, lb_ovf, ub, ub_ovf)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        Some(OperatorMinus.fold_range(ty, lhs, op2))
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        self.op1_range(ty, lhs, op1)
    }
}

pub struct OperatorMinus;

impl RangeOperator for OperatorMinus {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let (lb, lb_ovf) = wide::sub(ty, lh_lb, rh_ub);
        let (ub, ub_ovf) = wide::sub(ty, lh_ub, rh_lb);
        value_range_with_overflow(ty, lb, lb_ovf, ub, ub_ovf)
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        Some(OperatorPlus.fold_range(ty, lhs, op2))
    }

    fn op2_range(&self, ty: IntType, lhs: &Range, op1: &Range) -> Option<Range> {
        Some(self.fold_range(ty, op1, lhs))
    }
}

pub struct OperatorMin;

impl RangeOperator for OperatorMin {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let lb = if wide::cmp(ty, lh_lb, rh_lb) == Ordering::Greater { rh_lb } else { lh_lb };
        let ub = if wide::cmp(ty, lh_ub, rh_ub) == Ordering::Greater { rh_ub } else { lh_ub };
        Range::new(ty, lb, ub)
    }
}

pub struct OperatorMax;

impl RangeOperator for OperatorMax {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let lb = if wide::cmp(ty, lh_lb, rh_lb) == Ordering::Less { rh_lb } else { lh_lb };
        let ub = if wide::cmp(ty, lh_ub, rh_ub) == Ordering::Less { rh_ub } else { lh_ub };
        Range::new(ty, lb, ub)
    }
}

pub struct OperatorMult;

impl RangeOperator for OperatorMult {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        if ty.signed {
            return wi_cross_product(ty, |a, b| wide::mul(ty, a, b), lh_lb, lh_ub, rh_lb, rh_ub);
        }
        // wrapping multiply: exact products in widened precision, then
        // check whether the spread still fits one wrapped interval
        let products = [
            wide::mul_exact(ty, lh_lb, rh_lb),
            wide::mul_exact(ty, lh_lb, rh_ub),
            wide::mul_exact(ty, lh_ub, rh_lb),
            wide::mul_exact(ty, lh_ub, rh_ub),
        ];
        let mut lo = i128::MAX;
        let mut hi = i128::MIN;
        for p in products {
            match p {
                Some(v) => {
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
                None => return Range::varying(ty),
            }
        }
        if (hi - lo) as u128 >= wide::mask(ty.bits) {
            return Range::varying(ty);
        }
        create_possibly_reversed_range(ty, wide::from_i128(ty, lo), wide::from_i128(ty, hi))
    }
}

/// Shared divide folding; the divisor interval is split around zero and
/// each nonzero part folded as a corner product of quotients.
pub struct OperatorDiv {
    pub rounding: DivRounding,
}

impl OperatorDiv {
    fn fold_nonzero_divisor(
        &self,
        ty: IntType,
        lh_lb: u128,
        lh_ub: u128,
        rh_lb: i128,
        rh_ub: i128,
    ) -> Range {
        wi_cross_product(
            ty,
            |a, b| wide::div(ty, self.rounding, a, b),
            lh_lb,
            lh_ub,
            wide::from_i128(ty, rh_lb),
            wide::from_i128(ty, rh_ub),
        )
    }
}

impl RangeOperator for OperatorDiv {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let dlo = wide::to_i128(ty, rh_lb);
        let dhi = wide::to_i128(ty, rh_ub);
        if dlo == 0 && dhi == 0 {
            // division by zero yields no information
            return Range::varying(ty);
        }
        let mut r = Range::undefined(ty);
        if dlo < 0 {
            r.union_with(&self.fold_nonzero_divisor(ty, lh_lb, lh_ub, dlo, dhi.min(-1)));
        }
        if dhi > 0 {
            r.union_with(&self.fold_nonzero_divisor(ty, lh_lb, lh_ub, dlo.max(1), dhi));
        }
        r
    }

    fn op1_range(&self, ty: IntType, lhs: &Range, op2: &Range) -> Option<Range> {
        // only exact division inverts cleanly
        if self.rounding != DivRounding::Exact {
            return None;
        }
        if op2.singleton().is_some() && op2.is_nonzero() {
            return Some(OperatorMult.fold_range(ty, lhs, op2));
        }
        None
    }
}

pub struct OperatorTruncMod;

impl RangeOperator for OperatorTruncMod {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, rh_lb: u128, rh_ub: u128) -> Range {
        let dlo = wide::to_i128(ty, rh_lb);
        let dhi = wide::to_i128(ty, rh_ub);
        if dlo == 0 && dhi == 0 {
            return Range::undefined(ty);
        }
        // |result| < max |divisor|
        let bound = dlo.unsigned_abs().max(dhi.unsigned_abs()) as i128 - 1;
        let bound = bound.min(wide::max_i128(ty));
        let llo = wide::to_i128(ty, lh_lb);
        let lhi = wide::to_i128(ty, lh_ub);
        let (lo, hi) = if !ty.signed || llo >= 0 {
            (0, bound.min(lhi))
        } else if lhi <= 0 {
            ((-bound).max(llo), 0)
        } else {
            ((-bound).max(llo), bound.min(lhi))
        };
        if lo > hi {
            return Range::undefined(ty);
        }
        Range::new(ty, wide::from_i128(ty, lo), wide::from_i128(ty, hi))
    }
}

pub struct OperatorAbs;

impl RangeOperator for OperatorAbs {
    fn wi_fold(&self, ty: IntType, lh_lb: u128, lh_ub: u128, _rh_lb: u128, _rh_ub: u128) -> Range {
        if !ty.signed {
            return Range::new(ty, lh_lb, lh_ub);
        }
        let lo = wide::to_i128(ty, lh_lb);
        let hi = wide::to_i128(ty, lh_ub);
        let tmin = wide::min_i128(ty);
        let mut r = if lo <= 0 && hi >= 0 {
            Range::new(ty, 0, wide::from_i128(ty, (-lo.max(tmin + 1)).max(hi)))
        } else if hi < 0 {
            let lo_abs = -hi;
            let hi_abs = -lo.max(tmin + 1);
            Range::new(ty, wide::from_i128(ty, lo_abs), wide::from_i128(ty, hi_abs))
        } else {
            Range::new(ty, wide::from_i128(ty, lo), wide::from_i128(ty, hi))
        };
        // abs of the type minimum wraps back onto itself
        if lo == tmin {
            r.union_with(&Range::singleton_value(ty, wide::min_value(ty)));
        }
        r
    }
}

/// Absolute value into the unsigned counterpart type; `ty` is unsigned.
pub struct OperatorAbsu;

impl RangeOperator for OperatorAbsu {
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if let Some(r) = empty_range_varying(ty, lh, rh) {
            return r;
        }
        let inner = lh.ty();
        let mut result = Range::undefined(ty);
        for &(lb, ub) in &lh.to_pairs() {
            let lo = wide::to_i128(inner, lb);
            let hi = wide::to_i128(inner, ub);
            let (alo, ahi) = if lo >= 0 {
                (lo as u128, hi as u128)
            } else if hi <= 0 {
                (hi.unsigned_abs(), lo.unsigned_abs())
            } else {
                (0, lo.unsigned_abs().max(hi as u128))
            };
            result.union_with(&Range::new(ty, alo, ahi));
            if result.is_varying() {
                break;
            }
        }
        result
    }
}

pub struct OperatorNegate;

impl RangeOperator for OperatorNegate {
    /// `-x` folds as `0 - x`.
    fn fold_range(&self, ty: IntType, lh: &Range, rh: &Range) -> Range {
        if let Some(r) = empty_range_varying(ty, lh, rh) {
            return r;
        }
        OperatorMinus.fold_range(ty, &Range::zero(ty), lh)
    }

    /// Negation is an involution.
    fn op1_range(&self, ty: IntType, lhs: &Range, _op2: &Range) -> Option<Range> {
        Some(self.fold_range(ty, lhs, &Range::varying(ty)))
    }
}

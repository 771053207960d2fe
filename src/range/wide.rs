//! Fixed-width integer arithmetic over bit patterns.
//!
//! Range bounds are stored as `u128` bit patterns truncated to the type
//! width; arithmetic widens to `i128`, computes exactly, and classifies
//! the result against the type's representable span. Widths up to 64 bits
//! keep the exact math free of intermediate overflow (the one exception,
//! u64 multiplication, is classified via `checked_mul`).

use std::cmp::Ordering;

use crate::hir::IntType;

/// Direction an exact result fell outside the type's span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    None,
    Pos,
    Neg,
}

/// All-ones pattern for the width.
pub fn mask(bits: u8) -> u128 {
    if bits as u32 >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

pub fn trunc(ty: IntType, v: u128) -> u128 {
    v & mask(ty.bits)
}

/// Interpret a bit pattern as a signed-or-unsigned value of the type.
pub fn to_i128(ty: IntType, v: u128) -> i128 {
    let v = trunc(ty, v);
    if ty.signed && v & (1u128 << (ty.bits - 1)) != 0 {
        (v | !mask(ty.bits)) as i128
    } else {
        v as i128
    }
}

/// Wrap an exact value back into the type's bit pattern.
pub fn from_i128(ty: IntType, v: i128) -> u128 {
    (v as u128) & mask(ty.bits)
}

pub fn min_value(ty: IntType) -> u128 {
    if ty.signed {
        1u128 << (ty.bits - 1)
    } else {
        0
    }
}

pub fn max_value(ty: IntType) -> u128 {
    if ty.signed {
        mask(ty.bits) >> 1
    } else {
        mask(ty.bits)
    }
}

pub fn min_i128(ty: IntType) -> i128 {
    to_i128(ty, min_value(ty))
}

pub fn max_i128(ty: IntType) -> i128 {
    to_i128(ty, max_value(ty))
}

/// Value comparison honoring the type's signedness.
pub fn cmp(ty: IntType, a: u128, b: u128) -> Ordering {
    to_i128(ty, a).cmp(&to_i128(ty, b))
}

fn classify(ty: IntType, exact: i128) -> (u128, Overflow) {
    if exact > max_i128(ty) {
        (from_i128(ty, exact), Overflow::Pos)
    } else if exact < min_i128(ty) {
        (from_i128(ty, exact), Overflow::Neg)
    } else {
        (from_i128(ty, exact), Overflow::None)
    }
}

pub fn add(ty: IntType, a: u128, b: u128) -> (u128, Overflow) {
    classify(ty, to_i128(ty, a) + to_i128(ty, b))
}

pub fn sub(ty: IntType, a: u128, b: u128) -> (u128, Overflow) {
    classify(ty, to_i128(ty, a) - to_i128(ty, b))
}

pub fn mul(ty: IntType, a: u128, b: u128) -> (u128, Overflow) {
    let (av, bv) = (to_i128(ty, a), to_i128(ty, b));
    match av.checked_mul(bv) {
        Some(exact) => classify(ty, exact),
        // Only reachable for u64 operands; sign of the product is known.
        None => {
            let wrapped = from_i128(ty, av.wrapping_mul(bv));
            if (av < 0) != (bv < 0) {
                (wrapped, Overflow::Neg)
            } else {
                (wrapped, Overflow::Pos)
            }
        }
    }
}

pub fn neg(ty: IntType, a: u128) -> (u128, Overflow) {
    classify(ty, -to_i128(ty, a))
}

/// Exact product without truncation, for widened multiply folding.
pub fn mul_exact(ty: IntType, a: u128, b: u128) -> Option<i128> {
    to_i128(ty, a).checked_mul(to_i128(ty, b))
}

fn round_div(a: i128, b: i128) -> i128 {
    // round half away from zero
    let q = a / b;
    let r = a % b;
    if r == 0 {
        q
    } else if 2 * r.abs() >= b.abs() {
        if (a < 0) != (b < 0) {
            q - 1
        } else {
            q + 1
        }
    } else {
        q
    }
}

fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn ceil_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && (a < 0) == (b < 0) {
        q + 1
    } else {
        q
    }
}

/// Rounding discipline for the divide operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivRounding {
    Trunc,
    Floor,
    Ceil,
    Round,
    Exact,
}

/// Quotient with the given rounding; the divisor must be nonzero.
pub fn div(ty: IntType, rounding: DivRounding, a: u128, b: u128) -> (u128, Overflow) {
    let (av, bv) = (to_i128(ty, a), to_i128(ty, b));
    let exact = match rounding {
        DivRounding::Trunc | DivRounding::Exact => av / bv,
        DivRounding::Floor => floor_div(av, bv),
        DivRounding::Ceil => ceil_div(av, bv),
        DivRounding::Round => round_div(av, bv),
    };
    classify(ty, exact)
}

/// Truncating remainder; the divisor must be nonzero.
pub fn rem_trunc(ty: IntType, a: u128, b: u128) -> u128 {
    from_i128(ty, to_i128(ty, a) % to_i128(ty, b))
}

pub fn shl(ty: IntType, a: u128, shift: u32) -> (u128, Overflow) {
    let av = to_i128(ty, a);
    let exact = if shift < 127 { av.checked_mul(1i128 << shift) } else { None };
    match exact {
        Some(exact) => classify(ty, exact),
        None => {
            let wrapped = from_i128(ty, av.wrapping_shl(shift));
            if av < 0 {
                (wrapped, Overflow::Neg)
            } else {
                (wrapped, Overflow::Pos)
            }
        }
    }
}

/// Arithmetic shift for signed types, logical for unsigned.
pub fn shr(ty: IntType, a: u128, shift: u32) -> u128 {
    if ty.signed {
        from_i128(ty, to_i128(ty, a) >> shift.min(127))
    } else {
        trunc(ty, trunc(ty, a) >> shift.min(127))
    }
}

pub fn bit_not(ty: IntType, a: u128) -> u128 {
    trunc(ty, !a)
}

/// Bits that may be set / must be set across every value in `[lb, ub]`.
///
/// Bounds share their leading bits down to the most significant bit where
/// they differ; everything below that bit is unconstrained.
pub fn zero_nonzero_bits(ty: IntType, lb: u128, ub: u128) -> (u128, u128) {
    let lb = trunc(ty, lb);
    let ub = trunc(ty, ub);
    let mut maybe = lb | ub;
    let mut must = lb & ub;
    let xor = lb ^ ub;
    if xor != 0 {
        let varying_bits = mask((128 - xor.leading_zeros()) as u8);
        maybe |= varying_bits;
        must &= !varying_bits;
    }
    (trunc(ty, maybe), trunc(ty, must))
}

//! Value-range lattice and the propagation engine built on it.
//!
//! A [`Range`] is undefined (empty), varying (the whole type span), or a
//! canonical list of disjoint closed intervals. Bounds are bit patterns of
//! the range's [`IntType`]; ordering and arithmetic go through [`wide`] so
//! signedness is honored everywhere.

pub mod cache;
pub mod fold;
pub mod ops;
pub mod ops_arith;
pub mod ops_bitwise;
pub mod ranger;
pub mod source;
pub mod table;
pub mod trace;
pub mod wide;

use std::fmt;

use serde::Serialize;

use crate::hir::IntType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
enum Kind {
    Undefined,
    Varying,
    /// Sorted, disjoint, non-adjacent closed intervals.
    Pairs(Vec<(u128, u128)>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Range {
    ty: IntType,
    kind: Kind,
}

impl Range {
    pub fn undefined(ty: IntType) -> Self {
        Range { ty, kind: Kind::Undefined }
    }

    pub fn varying(ty: IntType) -> Self {
        Range { ty, kind: Kind::Varying }
    }

    /// Single closed interval `[lo, hi]` of bit patterns; `lo` must not
    /// exceed `hi` in the type's value order.
    pub fn new(ty: IntType, lo: u128, hi: u128) -> Self {
        debug_assert!(wide::cmp(ty, lo, hi) != std::cmp::Ordering::Greater);
        Self::from_pairs(ty, vec![(wide::trunc(ty, lo), wide::trunc(ty, hi))])
    }

    pub fn singleton_value(ty: IntType, v: u128) -> Self {
        let v = wide::trunc(ty, v);
        Self::new(ty, v, v)
    }

    pub fn zero(ty: IntType) -> Self {
        Self::singleton_value(ty, 0)
    }

    /// Everything except zero.
    pub fn nonzero(ty: IntType) -> Self {
        let mut r = Self::zero(ty);
        r.invert();
        r
    }

    /// Canonicalize an arbitrary pair list: sort by value order, merge
    /// overlapping and adjacent intervals, collapse the full span to
    /// varying and the empty list to undefined.
    pub fn from_pairs(ty: IntType, pairs: Vec<(u128, u128)>) -> Self {
        let mut vals: Vec<(i128, i128)> = pairs
            .into_iter()
            .map(|(lo, hi)| (wide::to_i128(ty, lo), wide::to_i128(ty, hi)))
            .filter(|(lo, hi)| lo <= hi)
            .collect();
        if vals.is_empty() {
            return Self::undefined(ty);
        }
        vals.sort_unstable();
        let mut merged: Vec<(i128, i128)> = Vec::with_capacity(vals.len());
        for (lo, hi) in vals {
            match merged.last_mut() {
                Some((_, phi)) if lo <= phi.saturating_add(1) => *phi = (*phi).max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        if merged.len() == 1
            && merged[0].0 == wide::min_i128(ty)
            && merged[0].1 == wide::max_i128(ty)
        {
            return Self::varying(ty);
        }
        let pairs = merged
            .into_iter()
            .map(|(lo, hi)| (wide::from_i128(ty, lo), wide::from_i128(ty, hi)))
            .collect();
        Range { ty, kind: Kind::Pairs(pairs) }
    }

    pub fn ty(&self) -> IntType {
        self.ty
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, Kind::Undefined)
    }

    pub fn is_varying(&self) -> bool {
        matches!(self.kind, Kind::Varying)
    }

    /// Materialized pair list; varying reports the full span, undefined
    /// reports nothing.
    pub fn to_pairs(&self) -> Vec<(u128, u128)> {
        match &self.kind {
            Kind::Undefined => Vec::new(),
            Kind::Varying => vec![(wide::min_value(self.ty), wide::max_value(self.ty))],
            Kind::Pairs(p) => p.clone(),
        }
    }

    pub fn num_pairs(&self) -> usize {
        match &self.kind {
            Kind::Undefined => 0,
            Kind::Varying => 1,
            Kind::Pairs(p) => p.len(),
        }
    }

    /// Smallest contained value, as a bit pattern. Undefined has none.
    pub fn lower_bound(&self) -> Option<u128> {
        match &self.kind {
            Kind::Undefined => None,
            Kind::Varying => Some(wide::min_value(self.ty)),
            Kind::Pairs(p) => Some(p[0].0),
        }
    }

    pub fn upper_bound(&self) -> Option<u128> {
        match &self.kind {
            Kind::Undefined => None,
            Kind::Varying => Some(wide::max_value(self.ty)),
            Kind::Pairs(p) => Some(p[p.len() - 1].1),
        }
    }

    pub fn contains(&self, v: u128) -> bool {
        let val = wide::to_i128(self.ty, v);
        match &self.kind {
            Kind::Undefined => false,
            Kind::Varying => true,
            Kind::Pairs(p) => p.iter().any(|&(lo, hi)| {
                wide::to_i128(self.ty, lo) <= val && val <= wide::to_i128(self.ty, hi)
            }),
        }
    }

    /// The one contained value, if the range has exactly one.
    pub fn singleton(&self) -> Option<u128> {
        match &self.kind {
            Kind::Pairs(p) if p.len() == 1 && p[0].0 == p[0].1 => Some(p[0].0),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.singleton() == Some(0)
    }

    pub fn is_nonzero(&self) -> bool {
        !self.is_undefined() && !self.contains(0)
    }

    pub fn union_with(&mut self, other: &Range) {
        debug_assert_eq!(self.ty, other.ty);
        if other.is_undefined() || self.is_varying() {
            return;
        }
        if self.is_undefined() {
            *self = other.clone();
            return;
        }
        if other.is_varying() {
            *self = Range::varying(self.ty);
            return;
        }
        let mut pairs = self.to_pairs();
        pairs.extend(other.to_pairs());
        *self = Range::from_pairs(self.ty, pairs);
    }

    pub fn intersect_with(&mut self, other: &Range) {
        debug_assert_eq!(self.ty, other.ty);
        if self.is_undefined() || other.is_varying() {
            return;
        }
        if other.is_undefined() || self.is_varying() {
            *self = other.clone();
            return;
        }
        let ty = self.ty;
        let a = self.to_pairs();
        let b = other.to_pairs();
        let mut out = Vec::new();
        for &(alo, ahi) in &a {
            let (alo, ahi) = (wide::to_i128(ty, alo), wide::to_i128(ty, ahi));
            for &(blo, bhi) in &b {
                let (blo, bhi) = (wide::to_i128(ty, blo), wide::to_i128(ty, bhi));
                let lo = alo.max(blo);
                let hi = ahi.min(bhi);
                if lo <= hi {
                    out.push((wide::from_i128(ty, lo), wide::from_i128(ty, hi)));
                }
            }
        }
        *self = Range::from_pairs(ty, out);
    }

    /// Complement within the type's span; undefined and varying swap.
    pub fn invert(&mut self) {
        let ty = self.ty;
        match &self.kind {
            Kind::Undefined => *self = Range::varying(ty),
            Kind::Varying => *self = Range::undefined(ty),
            Kind::Pairs(p) => {
                let mut out = Vec::with_capacity(p.len() + 1);
                let mut next = wide::min_i128(ty);
                for &(lo, hi) in p {
                    let (lo, hi) = (wide::to_i128(ty, lo), wide::to_i128(ty, hi));
                    if lo > next {
                        out.push((wide::from_i128(ty, next), wide::from_i128(ty, lo - 1)));
                    }
                    next = hi.saturating_add(1);
                }
                if next <= wide::max_i128(ty) {
                    out.push((wide::from_i128(ty, next), wide::max_value(ty)));
                }
                *self = Range::from_pairs(ty, out);
            }
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.ty.signed { "i" } else { "u" };
        write!(f, "{}{} ", sign, self.ty.bits)?;
        match &self.kind {
            Kind::Undefined => write!(f, "UNDEFINED"),
            Kind::Varying => write!(f, "VARYING"),
            Kind::Pairs(p) => {
                for (i, &(lo, hi)) in p.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    let lo = wide::to_i128(self.ty, lo);
                    let hi = wide::to_i128(self.ty, hi);
                    if lo == hi {
                        write!(f, "[{lo}]")?;
                    } else {
                        write!(f, "[{lo}, {hi}]")?;
                    }
                }
                Ok(())
            }
        }
    }
}

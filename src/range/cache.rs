//! Global range cache with temporal staleness tracking.
//!
//! Every store bumps a monotonic stamp. A cached global is current only if
//! it is at least as new as everything it was computed from; block-entry
//! memos are valid only while no global has moved at all.

use std::collections::HashMap;

use crate::cfg::{BlockId, VarId};
use crate::range::Range;

/// Which definitions each cached range was computed from.
#[derive(Debug, Default, Clone)]
pub struct DependencyMap {
    deps: HashMap<VarId, Vec<VarId>>,
}

impl DependencyMap {
    pub fn record(&mut self, lhs: VarId, rhs: VarId) {
        let list = self.deps.entry(lhs).or_default();
        if !list.contains(&rhs) {
            list.push(rhs);
        }
    }

    pub fn deps_of(&self, var: VarId) -> &[VarId] {
        self.deps.get(&var).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn merge(&mut self, other: DependencyMap) {
        for (lhs, rhs_list) in other.deps {
            for rhs in rhs_list {
                self.record(lhs, rhs);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RangeCache {
    globals: HashMap<VarId, (Range, u64)>,
    on_entry: HashMap<(BlockId, VarId), (Range, u64)>,
    stamp: u64,
    pub deps: DependencyMap,
}

impl RangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_global(&self, var: VarId) -> Option<&Range> {
        self.globals.get(&var).map(|(r, _)| r)
    }

    pub fn set_global(&mut self, var: VarId, r: Range) {
        self.stamp += 1;
        self.globals.insert(var, (r, self.stamp));
    }

    fn stamp_of(&self, var: VarId) -> u64 {
        self.globals.get(&var).map(|(_, s)| *s).unwrap_or(0)
    }

    /// A cached global is current when none of its inputs was recomputed
    /// after it was stored.
    pub fn global_is_current(&self, var: VarId) -> bool {
        let Some(&(_, stamp)) = self.globals.get(&var) else {
            return false;
        };
        self.deps.deps_of(var).iter().all(|&d| self.stamp_of(d) <= stamp)
    }

    pub fn get_entry(&self, block: BlockId, var: VarId) -> Option<&Range> {
        self.on_entry
            .get(&(block, var))
            .filter(|(_, s)| *s == self.stamp)
            .map(|(r, _)| r)
    }

    pub fn set_entry(&mut self, block: BlockId, var: VarId, r: Range) {
        self.on_entry.insert((block, var), (r, self.stamp));
    }
}

//! Frame invariants under randomized body shapes: slot uniqueness, index
//! arithmetic, and determinism.

#[path = "../integration/common/mod.rs"]
mod common;

use std::collections::HashSet;

use common::{await_stmt, coro_fn, world};
use mezzo::lower_coroutine;
use mezzo::span::Span;
use proptest::prelude::*;

fn lowered_field_names(n_awaits: usize, alternate: bool) -> (Vec<String>, usize) {
    let mut w = world();
    let body = (0..n_awaits)
        .map(|i| {
            let ty = if alternate && i % 2 == 1 { w.bool_awaitable } else { w.suspend_always };
            await_stmt(ty, Span::new(i * 10, i * 10 + 5))
        })
        .collect();
    let f = coro_fn(&w, "f", body);
    let lowered = lower_coroutine(&mut w.session, &f).unwrap();
    let names = lowered.frame.fields.iter().map(|f| f.name.clone()).collect();
    (names, lowered.frame.suspend_count())
}

proptest! {
    #[test]
    fn suspend_count_is_awaits_plus_the_bracketing_pair(n in 1usize..5) {
        let (_, count) = lowered_field_names(n, false);
        prop_assert_eq!(count, n + 2);
    }

    #[test]
    fn frame_field_names_are_unique(n in 1usize..5, alternate in any::<bool>()) {
        let (names, _) = lowered_field_names(n, alternate);
        let distinct: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(distinct.len(), names.len());
    }

    #[test]
    fn dispatch_indices_are_even_and_strictly_increasing(n in 1usize..5) {
        let mut w = world();
        let body = (0..n)
            .map(|i| await_stmt(w.suspend_always, Span::new(i * 10, i * 10 + 5)))
            .collect();
        let f = coro_fn(&w, "f", body);
        let lowered = lower_coroutine(&mut w.session, &f).unwrap();

        let mut prev = 0;
        for i in 0..lowered.frame.suspend_count() as u32 {
            let resume = lowered.frame.resume_index(i);
            prop_assert_eq!(resume % 2, 0);
            prop_assert!(resume > prev);
            prop_assert_eq!(lowered.frame.destroy_index(i), resume | 1);
            prev = resume;
        }
    }

    #[test]
    fn lowering_is_deterministic(n in 1usize..5, alternate in any::<bool>()) {
        let a = lowered_field_names(n, alternate);
        let b = lowered_field_names(n, alternate);
        prop_assert_eq!(a, b);
    }
}

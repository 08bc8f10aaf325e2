// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-function worst-case stack: a memoized walk over the (by now
//! acyclic) call graph. Only the deepest callee matters at each call
//! site — calls are sequential, so their stacks don't sum.

use crate::function::Program;

/// `(max stack with any interrupt state, max stack while interrupts stay
/// enabled throughout, whether this function or anything it calls
/// manually re-enables interrupts)`.
pub type WorstCase = (u32, u32, bool);

/// Compute `W(f)` for every function in the program, memoized by index.
/// Requires the call graph to be acyclic (run [`crate::recursion::check_and_repair`] first).
pub fn compute_all(program: &Program) -> Vec<WorstCase> {
    let mut memo: Vec<Option<WorstCase>> = vec![None; program.functions.len()];
    for idx in 0..program.functions.len() {
        compute(program, idx, &mut memo);
    }
    memo.into_iter().map(|w| w.expect("every index visited")).collect()
}

fn compute(program: &Program, idx: usize, memo: &mut Vec<Option<WorstCase>>) -> WorstCase {
    if let Some(cached) = memo[idx] {
        return cached;
    }

    let f = &program.functions[idx];
    let mut override_seen = f.interrupt_override;
    let mut pool_any: u32 = 0;
    let mut pool_unmasked: u32 = 0;

    for (dep_name, &masked) in f.deps.iter().zip(f.deps_masked.iter()) {
        let Some(callee_idx) = program.index_of(dep_name) else {
            // Dangling callee: already diagnosed by the populator: it
            // contributes nothing we can bound.
            continue;
        };
        let (child_any, child_unmasked, child_override) = compute(program, callee_idx, memo);
        override_seen |= child_override;

        pool_any = pool_any.max(child_any);

        let unmasked_contribution = if child_override {
            // The callee unmasks itself, so a "masked" call site still
            // exposes its full depth.
            child_any
        } else if masked {
            0
        } else {
            child_unmasked
        };
        pool_unmasked = pool_unmasked.max(unmasked_contribution);
    }

    let result = (f.local_stack + pool_any, f.local_stack + pool_unmasked, override_seen);
    memo[idx] = Some(result);
    result
}

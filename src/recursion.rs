// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recursion detection and repair: a depth-first walk of the call graph
//! induced by `deps`, carrying the current path so a cycle can be
//! reported (and, if asked, repaired by dropping the back-edge).

use crate::diagnostics::Diagnostics;
use crate::function::Program;

/// `Ok(())` if the call graph is a DAG (after repair, if `repair` was set).
/// `Err(())` if a cycle was found and `repair` was false — analysis must
/// stop; cycles are fatal unless repair is enabled.
pub fn check_and_repair(program: &mut Program, repair: bool, diags: &mut Diagnostics) -> Result<(), ()> {
    for start in 0..program.functions.len() {
        if visit(program, start, repair, diags) && !repair {
            return Err(());
        }
    }
    Ok(())
}

/// Depth-first visit from `idx`, returning whether a cycle was found
/// anywhere below it. When `repair` is set, back-edges are removed from
/// `deps`/`deps_masked` in lockstep as the walk unwinds.
fn visit(program: &mut Program, idx: usize, repair: bool, diags: &mut Diagnostics) -> bool {
    let mut path = Vec::new();
    visit_with_path(program, idx, repair, diags, &mut path)
}

fn visit_with_path(program: &mut Program, idx: usize, repair: bool, diags: &mut Diagnostics, path: &mut Vec<usize>) -> bool {
    if path.contains(&idx) {
        let name = &program.functions[idx].name;
        let direct = path.last() == Some(&idx);
        let message: String = if direct {
            "function is directly recursive; stack analysis cannot bound it".to_string()
        } else {
            let cycle: Vec<&str> = path.iter().map(|&i| program.functions[i].name.as_str()).chain(std::iter::once(name.as_str())).collect();
            format!("indirect recursion found: {}", cycle.join(" -> "))
        };
        // A cycle found with repair enabled is recovered from (the
        // back-edge is dropped below) and must not fail the run; only the
        // unrepaired case is fatal.
        if repair {
            diags.warn(Some(name), message);
        } else {
            diags.error(Some(name), message);
        }
        return true;
    }

    path.push(idx);
    let deps = program.functions[idx].deps.clone();
    // Positions within `deps`, not names: two call sites can name the same
    // recursive callee, and only the ones that actually close a cycle on
    // this walk should be dropped.
    let mut to_remove: Vec<usize> = Vec::new();
    let mut found = false;

    for (pos, dep_name) in deps.iter().enumerate() {
        let Some(dep_idx) = program.index_of(dep_name) else {
            continue;
        };
        if visit_with_path(program, dep_idx, repair, diags, path) {
            found = true;
            if repair {
                to_remove.push(pos);
            } else {
                path.pop();
                return true;
            }
        }
    }

    if repair && !to_remove.is_empty() {
        let f = &mut program.functions[idx];
        let mut kept_deps = Vec::with_capacity(f.deps.len());
        let mut kept_masked = Vec::with_capacity(f.deps.len());
        for (pos, (name, masked)) in f.deps.iter().zip(f.deps_masked.iter()).enumerate() {
            if to_remove.contains(&pos) {
                continue;
            }
            kept_deps.push(name.clone());
            kept_masked.push(*masked);
        }
        f.deps = kept_deps;
        f.deps_masked = kept_masked;
    }

    path.pop();
    found && !repair
}

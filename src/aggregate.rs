// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-program aggregation: combine main, tasks, signals and nestable
//! interrupts into an overall stack bound, plus the generated header.

use indexmap::IndexMap;

use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::function::Program;
use crate::platform::Platform;
use crate::worst_case::WorstCase;

#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub interrupts: Vec<String>,
    pub signals: Vec<String>,
    pub tasks: Vec<String>,
    pub sig_max: u32,
    pub int_overhead: u32,
    pub task_max_any: u32,
    pub task_max_unmasked: u32,
    pub main_any: u32,
    pub main_indirect: u32,
    pub simple_total: u32,
    pub context_sensitive_total: u32,
    pub header: IndexMap<String, u32>,
}

/// Look up `W(name)`, defaulting to all-zero for a name the platform
/// reported but the program doesn't actually contain (already diagnosed
/// upstream).
fn worst_of(program: &Program, worst: &[WorstCase], name: &str) -> WorstCase {
    program.index_of(name).map(|idx| worst[idx]).unwrap_or((0, 0, false))
}

/// The maximum, over all orderings in which a set of interrupts may
/// preempt one another, of "every interrupt before the currently-executing
/// one contributes its interrupts-enabled depth, the currently-executing
/// one contributes its full depth, anything after contributes nothing".
/// Depths are never negative, so the optimal ordering always
/// puts every other interrupt before the chosen one — there's no reason to
/// defer a nonnegative contribution past the cut point. That collapses the
/// ostensibly-exponential permutation search to one candidate per choice of
/// "currently executing" interrupt.
fn nested_interrupt_stack(enabled_stacks: &[u32], any_stacks: &[u32]) -> u32 {
    if enabled_stacks.is_empty() {
        return 0;
    }
    let total: u32 = enabled_stacks.iter().sum();
    (0..enabled_stacks.len())
        .map(|cut| total - enabled_stacks[cut] + any_stacks[cut])
        .max()
        .unwrap_or(0)
}

pub fn aggregate(
    program: &Program,
    platform: &dyn Platform,
    worst: &[WorstCase],
    config: &RunConfig,
    diags: &mut Diagnostics,
) -> AggregateReport {
    let isrs = platform.interrupts(program, diags);
    let tasks = platform.list_tasks(program, diags);

    let mut interrupts = Vec::new();
    let mut signals = Vec::new();
    for name in &isrs {
        let (_, _, overrides) = worst_of(program, worst, name);
        if overrides {
            signals.push(name.clone());
        } else {
            interrupts.push(name.clone());
        }
    }

    let sig_max = signals.iter().map(|n| worst_of(program, worst, n).0).max().unwrap_or(0);
    let enabled_stacks: Vec<u32> = interrupts.iter().map(|n| worst_of(program, worst, n).1).collect();
    let any_stacks: Vec<u32> = interrupts.iter().map(|n| worst_of(program, worst, n).0).collect();
    let int_overhead = nested_interrupt_stack(&enabled_stacks, &any_stacks)
        + sig_max
        + platform.interrupt_cost() * interrupts.len() as u32;

    let task_max_any = tasks.iter().map(|n| worst_of(program, worst, n).0).max().unwrap_or(0);
    let task_max_unmasked = tasks.iter().map(|n| worst_of(program, worst, n).1).max().unwrap_or(0);

    let main_name = platform.main_name();
    let (main_any, _, _) = worst_of(program, worst, main_name);
    let main_indirect = program.get(main_name).map(|f| f.indirect_call_stack_at_point).unwrap_or(0);

    let mut context_sensitive_total = main_indirect + task_max_any.max(task_max_unmasked + int_overhead);
    if main_any > context_sensitive_total {
        context_sensitive_total = main_any + int_overhead;
    }

    let simple_total = isrs.iter().map(|n| worst_of(program, worst, n).0).sum::<u32>()
        + task_max_any
        + main_any
        + platform.interrupt_cost() * isrs.len() as u32;

    let threading_overhead = 2 * platform.call_cost();
    let header = generate_header(&tasks, program, worst, int_overhead, threading_overhead, config);

    AggregateReport {
        interrupts,
        signals,
        tasks,
        sig_max,
        int_overhead,
        task_max_any,
        task_max_unmasked,
        main_any,
        main_indirect,
        simple_total,
        context_sensitive_total,
        header,
    }
}

/// Short task title: strip any prefix up through the last `$`.
fn short_title(name: &str) -> &str {
    match name.rfind('$') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn generate_header(
    tasks: &[String],
    program: &Program,
    worst: &[WorstCase],
    int_overhead: u32,
    threading_overhead: u32,
    config: &RunConfig,
) -> IndexMap<String, u32> {
    let mut header = IndexMap::new();
    for task in tasks {
        let title = short_title(task);
        if config.header_exceptions.iter().any(|e| e == title) || title.contains('.') {
            continue;
        }
        let (m_any, m_unmasked, _) = worst_of(program, worst, task);
        let size = m_any.max(m_unmasked + int_overhead) + threading_overhead;
        header
            .entry(title.to_string())
            .and_modify(|existing: &mut u32| *existing = (*existing).max(size))
            .or_insert(size);
    }
    header
}

/// Render the header map as `#define <TITLE>_STACKSIZE <N>` lines.
pub fn render_header(header: &IndexMap<String, u32>) -> String {
    let mut out = String::new();
    for (title, size) in header {
        out.push_str(&format!("#define  {title}_STACKSIZE  {size}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_interrupt_stack_picks_best_cut_point() {
        // Two interrupts: one deep while enabled (5) but shallow at full
        // depth (6), another shallow while enabled (1) but very deep at
        // full depth (20). Best is to run the first one first (contributing
        // its enabled depth) then let the second preempt at full depth.
        let enabled = vec![5, 1];
        let any = vec![6, 20];
        assert_eq!(nested_interrupt_stack(&enabled, &any), 5 + 20);
    }

    #[test]
    fn no_interrupts_means_no_overhead() {
        assert_eq!(nested_interrupt_stack(&[], &[]), 0);
    }

    #[test]
    fn short_title_strips_dollar_prefix() {
        assert_eq!(short_title("Module$handler"), "handler");
        assert_eq!(short_title("handler"), "handler");
    }

    #[test]
    fn avr_rogue_isr_with_bare_sei_is_a_signal_not_an_interrupt() {
        use crate::config::RunConfig;
        use crate::diagnostics::Diagnostics;
        use crate::function::group_functions;
        use crate::platform::avr::Avr;
        use crate::populate::{compute_dep_counts, populate};
        use crate::recursion::check_and_repair;
        use crate::worst_case::compute_all;

        let text = "\
00000000 <__vectors>:
       0:\t0c 94 10 00 \tjmp\t0x10

00000010 <rogue_isr>:
      10:\t78 94 \tsei
      12:\t08 95 \treti

00000014 <main>:
      14:\t08 95 \tret
";
        let mut diags = Diagnostics::new();
        let mut program = group_functions(text.lines(), &mut diags);
        let mut platform = Avr::new();
        let config = RunConfig::default();
        populate(&mut program, &mut platform, &config, &mut diags);
        compute_dep_counts(&mut program);
        check_and_repair(&mut program, false, &mut diags).unwrap();
        let worst = compute_all(&program);

        let report = aggregate(&program, &platform, &worst, &config, &mut diags);
        assert_eq!(report.signals, vec!["rogue_isr".to_string()]);
        assert!(report.interrupts.is_empty());
        let rogue_any = worst_of(&program, &worst, "rogue_isr").0;
        assert_eq!(report.sig_max, rogue_any);
    }

    #[test]
    fn header_collision_takes_the_max() {
        let mut program = Program::default();
        // Two distinct functions that map to the same short title.
        let mut f1 = crate::function::Function::default();
        f1.name = "Module$handler".to_string();
        f1.local_stack = 10;
        let mut f2 = crate::function::Function::default();
        f2.name = "handler".to_string();
        f2.local_stack = 20;
        let mut f3 = crate::function::Function::default();
        f3.name = "foo.bar".to_string();
        f3.local_stack = 5;
        let mut f4 = crate::function::Function::default();
        f4.name = "thread_task".to_string();
        f4.local_stack = 5;
        program.functions = vec![f1, f2, f3, f4];
        crate::function::reindex_for_tests(&mut program);

        let worst: Vec<WorstCase> = program.functions.iter().map(|f| (f.local_stack, f.local_stack, false)).collect();
        let config = RunConfig::default();
        let tasks = vec!["Module$handler".to_string(), "handler".to_string(), "foo.bar".to_string(), "thread_task".to_string()];
        let header = generate_header(&tasks, &program, &worst, 0, 0, &config);

        assert_eq!(header.get("handler"), Some(&20));
        assert!(!header.contains_key("foo.bar"));
        assert!(!header.contains_key("thread_task"));
        assert_eq!(header.len(), 1);
    }
}

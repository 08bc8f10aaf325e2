// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dependency populator: one pass per function that derives its local
//! stack contribution and its call/interrupt-masking dependencies.

use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::function::Program;
use crate::platform::{MaskEvent, Platform};

/// Populate every function's `local_stack`, `local_stack_with_interrupts`,
/// `deps`, `deps_masked`, `has_indirect_call`, `indirect_call_stack_at_point`
/// and `interrupt_override` fields, in place.
pub fn populate(program: &mut Program, platform: &mut dyn Platform, config: &RunConfig, diags: &mut Diagnostics) {
    for idx in 0..program.functions.len() {
        populate_one(program, idx, platform, config, diags);
    }
}

fn populate_one(program: &mut Program, idx: usize, platform: &mut dyn Platform, config: &RunConfig, diags: &mut Diagnostics) {
    platform.new_function();

    let name = program.functions[idx].name.clone();
    let instructions = program.functions[idx].instructions.clone();

    let mut stack: i64 = 0;
    let mut stack_max: i64 = 0;
    let mut stack_max_unmasked: i64 = 0;
    let mut mask_depth: i32 = 0;
    let mut call_pending = false;
    let mut has_indirect = false;
    let mut indirect_stack_at_point: i64 = 0;
    let mut override_flag = false;
    let mut deps: Vec<String> = Vec::new();
    let mut deps_masked: Vec<bool> = Vec::new();

    let push_cost = platform.push_cost() as i64;
    let call_cost = platform.call_cost() as i64;

    for inst in &instructions {
        let opcode = inst.opcode.as_str();

        if opcode == platform.push_opcode() {
            stack += push_cost;
        } else if opcode == platform.pop_opcode() {
            stack -= push_cost;
        } else if opcode == platform.call_opcode() || opcode == platform.icall_opcode() {
            stack += call_cost;
            call_pending = true;
            let is_indirect = opcode == platform.icall_opcode();
            if is_indirect {
                has_indirect = true;
                indirect_stack_at_point = stack;
            } else {
                let operand = inst.operand(0).unwrap_or_default().to_string();
                match platform.resolve_call(program, &operand) {
                    Some(callee) => {
                        let callee_name = callee.name.clone();
                        if callee_name == config.critical_start {
                            mask_depth += 1;
                        }
                        if callee_name == config.critical_stop {
                            mask_depth -= 1;
                        }
                        deps_masked.push(mask_depth > 0);
                        deps.push(callee_name);
                    }
                    None => {
                        diags.warn(Some(&name), format!("call target {operand:?} does not resolve to a known function"));
                        deps_masked.push(mask_depth > 0);
                        deps.push(operand);
                    }
                }
            }
        } else if opcode == platform.dint_opcode() {
            if mask_depth == 0 {
                mask_depth = 1;
                if name != config.critical_start {
                    diags.warn(Some(&name), "interrupts disabled directly outside the critical-section-begin function");
                }
            }
        } else if opcode == platform.eint_opcode() {
            mask_depth = 0;
            if name != config.critical_stop {
                override_flag = true;
                diags.warn(Some(&name), "interrupts enabled directly outside the critical-section-end function");
            }
        } else {
            let (delta, event) = platform.process_instruction(inst);
            stack += delta as i64;
            match event {
                MaskEvent::None => {}
                MaskEvent::CriticalStart => mask_depth += 1,
                MaskEvent::CriticalStop => mask_depth -= 1,
                MaskEvent::Insane => {
                    diags.warn(Some(&name), "masking instruction found outside any recognized critical-section idiom");
                }
            }
            for message in platform.drain_diagnostics() {
                diags.warn(Some(&name), message);
            }
        }

        if stack > stack_max {
            stack_max = stack;
        }
        if mask_depth == 0 && stack > stack_max_unmasked {
            stack_max_unmasked = stack;
        }
        if call_pending {
            stack -= call_cost;
            call_pending = false;
        }
    }

    let f = &mut program.functions[idx];
    f.local_stack = stack_max.max(0) as u32;
    f.local_stack_with_interrupts = stack_max_unmasked.max(0) as u32;
    f.deps = deps;
    f.deps_masked = deps_masked;
    f.has_indirect_call = has_indirect;
    f.indirect_call_stack_at_point = indirect_stack_at_point.max(0) as u32;
    f.interrupt_override = override_flag;
}

/// For each function, count the number of distinct call sites that name it
/// in their `deps` (the "uncalled functions" a task-list is built from).
pub fn compute_dep_counts(program: &mut Program) {
    let mut counts = vec![0u32; program.functions.len()];
    for f in &program.functions {
        for dep in &f.deps {
            if let Some(idx) = program.index_of(dep) {
                counts[idx] += 1;
            }
        }
    }
    for (f, count) in program.functions.iter_mut().zip(counts) {
        f.dep_count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::group_functions;
    use crate::platform::msp430::Msp430;

    fn parse(text: &str) -> (Program, Diagnostics) {
        let mut diags = Diagnostics::new();
        let program = group_functions(text.lines(), &mut diags);
        (program, diags)
    }

    #[test]
    fn leaf_function_local_stack_accounts_for_pushes_and_sp_adjust() {
        let text = "\
00000000 <foo>:
       0:\tc2 43 \tpush\tr4
       2:\tc2 43 \tpush\tr5
       4:\t30 41 \tsub\t#4, r1
       6:\tc2 43 \tpop\tr5
       8:\tc2 43 \tpop\tr4
       a:\t30 41 \tret
";
        let (mut program, mut diags) = parse(text);
        let mut platform = Msp430::new();
        let config = RunConfig::default();
        populate(&mut program, &mut platform, &config, &mut diags);

        let foo = program.get("foo").unwrap();
        assert_eq!(foo.local_stack, 8);
        assert_eq!(foo.local_stack_with_interrupts, 8);
        assert!(foo.deps.is_empty());
    }

    #[test]
    fn critical_section_marks_deps_masked() {
        let text = "\
00000000 <__nesc_atomic_start>:
       0:\t30 41 \tret

00000002 <baz>:
       2:\t30 41 \tret

00000004 <__nesc_atomic_end>:
       4:\t30 41 \tret

00000006 <bar>:
       6:\tb0 12 00 00 \tcall\t#0
       a:\tb0 12 02 00 \tcall\t#2
       e:\tb0 12 04 00 \tcall\t#4
      12:\t30 41 \tret
";
        let (mut program, mut diags) = parse(text);
        let mut platform = Msp430::new();
        let config = RunConfig::default();
        populate(&mut program, &mut platform, &config, &mut diags);

        let bar = program.get("bar").unwrap();
        assert_eq!(bar.deps, vec!["__nesc_atomic_start", "baz", "__nesc_atomic_end"]);
        assert_eq!(bar.deps_masked, vec![true, true, true]);
    }

    #[test]
    fn dangling_callee_is_recorded_and_diagnosed() {
        let text = "\
00000000 <bar>:
       0:\tb0 12 64 00 \tcall\t#100
       4:\t30 41 \tret
";
        let (mut program, mut diags) = parse(text);
        let mut platform = Msp430::new();
        let config = RunConfig::default();
        populate(&mut program, &mut platform, &config, &mut diags);

        let bar = program.get("bar").unwrap();
        assert_eq!(bar.deps, vec!["#100"]);
        assert!(!diags.is_empty());
    }

    #[test]
    fn avr_bare_sei_sets_interrupt_override() {
        use crate::platform::avr::Avr;

        let text = "\
00000010 <rogue_isr>:
      10:\t78 94 \tsei
      12:\t08 95 \treti
";
        let (mut program, mut diags) = parse(text);
        let mut platform = Avr::new();
        let config = RunConfig::default();
        populate(&mut program, &mut platform, &config, &mut diags);

        let isr = program.get("rogue_isr").unwrap();
        assert!(isr.interrupt_override);
        assert!(!diags.is_empty());
    }

    #[test]
    fn avr_inline_critical_section_marks_call_as_masked() {
        use crate::platform::avr::Avr;

        let text = "\
00000000 <worker>:
       0:\t08 95 \tret

00000002 <atomic_region>:
       2:\t80 91 3f 00 \tin\tr24, 0x3f
       6:\t78 94 \tcli
       8:\t0e 94 00 00 \tcall\t0
       c:\t80 93 3f 00 \tout\t0x3f, r24
      10:\t08 95 \tret
";
        let (mut program, mut diags) = parse(text);
        let mut platform = Avr::new();
        let config = RunConfig::default();
        populate(&mut program, &mut platform, &config, &mut diags);

        let region = program.get("atomic_region").unwrap();
        assert_eq!(region.deps, vec!["worker"]);
        assert_eq!(region.deps_masked, vec![true]);
        assert!(!region.interrupt_override);
    }

    #[test]
    fn dep_count_reflects_incoming_calls() {
        let text = "\
00000000 <helper>:
       0:\t30 41 \tret

00000002 <main>:
       2:\tb0 12 00 00 \tcall\t#0
       6:\t30 41 \tret
";
        let (mut program, mut diags) = parse(text);
        let mut platform = Msp430::new();
        let config = RunConfig::default();
        populate(&mut program, &mut platform, &config, &mut diags);
        compute_dep_counts(&mut program);

        assert_eq!(program.get("helper").unwrap().dep_count, 1);
        assert_eq!(program.get("main").unwrap().dep_count, 0);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform abstraction: a capability set, not an inheritance hierarchy.
//! The dependency populator is parameterized over this trait.

pub mod avr;
pub mod msp430;

use crate::diagnostics::Diagnostics;
use crate::function::{Function, Program};
use crate::instruction::Instruction;

/// What happened while interpreting an instruction the populator doesn't
/// already special-case (push/pop/call/icall/eint/dint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskEvent {
    None,
    CriticalStart,
    CriticalStop,
    /// A masking operation that broke the expected save/restore pairing.
    Insane,
}

pub trait Platform {
    fn push_cost(&self) -> u32;
    fn call_cost(&self) -> u32;
    fn interrupt_cost(&self) -> u32;

    fn push_opcode(&self) -> &str;
    fn pop_opcode(&self) -> &str;
    fn call_opcode(&self) -> &str;
    /// Indirect-call opcode, or an opcode no real disassembly will ever
    /// emit if the architecture has none.
    fn icall_opcode(&self) -> &str;
    fn eint_opcode(&self) -> &str;
    /// Disable-interrupts opcode, or an impossible sentinel when masking
    /// is routed through `process_instruction` instead (AVR).
    fn dint_opcode(&self) -> &str;

    /// Reset per-function interpreter state. Called once per function,
    /// before its first instruction is interpreted, so register tags
    /// never leak across a function boundary.
    fn new_function(&mut self);

    /// Interpret an opcode not already handled by the populator
    /// (push/pop/call/icall/eint/dint). Returns the stack delta and any
    /// masking event implied by the instruction.
    fn process_instruction(&mut self, inst: &Instruction) -> (i32, MaskEvent);

    /// Resolve a call operand to its target function, if any.
    fn resolve_call<'p>(&self, program: &'p Program, operand: &str) -> Option<&'p Function>;

    /// Drain any diagnostics the interpreter accumulated while processing
    /// the current function (e.g. AVR's "stack pointer set from an
    /// untracked register"). Most platforms never produce any.
    fn drain_diagnostics(&mut self) -> Vec<String> {
        Vec::new()
    }

    fn main_name(&self) -> &str {
        "main"
    }

    /// Enumerate ISR entry points from the architecture's interrupt-vector
    /// table.
    fn interrupts(&self, program: &Program, diags: &mut Diagnostics) -> Vec<String>;

    /// Uncalled functions, excluding ISRs, main, the vector table, and
    /// well-known runtime entries.
    fn list_tasks(&self, program: &Program, diags: &mut Diagnostics) -> Vec<String> {
        let excluded_runtime = ["InterruptVectors", "__vectors", "_unexpected_", "__stop_progExec__"];
        let interrupts = self.interrupts(program, diags);
        let main = self.main_name().to_string();

        let mut seen = std::collections::HashSet::new();
        let mut tasks = Vec::new();
        for f in &program.functions {
            if f.dep_count != 0 {
                continue;
            }
            if f.name == main {
                continue;
            }
            if excluded_runtime.contains(&f.name.as_str()) {
                continue;
            }
            if interrupts.contains(&f.name) {
                continue;
            }
            if seen.insert(f.name.clone()) {
                tasks.push(f.name.clone());
            }
        }
        tasks
    }
}

/// Parse a decimal (optionally signed) immediate of the form `#123` or
/// `#-4`, used by both the MSP430 stack-pointer idioms and call resolution.
pub(crate) fn parse_hash_decimal(operand: &str) -> Option<i64> {
    let digits = operand.trim().strip_prefix('#')?;
    digits.parse::<i64>().ok()
}

/// Wrap a possibly-negative address into the 16-bit address space used by
/// both 8/16-bit targets.
pub(crate) fn wrap_address(address: i64) -> u32 {
    (address.rem_euclid(0x10000)) as u32
}

/// Parse an AVR-style register operand, `r<N>`.
pub(crate) fn parse_register(operand: &str) -> Option<u32> {
    operand.trim().strip_prefix('r')?.parse::<u32>().ok()
}

/// Parse a bare (optionally signed) hexadecimal address, as used by AVR
/// call operands and vector-table entries.
pub(crate) fn parse_hex_address(operand: &str) -> Option<i64> {
    let trimmed = operand.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let digits = digits.trim_start_matches("0x");
    let value = i64::from_str_radix(digits, 16).ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hash_decimal_immediates() {
        assert_eq!(parse_hash_decimal("#4"), Some(4));
        assert_eq!(parse_hash_decimal("#-4"), Some(-4));
        assert_eq!(parse_hash_decimal("r1"), None);
    }

    #[test]
    fn wraps_negative_addresses_into_16_bit_space() {
        assert_eq!(wrap_address(-4), 0xfffc);
        assert_eq!(wrap_address(4), 4);
        assert_eq!(wrap_address(0x10004), 4);
    }

    #[test]
    fn parses_register_operands() {
        assert_eq!(parse_register("r24"), Some(24));
        assert_eq!(parse_register("r0"), Some(0));
        assert_eq!(parse_register("#4"), None);
    }

    #[test]
    fn parses_hex_addresses_with_optional_sign() {
        assert_eq!(parse_hex_address("227"), Some(0x227));
        assert_eq!(parse_hex_address("-4"), Some(-4));
        assert_eq!(parse_hex_address("0x1a"), Some(0x1a));
    }
}

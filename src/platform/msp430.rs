// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MSP430 platform.

use crate::diagnostics::Diagnostics;
use crate::function::{Function, Program};
use crate::instruction::Instruction;

use super::{parse_hash_decimal, wrap_address, MaskEvent, Platform};

pub const BOARDS: &[&str] = &["telos", "telosa", "telosb", "tmote", "eyesIFX", "eyesIFXv1", "eyesIFXv2"];

#[derive(Debug, Default)]
pub struct Msp430;

impl Msp430 {
    pub fn new() -> Self {
        Msp430
    }
}

impl Platform for Msp430 {
    fn push_cost(&self) -> u32 {
        2
    }
    fn call_cost(&self) -> u32 {
        2
    }
    fn interrupt_cost(&self) -> u32 {
        4
    }

    fn push_opcode(&self) -> &str {
        "push"
    }
    fn pop_opcode(&self) -> &str {
        "pop"
    }
    fn call_opcode(&self) -> &str {
        "call"
    }
    fn icall_opcode(&self) -> &str {
        // MSP430 has no indirect-call opcode in this model.
        "aflyingaardvark"
    }
    fn eint_opcode(&self) -> &str {
        "eint"
    }
    fn dint_opcode(&self) -> &str {
        "dint"
    }

    fn new_function(&mut self) {}

    fn process_instruction(&mut self, inst: &Instruction) -> (i32, MaskEvent) {
        let delta = match inst.opcode.as_str() {
            "sub" if inst.operand(1) == Some("r1") => {
                inst.operand(0).and_then(parse_hash_decimal).unwrap_or(0) as i32
            }
            "add" if inst.operand(1) == Some("r1") => {
                -(inst.operand(0).and_then(parse_hash_decimal).unwrap_or(0) as i32)
            }
            "decd" if inst.operand(0) == Some("r1") => 2,
            "incd" if inst.operand(0) == Some("r1") => -2,
            "dec" if inst.operand(0) == Some("r1") => 1,
            "inc" if inst.operand(0) == Some("r1") => -1,
            _ => 0,
        };
        (delta, MaskEvent::None)
    }

    fn resolve_call<'p>(&self, program: &'p Program, operand: &str) -> Option<&'p Function> {
        let value = parse_hash_decimal(operand)?;
        program.function_at(wrap_address(value))
    }

    fn interrupts(&self, program: &Program, diags: &mut Diagnostics) -> Vec<String> {
        let Some(vectors) = program.get("InterruptVectors") else {
            diags.warn(None, "no InterruptVectors function found");
            return Vec::new();
        };
        if vectors.instructions.len() < 2 {
            diags.warn(
                Some("InterruptVectors"),
                "vector table shorter than the two instructions this decoder expects; output may be truncated",
            );
            return Vec::new();
        }

        let mut bytes: Vec<u32> = Vec::new();
        for inst in &vectors.instructions[..2] {
            let column: &str = &inst.disassembly;
            let truncated = &column[..column.len().min(48)];
            for token in truncated.split_whitespace() {
                match u32::from_str_radix(token, 16) {
                    Ok(b) => bytes.push(b),
                    Err(_) => diags.warn(Some("InterruptVectors"), format!("non-hex byte token {token:?}")),
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut names = Vec::new();
        for i in 1..bytes.len() {
            if i & 1 == 1 {
                let address = bytes[i] * 256 + bytes[i - 1];
                if let Some(f) = program.function_at(address) {
                    if seen.insert(f.name.clone()) {
                        names.push(f.name.clone());
                    }
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::instruction::Instruction;

    fn inst(opcode: &str, operands: &[&str]) -> Instruction {
        Instruction {
            address: 0,
            size_bytes: 2,
            opcode: opcode.to_string(),
            operands: operands.iter().map(|s| s.to_string()).collect(),
            disassembly: String::new(),
            comment: String::new(),
        }
    }

    #[test]
    fn sub_r1_grows_stack() {
        let mut p = Msp430::new();
        let (delta, event) = p.process_instruction(&inst("sub", &["#4", "r1"]));
        assert_eq!(delta, 4);
        assert_eq!(event, MaskEvent::None);
    }

    #[test]
    fn add_r1_shrinks_stack() {
        let mut p = Msp430::new();
        let (delta, _) = p.process_instruction(&inst("add", &["#4", "r1"]));
        assert_eq!(delta, -4);
    }

    #[test]
    fn decd_incd_dec_inc_r1() {
        let mut p = Msp430::new();
        assert_eq!(p.process_instruction(&inst("decd", &["r1"])).0, 2);
        assert_eq!(p.process_instruction(&inst("incd", &["r1"])).0, -2);
        assert_eq!(p.process_instruction(&inst("dec", &["r1"])).0, 1);
        assert_eq!(p.process_instruction(&inst("inc", &["r1"])).0, -1);
    }

    #[test]
    fn unrelated_opcode_is_a_no_op() {
        let mut p = Msp430::new();
        assert_eq!(p.process_instruction(&inst("mov", &["r4", "r5"])).0, 0);
    }

    #[test]
    fn missing_vector_table_is_a_warning_not_a_panic() {
        let program = Program::default();
        let mut diags = Diagnostics::new();
        let p = Msp430::new();
        assert!(p.interrupts(&program, &mut diags).is_empty());
        assert!(!diags.is_empty());
    }
}

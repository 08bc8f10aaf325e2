// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Function grouping and the whole-program arena.

use indexmap::IndexMap;

use crate::diagnostics::Diagnostics;
use crate::instruction::{classify_line, Instruction, Line};

/// One disassembled function: an address range and its instruction stream,
/// plus every field later pipeline stages fill in.
#[derive(Debug, Clone, Default)]
pub struct Function {
    pub name: String,
    pub address_range: (u32, u32),
    pub instructions: Vec<Instruction>,

    // Filled by the dependency populator.
    pub local_stack: u32,
    pub local_stack_with_interrupts: u32,
    pub deps: Vec<String>,
    pub deps_masked: Vec<bool>,
    pub has_indirect_call: bool,
    pub indirect_call_stack_at_point: u32,
    pub interrupt_override: bool,

    // Filled by the dependency-count pass and the aggregator.
    pub dep_count: u32,
    pub worst_case_stack: u32,
}

impl Function {
    fn new(name: String, low: u32) -> Self {
        Function {
            name,
            address_range: (low, low),
            ..Default::default()
        }
    }

    fn close(&mut self) {
        let span: u32 = self.instructions.iter().map(|i| i.size_bytes).sum();
        self.address_range.1 = self.address_range.0 + span;
    }
}

/// An ordered collection of [`Function`]s plus a name -> index lookup.
/// Function names are unique and address ranges never overlap.
#[derive(Debug, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    index: IndexMap<String, usize>,
}

impl Program {
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.index.get(name).copied().map(move |i| &mut self.functions[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Resolve an address to the function whose range contains it. Linear
    /// scan: programs here are small enough (a handful of thousand
    /// functions at most) that this is not a bottleneck, and it keeps the
    /// arena a plain `Vec`.
    pub fn function_at(&self, address: u32) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.address_range.0 <= address && address <= f.address_range.1)
    }

    fn push(&mut self, f: Function) {
        let idx = self.functions.len();
        self.index.insert(f.name.clone(), idx);
        self.functions.push(f);
    }
}

/// Segment a disassembly line stream into functions.
pub fn group_functions<'a>(
    lines: impl Iterator<Item = &'a str>,
    diags: &mut Diagnostics,
) -> Program {
    let mut program = Program::default();
    let mut current: Option<Function> = None;

    for line in lines {
        match classify_line(line) {
            Line::Header(header) => {
                if let Some(mut f) = current.take() {
                    f.close();
                    program.push(f);
                }
                current = Some(Function::new(header.name, header.address));
            }
            Line::Instruction(inst) => match current.as_mut() {
                Some(f) => f.instructions.push(inst),
                None => diags.warn(None, format!("instruction {:#x} outside any function", inst.address)),
            },
            Line::Ellipsis => {}
            Line::Blank => {
                if let Some(mut f) = current.take() {
                    f.close();
                    program.push(f);
                }
            }
            Line::Unknown(text) => {
                if !text.trim().is_empty() {
                    diags.warn(None, format!("unrecognized line: {text}"));
                }
            }
        }
    }

    if let Some(mut f) = current.take() {
        f.close();
        program.push(f);
    }

    program
}

/// Rebuild `Program::index` from `Program::functions` after a test hand-
/// builds the function list directly (bypassing the grouper, which keeps
/// the two in sync as it goes).
#[cfg(test)]
pub(crate) fn reindex_for_tests(program: &mut Program) {
    program.index.clear();
    for (idx, f) in program.functions.iter().enumerate() {
        program.index.insert(f.name.clone(), idx);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line classifier and instruction parser.
//!
//! Disassembly text is a stream of lines of four kinds: an instruction, a
//! function header, an ellipsis zero-fill marker, or everything else (blank
//! lines terminate the current function; anything unrecognized is a parse
//! warning).

/// A single disassembled instruction. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u32,
    pub size_bytes: u32,
    pub opcode: String,
    pub operands: Vec<String>,
    pub disassembly: String,
    pub comment: String,
}

impl Instruction {
    /// The first operand, if any, with surrounding whitespace trimmed.
    pub fn operand(&self, idx: usize) -> Option<&str> {
        self.operands.get(idx).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHeader {
    pub address: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Instruction(Instruction),
    Header(FunctionHeader),
    /// A `...` zero-fill marker; carries no data and is skipped.
    Ellipsis,
    /// Blank line; terminates the function currently being grouped.
    Blank,
    /// Anything else. The raw text is kept so the caller can log it.
    Unknown(String),
}

/// Classify and, for instructions, fully parse a single disassembly line.
pub fn classify_line(line: &str) -> Line {
    if line.trim().is_empty() {
        return Line::Blank;
    }

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 2 {
        if let Some(address) = parse_instruction_label(fields[0]) {
            return Line::Instruction(parse_instruction_fields(address, &fields));
        }
    }

    if line.contains("...") {
        return Line::Ellipsis;
    }

    if let Some(header) = parse_function_header(line) {
        return Line::Header(header);
    }

    Line::Unknown(line.to_string())
}

/// `"<hex>:"` -> the address, or `None` if the label isn't a bare hex
/// address followed by a colon (a malformed hex address rejects the line
/// as an instruction).
fn parse_instruction_label(field: &str) -> Option<u32> {
    let label = field.trim();
    let hex = label.strip_suffix(':')?;
    if hex.is_empty() {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn parse_instruction_fields(address: u32, fields: &[&str]) -> Instruction {
    let bytes_column = fields[1].trim();
    let size_bytes = (bytes_column.split_whitespace().count() / 2) as u32;

    let opcode = fields.get(2).map(|s| s.trim().to_string()).unwrap_or_default();
    let operands = fields
        .get(3)
        .map(|s| {
            s.trim()
                .split(',')
                .map(|op| op.trim().to_string())
                .filter(|op| !op.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let comment = fields.get(4).map(|s| s.trim().to_string()).unwrap_or_default();

    Instruction {
        address,
        size_bytes,
        opcode,
        operands,
        disassembly: bytes_column.to_string(),
        comment,
    }
}

/// `"<hex> <name>:"` — a function header line, e.g. `"00000000 <main>:"`.
fn parse_function_header(line: &str) -> Option<FunctionHeader> {
    let parts: Vec<&str> = line.trim().splitn(2, ' ').collect();
    if parts.len() != 2 {
        return None;
    }
    let address = u32::from_str_radix(parts[0].trim(), 16).ok()?;
    let label = parts[1].trim();
    let name = label.strip_prefix('<')?.strip_suffix(">:")?;
    if name.is_empty() {
        return None;
    }
    Some(FunctionHeader { address, name: name.to_string() })
}

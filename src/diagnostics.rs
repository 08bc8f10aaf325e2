// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Non-fatal analysis findings, collected rather than thrown.
//!
//! The analyzer never panics or returns `Result` for data problems (a
//! malformed line, a dangling callee, a bare `cli`): those are recoverable
//! data, pushed onto a [`Diagnostics`] sink that the driver renders however
//! it likes (colored terminal output, a count, a test assertion).

use std::fmt;

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub function: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning".yellow(),
            Severity::Error => "error".red(),
        };
        match &self.function {
            Some(name) => write!(f, "{tag}: {name}: {}", self.message),
            None => write!(f, "{tag}: {}", self.message),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, function: Option<&str>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            function: function.map(str::to_owned),
            message: message.into(),
        });
    }

    pub fn error(&mut self, function: Option<&str>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            function: function.map(str::to_owned),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }
}

//! Diagnostics that stopped a compile.

use std::fmt;

use crate::error::{Diagnostic, ErrorCode, Severity};

/// One or more diagnostics, in the order they were found, at least one of
/// them an error.
#[derive(Debug, Clone)]
pub struct ParseError {
    diagnostics: Vec<Diagnostic>,
}

impl ParseError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Turn warnings the caller refuses to accept into errors.
    pub fn denied(warnings: Vec<Diagnostic>) -> Self {
        Self::new(
            warnings
                .into_iter()
                .map(|diag| diag.with_severity(Severity::Error))
                .collect(),
        )
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Codes of the coded diagnostics, in order.
    pub fn codes(&self) -> Vec<ErrorCode> {
        self.diagnostics.iter().filter_map(Diagnostic::code).collect()
    }
}

/// One diagnostic per line.
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diag) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{diag}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl From<Diagnostic> for ParseError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::new(vec![diagnostic])
    }
}

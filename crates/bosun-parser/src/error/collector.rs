//! Collector for accumulating diagnostics during a processing phase.
//!
//! The [`DiagnosticCollector`] allows phases to report multiple errors
//! and warnings instead of failing on the first error encountered.

use crate::error::{Diagnostic, ParseError};

/// A collector for accumulating diagnostics during a processing phase.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic to this collector.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity().is_error() {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Returns `true` if an error-severity diagnostic has been emitted.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Finish collection and return a result.
    ///
    /// - If there are errors, returns `Err(ParseError)` with all diagnostics.
    /// - If there are no errors, returns the warnings.
    pub fn finish(self) -> Result<Vec<Diagnostic>, ParseError> {
        if self.has_errors {
            Err(ParseError::new(self.diagnostics))
        } else {
            Ok(self.diagnostics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCode, span::Span};

    #[test]
    fn test_collector_new_finish_ok() {
        let collector = DiagnosticCollector::new();
        assert!(collector.finish().unwrap().is_empty());
    }

    #[test]
    fn test_collector_emit_error_finish_err() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(Diagnostic::error("test error"));

        assert!(collector.has_errors());
        assert!(collector.finish().is_err());
    }

    #[test]
    fn test_collector_warnings_are_returned() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(Diagnostic::warning("warning 1"));
        collector.emit(Diagnostic::warning("warning 2"));

        let warnings = collector.finish().unwrap();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_collector_finish_keeps_all_diagnostics() {
        let mut collector = DiagnosticCollector::new();

        collector.emit(
            Diagnostic::error("task has no name")
                .with_code(ErrorCode::E200)
                .with_label(Span::new(10..20), "here"),
        );
        collector.emit(Diagnostic::warning("test warning"));

        let err = collector.finish().unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert_eq!(err.diagnostics()[0].message(), "task has no name");
    }
}

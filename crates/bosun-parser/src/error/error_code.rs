//! Error codes for the Bosun diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E1xx` - Parser errors
//! - `E2xx` - Validation errors
//! - `E3xx` - Lowering defects
//! - `E4xx` - Code generation defects

use std::fmt;

/// Error codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Parser Errors (E1xx)
    // =========================================================================
    /// Unexpected input.
    ///
    /// No grammar rule could continue at the furthest position reached.
    E100,

    /// Incomplete input.
    ///
    /// The input ended before a complete construct was parsed.
    E101,

    // =========================================================================
    // Validation Errors (E2xx)
    // =========================================================================
    /// Missing task name.
    ///
    /// Simple tasks need a non-empty `[description]`; compound tasks need a
    /// `name` attribute.
    E200,

    /// Unknown task key.
    ///
    /// A task carries an attribute that is neither recognized nor a module
    /// argument block.
    E201,

    /// Undeclared module alias.
    ///
    /// The task refers to a module alias that is not in `imports` or the
    /// configured module table.
    E202,

    /// Module arguments are not an object.
    E203,

    /// Ambiguous module.
    ///
    /// More than one candidate module key remained on a task.
    E204,

    /// Missing module.
    ///
    /// A simple task names no module at all.
    E205,

    /// Invalid `when` condition.
    ///
    /// `when` must be a function call or index expression.
    E206,

    /// Invalid import path.
    ///
    /// An import does not name a valid Rust path.
    E207,

    // =========================================================================
    // Lowering Defects (E3xx)
    // =========================================================================
    /// Malformed parse tree.
    ///
    /// A parse node did not have the shape the grammar guarantees. This is
    /// an internal error.
    E300,

    // =========================================================================
    // Code Generation Defects (E4xx)
    // =========================================================================
    /// Unresolved function.
    ///
    /// A function or index expression names a function the runtime does not
    /// provide. The generator emits a sentinel identifier in its place.
    E400,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E100").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            ErrorCode::E205 => "E205",
            ErrorCode::E206 => "E206",
            ErrorCode::E207 => "E207",
            ErrorCode::E300 => "E300",
            ErrorCode::E400 => "E400",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E100 => "unexpected input",
            ErrorCode::E101 => "incomplete input",
            ErrorCode::E200 => "missing task name",
            ErrorCode::E201 => "unknown task key",
            ErrorCode::E202 => "undeclared module alias",
            ErrorCode::E203 => "module arguments must be an object",
            ErrorCode::E204 => "ambiguous module",
            ErrorCode::E205 => "missing module",
            ErrorCode::E206 => "invalid when condition",
            ErrorCode::E207 => "invalid import path",
            ErrorCode::E300 => "malformed parse tree",
            ErrorCode::E400 => "unresolved function",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E100.to_string(), "E100");
        assert_eq!(ErrorCode::E202.to_string(), "E202");
        assert_eq!(ErrorCode::E400.to_string(), "E400");
    }

    #[test]
    fn test_error_code_description() {
        assert_eq!(ErrorCode::E101.description(), "incomplete input");
        assert_eq!(ErrorCode::E204.description(), "ambiguous module");
        assert_eq!(ErrorCode::E400.description(), "unresolved function");
    }
}

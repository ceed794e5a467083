//! Error and diagnostic system for the Bosun front end.
//!
//! This module provides an error handling system with:
//! - Error codes for documentation and searchability
//! - Multiple labeled spans for rich error context
//! - Severity levels
//! - Diagnostic collector for accumulating multiple errors
//!
//! # Overview
//!
//! The error system is built around the [`Diagnostic`] type, which represents
//! a single error or warning message with optional error code, multiple source
//! locations, and help text. Multiple diagnostics are wrapped in [`ParseError`]
//! for returning from the compile lifecycle.
//!
//! # Example
//!
//! ```
//! # use bosun_parser::error::{Diagnostic, ErrorCode};
//! # use bosun_parser::Span;
//!
//! let span = Span::new(100..120);
//!
//! let diag = Diagnostic::error("module alias `s3` is not declared")
//!     .with_code(ErrorCode::E202)
//!     .with_label(span, "used here")
//!     .with_help("add it to the `imports` attribute");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod parse_error;
mod severity;

pub use collector::DiagnosticCollector;
pub use diagnostic::{Diagnostic, Label};
pub use error_code::ErrorCode;
pub use parse_error::ParseError;
pub use severity::Severity;

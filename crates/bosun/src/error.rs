//! Error types for Bosun operations.
//!
//! This module provides the main error type [`BosunError`] which wraps
//! the error conditions of every compile stage.

use std::io;

use thiserror::Error;

use bosun_parser::error::ParseError;

use crate::toolchain::BuildError;

/// The main error type for Bosun operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant carries the source text along with the diagnostics
/// of the parse, lowering, validation or code generation stage, so they can
/// be rendered with source snippets.
#[derive(Debug, Error)]
pub enum BosunError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),
}

impl BosunError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}

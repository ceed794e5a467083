//! Bosun - A compiler from infrastructure playbooks to native programs.
//!
//! Playbooks are written in a small declarative language of ordered tasks.
//! This crate validates them, generates a Rust program that drives the
//! `bosun-runtime` crate, and builds it with the native toolchain.

pub mod codegen;
pub mod config;

mod error;
mod toolchain;

pub use bosun_parser::{Resolved, Uast};
pub use codegen::Generated;
pub use error::BosunError;
pub use toolchain::{BuildError, Toolchain, with_suffix};

use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use bosun_parser::error::ParseError;

use config::AppConfig;

/// Compiler for Bosun playbooks.
///
/// Runs the stages of a compile: parse and validate, generate Rust source,
/// and build it.
///
/// # Examples
///
/// ```rust
/// use bosun::{Compiler, config::AppConfig};
///
/// let source = "name: 'hello'\ntask [greet] { debug: { msg: 'hi', } }\n";
///
/// let compiler = Compiler::new(AppConfig::default());
///
/// // Parse and validate
/// let resolved = compiler.check(source).expect("Failed to validate");
/// assert_eq!(resolved.uast.tasks.len(), 1);
///
/// // Generate the Rust program
/// let generated = compiler.generate(source).expect("Failed to generate");
/// assert!(generated.source().contains("fn main()"));
/// ```
#[derive(Default)]
pub struct Compiler {
    config: AppConfig,
}

impl Compiler {
    /// Create a new compiler with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration including modules, code generation and build settings
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Parse and validate a playbook.
    ///
    /// # Arguments
    ///
    /// * `source` - Playbook source code
    ///
    /// # Errors
    ///
    /// Returns `BosunError::Parse` for syntax or validation errors.
    pub fn check(&self, source: &str) -> Result<Resolved, BosunError> {
        info!("Parsing playbook");

        let resolved = bosun_parser::analyze(source, self.config.modules())
            .map_err(|err| BosunError::new_parse_error(err, source))?;

        debug!(modules = resolved.modules.len(); "Playbook validated");
        trace!(uast:? = resolved.uast; "Validated playbook");
        Ok(resolved)
    }

    /// Parse, validate and generate the Rust program for a playbook.
    ///
    /// Unresolved functions produce warnings in [`Generated::diagnostics`],
    /// or errors when `[codegen] deny_unresolved` is set.
    ///
    /// # Errors
    ///
    /// Returns `BosunError::Parse` for syntax, validation or denied code
    /// generation errors.
    pub fn generate(&self, source: &str) -> Result<Generated, BosunError> {
        let resolved = self.check(source)?;
        let generated = codegen::generate(&resolved.uast, &resolved.modules, self.config.codegen());

        if !generated.diagnostics.is_empty() {
            if self.config.codegen().deny_unresolved() {
                let err = ParseError::denied(generated.diagnostics);
                return Err(BosunError::new_parse_error(err, source));
            }
            warn!(count = generated.diagnostics.len(); "Generated program references unresolved names");
        }

        Ok(generated)
    }

    /// Build generated source into an executable at `output`.
    ///
    /// The build package is kept in `<output>.build/`.
    ///
    /// # Errors
    ///
    /// Returns `BosunError::Build` if the toolchain cannot build the program.
    pub fn build(&self, generated: &Generated, output: &Path) -> Result<PathBuf, BosunError> {
        let toolchain = Toolchain::new(self.config.codegen(), self.config.build());
        Ok(toolchain.build(&generated.source(), output)?)
    }
}

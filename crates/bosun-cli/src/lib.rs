//! CLI logic for the Bosun playbook compiler.
//!
//! This module contains the core CLI logic: loading configuration, reading
//! the playbook and driving the [`Compiler`] through the requested stages.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command};

use std::{fs, path::Path};

use log::{info, warn};

use bosun::{BosunError, Compiler, with_suffix};

use error_adapter::Reportable;

/// Run the Bosun CLI application
///
/// `check` parses and validates the playbook. `compile` also writes the
/// generated Rust source to `<output>.rs` and, unless `--no-build` is given,
/// builds it into an executable at `<output>`.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `BosunError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Parsing and validation errors
/// - Build errors
pub fn run(args: &Args) -> Result<(), BosunError> {
    info!(playbook = args.playbook(); "Processing playbook");

    let app_config = config::load_config(args.config.as_ref())?;
    let source = fs::read_to_string(args.playbook())?;
    let compiler = Compiler::new(app_config);

    match &args.command {
        Command::Check { .. } => {
            let resolved = compiler.check(&source)?;
            info!(tasks = resolved.uast.walk().count(); "Playbook is valid");
        }
        Command::Compile {
            output, no_build, ..
        } => {
            let generated = compiler.generate(&source)?;
            for warning in Reportable::warnings(&generated, &source) {
                warn!("{}", warning.render());
            }

            let output = Path::new(output);
            let source_path = with_suffix(output, ".rs");
            fs::write(&source_path, generated.source())?;
            info!(output_file = source_path.display().to_string(); "Rust source written");

            if !no_build {
                let binary = compiler.build(&generated, output)?;
                info!(output_file = binary.display().to_string(); "Executable built");
            }
        }
    }

    Ok(())
}

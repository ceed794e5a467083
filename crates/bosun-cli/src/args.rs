//! Command-line argument definitions for the Bosun CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Each subcommand names the playbook to work on; `compile`
//! additionally controls the output path and whether to build.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Bosun playbook compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the Rust program for a playbook and build it
    Compile {
        /// Path to the playbook
        #[arg(short, long)]
        playbook: String,

        /// Output path; the source is written to `<output>.rs`
        #[arg(short, long, default_value = "playbook")]
        output: String,

        /// Only write the generated source
        #[arg(long)]
        no_build: bool,
    },

    /// Parse and validate a playbook without generating anything
    Check {
        /// Path to the playbook
        #[arg(short, long)]
        playbook: String,
    },
}

impl Args {
    /// The playbook path of any subcommand.
    pub fn playbook(&self) -> &str {
        match &self.command {
            Command::Compile { playbook, .. } | Command::Check { playbook } => playbook,
        }
    }
}

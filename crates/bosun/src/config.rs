//! Configuration types for compiling playbooks.
//!
//! All types implement [`serde::Deserialize`] with defaults for every field,
//! so a configuration file only needs the settings it changes.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration: module table, code generation and build settings.
//! - [`CodegenConfig`] - Controls the generated Rust source.
//! - [`BuildConfig`] - Controls how the generated source is built into an executable.
//!
//! # Example
//!
//! ```
//! # use bosun::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.modules()["debug"], "bosun_runtime::modules::Debug");
//! assert_eq!(config.codegen().runtime_path(), "bosun_runtime");
//! ```

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

/// Crate path generated programs use to reach the runtime.
pub const DEFAULT_RUNTIME_PATH: &str = "bosun_runtime";

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Module alias to Rust type path, available to every playbook.
    modules: IndexMap<String, String>,

    /// Code generation section.
    codegen: CodegenConfig,

    /// Build section.
    build: BuildConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let modules = [("debug", "Debug"), ("fail", "Fail")]
            .into_iter()
            .map(|(alias, ty)| {
                (
                    alias.to_string(),
                    format!("{DEFAULT_RUNTIME_PATH}::modules::{ty}"),
                )
            })
            .collect();

        Self {
            modules,
            codegen: CodegenConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    ///
    /// # Arguments
    ///
    /// * `modules` - Module alias to Rust type path.
    /// * `codegen` - Code generation settings.
    /// * `build` - Build settings.
    pub fn new(modules: IndexMap<String, String>, codegen: CodegenConfig, build: BuildConfig) -> Self {
        Self {
            modules,
            codegen,
            build,
        }
    }

    /// Returns the configured module table.
    pub fn modules(&self) -> &IndexMap<String, String> {
        &self.modules
    }

    /// Returns the code generation configuration.
    pub fn codegen(&self) -> &CodegenConfig {
        &self.codegen
    }

    /// Returns the build configuration.
    pub fn build(&self) -> &BuildConfig {
        &self.build
    }
}

/// Settings for the generated Rust source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Turn unresolved-function warnings into errors.
    deny_unresolved: bool,

    /// Crate path of the runtime in generated code.
    runtime_path: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            deny_unresolved: false,
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
        }
    }
}

impl CodegenConfig {
    pub fn new(deny_unresolved: bool, runtime_path: impl Into<String>) -> Self {
        Self {
            deny_unresolved,
            runtime_path: runtime_path.into(),
        }
    }

    /// Whether unresolved functions fail the compile instead of producing
    /// a sentinel identifier.
    pub fn deny_unresolved(&self) -> bool {
        self.deny_unresolved
    }

    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// Package name of the runtime dependency, as written in `Cargo.toml`.
    pub fn runtime_package(&self) -> String {
        self.runtime_path.replace('_', "-")
    }
}

/// Settings for building generated programs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build tool executable.
    toolchain: String,

    /// Build with optimizations.
    release: bool,

    /// Kill the build after this many seconds. Unlimited when absent.
    timeout_secs: Option<u64>,

    /// Right-hand side of the runtime entry in the scaffold's
    /// `[dependencies]`, e.g. `{ path = "../bosun/crates/bosun-runtime" }`.
    runtime_dependency: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            toolchain: "cargo".to_string(),
            release: false,
            timeout_secs: None,
            runtime_dependency: format!("{{ version = \"{}\" }}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl BuildConfig {
    /// Creates a new [`BuildConfig`].
    ///
    /// # Arguments
    ///
    /// * `toolchain` - Build tool executable, normally `cargo`.
    /// * `release` - Build with optimizations.
    /// * `timeout_secs` - Optional time limit for the build.
    /// * `runtime_dependency` - Cargo dependency specification of the runtime.
    pub fn new(
        toolchain: impl Into<String>,
        release: bool,
        timeout_secs: Option<u64>,
        runtime_dependency: impl Into<String>,
    ) -> Self {
        Self {
            toolchain: toolchain.into(),
            release,
            timeout_secs,
            runtime_dependency: runtime_dependency.into(),
        }
    }

    pub fn toolchain(&self) -> &str {
        &self.toolchain
    }

    pub fn release(&self) -> bool {
        self.release
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn runtime_dependency(&self) -> &str {
        &self.runtime_dependency
    }

    /// Cargo profile directory the binary lands in.
    pub fn profile_dir(&self) -> &'static str {
        if self.release { "release" } else { "debug" }
    }
}

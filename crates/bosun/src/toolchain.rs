//! Building generated programs with the native toolchain.
//!
//! The generated source is placed in a throwaway Cargo package next to the
//! output (`<output>.build/`), built there, and the binary copied to
//! `<output>`.

use std::{
    env::consts::EXE_SUFFIX,
    ffi::OsString,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{BuildConfig, CodegenConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failures while building a generated program.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to write {}", path.display())]
    Scaffold {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to run `{toolchain}`")]
    Spawn {
        toolchain: String,
        #[source]
        source: io::Error,
    },

    #[error("`{toolchain}` failed ({status}):\n{stderr}")]
    Failed {
        toolchain: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{toolchain}` did not finish within {} seconds", timeout.as_secs())]
    Timeout {
        toolchain: String,
        timeout: Duration,
    },

    #[error("build produced no binary at {}", path.display())]
    MissingBinary { path: PathBuf },

    #[error("failed to copy the binary to {}", path.display())]
    Install {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `path` with `suffix` appended to its last component.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Cargo package name for an output path: its file name with anything
/// outside `[A-Za-z0-9_-]` replaced.
pub fn package_name(output: &Path) -> String {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => name,
        _ => format!("playbook-{name}"),
    }
}

/// `Cargo.toml` of the build package.
pub fn manifest(package: &str, codegen: &CodegenConfig, build: &BuildConfig) -> String {
    format!(
        r#"[package]
name = "{package}"
version = "0.1.0"
edition = "2024"
publish = false

[[bin]]
name = "{package}"
path = "src/main.rs"

[dependencies]
{runtime} = {dependency}

[workspace]
"#,
        runtime = codegen.runtime_package(),
        dependency = build.runtime_dependency(),
    )
}

/// Lays out the build package and runs the toolchain.
pub struct Toolchain<'a> {
    codegen: &'a CodegenConfig,
    build: &'a BuildConfig,
}

impl<'a> Toolchain<'a> {
    pub fn new(codegen: &'a CodegenConfig, build: &'a BuildConfig) -> Self {
        Self { codegen, build }
    }

    /// Write the build package for `source` into `<output>.build/` and
    /// return its directory.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Scaffold`] if a file cannot be written.
    pub fn scaffold(&self, source: &str, output: &Path) -> Result<PathBuf, BuildError> {
        let dir = with_suffix(output, ".build");
        let package = package_name(output);

        let src = dir.join("src");
        fs::create_dir_all(&src).map_err(|source| BuildError::Scaffold {
            path: src.clone(),
            source,
        })?;
        write(&dir.join("Cargo.toml"), &manifest(&package, self.codegen, self.build))?;
        write(&src.join("main.rs"), source)?;

        debug!(dir = dir.display().to_string(), package; "Build package written");
        Ok(dir)
    }

    /// Build `source` and install the binary at `output`.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] if the package cannot be written, the
    /// toolchain fails or times out, or the binary cannot be installed.
    pub fn build(&self, source: &str, output: &Path) -> Result<PathBuf, BuildError> {
        let dir = self.scaffold(source, output)?;
        self.run(&dir)?;

        let binary = dir
            .join("target")
            .join(self.build.profile_dir())
            .join(format!("{}{EXE_SUFFIX}", package_name(output)));
        if !binary.is_file() {
            return Err(BuildError::MissingBinary { path: binary });
        }

        let installed = with_suffix(output, EXE_SUFFIX);
        fs::copy(&binary, &installed).map_err(|source| BuildError::Install {
            path: installed.clone(),
            source,
        })?;

        info!(binary = installed.display().to_string(); "Playbook built");
        Ok(installed)
    }

    /// Run `<toolchain> build` in `dir`, honoring the configured timeout.
    fn run(&self, dir: &Path) -> Result<(), BuildError> {
        let toolchain = self.build.toolchain().to_string();
        let log_path = dir.join("build.log");
        let log = File::create(&log_path).map_err(|source| BuildError::Scaffold {
            path: log_path.clone(),
            source,
        })?;

        let mut command = Command::new(&toolchain);
        command
            .arg("build")
            .arg("--manifest-path")
            .arg(dir.join("Cargo.toml"))
            .arg("--target-dir")
            .arg(dir.join("target"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log));
        if self.build.release() {
            command.arg("--release");
        }

        info!(toolchain, dir = dir.display().to_string(); "Building playbook");
        let mut child = command.spawn().map_err(|source| BuildError::Spawn {
            toolchain: toolchain.clone(),
            source,
        })?;

        let started = Instant::now();
        let status = loop {
            let polled = child.try_wait().map_err(|source| BuildError::Spawn {
                toolchain: toolchain.clone(),
                source,
            })?;
            if let Some(status) = polled {
                break status;
            }

            if let Some(timeout) = self.build.timeout() {
                if started.elapsed() > timeout {
                    warn!(toolchain, seconds = timeout.as_secs(); "Build timed out, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(BuildError::Timeout { toolchain, timeout });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let stderr = fs::read_to_string(&log_path).unwrap_or_default();
            return Err(BuildError::Failed {
                toolchain,
                status,
                stderr,
            });
        }
        Ok(())
    }
}

fn write(path: &Path, contents: &str) -> Result<(), BuildError> {
    fs::write(path, contents).map_err(|source| BuildError::Scaffold {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_package_name() {
        assert_eq!(package_name(Path::new("out/web")), "web");
        assert_eq!(package_name(Path::new("my site.bin")), "my-site");
        assert_eq!(package_name(Path::new("2024")), "playbook-2024");
    }

    #[test]
    fn test_manifest_names_runtime_dependency() {
        let codegen = CodegenConfig::default();
        let build = BuildConfig::new("cargo", false, None, r#"{ path = "../runtime" }"#);

        let manifest = manifest("web", &codegen, &build);

        assert!(manifest.contains("name = \"web\""));
        assert!(manifest.contains("bosun-runtime = { path = \"../runtime\" }"));
        assert!(manifest.trim_end().ends_with("[workspace]"));
    }

    #[test]
    fn test_scaffold_layout() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("web");
        let codegen = CodegenConfig::default();
        let build = BuildConfig::default();

        let package = Toolchain::new(&codegen, &build)
            .scaffold("fn main() {}\n", &output)
            .unwrap();

        assert_eq!(package, dir.path().join("web.build"));
        assert_eq!(
            fs::read_to_string(package.join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
        assert!(package.join("Cargo.toml").is_file());
    }

    #[test]
    fn test_missing_toolchain_is_reported() {
        let dir = tempdir().unwrap();
        let codegen = CodegenConfig::default();
        let build = BuildConfig::new("bosun-no-such-toolchain", false, None, "\"0.1.0\"");

        let err = Toolchain::new(&codegen, &build)
            .build("fn main() {}\n", &dir.path().join("web"))
            .unwrap_err();

        assert!(matches!(err, BuildError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_toolchain_reports_stderr() {
        let dir = tempdir().unwrap();
        let codegen = CodegenConfig::default();
        let build = BuildConfig::new("false", false, None, "\"0.1.0\"");

        let err = Toolchain::new(&codegen, &build)
            .build("fn main() {}\n", &dir.path().join("web"))
            .unwrap_err();

        assert!(matches!(err, BuildError::Failed { .. }));
    }
}

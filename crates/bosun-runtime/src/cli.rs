//! Entry point of generated programs.

use std::{fs, path::PathBuf, process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};
use serde_json::{Map, Value};

use crate::{
    playbook::{Playbook, RuntimeError},
    task::TaskRecord,
};

/// Command-line arguments of a compiled playbook
#[derive(Parser, Debug)]
#[command(about = "Run a compiled Bosun playbook", long_about = None)]
pub struct RunArgs {
    /// Set an input, KEY=VALUE; VALUE is read as JSON, or as a string if it
    /// is not valid JSON
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// JSON object file with inputs; --var entries override it
    #[arg(long)]
    pub vars_file: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl RunArgs {
    /// Collect the inputs given on the command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the vars file cannot be read or is not a JSON
    /// object, or a `--var` has no `=`.
    pub fn vars(&self) -> Result<Map<String, Value>, RuntimeError> {
        let mut vars = match &self.vars_file {
            Some(path) => read_vars_file(path)?,
            None => Map::new(),
        };

        for var in &self.vars {
            let (key, raw) = var
                .split_once('=')
                .ok_or_else(|| RuntimeError::InvalidVar(var.clone()))?;
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            vars.insert(key.to_string(), value);
        }

        Ok(vars)
    }
}

fn read_vars_file(path: &PathBuf) -> Result<Map<String, Value>, RuntimeError> {
    let text = fs::read_to_string(path).map_err(|source| RuntimeError::VarsFile {
        path: path.clone(),
        source,
    })?;
    match serde_json::from_str(&text) {
        Ok(Value::Object(vars)) => Ok(vars),
        Ok(_) => Err(RuntimeError::VarsJson {
            path: path.clone(),
            source: None,
        }),
        Err(source) => Err(RuntimeError::VarsJson {
            path: path.clone(),
            source: Some(source),
        }),
    }
}

/// Prepare the context and run `playbook`.
///
/// Returns `Ok(true)` if every top-level task succeeded. The failing task's
/// result is printed as JSON on stderr, also when the failure aborted the
/// run.
///
/// # Errors
///
/// Returns the [`RuntimeError`] that prevented or aborted the run.
pub fn run(playbook: &mut Playbook, args: &RunArgs) -> Result<bool, RuntimeError> {
    let mut ctx = playbook.context(args.vars()?)?;
    let report = playbook.run(&mut ctx).inspect_err(|err| {
        if let Some(record) = err.record() {
            print_failure(record);
        }
    })?;
    debug!(records = report.records.len(); "Run finished");

    match &report.failure {
        None => Ok(true),
        Some(failure) => {
            print_failure(failure);
            Ok(false)
        }
    }
}

/// Pretty JSON form of a failed task, as printed on stderr.
pub fn failure_json(record: &TaskRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(record)
}

fn print_failure(record: &TaskRecord) {
    match failure_json(record) {
        Ok(json) => eprintln!("{json}"),
        Err(err) => error!(err:%; "Failed to serialize the task result"),
    }
}

/// Parse the command line, initialize logging and run `playbook`, exiting
/// with status 1 on failure.
pub fn run_main(mut playbook: Playbook) {
    let args = RunArgs::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    match run(&mut playbook, &args) {
        Ok(true) => info!("Playbook completed successfully"),
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("{err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::{lazy::lazy, modules::Fail, task::Task};

    fn args(extra: &[&str]) -> RunArgs {
        RunArgs::parse_from(std::iter::once("playbook").chain(extra.iter().copied()))
    }

    #[test]
    fn test_var_values_are_json_or_strings() {
        let vars = args(&["--var", "n=3", "--var", "env=prod", "--var", "on=true"])
            .vars()
            .unwrap();

        assert_eq!(vars["n"], json!(3));
        assert_eq!(vars["env"], json!("prod"));
        assert_eq!(vars["on"], json!(true));
    }

    #[test]
    fn test_var_without_equals_is_rejected() {
        let err = args(&["--var", "oops"]).vars().unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidVar(ref var) if var == "oops"));
    }

    #[test]
    fn test_vars_file_is_overridden_by_var() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"env": "dev", "replicas": 2}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let vars = args(&["--vars-file", &path, "--var", "env=prod"])
            .vars()
            .unwrap();

        assert_eq!(vars["env"], json!("prod"));
        assert_eq!(vars["replicas"], json!(2));
    }

    #[test]
    fn test_vars_file_must_be_an_object() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let err = args(&["--vars-file", &path]).vars().unwrap_err();
        assert!(matches!(err, RuntimeError::VarsJson { source: None, .. }));
    }

    #[test]
    fn test_aborted_run_keeps_the_failing_task() {
        let fail = Task::simple("notify", Box::new(Fail { msg: lazy("smtp down") }));
        let mut playbook = Playbook::new(
            json!({"name": "web"}),
            vec![Task::compound("deploy", vec![], vec![], vec![fail])],
        );

        let err = run(&mut playbook, &args(&[])).unwrap_err();

        let record = err.record().expect("aborting error carries its task");
        let printed: Value = serde_json::from_str(&failure_json(record).unwrap()).unwrap();
        assert_eq!(
            printed,
            json!({
                "task": "notify",
                "result": {
                    "succeeded": false,
                    "changed": false,
                    "error": "smtp down",
                    "module": "fail",
                },
            })
        );
    }
}

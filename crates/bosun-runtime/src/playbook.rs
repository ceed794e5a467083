//! Playbooks: attributes, inputs and the top-level run loop.

use std::{io, path::PathBuf};

use log::{debug, error, info};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    context::Context,
    module::ModuleError,
    task::{RunReport, Task, TaskRecord},
};

/// Failures that abort a playbook run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to initialize the module of task `{}`", .record.task)]
    Initialize {
        record: TaskRecord,
        #[source]
        source: ModuleError,
    },

    #[error(
        "task `{}` in the `always` clause of `{block}` failed: {}",
        .record.task,
        .record.result.error.as_deref().unwrap_or_default()
    )]
    Always { block: String, record: TaskRecord },

    #[error("required input `{name}` was not provided")]
    MissingInput { name: String },

    #[error("input `{name}` must be {expected}, got {found}")]
    InputType {
        name: String,
        expected: String,
        found: Value,
    },

    #[error("invalid --var `{0}`, expected KEY=VALUE")]
    InvalidVar(String),

    #[error("failed to read vars file {path}")]
    VarsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("vars file {path} is not a JSON object")]
    VarsJson {
        path: PathBuf,
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl RuntimeError {
    /// The task whose failure aborted the run.
    pub fn record(&self) -> Option<&TaskRecord> {
        match self {
            RuntimeError::Initialize { record, .. } | RuntimeError::Always { record, .. } => {
                Some(record)
            }
            _ => None,
        }
    }
}

/// Attribute declaring the playbook's inputs.
pub const INPUTS_ATTRIBUTE: &str = "inputs";

/// A compiled playbook.
pub struct Playbook {
    attributes: Value,
    tasks: Vec<Task>,
}

impl Playbook {
    pub fn new(attributes: Value, tasks: Vec<Task>) -> Self {
        Self { attributes, tasks }
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    /// Build the run context from caller-provided `vars`.
    ///
    /// Each declared input absent from `vars` takes its `default`; a
    /// `required` input without a default must be provided. Inputs with a
    /// `type` are checked against it.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::MissingInput`] or [`RuntimeError::InputType`].
    pub fn context(&self, mut vars: Map<String, Value>) -> Result<Context, RuntimeError> {
        let inputs = self
            .attributes
            .get(INPUTS_ATTRIBUTE)
            .and_then(Value::as_object);

        for (name, input) in inputs.into_iter().flatten() {
            if !vars.contains_key(name) {
                match input.get("default") {
                    Some(default) => {
                        vars.insert(name.clone(), default.clone());
                    }
                    None if input.get("required").and_then(Value::as_bool) == Some(true) => {
                        return Err(RuntimeError::MissingInput { name: name.clone() });
                    }
                    None => continue,
                }
            }

            if let (Some(expected), Some(value)) =
                (input.get("type").and_then(Value::as_str), vars.get(name))
            {
                if !has_type(value, expected) {
                    return Err(RuntimeError::InputType {
                        name: name.clone(),
                        expected: expected.to_string(),
                        found: value.clone(),
                    });
                }
            }
        }

        debug!(vars = vars.len(); "Run context prepared");
        Ok(Context::new(vars))
    }

    /// Run every top-level task in order, stopping at the first unhandled
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns the [`RuntimeError`] that aborted the run; task failures are
    /// reported in the [`RunReport`] instead.
    pub fn run(&mut self, ctx: &mut Context) -> Result<RunReport, RuntimeError> {
        info!(playbook = self.name().unwrap_or("<unnamed>"), tasks = self.tasks.len(); "Running playbook");
        let mut report = RunReport::default();

        for task in &mut self.tasks {
            let result = task.run(ctx, &mut report)?;
            if !result.succeeded {
                error!(task = task.description(); "Playbook halted");
                report.failure = Some(TaskRecord {
                    task: task.description().to_string(),
                    result,
                });
                break;
            }
        }

        Ok(report)
    }
}

/// JSON-Schema-like type names.
fn has_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "bool" | "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

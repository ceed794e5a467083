//! The contract between tasks and the modules that do their work.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::Context;

/// Errors a module reports while initializing.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("invalid configuration for module `{module}`: {message}")]
    Config { module: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outcome of running one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskResult {
    pub succeeded: bool,
    pub changed: bool,
    /// `None` when the task succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Name of the module that ran, or `block` for a compound task.
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    /// The task's `when` condition was false.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl TaskResult {
    /// Succeeded without changing anything.
    pub fn ok(module: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn failed(module: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error: Some(error.into()),
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn skipped(module: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::ok(module)
        }
    }

    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    pub fn with_output(mut self, output: Map<String, Value>) -> Self {
        self.output = Some(output);
        self
    }
}

/// A unit of work invoked by a task.
///
/// Module fields are [`Lazy`](crate::Lazy) values; evaluate them in
/// [`Module::apply`] so that lookup failures become the task's error and can
/// be rescued.
pub trait Module {
    /// Name reported in [`TaskResult::module`].
    fn name(&self) -> &str;

    /// Prepare the module before it is applied. A failure here aborts the
    /// whole run.
    fn initialize(&mut self, _ctx: &Context) -> Result<(), ModuleError> {
        Ok(())
    }

    fn apply(&mut self, ctx: &Context) -> TaskResult;

    /// Undo what [`Module::apply`] did. Reserved; the runner never calls it.
    fn destroy(&mut self, _ctx: &Context) -> TaskResult {
        TaskResult::ok(self.name())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_result_json_omits_empty_fields() {
        let result = TaskResult::ok("debug");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"succeeded": true, "changed": false, "module": "debug"})
        );

        let failed = TaskResult::failed("fail", "boom");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"succeeded": false, "changed": false, "error": "boom", "module": "fail"})
        );

        let skipped = serde_json::to_value(TaskResult::skipped("debug")).unwrap();
        assert_eq!(skipped["skipped"], json!(true));
    }
}

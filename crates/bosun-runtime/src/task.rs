//! Tasks and their execution rules.

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    context::Context,
    lazy::Lazy,
    module::{Module, TaskResult},
    playbook::RuntimeError,
};

/// Module name reported for compound tasks.
pub const COMPOUND_MODULE: &str = "block";

/// One executed task and its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub task: String,
    pub result: TaskResult,
}

/// Results of every executed task, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub records: Vec<TaskRecord>,
    /// The top-level task whose failure halted the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskRecord>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// The latest record for `task`.
    pub fn result(&self, task: &str) -> Option<&TaskResult> {
        self.records
            .iter()
            .rev()
            .find(|record| record.task == task)
            .map(|record| &record.result)
    }

    fn push(&mut self, task: &str, result: &TaskResult) {
        self.records.push(TaskRecord {
            task: task.to_string(),
            result: result.clone(),
        });
    }
}

enum TaskKind {
    Simple(Box<dyn Module>),
    Compound {
        body: Vec<Task>,
        rescue: Vec<Task>,
        always: Vec<Task>,
    },
}

/// A task of a playbook.
pub struct Task {
    description: String,
    when: Option<Lazy<bool>>,
    kind: TaskKind,
}

impl Task {
    /// A task that applies `module`.
    pub fn simple(description: impl Into<String>, module: Box<dyn Module>) -> Self {
        Self {
            description: description.into(),
            when: None,
            kind: TaskKind::Simple(module),
        }
    }

    /// A task that runs `body`, then `rescue` if the body failed, then
    /// `always` in any case.
    pub fn compound(
        description: impl Into<String>,
        body: Vec<Task>,
        rescue: Vec<Task>,
        always: Vec<Task>,
    ) -> Self {
        Self {
            description: description.into(),
            when: None,
            kind: TaskKind::Compound {
                body,
                rescue,
                always,
            },
        }
    }

    /// Only run the task when `condition` evaluates to `true`.
    pub fn with_when(mut self, condition: Lazy<bool>) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn module_name(&self) -> &str {
        match &self.kind {
            TaskKind::Simple(module) => module.name(),
            TaskKind::Compound { .. } => COMPOUND_MODULE,
        }
    }

    /// Run the task, recording it and every nested task into `report`.
    ///
    /// A failed task is an `Ok` result with `succeeded == false`; `Err` is
    /// reserved for failures that abort the whole run.
    pub fn run(&mut self, ctx: &mut Context, report: &mut RunReport) -> Result<TaskResult, RuntimeError> {
        if let Some(condition) = &self.when {
            let gate = match condition.eval(ctx) {
                Ok(true) => None,
                Ok(false) => {
                    debug!(task = self.description; "Condition false, skipping task");
                    Some(TaskResult::skipped(self.module_name()))
                }
                Err(err) => Some(TaskResult::failed(
                    self.module_name(),
                    format!("evaluating `when`: {err}"),
                )),
            };
            if let Some(result) = gate {
                report.push(&self.description, &result);
                return Ok(result);
            }
        }

        let result = match &mut self.kind {
            TaskKind::Simple(module) => apply(&self.description, module.as_mut(), ctx)?,
            TaskKind::Compound {
                body,
                rescue,
                always,
            } => run_compound(&self.description, body, rescue, always, ctx, report)?,
        };

        if let Some(output) = &result.output {
            ctx.record(&self.description, output.clone());
        }
        report.push(&self.description, &result);

        if result.succeeded {
            info!(task = self.description, changed = result.changed; "Task succeeded");
        } else {
            warn!(
                task = self.description,
                error = result.error.as_deref().unwrap_or_default();
                "Task failed"
            );
        }
        Ok(result)
    }
}

fn apply(task: &str, module: &mut dyn Module, ctx: &Context) -> Result<TaskResult, RuntimeError> {
    debug!(task, module = module.name(); "Initializing module");
    module
        .initialize(ctx)
        .map_err(|source| RuntimeError::Initialize {
            record: TaskRecord {
                task: task.to_string(),
                result: TaskResult::failed(module.name(), format!("initialize: {source}")),
            },
            source,
        })?;
    Ok(module.apply(ctx))
}

/// Run `tasks` in order until one fails; returns that failure.
fn run_until_failure(
    tasks: &mut [Task],
    ctx: &mut Context,
    report: &mut RunReport,
) -> Result<Option<TaskRecord>, RuntimeError> {
    for task in tasks {
        let result = task.run(ctx, report)?;
        if !result.succeeded {
            return Ok(Some(TaskRecord {
                task: task.description.clone(),
                result,
            }));
        }
    }
    Ok(None)
}

fn run_compound(
    description: &str,
    body: &mut [Task],
    rescue: &mut [Task],
    always: &mut [Task],
    ctx: &mut Context,
    report: &mut RunReport,
) -> Result<TaskResult, RuntimeError> {
    let first = report.records.len();

    let mut failure = run_until_failure(body, ctx, report)?;
    if failure.is_some() && !rescue.is_empty() {
        info!(task = description; "Body failed, running rescue");
        failure = run_until_failure(rescue, ctx, report)?;
    }

    if let Some(record) = run_until_failure(always, ctx, report)? {
        return Err(RuntimeError::Always {
            block: description.to_string(),
            record,
        });
    }

    let changed = report.records[first..]
        .iter()
        .any(|record| record.result.changed);
    let result = match failure {
        None => TaskResult::ok(COMPOUND_MODULE),
        Some(failure) => TaskResult::failed(COMPOUND_MODULE, failure.result.error.unwrap_or_default()),
    };
    Ok(result.with_changed(changed))
}

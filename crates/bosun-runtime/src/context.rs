//! Run-time context shared by every task of a playbook run.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::lazy::LazyError;

/// Inputs and recorded task outputs.
///
/// `vars` is fixed once the run starts; `state` grows by one entry for each
/// completed task that produced output, keyed by the task description.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Context {
    pub vars: Map<String, Value>,
    pub state: Map<String, Value>,
}

impl Context {
    pub fn new(vars: Map<String, Value>) -> Self {
        Self {
            vars,
            state: Map::new(),
        }
    }

    /// Record the output of a completed task.
    pub fn record(&mut self, task: &str, output: Map<String, Value>) {
        self.state.insert(task.to_string(), Value::Object(output));
    }

    /// Follow `path` into `vars`.
    pub fn var(&self, path: &[&str]) -> Result<&Value, LazyError> {
        lookup("vars", &self.vars, path)
    }

    /// Follow `path` into `state`.
    pub fn output(&self, path: &[&str]) -> Result<&Value, LazyError> {
        lookup("state", &self.state, path)
    }
}

/// Walk `path` from `root`; array elements are addressed by decimal index.
fn lookup<'a>(
    root_name: &str,
    root: &'a Map<String, Value>,
    path: &[&str],
) -> Result<&'a Value, LazyError> {
    let missing = |depth: usize| LazyError::Missing {
        path: std::iter::once(root_name)
            .chain(path[..=depth].iter().copied())
            .collect::<Vec<_>>()
            .join("."),
    };

    let Some((first, rest)) = path.split_first() else {
        return Err(missing_root(root_name));
    };
    let mut current = root.get(*first).ok_or_else(|| missing(0))?;

    for (depth, segment) in rest.iter().enumerate() {
        let next = match current {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
            _ => None,
        };
        current = next.ok_or_else(|| missing(depth + 1))?;
    }

    Ok(current)
}

fn missing_root(root_name: &str) -> LazyError {
    LazyError::Missing {
        path: root_name.to_string(),
    }
}

use log::info;
use serde_json::{Map, Value};

use crate::{
    context::Context,
    lazy::Lazy,
    module::{Module, TaskResult},
};

/// Log a message and record it as the task output.
///
/// Output: `{ "msg": <message> }`.
#[derive(Debug, Default)]
pub struct Debug {
    pub msg: Lazy<Value>,
    /// Also print the message on stdout.
    pub verbose: Lazy<Option<bool>>,
}

impl Module for Debug {
    fn name(&self) -> &str {
        "debug"
    }

    fn apply(&mut self, ctx: &Context) -> TaskResult {
        let (msg, verbose) = match (self.msg.eval(ctx), self.verbose.eval(ctx)) {
            (Ok(msg), Ok(verbose)) => (msg, verbose.unwrap_or(false)),
            (Err(err), _) | (_, Err(err)) => return TaskResult::failed(self.name(), err.to_string()),
        };

        let text = match &msg {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        info!(msg = text; "debug");
        if verbose {
            println!("{text}");
        }

        let mut output = Map::new();
        output.insert("msg".to_string(), msg);
        TaskResult::ok(self.name()).with_output(output)
    }
}

//! Typed intermediate representation of a playbook.

use crate::{
    span::Span,
    value::{FunctionExpr, ObjectExpr},
};

/// A lowered playbook: top-level attributes and the ordered task list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Uast {
    pub attributes: ObjectExpr,
    pub tasks: Vec<TaskExpr>,
}

impl Uast {
    /// All tasks, depth first, in execution-declaration order.
    pub fn walk(&self) -> impl Iterator<Item = &TaskExpr> {
        let mut stack: Vec<&TaskExpr> = self.tasks.iter().rev().collect();
        std::iter::from_fn(move || {
            let task = stack.pop()?;
            stack.extend(task.children().rev());
            Some(task)
        })
    }
}

/// One task of a playbook.
///
/// A simple task has a module and arguments; a compound task has a non-empty
/// `body` and may carry `rescue` and `always` lists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskExpr {
    pub description: String,
    /// Module alias, resolved against the declared imports.
    pub module: Option<String>,
    pub when: Option<FunctionExpr>,
    pub args: ObjectExpr,
    pub body: Vec<TaskExpr>,
    pub rescue: Vec<TaskExpr>,
    pub always: Vec<TaskExpr>,
    /// Pairs whose key is not recognized for this kind of task.
    pub extra: ObjectExpr,
    pub span: Span,
}

impl TaskExpr {
    pub fn is_compound(&self) -> bool {
        !self.body.is_empty()
    }

    /// Nested tasks: body, then rescue, then always.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = &TaskExpr> {
        self.body.iter().chain(&self.rescue).chain(&self.always)
    }
}

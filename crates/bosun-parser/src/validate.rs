//! Module import resolution and task validation.
//!
//! Every task must end up naming exactly one declared module. Two spellings
//! are accepted for a simple task:
//!
//! ```text
//! task [explicit] { module: 'debug' args: { msg: 'hi', } }
//! task [shorthand] { debug: { msg: 'hi', } }
//! ```
//!
//! [`resolve`] normalizes the shorthand into the explicit form, so the code
//! generator only ever sees `module` and `args`. All problems found are
//! reported together.

use indexmap::IndexMap;
use log::{debug, info};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    uast::{TaskExpr, Uast},
    value::ValueExpr,
};

/// Attribute holding the playbook's own import table.
pub const IMPORTS_ATTRIBUTE: &str = "imports";

/// A module alias bound to the Rust path of the module type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRef {
    pub alias: String,
    pub path: String,
}

/// A validated playbook.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The playbook with every simple task in explicit `module`/`args` form.
    pub uast: Uast,
    /// Modules referenced by at least one task, in order of first use.
    pub modules: IndexMap<String, ModuleRef>,
}

/// Resolve module aliases and validate every task of `uast`.
///
/// `declared` holds the configured alias to path table; the playbook's
/// `imports` attribute is laid over it.
///
/// # Errors
///
/// Returns every validation diagnostic found (`E200`..`E207`).
pub fn resolve(uast: &Uast, declared: &IndexMap<String, String>) -> Result<Resolved, ParseError> {
    let mut collector = DiagnosticCollector::new();
    let imports = imports(uast, declared, &mut collector);
    debug!(imports = imports.len(); "Declared module imports");

    let mut resolver = Resolver {
        imports: &imports,
        modules: IndexMap::new(),
        collector,
    };
    let tasks = uast
        .tasks
        .iter()
        .map(|task| resolver.task(task))
        .collect();

    let Resolver {
        modules, collector, ..
    } = resolver;
    collector.finish()?;

    info!(tasks = uast.tasks.len(), modules = modules.len(); "Playbook validated");
    Ok(Resolved {
        uast: Uast {
            attributes: uast.attributes.clone(),
            tasks,
        },
        modules,
    })
}

/// Merge the configured imports with the playbook's `imports` attribute.
fn imports(
    uast: &Uast,
    declared: &IndexMap<String, String>,
    collector: &mut DiagnosticCollector,
) -> IndexMap<String, String> {
    let mut imports = declared.clone();

    match uast.attributes.get(IMPORTS_ATTRIBUTE) {
        None => {}
        Some(ValueExpr::Object(object)) => {
            for (alias, path) in object {
                match path {
                    ValueExpr::String(path) => {
                        imports.insert(alias.clone(), path.clone());
                    }
                    other => collector.emit(
                        Diagnostic::error(format!(
                            "import `{alias}` must be a string path, found {}",
                            other.value_type()
                        ))
                        .with_code(ErrorCode::E207)
                        .with_help("write the module type's path, e.g. 'bosun_runtime::modules::Debug'"),
                    ),
                }
            }
        }
        Some(other) => collector.emit(
            Diagnostic::error(format!(
                "`{IMPORTS_ATTRIBUTE}` must be an object, found {}",
                other.value_type()
            ))
            .with_code(ErrorCode::E207),
        ),
    }

    for (alias, path) in &imports {
        if !is_rust_path(path) {
            collector.emit(
                Diagnostic::error(format!("import `{alias}` is not a valid Rust path: `{path}`"))
                    .with_code(ErrorCode::E207)
                    .with_help("paths are `::`-separated identifiers"),
            );
        }
    }

    imports
}

/// `a::b::C`: one or more identifiers joined by `::`.
pub fn is_rust_path(path: &str) -> bool {
    path.split("::").all(|segment| {
        let mut chars = segment.chars();
        segment != "_"
            && chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

struct Resolver<'a> {
    imports: &'a IndexMap<String, String>,
    modules: IndexMap<String, ModuleRef>,
    collector: DiagnosticCollector,
}

impl Resolver<'_> {
    fn diagnostic(task: &TaskExpr, code: ErrorCode, message: String) -> Diagnostic {
        Diagnostic::error(message)
            .with_code(code)
            .with_label(task.span, code.description())
    }

    fn error(&mut self, task: &TaskExpr, code: ErrorCode, message: String) {
        self.collector.emit(Self::diagnostic(task, code, message));
    }

    fn task(&mut self, task: &TaskExpr) -> TaskExpr {
        if task.is_compound() {
            self.compound(task)
        } else {
            self.simple(task)
        }
    }

    fn tasks(&mut self, tasks: &[TaskExpr]) -> Vec<TaskExpr> {
        tasks.iter().map(|task| self.task(task)).collect()
    }

    fn check_when(&mut self, task: &TaskExpr) {
        if let Some(when) = task.extra.get("when") {
            let found = when.value_type();
            self.error(
                task,
                ErrorCode::E206,
                format!("`when` of task `{}` must be a function call, found {found}", task.description),
            );
        }
    }

    fn compound(&mut self, task: &TaskExpr) -> TaskExpr {
        if task.description.is_empty() {
            self.error(
                task,
                ErrorCode::E200,
                "block is missing a string `name` attribute".to_string(),
            );
        }
        self.check_when(task);

        for key in task.extra.keys().filter(|key| !matches!(key.as_str(), "when" | "name")) {
            let message = format!("unknown key `{key}` on block `{}`", task.description);
            self.error(task, ErrorCode::E201, message);
        }

        TaskExpr {
            body: self.tasks(&task.body),
            rescue: self.tasks(&task.rescue),
            always: self.tasks(&task.always),
            ..task.clone()
        }
    }

    fn simple(&mut self, task: &TaskExpr) -> TaskExpr {
        if task.description.trim().is_empty() {
            self.error(task, ErrorCode::E200, "task has an empty description".to_string());
        }
        self.check_when(task);

        let mut resolved = task.clone();
        resolved.extra.shift_remove("when");

        match &task.module {
            Some(alias) => {
                for key in resolved.extra.keys() {
                    let (code, message) = if key == "args" {
                        (
                            ErrorCode::E203,
                            format!("`args` of task `{}` must be an object", task.description),
                        )
                    } else {
                        (
                            ErrorCode::E201,
                            format!("unknown key `{key}` on task `{}`", task.description),
                        )
                    };
                    self.error(task, code, message);
                }
                self.use_module(task, alias);
                resolved.extra.clear();
            }
            None => self.shorthand(task, &mut resolved),
        }

        resolved
    }

    /// `alias: { args }`: the one remaining key names the module.
    fn shorthand(&mut self, task: &TaskExpr, resolved: &mut TaskExpr) {
        if !task.args.is_empty() {
            self.collector.emit(
                Self::diagnostic(
                    task,
                    ErrorCode::E205,
                    format!("task `{}` has `args` but no `module`", task.description),
                )
                .with_help("add `module: '<alias>'` next to `args`"),
            );
            return;
        }

        let mut candidates = std::mem::take(&mut resolved.extra).into_iter();
        let (alias, args) = match (candidates.next(), candidates.next()) {
            (Some(only), None) => only,
            (None, _) => {
                self.collector.emit(
                    Self::diagnostic(
                        task,
                        ErrorCode::E205,
                        format!("task `{}` does not name a module", task.description),
                    )
                    .with_help("write `<alias>: { ... }` or `module: '<alias>'`"),
                );
                return;
            }
            (Some((first, _)), Some((second, _))) => {
                let mut keys = vec![first, second];
                keys.extend(candidates.map(|(key, _)| key));
                let message = format!(
                    "task `{}` has several candidate modules: {}",
                    task.description,
                    keys.iter()
                        .map(|key| format!("`{key}`"))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.error(task, ErrorCode::E204, message);
                return;
            }
        };

        let declared = self.use_module(task, &alias);
        match args {
            ValueExpr::Object(args) => resolved.args = args,
            other if declared => {
                let message = format!(
                    "arguments of module `{alias}` on task `{}` must be an object, found {}",
                    task.description,
                    other.value_type()
                );
                self.error(task, ErrorCode::E203, message);
            }
            _ => {}
        }
        resolved.module = Some(alias);
    }

    /// Record a use of `alias`; returns `false` if it is not declared.
    fn use_module(&mut self, task: &TaskExpr, alias: &str) -> bool {
        if let Some(path) = self.imports.get(alias) {
            self.modules
                .entry(alias.to_string())
                .or_insert_with(|| ModuleRef {
                    alias: alias.to_string(),
                    path: path.clone(),
                });
            return true;
        }

        let mut declared: Vec<&str> = self.imports.keys().map(String::as_str).collect();
        declared.sort_unstable();
        let message = format!(
            "module `{alias}` used by task `{}` is not declared",
            task.description
        );
        let help = if declared.is_empty() {
            "declare it in the `imports` attribute".to_string()
        } else {
            format!("declared modules: {}", declared.join(", "))
        };
        self.collector
            .emit(Self::diagnostic(task, ErrorCode::E202, message).with_help(help));
        false
    }
}

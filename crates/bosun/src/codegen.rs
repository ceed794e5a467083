//! Rust code generation for validated playbooks.
//!
//! Every task becomes a `Task` expression. Module arguments become fields of
//! the module's struct, each a `Lazy` value so that lookups into `vars` and
//! `state` happen when the task runs. Function calls nested in arguments are
//! evaluated eagerly inside the enclosing closure and pass errors along as
//! values.
//!
//! Anything that cannot be resolved (an unknown function, an argument name
//! that is not a Rust identifier) is replaced by
//! [`INVALID_IDENTIFIER`](rust::INVALID_IDENTIFIER) and reported as an `E400`
//! warning. Generation always completes; the program then fails to build at
//! the offending spot.

pub mod rust;

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde_json::Value;

use bosun_parser::{
    FunctionExpr, ModuleRef, Number, ObjectExpr, Span, TaskExpr, Uast, ValueExpr,
    error::{Diagnostic, ErrorCode},
};
use bosun_runtime::fns;

use crate::config::CodegenConfig;
use rust::{Expr, File, Function, Ident, Lit};

/// Parameter name of generated closures.
const CTX: &str = "ctx";

/// Generated program and the defects found while generating it.
#[derive(Debug, Clone)]
pub struct Generated {
    pub file: File,
    /// `E400` warnings, one per sentinel emitted.
    pub diagnostics: Vec<Diagnostic>,
}

impl Generated {
    /// Printed Rust source.
    pub fn source(&self) -> String {
        self.file.to_string()
    }
}

/// Generate the Rust program for a validated playbook.
///
/// `uast` must be in the explicit `module`/`args` form produced by
/// [`bosun_parser::validate::resolve`], and `modules` its module table.
pub fn generate(uast: &Uast, modules: &IndexMap<String, ModuleRef>, config: &CodegenConfig) -> Generated {
    let runtime = config.runtime_path();
    let mut generator = Generator {
        modules,
        diagnostics: Vec::new(),
        span: None,
    };

    let attributes = generator.attributes(&uast.attributes);
    let tasks = uast.tasks.iter().map(|task| generator.task(task)).collect();

    let file = File {
        header: vec!["Generated by bosun. Do not edit.".to_string()],
        uses: vec![format!("{runtime}::prelude::*")],
        functions: vec![
            Function::new(
                "playbook",
                Some("Playbook"),
                Expr::call("Playbook::new", vec![attributes, Expr::Vec(tasks)]),
            ),
            Function::new(
                "main",
                None,
                Expr::call(
                    format!("{runtime}::run_main"),
                    vec![Expr::call("playbook", vec![])],
                ),
            ),
        ],
    };

    info!(
        tasks = uast.tasks.len(),
        unresolved = generator.diagnostics.len();
        "Generated Rust program"
    );
    Generated {
        file,
        diagnostics: generator.diagnostics,
    }
}

struct Generator<'a> {
    modules: &'a IndexMap<String, ModuleRef>,
    diagnostics: Vec<Diagnostic>,
    /// Span of the task being generated.
    span: Option<Span>,
}

impl Generator<'_> {
    fn task(&mut self, task: &TaskExpr) -> Expr {
        self.span = Some(task.span);
        debug!(task = task.description; "Generating task");

        let mut expr = if task.is_compound() {
            let body = self.tasks(&task.body);
            let rescue = self.tasks(&task.rescue);
            let always = self.tasks(&task.always);
            self.span = Some(task.span);
            Expr::call(
                "Task::compound",
                vec![Expr::str(&task.description), body, rescue, always],
            )
        } else {
            let module = self.module(task);
            Expr::call(
                "Task::simple",
                vec![Expr::str(&task.description), Expr::call("Box::new", vec![module])],
            )
        };

        if let Some(when) = &task.when {
            expr = expr.method("with_when", vec![self.deferred_call(when)]);
        }
        expr
    }

    fn tasks(&mut self, tasks: &[TaskExpr]) -> Expr {
        Expr::Vec(tasks.iter().map(|task| self.task(task)).collect())
    }

    /// `path { field: <lazy>, ..Default::default() }`
    fn module(&mut self, task: &TaskExpr) -> Expr {
        let alias = task.module.as_deref().unwrap_or_default();
        let Some(module) = self.modules.get(alias) else {
            return self.unresolved(
                format!("module `{alias}` is not resolved"),
                "validate the playbook before generating code",
            );
        };

        let fields = task
            .args
            .iter()
            .map(|(key, value)| (self.field_name(key), self.deferred(value)))
            .collect();

        Expr::Struct {
            path: module.path.clone(),
            fields,
            rest: Some(Box::new(Expr::call("Default::default", vec![]))),
        }
    }

    fn field_name(&mut self, key: &str) -> Ident {
        match Ident::from_kebab(key) {
            Some(ident) => ident,
            None => {
                self.report(
                    format!("argument `{key}` is not a valid field name"),
                    "module arguments are kebab-case identifiers",
                );
                Ident::sentinel()
            }
        }
    }

    /// A `Lazy` evaluating `value`.
    fn deferred(&mut self, value: &ValueExpr) -> Expr {
        match value {
            ValueExpr::String(_) | ValueExpr::Bool(_) | ValueExpr::Number(_) => {
                Expr::call("lazy", vec![literal(value)])
            }
            ValueExpr::Function(function) => self.deferred_call(function),
            ValueExpr::Array(items) => Expr::call("Lazy::array", vec![self.deferred_items(items)]),
            ValueExpr::Object(members) => {
                Expr::call("Lazy::object", vec![self.deferred_members(members)])
            }
            ValueExpr::Unknown => self.unresolved("unknown value", "this is a compiler defect"),
        }
    }

    fn deferred_call(&mut self, function: &FunctionExpr) -> Expr {
        let call = self.call(function);
        Expr::call("Lazy::from_fn", vec![Expr::closure(CTX, call)])
    }

    fn deferred_items(&mut self, items: &[ValueExpr]) -> Expr {
        Expr::Vec(items.iter().map(|item| self.deferred(item)).collect())
    }

    fn deferred_members(&mut self, members: &ObjectExpr) -> Expr {
        Expr::Vec(
            members
                .iter()
                .map(|(key, value)| Expr::Tuple(vec![Expr::str(key), self.deferred(value)]))
                .collect(),
        )
    }

    /// An `Arg` expression, valid where `ctx` is in scope.
    fn argument(&mut self, value: &ValueExpr) -> Expr {
        match value {
            ValueExpr::String(_) | ValueExpr::Bool(_) | ValueExpr::Number(_) => Expr::call(
                "Ok",
                vec![Expr::call("Value::from", vec![literal(value)])],
            ),
            ValueExpr::Function(function) => self.call(function),
            ValueExpr::Array(items) => Expr::call(
                "expand_array",
                vec![Expr::path(CTX), self.deferred_items(items)],
            ),
            ValueExpr::Object(members) => Expr::call(
                "expand_object",
                vec![Expr::path(CTX), self.deferred_members(members)],
            ),
            ValueExpr::Unknown => self.unresolved("unknown value", "this is a compiler defect"),
        }
    }

    /// `fns::name(ctx, vec![args])`
    fn call(&mut self, function: &FunctionExpr) -> Expr {
        let name = &function.name;
        let ident = fns::lookup(name).and_then(|_| Ident::from_kebab(name));
        let Some(ident) = ident else {
            return self.unresolved(
                format!("unknown function `{name}`"),
                format!(
                    "available functions: {}",
                    fns::FUNCTIONS
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            );
        };

        let args = function.args.iter().map(|arg| self.argument(arg)).collect();
        Expr::call(
            format!("fns::{ident}"),
            vec![Expr::path(CTX), Expr::Vec(args)],
        )
    }

    /// Playbook attributes as a plain `Value`.
    fn attributes(&mut self, attributes: &ObjectExpr) -> Expr {
        Expr::call("object", vec![self.attribute_members(attributes)])
    }

    fn attribute_members(&mut self, members: &ObjectExpr) -> Expr {
        Expr::Vec(
            members
                .iter()
                .map(|(key, value)| Expr::Tuple(vec![Expr::str(key), self.attribute(value)]))
                .collect(),
        )
    }

    fn attribute(&mut self, value: &ValueExpr) -> Expr {
        match value {
            ValueExpr::String(_) | ValueExpr::Bool(_) | ValueExpr::Number(_) => {
                Expr::call("Value::from", vec![literal(value)])
            }
            ValueExpr::Array(items) => Expr::call(
                "Value::Array",
                vec![Expr::Vec(items.iter().map(|item| self.attribute(item)).collect())],
            ),
            ValueExpr::Object(members) => Expr::call("object", vec![self.attribute_members(members)]),
            ValueExpr::Function(function) => json(&function.to_json()),
            ValueExpr::Unknown => self.unresolved("unknown value", "this is a compiler defect"),
        }
    }

    /// Emit the sentinel and record why.
    fn unresolved(&mut self, message: impl Into<String>, help: impl Into<String>) -> Expr {
        let message = message.into();
        self.report(message.clone(), help);
        Expr::invalid(message)
    }

    fn report(&mut self, message: String, help: impl Into<String>) {
        warn!(message; "Emitting invalid identifier");
        let mut diagnostic = Diagnostic::warning(message)
            .with_code(ErrorCode::E400)
            .with_help(help);
        if let Some(span) = self.span {
            diagnostic = diagnostic.with_label(span, "in this task");
        }
        self.diagnostics.push(diagnostic);
    }
}

fn literal(value: &ValueExpr) -> Expr {
    let lit = match value {
        ValueExpr::String(text) => Lit::Str(text.clone()),
        ValueExpr::Bool(b) => Lit::Bool(*b),
        ValueExpr::Number(Number::Int(n)) => Lit::Int(*n),
        ValueExpr::Number(Number::Float(x)) => Lit::Float(*x),
        _ => return Expr::invalid("not a literal"),
    };
    Expr::Lit(lit)
}

/// A `Value` expression for serialized data.
fn json(value: &Value) -> Expr {
    match value {
        Value::Null => Expr::path("Value::Null"),
        Value::Bool(b) => Expr::call("Value::from", vec![Expr::Lit(Lit::Bool(*b))]),
        Value::Number(n) => {
            let lit = match n.as_i64() {
                Some(n) => Lit::Int(n),
                None => Lit::Float(n.as_f64().unwrap_or_default()),
            };
            Expr::call("Value::from", vec![Expr::Lit(lit)])
        }
        Value::String(text) => Expr::call("Value::from", vec![Expr::str(text)]),
        Value::Array(items) => Expr::call(
            "Value::Array",
            vec![Expr::Vec(items.iter().map(json).collect())],
        ),
        Value::Object(members) => Expr::call(
            "object",
            vec![Expr::Vec(
                members
                    .iter()
                    .map(|(key, value)| Expr::Tuple(vec![Expr::str(key), json(value)]))
                    .collect(),
            )],
        ),
    }
}

#[cfg(test)]
mod tests {
    use bosun_parser::analyze;

    use super::*;
    use crate::config::AppConfig;

    fn generate_source(source: &str) -> Generated {
        let resolved = analyze(source, AppConfig::default().modules()).expect("playbook should validate");
        generate(&resolved.uast, &resolved.modules, &CodegenConfig::default())
    }

    /// Source without layout: no whitespace, no trailing commas.
    fn compact(source: &str) -> String {
        source
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .replace(",)", ")")
            .replace(",]", "]")
            .replace(",}", "}")
    }

    fn assert_generates(playbook: &str, expected: &str) {
        let source = generate_source(playbook).source();
        assert!(
            compact(&source).contains(&compact(expected)),
            "expected `{expected}` in:\n{source}"
        );
    }

    #[test]
    fn test_program_shape() {
        let generated = generate_source("name: 'empty'\n");
        let source = generated.source();

        assert!(source.starts_with("// Generated by bosun. Do not edit.\n\nuse bosun_runtime::prelude::*;\n"));
        assert!(source.contains(
            "fn playbook() -> Playbook {\n    Playbook::new(object(vec![(\"name\", Value::from(\"empty\"))]), vec![])\n}\n"
        ));
        assert!(source.contains("fn main() {\n    bosun_runtime::run_main(playbook())\n}\n"));
        assert!(generated.diagnostics.is_empty());
    }

    #[test]
    fn test_simple_task_fields() {
        assert_generates(
            "task [greet] { debug: { msg: 'hi', verbose: true, } }",
            r#"Task::simple("greet", Box::new(bosun_runtime::modules::Debug { msg: lazy("hi"), verbose: lazy(true), ..Default::default() }))"#,
        );
    }

    #[test]
    fn test_deferred_and_eager_values() {
        assert_generates(
            "task [t] { debug: { msg: concat('x', vars.env, [1, 2.5,],), } }",
            r#"Lazy::from_fn(|ctx| fns::concat(ctx, vec![Ok(Value::from("x")), fns::vars(ctx, vec![Ok(Value::from("env"))]), expand_array(ctx, vec![lazy(1), lazy(2.5)])]))"#,
        );
    }

    #[test]
    fn test_nested_aggregates_stay_deferred() {
        assert_generates(
            "task [t] { debug: { msg: { hosts: ['a', vars.host,], }, } }",
            r#"msg: Lazy::object(vec![("hosts", Lazy::array(vec![lazy("a"), Lazy::from_fn(|ctx| fns::vars(ctx, vec![Ok(Value::from("host"))]))]))])"#,
        );
    }

    #[test]
    fn test_when_and_compound() {
        let playbook = "block { name: 'outer' when: not(vars.skip,) task [a] { debug: { msg: 'a', } } } rescue { task [r] { fail: {} } }";

        assert_generates(playbook, r#"Task::compound("outer", vec!["#);
        assert_generates(playbook, "bosun_runtime::modules::Fail { ..Default::default() }");
        assert_generates(
            playbook,
            r#".with_when(Lazy::from_fn(|ctx| fns::not(ctx, vec![fns::vars(ctx, vec![Ok(Value::from("skip"))])])))"#,
        );
    }

    #[test]
    fn test_unknown_function_emits_sentinel_and_warning() {
        let generated = generate_source("task [t] { debug: { msg: shout('x',), } }");

        assert!(
            generated
                .source()
                .contains("/* unknown function `shout` */ __bosun_invalid_identifier__")
        );
        assert_eq!(generated.diagnostics.len(), 1);
        let diag = &generated.diagnostics[0];
        assert_eq!(diag.code(), Some(ErrorCode::E400));
        assert!(diag.severity().is_warning());
        assert_eq!(diag.labels().len(), 1);
    }

    #[test]
    fn test_invalid_argument_name_is_reported() {
        let generated = generate_source("task [t] { debug: { 'two words': 1, } }");

        assert!(generated.source().contains("__bosun_invalid_identifier__: lazy(1)"));
        assert_eq!(generated.diagnostics.len(), 1);
    }

    #[test]
    fn test_keyword_names_use_raw_identifiers() {
        assert_generates("task [t] { debug: { msg: mod(7, 2,), } }", "fns::r#mod(ctx");
    }

    #[test]
    fn test_attribute_functions_are_serialized() {
        assert_generates(
            "name: 'x'\nowner: vars.team\n",
            r#"("owner", Value::Array(vec![Value::from("vars"), Value::from("team")]))"#,
        );
    }

    #[test]
    fn test_generation_is_deterministic() {
        let playbook = "name: 'd'\ntask [a] { debug: { msg: format('{}-{}', vars.a, 1 + 2,), } }\n";
        assert_eq!(generate_source(playbook).source(), generate_source(playbook).source());
    }
}

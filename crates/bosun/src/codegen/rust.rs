//! A small Rust syntax tree, just large enough for generated playbooks, and
//! its printer.
//!
//! The printer lays an expression out on one line when it fits in
//! [`MAX_WIDTH`] columns and otherwise breaks its argument lists one item per
//! line with trailing commas, the way `rustfmt` does. Output is deterministic.

use std::fmt::{self, Write};

/// Column limit for single-line expressions.
pub const MAX_WIDTH: usize = 100;

const INDENT: &str = "    ";

/// Identifier emitted in place of anything that cannot be resolved. It is
/// never defined, so the program fails to build at that spot.
pub const INVALID_IDENTIFIER: &str = "__bosun_invalid_identifier__";

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Keywords that have no raw form.
const RESERVED: &[&str] = &["_", "crate", "self", "Self", "super"];

/// A valid Rust identifier, raw if it is a keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(String);

impl Ident {
    /// Convert a playbook name (`kebab-case`) into an identifier.
    ///
    /// Returns `None` if the name cannot be a Rust identifier.
    pub fn from_kebab(name: &str) -> Option<Self> {
        let name = name.replace('-', "_");
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid || RESERVED.contains(&name.as_str()) {
            return None;
        }

        if KEYWORDS.contains(&name.as_str()) {
            Some(Self(format!("r#{name}")))
        } else {
            Some(Self(name))
        }
    }

    /// [`INVALID_IDENTIFIER`] in identifier position.
    pub fn sentinel() -> Self {
        Self(INVALID_IDENTIFIER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `str`'s Debug form is a valid Rust string literal.
            Lit::Str(text) => write!(f, "{text:?}"),
            Lit::Int(n) if i32::try_from(*n).is_ok() => write!(f, "{n}"),
            Lit::Int(n) => write!(f, "{n}_i64"),
            Lit::Float(x) => {
                let text = x.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{text}.0")
                }
            }
            Lit::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `a::b::c`
    Path(String),
    Lit(Lit),
    /// `callee(args)`
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `receiver.method(args)`
    MethodCall {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    /// `path { field: value, ..rest }`
    Struct {
        path: String,
        fields: Vec<(Ident, Expr)>,
        rest: Option<Box<Expr>>,
    },
    /// `|params| body`
    Closure { params: Vec<Ident>, body: Box<Expr> },
    /// `vec![items]`
    Vec(Vec<Expr>),
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `/* comment */ expr`
    Commented { comment: String, expr: Box<Expr> },
}

impl Expr {
    pub fn path(path: impl Into<String>) -> Self {
        Expr::Path(path.into())
    }

    pub fn str(text: impl Into<String>) -> Self {
        Expr::Lit(Lit::Str(text.into()))
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(Expr::Path(callee.into())),
            args,
        }
    }

    /// `self.method(args)`; `method` must be a plain identifier.
    pub fn method(self, method: &str, args: Vec<Expr>) -> Self {
        Expr::MethodCall {
            receiver: Box::new(self),
            method: Ident(method.to_string()),
            args,
        }
    }

    pub fn closure(param: &str, body: Expr) -> Self {
        Expr::Closure {
            params: vec![Ident(param.to_string())],
            body: Box::new(body),
        }
    }

    /// The sentinel identifier, annotated with what could not be resolved.
    pub fn invalid(comment: impl Into<String>) -> Self {
        Expr::Commented {
            comment: comment.into(),
            expr: Box::new(Expr::Path(INVALID_IDENTIFIER.to_string())),
        }
    }

    /// Single-line rendering.
    fn flat(&self) -> String {
        let mut out = String::new();
        self.write_flat(&mut out);
        out
    }

    fn write_flat(&self, out: &mut String) {
        match self {
            Expr::Path(path) => out.push_str(path),
            Expr::Lit(lit) => {
                let _ = write!(out, "{lit}");
            }
            Expr::Call { callee, args } => {
                callee.write_flat(out);
                write_flat_list(out, "(", args, ")");
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                receiver.write_flat(out);
                let _ = write!(out, ".{method}");
                write_flat_list(out, "(", args, ")");
            }
            Expr::Struct { path, fields, rest } => {
                out.push_str(path);
                if fields.is_empty() && rest.is_none() {
                    out.push_str(" {}");
                    return;
                }
                out.push_str(" { ");
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{name}: ");
                    value.write_flat(out);
                }
                if let Some(rest) = rest {
                    if !fields.is_empty() {
                        out.push_str(", ");
                    }
                    out.push_str("..");
                    rest.write_flat(out);
                }
                out.push_str(" }");
            }
            Expr::Closure { params, body } => {
                out.push('|');
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(param.as_str());
                }
                out.push_str("| ");
                body.write_flat(out);
            }
            Expr::Vec(items) => {
                out.push_str("vec!");
                write_flat_list(out, "[", items, "]");
            }
            Expr::Tuple(items) => write_flat_list(out, "(", items, ")"),
            Expr::Commented { comment, expr } => {
                let _ = write!(out, "/* {} */ ", comment.replace("*/", "* /"));
                expr.write_flat(out);
            }
        }
    }
}

fn write_flat_list(out: &mut String, open: &str, items: &[Expr], close: &str) {
    out.push_str(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_flat(out);
    }
    out.push_str(close);
}

/// A function without parameters whose body is a single expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Ident,
    pub output: Option<String>,
    pub body: Expr,
}

impl Function {
    pub fn new(name: &str, output: Option<&str>, body: Expr) -> Self {
        Self {
            name: Ident(name.to_string()),
            output: output.map(str::to_string),
            body,
        }
    }
}

/// A source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    /// `//` comment lines at the top.
    pub header: Vec<String>,
    /// Paths of `use` declarations.
    pub uses: Vec<String>,
    pub functions: Vec<Function>,
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::default();
        printer.file(self);
        f.write_str(&printer.out)
    }
}

#[derive(Default)]
struct Printer {
    out: String,
}

impl Printer {
    fn file(&mut self, file: &File) {
        for line in &file.header {
            self.out.push_str("// ");
            self.out.push_str(line);
            self.out.push('\n');
        }
        if !file.header.is_empty() {
            self.out.push('\n');
        }

        for path in &file.uses {
            self.out.push_str("use ");
            self.out.push_str(path);
            self.out.push_str(";\n");
        }

        for function in &file.functions {
            self.out.push('\n');
            self.function(function);
        }
    }

    fn function(&mut self, function: &Function) {
        let _ = write!(self.out, "fn {}()", function.name);
        if let Some(output) = &function.output {
            let _ = write!(self.out, " -> {output}");
        }
        self.out.push_str(" {\n");
        self.indent(1);
        self.expr(&function.body, 1, 0);
        self.out.push_str("\n}\n");
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
    }

    /// Write `expr` at the cursor; `level` is the indentation of the
    /// current line and `lead` the width already written on it.
    fn expr(&mut self, expr: &Expr, level: usize, lead: usize) {
        let flat = expr.flat();
        if level * INDENT.len() + lead + flat.len() <= MAX_WIDTH {
            self.out.push_str(&flat);
            return;
        }

        match expr {
            Expr::Call { callee, args } => {
                self.expr(callee, level, lead);
                self.list("(", args, ")", level);
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.expr(receiver, level, lead);
                self.out.push('\n');
                self.indent(level);
                let _ = write!(self.out, ".{method}");
                self.list("(", args, ")", level);
            }
            Expr::Struct { path, fields, rest } => {
                self.out.push_str(path);
                self.out.push_str(" {\n");
                for (name, value) in fields {
                    self.indent(level + 1);
                    let _ = write!(self.out, "{name}: ");
                    self.expr(value, level + 1, name.as_str().len() + 2);
                    self.out.push_str(",\n");
                }
                if let Some(rest) = rest {
                    self.indent(level + 1);
                    self.out.push_str("..");
                    self.expr(rest, level + 1, 2);
                    self.out.push('\n');
                }
                self.indent(level);
                self.out.push('}');
            }
            Expr::Closure { params, body } => {
                let head = format!(
                    "|{}| ",
                    params
                        .iter()
                        .map(Ident::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.out.push_str(&head);
                self.expr(body, level, lead + head.len());
            }
            Expr::Vec(items) => {
                self.out.push_str("vec!");
                self.list("[", items, "]", level);
            }
            Expr::Tuple(items) => self.list("(", items, ")", level),
            Expr::Commented { comment, expr } => {
                let head = format!("/* {} */ ", comment.replace("*/", "* /"));
                self.out.push_str(&head);
                self.expr(expr, level, lead + head.len());
            }
            Expr::Path(_) | Expr::Lit(_) => self.out.push_str(&flat),
        }
    }

    fn list(&mut self, open: &str, items: &[Expr], close: &str, level: usize) {
        self.out.push_str(open);
        if items.is_empty() {
            self.out.push_str(close);
            return;
        }
        self.out.push('\n');
        for item in items {
            self.indent(level + 1);
            self.expr(item, level + 1, 0);
            self.out.push_str(",\n");
        }
        self.indent(level);
        self.out.push_str(close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_from_kebab() {
        assert_eq!(Ident::from_kebab("is-empty").unwrap().as_str(), "is_empty");
        assert_eq!(Ident::from_kebab("mod").unwrap().as_str(), "r#mod");
        assert_eq!(Ident::from_kebab("type").unwrap().as_str(), "r#type");
        assert!(Ident::from_kebab("self").is_none());
        assert!(Ident::from_kebab("a b").is_none());
        assert!(Ident::from_kebab("9lives").is_none());
        assert!(Ident::from_kebab("").is_none());
    }

    #[test]
    fn test_literals() {
        assert_eq!(Lit::Str("it's \"q\"\n".into()).to_string(), r#""it's \"q\"\n""#);
        assert_eq!(Lit::Int(-3).to_string(), "-3");
        assert_eq!(Lit::Int(i64::MAX).to_string(), "9223372036854775807_i64");
        assert_eq!(Lit::Float(2.0).to_string(), "2.0");
        assert_eq!(Lit::Float(0.25).to_string(), "0.25");
        assert_eq!(Lit::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_short_expression_stays_on_one_line() {
        let expr = Expr::call("fns::add", vec![Expr::path("ctx"), Expr::Vec(vec![])]);
        assert_eq!(expr.flat(), "fns::add(ctx, vec![])");
    }

    #[test]
    fn test_long_call_breaks_arguments() {
        let long = "x".repeat(60);
        let file = File {
            header: vec![],
            uses: vec![],
            functions: vec![Function::new(
                "f",
                None,
                Expr::call("g", vec![Expr::str(long.clone()), Expr::str(long.clone())]),
            )],
        };

        let expected = format!("\nfn f() {{\n    g(\n        \"{long}\",\n        \"{long}\",\n    )\n}}\n");
        assert_eq!(file.to_string(), expected);
    }

    #[test]
    fn test_struct_with_rest() {
        let expr = Expr::Struct {
            path: "m::Debug".into(),
            fields: vec![(Ident::from_kebab("msg").unwrap(), Expr::str("hi"))],
            rest: Some(Box::new(Expr::call("Default::default", vec![]))),
        };
        assert_eq!(expr.flat(), r#"m::Debug { msg: "hi", ..Default::default() }"#);
    }

    #[test]
    fn test_invalid_identifier_comment_cannot_close_early() {
        let expr = Expr::invalid("unknown function `a*/b`");
        assert_eq!(
            expr.flat(),
            "/* unknown function `a* /b` */ __bosun_invalid_identifier__"
        );
    }
}

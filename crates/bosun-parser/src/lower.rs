//! Lowering from the [`ParseTree`] to the [`Uast`].
//!
//! This is a structural walk only: every shape the grammar accepts has a
//! lowering, and keys a task does not recognize are kept in
//! [`TaskExpr::extra`] for validation to judge. A node whose shape the
//! grammar cannot produce is reported as an internal `E300` diagnostic.

use log::trace;

use crate::{
    error::{Diagnostic, ErrorCode},
    tree::{NodeId, ParseTree, Rule},
    uast::{TaskExpr, Uast},
    value::{FunctionExpr, Number, ObjectExpr, ValueExpr},
};

/// Lower a parse tree produced from `source` into a [`Uast`].
///
/// # Errors
///
/// Returns an `E300` diagnostic if a node does not have the shape its rule
/// guarantees.
pub fn lower(tree: &ParseTree, source: &str) -> Result<Uast, Diagnostic> {
    Lowering { tree, source }.entry()
}

/// Lower a tree produced by [`parse_value`](crate::parser::parse_value).
pub fn lower_value(tree: &ParseTree, source: &str) -> Result<ValueExpr, Diagnostic> {
    Lowering { tree, source }.value(tree.root())
}

struct Lowering<'a> {
    tree: &'a ParseTree,
    source: &'a str,
}

impl Lowering<'_> {
    fn malformed(&self, id: NodeId, what: &str) -> Diagnostic {
        let rule = self.tree.rule(id);
        Diagnostic::error(format!("malformed `{rule}` node: {what}"))
            .with_code(ErrorCode::E300)
            .with_label(self.tree.span(id), ErrorCode::E300.description())
            .with_help("this is a bug in the parser; please report it")
    }

    fn text(&self, id: NodeId) -> &str {
        self.tree.text(id, self.source)
    }

    /// Text of a `string` node without its quotes.
    fn unquoted(&self, id: NodeId) -> Result<String, Diagnostic> {
        self.text(id)
            .strip_prefix('\'')
            .and_then(|text| text.strip_suffix('\''))
            .map(str::to_string)
            .ok_or_else(|| self.malformed(id, "string without quotes"))
    }

    fn entry(&self) -> Result<Uast, Diagnostic> {
        let root = self.tree.root();
        let mut uast = Uast::default();

        for child in self.tree.children(root) {
            match self.tree.rule(child) {
                Rule::Pair => {
                    let (key, value) = self.pair(child)?;
                    uast.attributes.insert(key, value);
                }
                Rule::SimpleBlock | Rule::CompoundBlock => uast.tasks.push(self.block(child)?),
                _ => return Err(self.malformed(child, "expected a pair or a block")),
            }
        }

        trace!(
            attributes = uast.attributes.len(),
            tasks = uast.tasks.len();
            "Lowered playbook"
        );
        Ok(uast)
    }

    fn pair(&self, id: NodeId) -> Result<(String, ValueExpr), Diagnostic> {
        let mut children = self.tree.children(id);
        let (Some(key), Some(value), None) = (children.next(), children.next(), children.next())
        else {
            return Err(self.malformed(id, "expected a key and a value"));
        };

        let key = match self.tree.rule(key) {
            Rule::Ident => self.text(key).to_string(),
            Rule::String => self.unquoted(key)?,
            _ => return Err(self.malformed(key, "expected an identifier or string key")),
        };
        Ok((key, self.value(value)?))
    }

    fn object(&self, id: NodeId) -> Result<ObjectExpr, Diagnostic> {
        let mut object = ObjectExpr::new();
        for child in self.tree.children(id) {
            let (key, value) = self.pair(child)?;
            object.insert(key, value);
        }
        Ok(object)
    }

    fn value(&self, id: NodeId) -> Result<ValueExpr, Diagnostic> {
        match self.tree.rule(id) {
            Rule::String => self.unquoted(id).map(ValueExpr::String),
            Rule::Bool => Ok(ValueExpr::Bool(self.text(id) == "true")),
            Rule::Number => Number::parse(self.text(id))
                .map(ValueExpr::Number)
                .ok_or_else(|| self.malformed(id, "invalid number")),
            Rule::Array => self
                .tree
                .children(id)
                .map(|item| self.value(item))
                .collect::<Result<_, _>>()
                .map(ValueExpr::Array),
            Rule::Object => self.object(id).map(ValueExpr::Object),
            Rule::FunExpr => self.fun_expr(id).map(ValueExpr::Function),
            Rule::IndexExpr => self.index_expr(id).map(ValueExpr::Function),
            Rule::MathExpr | Rule::MathTerm => self.math(id),
            _ => Err(self.malformed(id, "expected a value")),
        }
    }

    /// Leading identifier of a call or index expression.
    fn head(&self, id: NodeId) -> Result<String, Diagnostic> {
        self.tree
            .children(id)
            .next()
            .filter(|head| self.tree.rule(*head) == Rule::Ident)
            .map(|head| self.text(head).to_string())
            .ok_or_else(|| self.malformed(id, "missing leading identifier"))
    }

    fn fun_expr(&self, id: NodeId) -> Result<FunctionExpr, Diagnostic> {
        let name = self.head(id)?;
        let args = self
            .tree
            .children(id)
            .skip(1)
            .map(|arg| self.value(arg))
            .collect::<Result<_, _>>()?;
        Ok(FunctionExpr::new(name, args))
    }

    /// `a.b[c d]` lowers to `a('b', 'c d',)`.
    fn index_expr(&self, id: NodeId) -> Result<FunctionExpr, Diagnostic> {
        let name = self.head(id)?;
        let args = self
            .tree
            .children(id)
            .skip(1)
            .map(|segment| match self.tree.rule(segment) {
                Rule::IndexSegment | Rule::Sentence => {
                    Ok(ValueExpr::String(self.text(segment).to_string()))
                }
                _ => Err(self.malformed(segment, "expected an index segment")),
            })
            .collect::<Result<_, _>>()?;
        Ok(FunctionExpr::new(name, args))
    }

    /// Operands and operators alternate; fold them left to right.
    fn math(&self, id: NodeId) -> Result<ValueExpr, Diagnostic> {
        let mut children = self.tree.children(id);
        let first = children
            .next()
            .ok_or_else(|| self.malformed(id, "missing operand"))?;
        let mut acc = self.value(first)?;

        while let Some(op) = children.next() {
            let name = match self.text(op) {
                "+" => "add",
                "-" => "sub",
                "*" => "mul",
                "/" => "div",
                _ => return Err(self.malformed(op, "expected an operator")),
            };
            let rhs = children
                .next()
                .ok_or_else(|| self.malformed(id, "operator without right operand"))?;
            acc = ValueExpr::Function(FunctionExpr::new(name, vec![acc, self.value(rhs)?]));
        }

        Ok(acc)
    }

    fn block(&self, id: NodeId) -> Result<TaskExpr, Diagnostic> {
        match self.tree.rule(id) {
            Rule::SimpleBlock => self.simple_block(id),
            Rule::CompoundBlock => self.compound_block(id),
            _ => Err(self.malformed(id, "expected a block")),
        }
    }

    fn blocks(&self, id: NodeId) -> Result<Vec<TaskExpr>, Diagnostic> {
        self.tree.children(id).map(|child| self.block(child)).collect()
    }

    fn simple_block(&self, id: NodeId) -> Result<TaskExpr, Diagnostic> {
        let description = self
            .tree
            .find_child(id, Rule::Sentence)
            .map(|sentence| self.text(sentence).to_string())
            .unwrap_or_default();

        let mut task = TaskExpr {
            description,
            span: self.tree.span(id),
            ..TaskExpr::default()
        };

        for pair in self.tree.children_of(id, Rule::Pair) {
            let (key, value) = self.pair(pair)?;
            match (key.as_str(), value) {
                ("module", ValueExpr::String(module)) if task.module.is_none() => {
                    task.module = Some(module);
                }
                ("args", ValueExpr::Object(args)) if task.args.is_empty() => task.args = args,
                ("when", ValueExpr::Function(when)) if task.when.is_none() => {
                    task.when = Some(when);
                }
                (_, value) => {
                    task.extra.insert(key, value);
                }
            }
        }

        Ok(task)
    }

    fn compound_block(&self, id: NodeId) -> Result<TaskExpr, Diagnostic> {
        let mut task = TaskExpr {
            span: self.tree.span(id),
            ..TaskExpr::default()
        };

        for child in self.tree.children(id) {
            match self.tree.rule(child) {
                Rule::Pair => {
                    let (key, value) = self.pair(child)?;
                    match (key.as_str(), value) {
                        ("name", ValueExpr::String(name)) if task.description.is_empty() => {
                            task.description = name;
                        }
                        ("when", ValueExpr::Function(when)) if task.when.is_none() => {
                            task.when = Some(when);
                        }
                        (_, value) => {
                            task.extra.insert(key, value);
                        }
                    }
                }
                Rule::Body => task.body = self.blocks(child)?,
                Rule::Rescue => task.rescue = self.blocks(child)?,
                Rule::Always => task.always = self.blocks(child)?,
                _ => return Err(self.malformed(child, "unexpected child of a compound block")),
            }
        }

        if task.body.is_empty() {
            return Err(self.malformed(id, "compound block without a body"));
        }
        Ok(task)
    }
}

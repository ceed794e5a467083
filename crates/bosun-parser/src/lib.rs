//! # Bosun Parser
//!
//! Front end of the Bosun playbook compiler. This crate takes playbook
//! source text through parsing, lowering and module validation, producing
//! the typed intermediate representation the code generator consumes.
//!
//! ## Usage
//!
//! ```
//! # use bosun_parser::{analyze, error::ParseError};
//! # use indexmap::IndexMap;
//!
//! fn main() -> Result<(), ParseError> {
//!     let source = r#"
//!         name: 'hello'
//!         imports: { debug: 'bosun_runtime::modules::Debug', }
//!
//!         task [greet] {
//!             debug: { msg: concat('hello, ', vars.who,), }
//!         }
//!     "#;
//!
//!     let resolved = analyze(source, &IndexMap::new())?;
//!     assert_eq!(resolved.uast.tasks[0].module.as_deref(), Some("debug"));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod lower;
pub mod parser;
#[cfg(test)]
mod parser_tests;
pub mod span;
pub mod tree;
pub mod uast;
pub mod validate;
pub mod value;

pub use span::Span;
pub use uast::{TaskExpr, Uast};
pub use validate::{ModuleRef, Resolved};
pub use value::{FunctionExpr, Number, ObjectExpr, ValueExpr, ValueType};

use indexmap::IndexMap;
use log::debug;

use error::ParseError;

/// Parse and lower source text into a [`Uast`].
///
/// 1. **Parse** - Build the parse tree
/// 2. **Lower** - Walk the tree into the typed representation
///
/// # Errors
///
/// Returns a [`ParseError`] with the parse or lowering diagnostic.
pub fn build_uast(source: &str) -> Result<Uast, ParseError> {
    let tree = parser::parse(source)?;
    debug!(nodes = tree.len(); "Parse tree built");

    let uast = lower::lower(&tree, source)?;
    Ok(uast)
}

/// Run the whole front end: parse, lower, then resolve modules against
/// `declared` (alias to Rust path) and validate every task.
///
/// # Errors
///
/// Returns a [`ParseError`] with the diagnostics of the first failing stage;
/// validation reports all of its findings at once.
pub fn analyze(source: &str, declared: &IndexMap<String, String>) -> Result<Resolved, ParseError> {
    let uast = build_uast(source)?;
    validate::resolve(&uast, declared)
}

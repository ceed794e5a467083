//! Runtime for programs generated by the Bosun compiler.
//!
//! A compiled playbook is a Rust program that builds a [`Playbook`] of
//! [`Task`]s and hands it to [`run_main`]. Module fields are [`Lazy`] values
//! that read playbook inputs and the outputs of earlier tasks from the
//! [`Context`] when the task runs.
//!
//! # Example
//!
//! ```
//! use bosun_runtime::{modules::Debug, prelude::*};
//!
//! let mut playbook = Playbook::new(
//!     object(vec![("name", Value::from("hello"))]),
//!     vec![Task::simple(
//!         "greet",
//!         Box::new(Debug {
//!             msg: Lazy::from_fn(|ctx| {
//!                 fns::format(ctx, vec![Ok(Value::from("hello {}")), Ok(Value::from("world"))])
//!             }),
//!             ..Default::default()
//!         }),
//!     )],
//! );
//!
//! let mut ctx = playbook.context(Default::default()).unwrap();
//! let report = playbook.run(&mut ctx).unwrap();
//! assert!(report.succeeded());
//! assert_eq!(ctx.state["greet"]["msg"], "hello world");
//! ```

mod cli;
mod context;
pub mod fns;
mod lazy;
mod module;
pub mod modules;
mod playbook;
mod task;

pub use cli::{RunArgs, failure_json, run, run_main};
pub use context::Context;
pub use lazy::{Arg, Lazy, LazyError, expand_array, expand_object, lazy, object};
pub use module::{Module, ModuleError, TaskResult};
pub use playbook::{INPUTS_ATTRIBUTE, Playbook, RuntimeError};
pub use task::{COMPOUND_MODULE, RunReport, Task, TaskRecord};

/// Everything generated code refers to.
pub mod prelude {
    pub use serde_json::Value;

    pub use crate::{
        Arg, Context, Lazy, LazyError, Module, Playbook, Task, TaskResult, expand_array,
        expand_object, fns, lazy, object,
    };
}

//! Deferred values resolved against the run-time [`Context`].
//!
//! Every module field of a generated program is a [`Lazy`], because a value
//! written in the playbook may depend on inputs or on the output of earlier
//! tasks. Evaluation errors travel as values ([`Arg`]) so that a failing
//! lookup deep inside an expression surfaces as the task's error.

use std::{fmt, marker::PhantomData};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::Context;

/// An evaluated argument: a value, or the first error met while computing it.
pub type Arg = Result<Value, LazyError>;

/// Errors raised while evaluating lazy values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LazyError {
    #[error("no value at `{path}`")]
    Missing { path: String },

    #[error("{function}: expected {expected}, found {found}")]
    Argument {
        function: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("{function}: expected {expected} arguments, got {found}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("{function}: division by zero")]
    DivisionByZero { function: &'static str },

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("value does not fit the field: {0}")]
    Type(String),
}

type Thunk = Box<dyn Fn(&Context) -> Arg>;

/// A value of type `T` computed on demand from a [`Context`].
pub struct Lazy<T = Value> {
    thunk: Thunk,
    _type: PhantomData<fn() -> T>,
}

impl<T> Lazy<T> {
    pub fn from_fn(thunk: impl Fn(&Context) -> Arg + 'static) -> Self {
        Self {
            thunk: Box::new(thunk),
            _type: PhantomData,
        }
    }

    /// A lazy array whose elements are evaluated in order.
    pub fn array(items: Vec<Lazy<Value>>) -> Self {
        Self::from_fn(move |ctx| expand(ctx, &items))
    }

    /// A lazy object whose members are evaluated in order.
    pub fn object(members: Vec<(&'static str, Lazy<Value>)>) -> Self {
        Self::from_fn(move |ctx| expand_members(ctx, &members))
    }

    /// Evaluate without converting to `T`.
    pub fn value(&self, ctx: &Context) -> Arg {
        (self.thunk)(ctx)
    }
}

impl<T: DeserializeOwned> Lazy<T> {
    /// Evaluate and convert to `T`.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error, or [`LazyError::Type`] if the value does
    /// not deserialize into `T`.
    pub fn eval(&self, ctx: &Context) -> Result<T, LazyError> {
        let value = self.value(ctx)?;
        serde_json::from_value(value).map_err(|err| LazyError::Type(err.to_string()))
    }
}

/// Evaluates to `null`.
impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Self::from_fn(|_| Ok(Value::Null))
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(..)")
    }
}

/// A lazy value that is already known.
pub fn lazy<T>(value: impl Into<Value>) -> Lazy<T> {
    let value = value.into();
    Lazy::from_fn(move |_| Ok(value.clone()))
}

/// Evaluate `items` in order into an array, stopping at the first error.
pub fn expand_array(ctx: &Context, items: Vec<Lazy<Value>>) -> Arg {
    expand(ctx, &items)
}

/// Evaluate `members` in order into an object, stopping at the first error.
pub fn expand_object(ctx: &Context, members: Vec<(&'static str, Lazy<Value>)>) -> Arg {
    expand_members(ctx, &members)
}

fn expand(ctx: &Context, items: &[Lazy<Value>]) -> Arg {
    items
        .iter()
        .map(|item| item.value(ctx))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn expand_members(ctx: &Context, members: &[(&'static str, Lazy<Value>)]) -> Arg {
    members
        .iter()
        .map(|(key, member)| Ok((key.to_string(), member.value(ctx)?)))
        .collect::<Result<Map<_, _>, _>>()
        .map(Value::Object)
}

/// Build an object value from literal members.
pub fn object(members: Vec<(&str, Value)>) -> Value {
    Value::Object(
        members
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

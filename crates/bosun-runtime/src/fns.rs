//! Functions callable from playbook expressions.
//!
//! Every function has the same shape, `fn(&Context, Vec<Arg>) -> Arg`, and
//! returns the first error among its arguments before doing any work of its
//! own. DSL names use kebab-case; the Rust names are their snake_case form
//! (`is-empty` is [`is_empty`], `mod` is [`r#mod`]).

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::{
    context::Context,
    lazy::{Arg, LazyError},
};

/// A runtime function.
pub type Function = fn(&Context, Vec<Arg>) -> Arg;

/// Every function by its DSL name.
pub const FUNCTIONS: &[(&str, Function)] = &[
    ("vars", vars),
    ("state", state),
    ("concat", concat),
    ("join", join),
    ("lower", lower),
    ("upper", upper),
    ("trim", trim),
    ("replace", replace),
    ("split", split),
    ("format", format),
    ("len", len),
    ("add", add),
    ("sub", sub),
    ("mul", mul),
    ("div", div),
    ("mod", r#mod),
    ("eq", eq),
    ("ne", ne),
    ("lt", lt),
    ("le", le),
    ("gt", gt),
    ("ge", ge),
    ("not", not),
    ("and", and),
    ("or", or),
    ("contains", contains),
    ("is-empty", is_empty),
    ("default", default),
];

/// Look up a function by its DSL name.
pub fn lookup(name: &str) -> Option<Function> {
    FUNCTIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, function)| *function)
}

/// Call a function by its DSL name.
pub fn call(name: &str, ctx: &Context, args: Vec<Arg>) -> Arg {
    match lookup(name) {
        Some(function) => function(ctx, args),
        None => Err(LazyError::UnknownFunction(name.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn values(args: Vec<Arg>) -> Result<Vec<Value>, LazyError> {
    args.into_iter().collect()
}

fn exactly<const N: usize>(function: &'static str, args: Vec<Arg>) -> Result<[Value; N], LazyError> {
    let values = values(args)?;
    let found = values.len();
    values.try_into().map_err(|_| LazyError::Arity {
        function,
        expected: arity_name(N),
        found,
    })
}

fn arity_name(n: usize) -> &'static str {
    match n {
        0 => "no",
        1 => "1",
        2 => "2",
        3 => "3",
        _ => "several",
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(function: &'static str, expected: &'static str, found: &Value) -> LazyError {
    LazyError::Argument {
        function,
        expected,
        found: kind(found).to_string(),
    }
}

fn string(function: &'static str, value: Value) -> Result<String, LazyError> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(expected(function, "a string", &other)),
    }
}

fn boolean(function: &'static str, value: &Value) -> Result<bool, LazyError> {
    value.as_bool().ok_or_else(|| expected(function, "a bool", value))
}

fn segments(function: &'static str, args: Vec<Arg>) -> Result<Vec<String>, LazyError> {
    values(args)?
        .into_iter()
        .map(|segment| match segment {
            Value::Number(number) => Ok(number.to_string()),
            other => string(function, other),
        })
        .collect()
}

/// Text form used when values are spliced into strings.
fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

/// `vars.a.b`: a playbook input, or all inputs without a path.
pub fn vars(ctx: &Context, args: Vec<Arg>) -> Arg {
    let path = segments("vars", args)?;
    if path.is_empty() {
        return Ok(Value::Object(ctx.vars.clone()));
    }
    let path: Vec<&str> = path.iter().map(String::as_str).collect();
    ctx.var(&path).cloned()
}

/// `state[task].key`: output recorded by an earlier task.
pub fn state(ctx: &Context, args: Vec<Arg>) -> Arg {
    let path = segments("state", args)?;
    if path.is_empty() {
        return Ok(Value::Object(ctx.state.clone()));
    }
    let path: Vec<&str> = path.iter().map(String::as_str).collect();
    ctx.output(&path).cloned()
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

pub fn concat(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let values = values(args)?;
    Ok(Value::String(values.iter().map(text).collect()))
}

/// `join(list, separator,)`
pub fn join(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [list, separator] = exactly("join", args)?;
    let separator = string("join", separator)?;
    match list {
        Value::Array(items) => Ok(Value::String(
            items.iter().map(text).collect::<Vec<_>>().join(&separator),
        )),
        other => Err(expected("join", "an array", &other)),
    }
}

pub fn lower(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value] = exactly("lower", args)?;
    Ok(Value::String(string("lower", value)?.to_lowercase()))
}

pub fn upper(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value] = exactly("upper", args)?;
    Ok(Value::String(string("upper", value)?.to_uppercase()))
}

pub fn trim(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value] = exactly("trim", args)?;
    Ok(Value::String(string("trim", value)?.trim().to_string()))
}

/// `replace(text, from, to,)`
pub fn replace(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value, from, to] = exactly("replace", args)?;
    let value = string("replace", value)?;
    Ok(Value::String(
        value.replace(&string("replace", from)?, &string("replace", to)?),
    ))
}

/// `split(text, separator,)`
pub fn split(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value, separator] = exactly("split", args)?;
    let value = string("split", value)?;
    let separator = string("split", separator)?;
    Ok(Value::Array(
        value
            .split(separator.as_str())
            .map(|part| Value::String(part.to_string()))
            .collect(),
    ))
}

/// `format('{} of {}', a, b,)`: each `{}` takes the next argument.
pub fn format(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let mut values = values(args)?.into_iter();
    let template = match values.next() {
        Some(template) => string("format", template)?,
        None => {
            return Err(LazyError::Arity {
                function: "format",
                expected: "at least 1",
                found: 0,
            });
        }
    };

    let mut out = String::with_capacity(template.len());
    let mut pieces = template.split("{}");
    if let Some(first) = pieces.next() {
        out.push_str(first);
    }
    for piece in pieces {
        let value = values.next().ok_or(LazyError::Arity {
            function: "format",
            expected: "one per placeholder",
            found: 0,
        })?;
        out.push_str(&text(&value));
        out.push_str(piece);
    }
    Ok(Value::String(out))
}

/// Characters of a string, elements of an array or members of an object.
pub fn len(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value] = exactly("len", args)?;
    let len = match &value {
        Value::String(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(members) => members.len(),
        other => return Err(expected("len", "a string, array or object", other)),
    };
    Ok(Value::from(len))
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(function: &'static str, value: &Value) -> Result<Self, LazyError> {
        let Value::Number(number) = value else {
            return Err(expected(function, "a number", value));
        };
        match number.as_i64() {
            Some(int) => Ok(Num::Int(int)),
            None => number
                .as_f64()
                .map(Num::Float)
                .ok_or_else(|| expected(function, "a number", value)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(int) => int as f64,
            Num::Float(float) => float,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(int) => Value::from(int),
            Num::Float(float) => Number::from_f64(float).map_or(Value::Null, Value::Number),
        }
    }
}

/// Apply an integer operation, falling back to floats on overflow or when
/// either side is a float.
fn arithmetic(
    function: &'static str,
    args: Vec<Arg>,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Arg {
    let [lhs, rhs] = exactly(function, args)?;
    let (lhs, rhs) = (Num::of(function, &lhs)?, Num::of(function, &rhs)?);
    let result = match (lhs, rhs) {
        (Num::Int(a), Num::Int(b)) => int(a, b).map_or_else(|| Num::Float(float(a as f64, b as f64)), Num::Int),
        (a, b) => Num::Float(float(a.as_f64(), b.as_f64())),
    };
    Ok(result.into_value())
}

pub fn add(_ctx: &Context, args: Vec<Arg>) -> Arg {
    arithmetic("add", args, i64::checked_add, |a, b| a + b)
}

pub fn sub(_ctx: &Context, args: Vec<Arg>) -> Arg {
    arithmetic("sub", args, i64::checked_sub, |a, b| a - b)
}

pub fn mul(_ctx: &Context, args: Vec<Arg>) -> Arg {
    arithmetic("mul", args, i64::checked_mul, |a, b| a * b)
}

/// Integer division stays integral only when exact.
pub fn div(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [lhs, rhs] = exactly("div", args)?;
    let (lhs, rhs) = (Num::of("div", &lhs)?, Num::of("div", &rhs)?);
    if rhs.as_f64() == 0.0 {
        return Err(LazyError::DivisionByZero { function: "div" });
    }
    let result = match (lhs, rhs) {
        (Num::Int(a), Num::Int(b)) if a.checked_rem(b) == Some(0) => {
            a.checked_div(b).map_or(Num::Float(a as f64 / b as f64), Num::Int)
        }
        (a, b) => Num::Float(a.as_f64() / b.as_f64()),
    };
    Ok(result.into_value())
}

pub fn r#mod(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [lhs, rhs] = exactly("mod", args)?;
    let (lhs, rhs) = (Num::of("mod", &lhs)?, Num::of("mod", &rhs)?);
    if rhs.as_f64() == 0.0 {
        return Err(LazyError::DivisionByZero { function: "mod" });
    }
    let result = match (lhs, rhs) {
        (Num::Int(a), Num::Int(b)) => a.checked_rem(b).map_or(Num::Int(0), Num::Int),
        (a, b) => Num::Float(a.as_f64() % b.as_f64()),
    };
    Ok(result.into_value())
}

// ---------------------------------------------------------------------------
// Logic and comparison
// ---------------------------------------------------------------------------

/// Numbers compare by value regardless of representation.
fn same(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn order(function: &'static str, args: Vec<Arg>) -> Result<Ordering, LazyError> {
    let [lhs, rhs] = exactly(function, args)?;
    match (&lhs, &rhs) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Number(_), Value::Number(_)) => {
            let (a, b) = (Num::of(function, &lhs)?.as_f64(), Num::of(function, &rhs)?.as_f64());
            a.partial_cmp(&b)
                .ok_or_else(|| expected(function, "comparable numbers", &rhs))
        }
        (Value::Number(_) | Value::String(_), other) | (other, _) => {
            Err(expected(function, "two numbers or two strings", other))
        }
    }
}

pub fn eq(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [lhs, rhs] = exactly("eq", args)?;
    Ok(Value::Bool(same(&lhs, &rhs)))
}

pub fn ne(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [lhs, rhs] = exactly("ne", args)?;
    Ok(Value::Bool(!same(&lhs, &rhs)))
}

pub fn lt(_ctx: &Context, args: Vec<Arg>) -> Arg {
    order("lt", args).map(|ordering| Value::Bool(ordering.is_lt()))
}

pub fn le(_ctx: &Context, args: Vec<Arg>) -> Arg {
    order("le", args).map(|ordering| Value::Bool(ordering.is_le()))
}

pub fn gt(_ctx: &Context, args: Vec<Arg>) -> Arg {
    order("gt", args).map(|ordering| Value::Bool(ordering.is_gt()))
}

pub fn ge(_ctx: &Context, args: Vec<Arg>) -> Arg {
    order("ge", args).map(|ordering| Value::Bool(ordering.is_ge()))
}

pub fn not(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value] = exactly("not", args)?;
    Ok(Value::Bool(!boolean("not", &value)?))
}

pub fn and(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let values = values(args)?;
    for value in &values {
        if !boolean("and", value)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

pub fn or(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let values = values(args)?;
    for value in &values {
        if boolean("or", value)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// Substring, array element or object key.
pub fn contains(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [haystack, needle] = exactly("contains", args)?;
    let found = match &haystack {
        Value::String(text) => text.contains(&string("contains", needle)?),
        Value::Array(items) => items.iter().any(|item| same(item, &needle)),
        Value::Object(members) => members.contains_key(&string("contains", needle)?),
        other => return Err(expected("contains", "a string, array or object", other)),
    };
    Ok(Value::Bool(found))
}

pub fn is_empty(_ctx: &Context, args: Vec<Arg>) -> Arg {
    let [value] = exactly("is-empty", args)?;
    let empty = match &value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(members) => members.is_empty(),
        other => return Err(expected("is-empty", "a string, array or object", other)),
    };
    Ok(Value::Bool(empty))
}

/// `default(value, fallback,)`: the fallback when `value` is null or names a
/// path that does not exist. Other errors in `value` still propagate.
pub fn default(_ctx: &Context, mut args: Vec<Arg>) -> Arg {
    if let Some(Err(LazyError::Missing { .. })) = args.first() {
        args[0] = Ok(Value::Null);
    }
    let [value, fallback] = exactly("default", args)?;
    Ok(if value.is_null() { fallback } else { value })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn ok(value: Value) -> Arg {
        Ok(value)
    }

    fn run(name: &str, args: Vec<Value>) -> Arg {
        call(name, &Context::default(), args.into_iter().map(ok).collect())
    }

    #[test]
    fn test_accessors() {
        let Value::Object(inputs) = json!({"env": "prod", "db": {"port": 5432}}) else {
            unreachable!()
        };
        let ctx = Context::new(inputs);

        assert_eq!(vars(&ctx, vec![ok(json!("env"))]), Ok(json!("prod")));
        assert_eq!(vars(&ctx, vec![ok(json!("db")), ok(json!("port"))]), Ok(json!(5432)));
        assert!(matches!(
            state(&ctx, vec![ok(json!("nope"))]),
            Err(LazyError::Missing { .. })
        ));
    }

    #[test]
    fn test_errors_short_circuit_before_work() {
        let missing = LazyError::Missing {
            path: "vars.x".to_string(),
        };
        let ctx = Context::default();

        for (name, _) in FUNCTIONS.iter().filter(|(name, _)| *name != "default") {
            let result = call(name, &ctx, vec![Err(missing.clone()), ok(json!(1)), ok(json!(2))]);
            assert_eq!(result, Err(missing.clone()), "{name}");
        }
    }

    #[test]
    fn test_strings() {
        assert_eq!(run("concat", vec![json!("a-"), json!(1), json!(true)]), Ok(json!("a-1true")));
        assert_eq!(run("join", vec![json!(["a", 2]), json!(", ")]), Ok(json!("a, 2")));
        assert_eq!(run("upper", vec![json!("abc")]), Ok(json!("ABC")));
        assert_eq!(run("trim", vec![json!("  x ")]), Ok(json!("x")));
        assert_eq!(run("split", vec![json!("a,b"), json!(",")]), Ok(json!(["a", "b"])));
        assert_eq!(
            run("replace", vec![json!("a-b-c"), json!("-"), json!("_")]),
            Ok(json!("a_b_c"))
        );
        assert_eq!(
            run("format", vec![json!("{} of {}"), json!(1), json!("two")]),
            Ok(json!("1 of two"))
        );
        assert!(run("format", vec![json!("{} {}"), json!(1)]).is_err());
        assert!(matches!(run("lower", vec![json!(1)]), Err(LazyError::Argument { .. })));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("add", vec![json!(1), json!(2)]), Ok(json!(3)));
        assert_eq!(run("add", vec![json!(1), json!(0.5)]), Ok(json!(1.5)));
        assert_eq!(run("sub", vec![json!(1), json!(3)]), Ok(json!(-2)));
        assert_eq!(run("mul", vec![json!(i64::MAX), json!(2)]), Ok(json!(i64::MAX as f64 * 2.0)));
        assert_eq!(run("div", vec![json!(6), json!(3)]), Ok(json!(2)));
        assert_eq!(run("div", vec![json!(7), json!(2)]), Ok(json!(3.5)));
        assert_eq!(run("mod", vec![json!(7), json!(3)]), Ok(json!(1)));
        assert_eq!(
            run("div", vec![json!(1), json!(0)]),
            Err(LazyError::DivisionByZero { function: "div" })
        );
        assert!(matches!(run("add", vec![json!(1)]), Err(LazyError::Arity { .. })));
        assert!(matches!(run("add", vec![json!("1"), json!(1)]), Err(LazyError::Argument { .. })));
    }

    #[test]
    fn test_logic() {
        assert_eq!(run("eq", vec![json!(1), json!(1.0)]), Ok(json!(true)));
        assert_eq!(run("ne", vec![json!("a"), json!("b")]), Ok(json!(true)));
        assert_eq!(run("lt", vec![json!(1), json!(2)]), Ok(json!(true)));
        assert_eq!(run("ge", vec![json!("b"), json!("a")]), Ok(json!(true)));
        assert!(run("gt", vec![json!(1), json!("a")]).is_err());
        assert_eq!(run("not", vec![json!(false)]), Ok(json!(true)));
        assert_eq!(run("and", vec![json!(true), json!(false)]), Ok(json!(false)));
        assert_eq!(run("or", vec![json!(false), json!(true)]), Ok(json!(true)));
        assert_eq!(run("contains", vec![json!([1, 2]), json!(2)]), Ok(json!(true)));
        assert_eq!(run("contains", vec![json!({"k": 1}), json!("k")]), Ok(json!(true)));
        assert_eq!(run("is-empty", vec![json!("")]), Ok(json!(true)));
        assert_eq!(run("default", vec![Value::Null, json!("x")]), Ok(json!("x")));
        assert_eq!(run("len", vec![json!("héllo")]), Ok(json!(5)));
    }

    #[test]
    fn test_default_covers_missing_paths() {
        let ctx = Context::default();
        let missing = vars(&ctx, vec![ok(json!("missing"))]);
        assert!(missing.is_err());

        assert_eq!(default(&ctx, vec![missing, ok(json!("x"))]), Ok(json!("x")));
        assert_eq!(default(&ctx, vec![ok(json!(0)), ok(json!("x"))]), Ok(json!(0)));

        let broken = run("upper", vec![json!(1)]);
        assert!(matches!(
            default(&ctx, vec![broken, ok(json!("x"))]),
            Err(LazyError::Argument { .. })
        ));

        let missing_fallback = LazyError::Missing {
            path: "vars.y".to_string(),
        };
        assert_eq!(
            default(&ctx, vec![ok(Value::Null), Err(missing_fallback.clone())]),
            Err(missing_fallback)
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            run("nope", vec![]),
            Err(LazyError::UnknownFunction("nope".to_string()))
        );
        assert!(lookup("is-empty").is_some());
        assert!(lookup("is_empty").is_none());
    }

    proptest! {
        #[test]
        fn prop_integer_arithmetic_matches_i64(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            prop_assert_eq!(run("add", vec![json!(a), json!(b)]), Ok(json!(a + b)));
            prop_assert_eq!(run("sub", vec![json!(a), json!(b)]), Ok(json!(a - b)));
            prop_assert_eq!(run("mul", vec![json!(a), json!(b)]), Ok(json!(a * b)));
        }

        #[test]
        fn prop_concat_matches_string_concatenation(parts in prop::collection::vec("[a-z0-9 ]{0,8}", 0..6)) {
            let args = parts.iter().map(|part| json!(part)).collect();
            prop_assert_eq!(run("concat", args), Ok(json!(parts.concat())));
        }
    }
}

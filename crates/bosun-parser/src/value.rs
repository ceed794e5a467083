//! The value model shared by every stage after parsing.
//!
//! A [`ValueExpr`] is what a DSL value lowers to. Literal values map
//! one-to-one onto JSON; a [`FunctionExpr`] is a deferred call that is only
//! resolved when the generated program runs.

use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Attribute name to value, in source order.
pub type ObjectExpr = IndexMap<String, ValueExpr>;

/// A numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Parse the text of a `number` match.
    ///
    /// Integers that do not fit in an `i64` fall back to a float.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.contains('.') {
            if let Ok(int) = text.parse::<i64>() {
                return Some(Number::Int(int));
            }
        }
        text.parse::<f64>().ok().map(Number::Float)
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(int) => int as f64,
            Number::Float(float) => float,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(int) => write!(f, "{int}"),
            // Keep the decimal point so the literal reads back as a float.
            Number::Float(float) if float.is_finite() && float.fract() == 0.0 => {
                write!(f, "{float:.1}")
            }
            Number::Float(float) => write!(f, "{float}"),
        }
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(int) => Value::from(int),
            Number::Float(float) => Value::from(float),
        }
    }
}

/// A deferred call: `name(args,)`, or an index lookup `name.a[b]` which is
/// modelled as `name('a', 'b',)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<ValueExpr>,
}

impl FunctionExpr {
    pub fn new(name: impl Into<String>, args: Vec<ValueExpr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Serialized form: an array headed by the function name.
    pub fn to_json(&self) -> Value {
        let mut items = Vec::with_capacity(self.args.len() + 1);
        items.push(Value::String(self.name.clone()));
        items.extend(self.args.iter().map(ValueExpr::to_json));
        Value::Array(items)
    }
}

impl fmt::Display for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_items(f, &self.args)?;
        f.write_str(")")
    }
}

/// The kind of a [`ValueExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Array,
    Bool,
    Function,
    Number,
    Object,
    String,
    Unknown,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Array => "array",
            ValueType::Bool => "bool",
            ValueType::Function => "function",
            ValueType::Number => "number",
            ValueType::Object => "object",
            ValueType::String => "string",
            ValueType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lowered DSL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValueExpr {
    Array(Vec<ValueExpr>),
    Bool(bool),
    Function(FunctionExpr),
    Number(Number),
    Object(ObjectExpr),
    String(String),
    #[default]
    Unknown,
}

impl ValueExpr {
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueExpr::Array(_) => ValueType::Array,
            ValueExpr::Bool(_) => ValueType::Bool,
            ValueExpr::Function(_) => ValueType::Function,
            ValueExpr::Number(_) => ValueType::Number,
            ValueExpr::Object(_) => ValueType::Object,
            ValueExpr::String(_) => ValueType::String,
            ValueExpr::Unknown => ValueType::Unknown,
        }
    }

    /// Language-agnostic form of this value.
    ///
    /// Non-finite floats have no JSON form and become `null`, like
    /// [`ValueExpr::Unknown`].
    pub fn to_json(&self) -> Value {
        match self {
            ValueExpr::Array(items) => Value::Array(items.iter().map(ValueExpr::to_json).collect()),
            ValueExpr::Bool(flag) => Value::Bool(*flag),
            ValueExpr::Function(function) => function.to_json(),
            ValueExpr::Number(number) => Value::from(*number),
            ValueExpr::Object(object) => Value::Object(
                object
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            ValueExpr::String(text) => Value::String(text.clone()),
            ValueExpr::Unknown => Value::Null,
        }
    }
}

impl Serialize for ValueExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Serialize for FunctionExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<Value> for ValueExpr {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ValueExpr::Unknown,
            Value::Bool(flag) => ValueExpr::Bool(flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => ValueExpr::Number(Number::Int(int)),
                None => number
                    .as_f64()
                    .map_or(ValueExpr::Unknown, |float| ValueExpr::Number(Number::Float(float))),
            },
            Value::String(text) => ValueExpr::String(text),
            Value::Array(items) => ValueExpr::Array(items.into_iter().map(ValueExpr::from).collect()),
            Value::Object(map) => ValueExpr::Object(
                map.into_iter()
                    .map(|(key, value)| (key, ValueExpr::from(value)))
                    .collect(),
            ),
        }
    }
}

/// `a, b,` with the trailing comma arrays and calls require.
fn write_items(f: &mut fmt::Formatter<'_>, items: &[ValueExpr]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item},")?;
    }
    if items.is_empty() {
        f.write_str(",")?;
    }
    Ok(())
}

/// `true` if `text` can be written as a bare identifier key.
pub(crate) fn is_ident(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !matches!(text, "true" | "false" | "block" | "rescue" | "always")
}

/// Writes the value back in DSL syntax.
///
/// Strings containing `'` or a newline and [`ValueExpr::Unknown`] have no
/// DSL spelling; they are written as-is and will not parse back.
impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Array(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            ValueExpr::Bool(flag) => write!(f, "{flag}"),
            ValueExpr::Function(function) => write!(f, "{function}"),
            ValueExpr::Number(number) => write!(f, "{number}"),
            ValueExpr::Object(object) => {
                f.write_str("{")?;
                for (index, (key, value)) in object.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    if is_ident(key) {
                        write!(f, "{key}: {value},")?;
                    } else {
                        write!(f, "'{key}': {value},")?;
                    }
                }
                f.write_str("}")
            }
            ValueExpr::String(text) => write!(f, "'{text}'"),
            ValueExpr::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_number_parse() {
        assert_eq!(Number::parse("42"), Some(Number::Int(42)));
        assert_eq!(Number::parse("-7"), Some(Number::Int(-7)));
        assert_eq!(Number::parse("3.25"), Some(Number::Float(3.25)));
        assert_eq!(
            Number::parse("99999999999999999999"),
            Some(Number::Float(1e20))
        );
        assert_eq!(Number::parse("abc"), None);
    }

    #[test]
    fn test_number_display_keeps_float_kind() {
        assert_eq!(Number::Float(2.0).to_string(), "2.0");
        assert_eq!(Number::Float(-0.5).to_string(), "-0.5");
        assert_eq!(Number::Int(2).to_string(), "2");
    }

    #[test]
    fn test_value_type() {
        assert_eq!(ValueExpr::Unknown.value_type(), ValueType::Unknown);
        assert_eq!(
            ValueExpr::Function(FunctionExpr::new("vars", vec![])).value_type(),
            ValueType::Function
        );
        assert_eq!(ValueExpr::default().value_type().name(), "unknown");
    }

    #[test]
    fn test_function_serializes_as_array() {
        let function = FunctionExpr::new(
            "concat",
            vec![
                ValueExpr::String("a".into()),
                ValueExpr::Function(FunctionExpr::new("vars", vec![ValueExpr::String("x".into())])),
            ],
        );

        let json = serde_json::to_value(ValueExpr::Function(function)).unwrap();

        assert_eq!(json, json!(["concat", "a", ["vars", "x"]]));
    }

    #[test]
    fn test_json_literal_round_trip() {
        let json = json!({"a": [1, 2.5, true, "x"], "b": {"c": null}});
        let value = ValueExpr::from(json.clone());

        assert!(matches!(value, ValueExpr::Object(_)));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_display_dsl_form() {
        let mut object = ObjectExpr::new();
        object.insert("msg".into(), ValueExpr::String("hi".into()));
        object.insert("two words".into(), ValueExpr::Array(vec![]));
        object.insert(
            "when".into(),
            ValueExpr::Function(FunctionExpr::new("vars", vec![ValueExpr::String("on".into())])),
        );

        assert_eq!(
            ValueExpr::Object(object).to_string(),
            "{msg: 'hi', 'two words': [,], when: vars('on',),}"
        );
    }

    #[test]
    fn test_is_ident() {
        assert!(is_ident("db-name"));
        assert!(!is_ident("2fast"));
        assert!(!is_ident("under_score"));
        assert!(!is_ident("true"));
        assert!(!is_ident(""));
    }
}

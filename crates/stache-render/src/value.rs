/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dynamic values that make up rendering scopes.
//!
//! Every scope on the [`crate::ContextStack`] is a [`Value`]. Maps are plain
//! key-to-value [`Scope`]s so lookup, section pushes and the smashed lambda
//! context all work on one uniform shape.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::LambdaError;

/// A flat key-to-value mapping: one map scope, or the smashed context.
pub type Scope = HashMap<String, Value>;

type LambdaFn = dyn Fn(Option<&str>, &Scope) -> Result<Value, LambdaError> + Send + Sync;

/// A callable value.
///
/// Lambdas are invoked during resolution with the raw, unrendered section
/// body (`None` for plain tags) and the smashed context. Their return value
/// replaces the lambda for the tag or section being rendered.
#[derive(Clone)]
pub struct Lambda(Arc<LambdaFn>);

impl Lambda {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&str>, &Scope) -> Result<Value, LambdaError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, body: Option<&str>, context: &Scope) -> Result<Value, LambdaError> {
        (self.0)(body, context)
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lambda")
    }
}

impl PartialEq for Lambda {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A value that can be looked up, iterated or printed by a template.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// An explicit null. Distinct from a path that is not found at all.
    #[default]
    Null,

    /// A boolean value.
    Bool(bool),

    /// A numeric value.
    Number(f64),

    /// A string value.
    String(String),

    /// A sequence; sections iterate it, one pushed scope per element.
    List(Vec<Value>),

    /// A map of string keys to values.
    Map(Scope),

    /// A timestamp. Pushable as a scope, but exposes no keys of its own.
    Date(DateTime<Utc>),

    /// A callable value, see [`Lambda`].
    Lambda(Lambda),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create a lambda value from a closure.
    pub fn lambda<F>(f: F) -> Self
    where
        F: Fn(Option<&str>, &Scope) -> Result<Value, LambdaError> + Send + Sync + 'static,
    {
        Value::Lambda(Lambda::new(f))
    }

    /// Build a map value from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check if this value is "truthy" for section evaluation.
    ///
    /// Truthiness rules:
    /// - `Null`, `false`, `0`, `NaN` and the empty string are falsy
    /// - Everything else is truthy, including empty lists and empty maps
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Date(_) | Value::Lambda(_) => true,
        }
    }

    /// Composite values can be descended into and pushed as a scope.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_) | Value::Date(_))
    }

    /// True for a list with no elements.
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Value::List(items) if items.is_empty())
    }

    /// Descend one path segment.
    ///
    /// Maps descend by key, lists by decimal index or `length`. Any other
    /// value has no children.
    pub fn child(&self, segment: &str) -> Option<Value> {
        match self {
            Value::Map(m) => m.get(segment).cloned(),
            Value::List(items) => {
                if segment == "length" {
                    Some(Value::Number(items.len() as f64))
                } else {
                    segment
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                }
            }
            _ => None,
        }
    }

    /// Render this value as a string for output.
    ///
    /// Returns `None` for `Null`, which prints like a missing value.
    pub fn stringify(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(format_number(*n)),
            Value::String(s) => Some(s.clone()),
            Value::List(items) => Some(
                items
                    .iter()
                    .map(|v| v.stringify().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Value::Map(_) => Some("[object Object]".to_string()),
            Value::Date(d) => Some(d.to_rfc3339()),
            Value::Lambda(_) => Some("[lambda]".to_string()),
        }
    }
}

/// Print a number the way JavaScript's `Number#toString` does.
///
/// Magnitudes of `1e21` and above, or below `1e-6`, use exponent form with an
/// explicit sign (`1e+21`, `1.5e-7`); everything else is plain decimal.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        return format!("{sign}Infinity");
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let magnitude = n.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let exponential = format!("{n:e}");
        return match exponential.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => exponential,
        };
    }
    n.to_string()
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Scope> for Value {
    fn from(scope: Scope) -> Self {
        Value::Map(scope)
    }
}

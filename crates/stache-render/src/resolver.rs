/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dotted-path resolution across the context stack.
//!
//! Lookup walks the stack from the innermost scope outwards and stops at the
//! first scope that *contains* the path, whatever the value. A path that no
//! scope contains resolves to [`Resolved::Absent`], which is not the same as
//! resolving to `Null`, `false` or an empty list.

use crate::context::ContextStack;
use crate::error::{LambdaError, RenderError, RenderResult};
use crate::value::{Scope, Value};

/// Reserved smashed-context key for a date scope.
pub const DATE_KEY: &str = "__date";

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// No scope contains the path.
    Absent,
    /// The innermost value found (lambdas already invoked).
    Found(Value),
}

impl Resolved {
    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }

    /// The found value, or `None` when absent.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolved::Absent => None,
            Resolved::Found(value) => Some(value),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Absent => None,
            Resolved::Found(value) => Some(value),
        }
    }

    /// Absent, falsy, or an empty list. Drives inverted sections.
    pub fn is_empty(&self) -> bool {
        match self {
            Resolved::Absent => true,
            Resolved::Found(value) => !value.is_truthy() || value.is_empty_list(),
        }
    }
}

/// Resolve `path`, invoking the value if it is a lambda.
///
/// `body` is the raw section source passed to lambdas; tags pass `None`.
pub fn resolve(stack: &ContextStack, path: &str, body: Option<&str>) -> RenderResult<Resolved> {
    match lookup(stack, path) {
        Some(Value::Lambda(lambda)) => lambda
            .call(body, &smash(stack))
            .map(Resolved::Found)
            .map_err(|source: LambdaError| RenderError::Lambda {
                path: path.to_string(),
                source,
            }),
        Some(value) => Ok(Resolved::Found(value)),
        None => Ok(Resolved::Absent),
    }
}

/// Find the innermost scope that contains `path`.
pub fn lookup(stack: &ContextStack, path: &str) -> Option<Value> {
    stack
        .innermost_first()
        .find_map(|scope| context_level_contains(scope, path))
}

/// Descend into `scope` one dotted segment at a time.
///
/// Fails as soon as a segment is missing or the current value is not
/// composite.
pub fn context_level_contains(scope: &Value, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    segments.try_fold(scope.child(first)?, |current, segment| {
        current.child(segment)
    })
}

/// Flatten the stack into one scope, inner keys overriding outer ones.
///
/// Date scopes have no keys of their own and contribute [`DATE_KEY`] instead.
pub fn smash(stack: &ContextStack) -> Scope {
    let mut smashed = Scope::new();
    for scope in stack.outermost_first() {
        match scope {
            Value::Map(entries) => {
                smashed.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Value::List(items) => {
                smashed.extend(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (i.to_string(), v.clone())),
                );
            }
            Value::Date(_) => {
                smashed.insert(DATE_KEY.to_string(), scope.clone());
            }
            _ => {}
        }
    }
    smashed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn stack(json: serde_json::Value) -> ContextStack {
        ContextStack::from(json)
    }

    #[test]
    fn test_innermost_wins() {
        let stack = stack(json!([{ "a": 1 }, { "a": 2 }]));
        assert_eq!(
            resolve(&stack, "a", None).unwrap(),
            Resolved::Found(Value::Number(2.0))
        );
    }

    #[test]
    fn test_outer_scope_used_when_inner_lacks_key() {
        let stack = stack(json!([{ "a": 1, "b": "outer" }, { "a": 2 }]));
        assert_eq!(
            resolve(&stack, "b", None).unwrap(),
            Resolved::Found(Value::string("outer"))
        );
    }

    #[test]
    fn test_dotted_path() {
        let stack = stack(json!({ "user": { "name": "Cy" } }));
        assert_eq!(
            resolve(&stack, "user.name", None).unwrap(),
            Resolved::Found(Value::string("Cy"))
        );
        assert!(resolve(&stack, "user.missing", None).unwrap().is_absent());
        assert!(resolve(&stack, "user.name.first", None).unwrap().is_absent());
    }

    #[test]
    fn test_found_falsy_stops_the_walk() {
        // Inner null shadows the outer value; it is found, not absent
        let stack = stack(json!([{ "a": "outer" }, { "a": null }]));
        assert_eq!(resolve(&stack, "a", None).unwrap(), Resolved::Found(Value::Null));

        let stack = ContextStack::from(vec![
            Value::map([("flag", Value::Bool(true))]),
            Value::map([("flag", Value::Bool(false))]),
        ]);
        assert_eq!(
            resolve(&stack, "flag", None).unwrap(),
            Resolved::Found(Value::Bool(false))
        );
    }

    #[test]
    fn test_partial_path_falls_through_to_outer_scope() {
        // The inner scope has "user" but not "user.name"
        let stack = stack(json!([{ "user": { "name": "outer" } }, { "user": {} }]));
        assert_eq!(
            resolve(&stack, "user.name", None).unwrap(),
            Resolved::Found(Value::string("outer"))
        );
    }

    #[test]
    fn test_list_index_and_length() {
        let stack = stack(json!({ "items": ["x", "y", "z"] }));
        assert_eq!(
            resolve(&stack, "items.1", None).unwrap(),
            Resolved::Found(Value::string("y"))
        );
        assert_eq!(
            resolve(&stack, "items.length", None).unwrap(),
            Resolved::Found(Value::Number(3.0))
        );
    }

    #[test]
    fn test_scalar_scope_contains_nothing() {
        let stack = ContextStack::from(vec![
            Value::map([("name", Value::string("outer"))]),
            Value::string("scalar"),
        ]);
        assert_eq!(
            resolve(&stack, "name", None).unwrap(),
            Resolved::Found(Value::string("outer"))
        );
    }

    #[test]
    fn test_lambda_receives_body_and_smashed_context() {
        let lambda = Value::lambda(|body, ctx| {
            let who = ctx
                .get("who")
                .and_then(Value::stringify)
                .unwrap_or_default();
            Ok(Value::String(format!("{}:{}", body.unwrap_or("-"), who)))
        });
        let stack = ContextStack::from(vec![
            Value::map([("who", Value::string("outer")), ("f", lambda)]),
            Value::map([("who", Value::string("inner"))]),
        ]);

        assert_eq!(
            resolve(&stack, "f", Some("{{who}}")).unwrap(),
            Resolved::Found(Value::string("{{who}}:inner"))
        );
        assert_eq!(
            resolve(&stack, "f", None).unwrap(),
            Resolved::Found(Value::string("-:inner"))
        );
    }

    #[test]
    fn test_lambda_error() {
        let stack = ContextStack::new(Value::map([(
            "boom",
            Value::lambda(|_, _| Err(LambdaError::new("nope"))),
        )]));
        let err = resolve(&stack, "boom", None).unwrap_err();
        assert!(matches!(err, RenderError::Lambda { ref path, .. } if path == "boom"));
    }

    #[test]
    fn test_smash_overrides_and_date_key() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let stack = ContextStack::from(vec![
            Value::map([("a", Value::from(1)), ("b", Value::from(1))]),
            Value::Date(date),
            Value::map([("b", Value::from(2))]),
        ]);

        let smashed = smash(&stack);
        assert_eq!(smashed.len(), 3);
        assert_eq!(smashed.get("a"), Some(&Value::Number(1.0)));
        assert_eq!(smashed.get("b"), Some(&Value::Number(2.0)));
        assert_eq!(smashed.get(DATE_KEY), Some(&Value::Date(date)));
    }

    #[test]
    fn test_resolved_is_empty() {
        assert!(Resolved::Absent.is_empty());
        assert!(Resolved::Found(Value::Null).is_empty());
        assert!(Resolved::Found(Value::List(vec![])).is_empty());
        assert!(!Resolved::Found(Value::Map(Scope::new())).is_empty());
        assert!(!Resolved::Found(Value::string("x")).is_empty());
    }
}

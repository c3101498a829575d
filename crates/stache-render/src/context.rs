/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The layered scope stack used for variable lookup.

use crate::value::Value;

/// Ordered stack of scopes.
///
/// Lookup walks from the last-pushed (innermost) scope to the first. The
/// renderer only pushes when it enters a section over a list element, map or
/// date, and pops exactly once when that section body finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStack {
    scopes: Vec<Value>,
}

impl ContextStack {
    /// Create a stack holding a single scope.
    pub fn new(root: Value) -> Self {
        Self { scopes: vec![root] }
    }

    /// Push a new innermost scope.
    pub fn push(&mut self, scope: Value) {
        self.scopes.push(scope);
    }

    /// Remove and return the innermost scope.
    pub fn pop(&mut self) -> Option<Value> {
        self.scopes.pop()
    }

    /// Number of scopes on the stack.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Scopes from innermost to outermost.
    pub fn innermost_first(&self) -> impl Iterator<Item = &Value> {
        self.scopes.iter().rev()
    }

    /// Scopes from outermost to innermost.
    pub fn outermost_first(&self) -> impl Iterator<Item = &Value> {
        self.scopes.iter()
    }
}

/// A list is taken as the stack itself; any other value becomes the only scope.
impl From<Value> for ContextStack {
    fn from(value: Value) -> Self {
        match value {
            Value::List(scopes) => Self { scopes },
            other => Self::new(other),
        }
    }
}

impl From<Vec<Value>> for ContextStack {
    fn from(scopes: Vec<Value>) -> Self {
        Self { scopes }
    }
}

impl From<serde_json::Value> for ContextStack {
    fn from(value: serde_json::Value) -> Self {
        Self::from(Value::from(value))
    }
}

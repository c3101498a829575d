/*
 * partials.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Partial template registries.
//!
//! A registry maps a partial name to its compiled tree. A name that is not
//! registered is not an error: the partial reference renders as nothing.

use std::collections::HashMap;
use std::hash::BuildHasher;

use serde_json::Value as Json;

use crate::error::{RenderError, RenderResult};
use crate::token::TokenTree;

/// A compiled partial.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPartial {
    pub tree: TokenTree,
    /// Template source, when the compiler kept it.
    pub source: Option<String>,
}

impl CompiledPartial {
    pub fn new(tree: TokenTree) -> Self {
        Self { tree, source: None }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Trait for looking up partials by name.
pub trait PartialRegistry {
    /// Look up a partial, or `None` if it is not registered.
    fn get(&self, name: &str) -> Option<&CompiledPartial>;
}

impl<S: BuildHasher> PartialRegistry for HashMap<String, CompiledPartial, S> {
    fn get(&self, name: &str) -> Option<&CompiledPartial> {
        HashMap::get(self, name)
    }
}

/// Registry with no partials.
///
/// Use this for templates that don't reference partials, or when partial
/// references should render as nothing.
#[derive(Debug, Clone, Default)]
pub struct NullRegistry;

impl PartialRegistry for NullRegistry {
    fn get(&self, _name: &str) -> Option<&CompiledPartial> {
        None
    }
}

/// Registry backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    partials: HashMap<String, CompiledPartial>,
}

impl MemoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled tree under `name`, replacing any previous entry.
    pub fn add(&mut self, name: impl Into<String>, tree: TokenTree) -> &mut Self {
        self.partials.insert(name.into(), CompiledPartial::new(tree));
        self
    }

    /// Register a full partial record.
    pub fn insert(&mut self, name: impl Into<String>, partial: CompiledPartial) -> &mut Self {
        self.partials.insert(name.into(), partial);
        self
    }

    /// Create a registry with the given partials.
    pub fn with_partials(partials: impl IntoIterator<Item = (impl Into<String>, TokenTree)>) -> Self {
        let mut registry = Self::new();
        for (name, tree) in partials {
            registry.add(name, tree);
        }
        registry
    }

    /// Decode the compiler's partial map.
    ///
    /// The expected shape is `{ "name": [{ "tokens": tree, "source"?: "..." }] }`;
    /// only the first record of each entry is used.
    pub fn from_json(json: &Json) -> RenderResult<Self> {
        let entries = json
            .as_object()
            .ok_or_else(|| RenderError::malformed("partial map must be an object"))?;

        let mut registry = Self::new();
        for (name, records) in entries {
            let record = records
                .as_array()
                .and_then(|r| r.first())
                .ok_or_else(|| RenderError::malformed(format!("partial '{name}' has no record")))?;
            let tokens = record.get("tokens").ok_or_else(|| {
                RenderError::malformed(format!("partial '{name}' has no tokens"))
            })?;

            let mut partial = CompiledPartial::new(TokenTree::from_json(tokens)?);
            if let Some(source) = record.get("source").and_then(Json::as_str) {
                partial = partial.with_source(source);
            }
            registry.insert(name.clone(), partial);
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }
}

impl PartialRegistry for MemoryRegistry {
    fn get(&self, name: &str) -> Option<&CompiledPartial> {
        self.partials.get(name)
    }
}

/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render configuration.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Configuration for a [`crate::Renderer`].
///
/// Can be built in code with the `with_*` methods or deserialized from a
/// config file:
///
/// ```yaml
/// yield-interval: 100
/// max-partial-depth: 50
/// strict: false
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderOptions {
    /// Traversal steps (and list-section iterations) between cooperative yields.
    pub yield_interval: usize,

    /// Maximum partial nesting depth before a partial reference fails.
    pub max_partial_depth: usize,

    /// Strict mode: report undefined tags as errors instead of warnings.
    pub strict: bool,

    /// Cancellation token checked before every step.
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            yield_interval: 100,
            max_partial_depth: 50,
            strict: false,
            cancellation: None,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the yield interval. Zero is treated as one.
    pub fn with_yield_interval(mut self, interval: usize) -> Self {
        self.yield_interval = interval.max(1);
        self
    }

    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn interval(&self) -> usize {
        self.yield_interval.max(1)
    }
}

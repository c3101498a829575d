/*
 * renderer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The streaming traversal engine.
//!
//! Each tree is walked by an index-based loop. Before every advance the loop
//! checks for cancellation and waits while the sink is paused; every
//! `yield_interval` advances it yields to the scheduler instead of taking a
//! token, which bounds how much work runs between suspension points no
//! matter how large the template is. Section bodies and partials are walked
//! by the same loop, one level of (boxed) recursion per nesting level.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::context::ContextStack;
use crate::error::{RenderError, RenderResult};
use crate::escape::{Escaper, TableEscaper};
use crate::options::RenderOptions;
use crate::partials::PartialRegistry;
use crate::resolver::{Resolved, resolve};
use crate::sink::{OutputSink, StringSink, Warning, WarningCategory};
use crate::token::{Mustache, Token, TokenTree};
use crate::value::Value;

/// Counters describing a finished render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Traversal advances, including those spent yielding.
    pub steps: u64,
    /// Cooperative yields to the scheduler.
    pub yields: u64,
    /// Times the render waited for a paused sink.
    pub pauses: u64,
    /// Scopes pushed by section expansion (each popped again).
    pub scope_pushes: u64,
    /// Token errors reported to the sink.
    pub errors: u64,
    /// Warnings reported to the sink.
    pub warnings: u64,
}

/// Renders token trees to an [`OutputSink`].
#[derive(Clone)]
pub struct Renderer {
    escaper: Arc<dyn Escaper>,
    options: RenderOptions,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Create a renderer with default options and LaTeX escaping.
    pub fn new() -> Self {
        Self {
            escaper: Arc::new(TableEscaper::latex()),
            options: RenderOptions::default(),
        }
    }

    /// Use a different escaping strategy for escaped tags.
    pub fn with_escaper(mut self, escaper: impl Escaper + 'static) -> Self {
        self.escaper = Arc::new(escaper);
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `tree` against `context`, streaming into `sink`.
    ///
    /// Resolves once the whole tree has been written. Fails without writing
    /// anything if the tree is not rooted under `multi`, and stops early only
    /// if the cancellation token fires; every other problem is reported to
    /// the sink and rendering continues.
    pub async fn render(
        &self,
        tree: &TokenTree,
        context: impl Into<ContextStack>,
        partials: &dyn PartialRegistry,
        sink: &mut dyn OutputSink,
    ) -> RenderResult<RenderSummary> {
        let mut stack: ContextStack = context.into();
        self.render_with_stack(tree, &mut stack, partials, sink).await
    }

    /// Like [`Renderer::render`], but on a caller-owned stack.
    ///
    /// The stack is left exactly as deep as it was handed in.
    pub async fn render_with_stack(
        &self,
        tree: &TokenTree,
        stack: &mut ContextStack,
        partials: &dyn PartialRegistry,
        sink: &mut dyn OutputSink,
    ) -> RenderResult<RenderSummary> {
        tree.validate()?;
        let placeholder = stack.is_empty();
        if placeholder {
            stack.push(Value::Null);
        }

        tracing::debug!(tokens = tree.len(), scopes = stack.depth(), "Starting render");

        let mut walk = Walk {
            renderer: self,
            partials,
            sink,
            summary: RenderSummary::default(),
            partial_depth: 0,
        };
        let result = walk.traverse(tree, stack).await;
        let summary = walk.summary;
        if placeholder {
            stack.pop();
        }

        match &result {
            Ok(()) => tracing::debug!(
                steps = summary.steps,
                yields = summary.yields,
                pauses = summary.pauses,
                errors = summary.errors,
                warnings = summary.warnings,
                "Render completed"
            ),
            Err(e) => tracing::debug!(error = %e, "Render aborted"),
        }
        result.map(|()| summary)
    }

    /// Render, then invoke `on_done` once the render completed.
    ///
    /// `on_done` is not called if the render fails or is cancelled.
    pub async fn render_then<F>(
        &self,
        tree: &TokenTree,
        context: impl Into<ContextStack>,
        partials: &dyn PartialRegistry,
        sink: &mut dyn OutputSink,
        on_done: F,
    ) -> RenderResult<RenderSummary>
    where
        F: FnOnce(),
    {
        let summary = self.render(tree, context, partials, sink).await?;
        on_done();
        Ok(summary)
    }

    /// Render to a [`StringSink`], blocking the current thread until done.
    pub fn render_blocking(
        &self,
        tree: &TokenTree,
        context: impl Into<ContextStack>,
        partials: &dyn PartialRegistry,
    ) -> RenderResult<StringSink> {
        let mut sink = StringSink::new();
        pollster::block_on(self.render(tree, context, partials, &mut sink))?;
        Ok(sink)
    }
}

/// State shared by every traversal level of one render.
struct Walk<'r> {
    renderer: &'r Renderer,
    partials: &'r dyn PartialRegistry,
    sink: &'r mut dyn OutputSink,
    summary: RenderSummary,
    partial_depth: usize,
}

impl<'r> Walk<'r> {
    /// Walk one tree, token by token.
    fn traverse<'a>(
        &'a mut self,
        tree: &'a TokenTree,
        stack: &'a mut ContextStack,
    ) -> LocalBoxFuture<'a, RenderResult<()>> {
        async move {
            tree.validate()?;
            let interval = self.renderer.options.interval() as u64;
            let mut index = 0;
            let mut steps: u64 = 0;

            loop {
                self.checkpoint().await?;

                steps += 1;
                self.summary.steps += 1;
                if steps % interval == 0 {
                    self.summary.yields += 1;
                    tracing::trace!(steps, index, "Yielding traversal");
                    tokio::task::yield_now().await;
                    continue;
                }

                let Some(token) = tree.tokens().get(index) else {
                    return Ok(());
                };
                index += 1;

                if let Err(err) = self.step(token, stack).await {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    self.report_error(&err);
                }
            }
        }
        .boxed_local()
    }

    /// Stop if cancelled; wait while the sink is paused.
    async fn checkpoint(&mut self) -> RenderResult<()> {
        let cancellation = self.renderer.options.cancellation.clone();
        if cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(RenderError::Cancelled);
        }

        let Some(gate) = self.sink.backpressure() else {
            return Ok(());
        };
        if !gate.is_paused() {
            return Ok(());
        }

        self.summary.pauses += 1;
        tracing::trace!("Sink paused; waiting for resume");
        match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(RenderError::Cancelled),
                    _ = gate.resumed() => {}
                }
            }
            None => gate.resumed().await,
        }
        Ok(())
    }

    async fn step(&mut self, token: &Token, stack: &mut ContextStack) -> RenderResult<()> {
        let mustache = match token {
            Token::Static(text) => {
                self.write(text);
                return Ok(());
            }
            Token::Mustache(mustache) => mustache,
        };

        match mustache {
            Mustache::UnescapedTag(path) => {
                let resolved = resolve(stack, path, None)?;
                let text = self.stringify(path, &resolved);
                self.write(&text);
            }

            Mustache::EscapedTag(path) => {
                let resolved = resolve(stack, path, None)?;
                let text = self.stringify(path, &resolved);
                let escaped = self
                    .renderer
                    .escaper
                    .escape(&text)
                    .map_err(|source| RenderError::Escape {
                        path: path.clone(),
                        source,
                    })?;
                self.write(&escaped);
            }

            Mustache::Section { path, raw, body } => {
                if let Resolved::Found(value) = resolve(stack, path, Some(raw.as_str()))?
                    && value.is_truthy()
                {
                    self.expand_section(stack, value, body).await?;
                }
            }

            Mustache::InvertedSection { path, raw, body } => {
                if resolve(stack, path, Some(raw.as_str()))?.is_empty() {
                    self.expand_section(stack, Value::Bool(true), body).await?;
                }
            }

            Mustache::Partial(name) => {
                let partials = self.partials;
                if let Some(partial) = partials.get(name) {
                    let max_depth = self.renderer.options.max_partial_depth;
                    if self.partial_depth >= max_depth {
                        return Err(RenderError::RecursivePartial {
                            name: name.clone(),
                            max_depth,
                        });
                    }
                    self.partial_depth += 1;
                    let result = self.traverse(&partial.tree, stack).await;
                    self.partial_depth -= 1;
                    result?;
                }
            }
        }
        Ok(())
    }

    /// Render a section body according to the shape of its value.
    ///
    /// - List: once per element, each pushed as the innermost scope
    /// - Map or date: once, with the value pushed
    /// - Other truthy value: once, under the unchanged stack
    /// - Falsy: not at all
    async fn expand_section(
        &mut self,
        stack: &mut ContextStack,
        value: Value,
        body: &TokenTree,
    ) -> RenderResult<()> {
        match value {
            Value::List(items) => {
                let interval = self.renderer.options.interval();
                for (i, item) in items.into_iter().enumerate() {
                    self.with_scope(stack, item, body).await?;

                    if (i + 1) % interval == 0 {
                        if self.renderer.options.is_cancelled() {
                            return Err(RenderError::Cancelled);
                        }
                        self.summary.yields += 1;
                        tracing::trace!(iteration = i + 1, "Yielding section iteration");
                        tokio::task::yield_now().await;
                    }
                }
                Ok(())
            }
            value if value.is_composite() => self.with_scope(stack, value, body).await,
            value if value.is_truthy() => self.traverse(body, stack).await,
            _ => Ok(()),
        }
    }

    /// Push `scope`, walk `body`, then pop whether or not the walk failed.
    async fn with_scope(
        &mut self,
        stack: &mut ContextStack,
        scope: Value,
        body: &TokenTree,
    ) -> RenderResult<()> {
        stack.push(scope);
        self.summary.scope_pushes += 1;
        let result = self.traverse(body, stack).await;
        stack.pop();
        result
    }

    /// Stringify a resolved value, warning when there is nothing to print.
    fn stringify(&mut self, path: &str, resolved: &Resolved) -> String {
        if let Some(text) = resolved.value().and_then(Value::stringify) {
            return text;
        }

        if self.renderer.options.strict {
            self.report_error(&RenderError::Undefined {
                path: path.to_string(),
            });
        } else {
            let warning = Warning {
                path: path.to_string(),
                category: WarningCategory::UndefinedToken,
            };
            tracing::debug!(%warning, "Undefined tag");
            self.summary.warnings += 1;
            self.sink.warn(&warning);
        }
        String::new()
    }

    fn write(&mut self, chunk: &str) {
        if !chunk.is_empty() {
            self.sink.write(chunk);
        }
    }

    fn report_error(&mut self, err: &RenderError) {
        tracing::debug!(error = %err, "Token failed to render");
        self.summary.errors += 1;
        self.sink.error(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partials::{MemoryRegistry, NullRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(tree: &TokenTree, context: serde_json::Value) -> StringSink {
        Renderer::new()
            .render_blocking(tree, context, &NullRegistry)
            .expect("render should succeed")
    }

    #[test]
    fn test_static_only() {
        let tree = TokenTree::multi(vec![Token::text("a"), Token::text("b"), Token::text("c")]);
        assert_eq!(render(&tree, json!({})).output(), "abc");
    }

    #[test]
    fn test_tags() {
        let tree = TokenTree::multi(vec![
            Token::text("Hello, "),
            Token::escaped("name"),
            Token::text(" "),
            Token::unescaped("name"),
        ]);
        let sink = render(&tree, json!({ "name": "A&B" }));
        assert_eq!(sink.output(), r"Hello, A\&B A&B");
    }

    #[test]
    fn test_missing_tag_warns() {
        let tree = TokenTree::multi(vec![
            Token::text("["),
            Token::escaped("user.missing"),
            Token::text("]"),
        ]);
        let sink = render(&tree, json!({ "user": { "name": "Cy" } }));
        assert_eq!(sink.output(), "[]");
        assert_eq!(
            sink.warnings(),
            &[Warning {
                path: "user.missing".to_string(),
                category: WarningCategory::UndefinedToken,
            }]
        );
        assert!(sink.errors().is_empty());
    }

    #[test]
    fn test_strict_mode_reports_error() {
        let tree = TokenTree::multi(vec![Token::escaped("missing"), Token::text("after")]);
        let renderer = Renderer::new().with_options(RenderOptions::new().with_strict_mode(true));
        let sink = renderer
            .render_blocking(&tree, json!({}), &NullRegistry)
            .unwrap();
        assert_eq!(sink.output(), "after");
        assert_eq!(sink.errors(), &["Undefined value: missing".to_string()]);
        assert!(sink.warnings().is_empty());
    }

    #[test]
    fn test_invalid_tree_is_fatal() {
        let tree = TokenTree::with_marker(
            crate::token::TreeMarker::Other("static".to_string()),
            vec![Token::text("never")],
        );
        let mut sink = StringSink::new();
        let result =
            pollster::block_on(Renderer::new().render(&tree, json!({}), &NullRegistry, &mut sink));
        assert!(matches!(result, Err(RenderError::InvalidTree { .. })));
        assert_eq!(sink.output(), "");
    }

    #[test]
    fn test_empty_caller_stack_is_left_empty() {
        let tree = TokenTree::multi(vec![Token::text("x")]);
        let mut stack = ContextStack::from(Vec::new());
        let mut sink = StringSink::new();

        pollster::block_on(Renderer::new().render_with_stack(
            &tree,
            &mut stack,
            &NullRegistry,
            &mut sink,
        ))
        .unwrap();

        assert_eq!(sink.output(), "x");
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_caller_stack_depth_is_preserved() {
        let tree = TokenTree::multi(vec![Token::section(
            "items",
            "",
            TokenTree::multi(vec![Token::escaped("v")]),
        )]);
        let mut stack = ContextStack::from(json!({ "items": [{ "v": 1 }, { "v": 2 }] }));
        let mut sink = StringSink::new();

        pollster::block_on(Renderer::new().render_with_stack(
            &tree,
            &mut stack,
            &NullRegistry,
            &mut sink,
        ))
        .unwrap();

        assert_eq!(sink.output(), "12");
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_sections_by_shape() {
        let body = TokenTree::multi(vec![Token::text("<"), Token::escaped("v"), Token::text(">")]);
        let tree = TokenTree::multi(vec![
            Token::section("list", "", body.clone()),
            Token::section("map", "", body.clone()),
            Token::section("flag", "", body.clone()),
            Token::section("off", "", body.clone()),
            Token::section("missing", "", body),
        ]);
        let sink = render(
            &tree,
            json!({
                "v": "top",
                "list": [{ "v": 1 }, { "v": 2 }],
                "map": { "v": "m" },
                "flag": true,
                "off": false
            }),
        );
        assert_eq!(sink.output(), "<1><2><m><top>");
    }

    #[test]
    fn test_yield_interval_is_observable() {
        let tokens = (0..250).map(|_| Token::text("x")).collect();
        let tree = TokenTree::multi(tokens);
        let mut sink = StringSink::new();
        let summary =
            pollster::block_on(Renderer::new().render(&tree, json!({}), &NullRegistry, &mut sink))
                .unwrap();

        assert_eq!(sink.output().len(), 250);
        // 251 advances that take a token (250 + the final one), plus one
        // yielding advance at every multiple of 100
        assert_eq!(summary.yields, 2);
        assert_eq!(summary.steps, 253);
    }

    #[test]
    fn test_recursive_partial_is_bounded() {
        let mut partials = MemoryRegistry::new();
        partials.add(
            "loop",
            TokenTree::multi(vec![Token::text("."), Token::partial("loop")]),
        );
        let tree = TokenTree::multi(vec![Token::partial("loop"), Token::text("end")]);
        let renderer =
            Renderer::new().with_options(RenderOptions::new().with_max_partial_depth(3));

        let sink = renderer.render_blocking(&tree, json!({}), &partials).unwrap();
        assert_eq!(sink.output(), "...end");
        assert_eq!(sink.errors().len(), 1);
        assert!(sink.errors()[0].contains("Recursive partial"));
    }
}

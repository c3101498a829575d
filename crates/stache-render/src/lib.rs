/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Streaming renderer for compiled mustache token trees.
//!
//! This crate renders a pre-parsed template (a [`TokenTree`] of static text,
//! tags, sections and partial references) against a layered [`ContextStack`],
//! writing output incrementally to an [`OutputSink`]. It supports:
//!
//! - Escaped and unescaped tags: `{{name}}`, `{{{name}}}`
//! - Dotted paths with innermost-scope-wins lookup: `{{user.name}}`
//! - Sections and inverted sections over lists, maps and booleans
//! - Partials from a [`PartialRegistry`]
//! - Lambda values invoked with the raw section body
//!
//! # Architecture
//!
//! Parsing is **not** part of this crate. Trees are built directly or decoded
//! from the compiler's JSON wire format with [`TokenTree::from_json`].
//!
//! The traversal is a flat, index-based loop per tree. It yields to the
//! scheduler every [`RenderOptions::yield_interval`] steps, waits on the
//! sink's [`Backpressure`] gate while the consumer is paused, and checks an
//! optional cancellation token at the same points. A failing token is
//! reported on the sink's error channel and the traversal moves on.
//!
//! # Example
//!
//! ```ignore
//! use stache_render::{NullRegistry, Renderer, Token, TokenTree, Value};
//!
//! let tree = TokenTree::multi(vec![
//!     Token::text("Hello, "),
//!     Token::escaped("name"),
//!     Token::text("!"),
//! ]);
//! let context = Value::from(serde_json::json!({ "name": "World" }));
//!
//! let sink = Renderer::new().render_blocking(&tree, context, &NullRegistry)?;
//! assert_eq!(sink.output(), "Hello, World!");
//! ```

pub mod context;
pub mod error;
pub mod escape;
pub mod flow;
pub mod options;
pub mod partials;
pub mod renderer;
pub mod resolver;
pub mod sink;
pub mod token;
pub mod value;

// Re-export main types at crate root
pub use context::ContextStack;
pub use error::{EscapeError, LambdaError, RenderError, RenderResult};
pub use escape::{Escaper, LITERAL_MARKER, TableEscaper, Verbatim};
pub use flow::{Backpressure, FlowController, flow_control};
pub use options::RenderOptions;
pub use partials::{CompiledPartial, MemoryRegistry, NullRegistry, PartialRegistry};
pub use renderer::{RenderSummary, Renderer};
pub use resolver::{Resolved, resolve, smash};
pub use sink::{ChannelSink, OutputSink, RenderEvent, StringSink, Warning, WarningCategory};
pub use token::{Mustache, Token, TokenTree, TreeMarker};
pub use value::{Lambda, Scope, Value};

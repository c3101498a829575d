/*
 * sink.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output sinks: where rendered text, errors and warnings go.

use std::fmt;

use tokio::sync::mpsc;

use crate::error::RenderError;
use crate::flow::Backpressure;

/// Category tag attached to a [`Warning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCategory {
    /// A tag resolved to nothing (or to null) and printed as empty.
    UndefinedToken,
}

impl WarningCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCategory::UndefinedToken => "token.undefined",
        }
    }
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A soft problem with one tag. Never stops rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// The tag path as written in the template.
    pub path: String,
    pub category: WarningCategory,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.path)
    }
}

/// Consumer of a render.
///
/// Output arrives as a sequence of chunks in document order. Per-token
/// errors and warnings are reported as they happen; none of them stop the
/// render.
pub trait OutputSink {
    /// Append a chunk of output.
    fn write(&mut self, chunk: &str);

    /// Report a token that failed to render.
    fn error(&mut self, error: &RenderError);

    /// Report a soft warning.
    fn warn(&mut self, warning: &Warning);

    /// Gate the renderer waits on before every step.
    ///
    /// Sinks that never apply backpressure keep the default.
    fn backpressure(&self) -> Option<Backpressure> {
        None
    }
}

/// Sink that collects everything in memory.
#[derive(Debug, Default)]
pub struct StringSink {
    output: String,
    chunks: usize,
    errors: Vec<String>,
    warnings: Vec<Warning>,
    gate: Option<Backpressure>,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply backpressure from the given gate.
    pub fn with_backpressure(mut self, gate: Backpressure) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }

    /// Number of chunks written so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Messages of the errors reported so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

impl OutputSink for StringSink {
    fn write(&mut self, chunk: &str) {
        self.output.push_str(chunk);
        self.chunks += 1;
    }

    fn error(&mut self, error: &RenderError) {
        self.errors.push(error.to_string());
    }

    fn warn(&mut self, warning: &Warning) {
        self.warnings.push(warning.clone());
    }

    fn backpressure(&self) -> Option<Backpressure> {
        self.gate.clone()
    }
}

/// Event streamed by a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Data(String),
    Error(String),
    Warn(Warning),
}

/// Sink that forwards every event over an unbounded channel.
///
/// The channel itself never blocks; pair it with [`crate::flow_control`]
/// so the receiving side can pause the renderer when it falls behind.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RenderEvent>,
    gate: Option<Backpressure>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RenderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, gate: None }, rx)
    }

    pub fn with_backpressure(mut self, gate: Backpressure) -> Self {
        self.gate = Some(gate);
        self
    }

    fn send(&self, event: RenderEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Render event dropped: receiver closed");
        }
    }
}

impl OutputSink for ChannelSink {
    fn write(&mut self, chunk: &str) {
        self.send(RenderEvent::Data(chunk.to_string()));
    }

    fn error(&mut self, error: &RenderError) {
        self.send(RenderEvent::Error(error.to_string()));
    }

    fn warn(&mut self, warning: &Warning) {
        self.send(RenderEvent::Warn(warning.clone()));
    }

    fn backpressure(&self) -> Option<Backpressure> {
        self.gate.clone()
    }
}

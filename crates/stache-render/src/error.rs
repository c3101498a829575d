/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for decoding and rendering token trees.

use thiserror::Error;

/// Errors that can occur while decoding or rendering a template.
///
/// Only [`RenderError::InvalidTree`] on the top-level tree and
/// [`RenderError::Cancelled`] end a render. Everything else is raised for a
/// single token, reported through [`crate::OutputSink::error`], and the
/// traversal continues with the next token.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The tree is not rooted under the `multi` marker.
    #[error("Expected a compiled token tree rooted at 'multi', found '{marker}'")]
    InvalidTree { marker: String },

    /// The compiler's JSON output could not be decoded.
    #[error("Malformed token: {message}")]
    MalformedToken { message: String },

    /// A lambda bound to a tag or section failed.
    #[error("Lambda for '{path}' failed: {source}")]
    Lambda {
        path: String,
        #[source]
        source: LambdaError,
    },

    /// The escaper rejected a tag's output.
    #[error("Failed to escape '{path}': {source}")]
    Escape {
        path: String,
        #[source]
        source: EscapeError,
    },

    /// Partials nested deeper than the configured limit.
    #[error("Recursive partial inclusion detected (depth > {max_depth}): {name}")]
    RecursivePartial { name: String, max_depth: usize },

    /// A tag resolved to nothing while rendering in strict mode.
    #[error("Undefined value: {path}")]
    Undefined { path: String },

    /// The render was cancelled through its cancellation token.
    #[error("Render was cancelled")]
    Cancelled,
}

impl RenderError {
    /// Create a MalformedToken error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Check if this error ends the whole render rather than one token.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error returned by a [`crate::Lambda`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LambdaError {
    pub message: String,
}

impl LambdaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned by an [`crate::Escaper`] that cannot represent its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{alphabet} cannot represent {character:?}")]
pub struct EscapeError {
    /// Name of the target alphabet (e.g. "latex").
    pub alphabet: String,
    /// The offending character.
    pub character: char,
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cancellation_is_fatal() {
        assert!(RenderError::Cancelled.is_fatal());
        assert!(
            !RenderError::InvalidTree {
                marker: "static".to_string()
            }
            .is_fatal()
        );
        assert!(!RenderError::malformed("bad").is_fatal());
    }

    #[test]
    fn test_lambda_error_display() {
        let err = RenderError::Lambda {
            path: "greet".to_string(),
            source: LambdaError::new("boom"),
        };
        assert_eq!(err.to_string(), "Lambda for 'greet' failed: boom");
    }
}

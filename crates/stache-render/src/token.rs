/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled template tokens.
//!
//! Trees are produced by an external compiler. They can be built directly
//! with the constructors here, or decoded from the compiler's JSON output:
//!
//! ```text
//! ["multi",
//!   ["static", _, "Hello "],
//!   ["mustache", "etag", "name"],
//!   ["mustache", "section", "items", "{{.}}", ["multi", ...]],
//!   ["mustache", "partial", "footer"]]
//! ```

use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::{RenderError, RenderResult};

/// Root marker of a token tree. Only [`TreeMarker::Multi`] is renderable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeMarker {
    Multi,
    Other(String),
}

impl TreeMarker {
    pub fn as_str(&self) -> &str {
        match self {
            TreeMarker::Multi => "multi",
            TreeMarker::Other(marker) => marker,
        }
    }
}

/// An immutable, cheaply cloned sequence of tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenTree {
    marker: TreeMarker,
    tokens: Arc<[Token]>,
}

impl TokenTree {
    /// Create a renderable tree.
    pub fn multi(tokens: Vec<Token>) -> Self {
        Self {
            marker: TreeMarker::Multi,
            tokens: tokens.into(),
        }
    }

    /// Create a tree with an arbitrary root marker.
    pub fn with_marker(marker: TreeMarker, tokens: Vec<Token>) -> Self {
        Self {
            marker,
            tokens: tokens.into(),
        }
    }

    pub fn marker(&self) -> &TreeMarker {
        &self.marker
    }

    pub fn is_multi(&self) -> bool {
        self.marker == TreeMarker::Multi
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Fail unless the tree is rooted under `multi`.
    pub fn validate(&self) -> RenderResult<()> {
        if self.is_multi() {
            Ok(())
        } else {
            Err(RenderError::InvalidTree {
                marker: self.marker.as_str().to_string(),
            })
        }
    }

    /// Decode a tree from the compiler's JSON output.
    ///
    /// The root marker is recorded, not checked: a tree rooted elsewhere
    /// decodes fine and is rejected when rendered.
    pub fn from_json(json: &Json) -> RenderResult<Self> {
        let items = json
            .as_array()
            .ok_or_else(|| RenderError::malformed("token tree must be an array"))?;
        let (head, rest) = items
            .split_first()
            .ok_or_else(|| RenderError::malformed("token tree is empty"))?;
        let marker = match head.as_str() {
            Some("multi") => TreeMarker::Multi,
            Some(other) => TreeMarker::Other(other.to_string()),
            None => return Err(RenderError::malformed("token tree marker must be a string")),
        };
        let tokens = rest
            .iter()
            .map(Token::from_json)
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(Self::with_marker(marker, tokens))
    }
}

/// One node of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text, written verbatim.
    Static(String),

    /// A tag, section or partial reference.
    Mustache(Mustache),
}

/// The kinds of mustache tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Mustache {
    /// `{{{path}}}` / `{{&path}}`: written without escaping.
    UnescapedTag(String),

    /// `{{path}}`: written through the escaper.
    EscapedTag(String),

    /// `{{#path}}...{{/path}}`
    Section {
        path: String,
        /// Unrendered body source, handed to lambdas.
        raw: String,
        body: TokenTree,
    },

    /// `{{^path}}...{{/path}}`
    InvertedSection {
        path: String,
        raw: String,
        body: TokenTree,
    },

    /// `{{> name}}`
    Partial(String),
}

impl Token {
    pub fn text(text: impl Into<String>) -> Self {
        Token::Static(text.into())
    }

    pub fn escaped(path: impl Into<String>) -> Self {
        Token::Mustache(Mustache::EscapedTag(path.into()))
    }

    pub fn unescaped(path: impl Into<String>) -> Self {
        Token::Mustache(Mustache::UnescapedTag(path.into()))
    }

    pub fn section(path: impl Into<String>, raw: impl Into<String>, body: TokenTree) -> Self {
        Token::Mustache(Mustache::Section {
            path: path.into(),
            raw: raw.into(),
            body,
        })
    }

    pub fn inverted(path: impl Into<String>, raw: impl Into<String>, body: TokenTree) -> Self {
        Token::Mustache(Mustache::InvertedSection {
            path: path.into(),
            raw: raw.into(),
            body,
        })
    }

    pub fn partial(name: impl Into<String>) -> Self {
        Token::Mustache(Mustache::Partial(name.into()))
    }

    /// Decode one token from the compiler's JSON output.
    pub fn from_json(json: &Json) -> RenderResult<Self> {
        let items = json
            .as_array()
            .ok_or_else(|| RenderError::malformed(format!("token must be an array: {json}")))?;
        let field = |i: usize| -> RenderResult<&str> {
            items.get(i).and_then(Json::as_str).ok_or_else(|| {
                RenderError::malformed(format!("token field {i} must be a string: {json}"))
            })
        };

        match field(0)? {
            "static" => Ok(Token::text(field(2)?)),
            "mustache" => {
                let kind = field(1)?;
                let name = field(2)?;
                match kind {
                    "utag" => Ok(Token::unescaped(name)),
                    "etag" => Ok(Token::escaped(name)),
                    "partial" => Ok(Token::partial(name)),
                    "section" | "inverted_section" => {
                        let raw = field(3)?;
                        let body = items.get(4).ok_or_else(|| {
                            RenderError::malformed(format!("section '{name}' has no body"))
                        })?;
                        let body = TokenTree::from_json(body)?;
                        if kind == "section" {
                            Ok(Token::section(name, raw, body))
                        } else {
                            Ok(Token::inverted(name, raw, body))
                        }
                    }
                    other => Err(RenderError::malformed(format!(
                        "unknown mustache kind '{other}'"
                    ))),
                }
            }
            other => Err(RenderError::malformed(format!(
                "unknown token type '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_flat_tree() {
        let tree = TokenTree::from_json(&json!([
            "multi",
            ["static", "", "Hello, "],
            ["mustache", "etag", "name"],
            ["mustache", "utag", "raw"],
            ["mustache", "partial", "footer"]
        ]))
        .unwrap();

        assert!(tree.is_multi());
        assert_eq!(
            tree.tokens(),
            &[
                Token::text("Hello, "),
                Token::escaped("name"),
                Token::unescaped("raw"),
                Token::partial("footer"),
            ]
        );
    }

    #[test]
    fn test_decode_nested_sections() {
        let tree = TokenTree::from_json(&json!([
            "multi",
            ["mustache", "section", "items", "{{.}}", ["multi", ["static", "", "x"]]],
            ["mustache", "inverted_section", "items", "none", ["multi"]]
        ]))
        .unwrap();

        assert_eq!(tree.len(), 2);
        match &tree.tokens()[0] {
            Token::Mustache(Mustache::Section { path, raw, body }) => {
                assert_eq!(path, "items");
                assert_eq!(raw, "{{.}}");
                assert_eq!(body.tokens(), &[Token::text("x")]);
            }
            other => panic!("expected section, got {other:?}"),
        }
        match &tree.tokens()[1] {
            Token::Mustache(Mustache::InvertedSection { body, .. }) => assert!(body.is_empty()),
            other => panic!("expected inverted section, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_marker_decodes_but_does_not_validate() {
        let tree = TokenTree::from_json(&json!(["tree", ["static", "", "oops"]])).unwrap();
        assert_eq!(tree.marker(), &TreeMarker::Other("tree".to_string()));
        assert!(matches!(
            tree.validate(),
            Err(RenderError::InvalidTree { marker }) if marker == "tree"
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_kinds() {
        let err = TokenTree::from_json(&json!(["multi", ["mustache", "comment", "x"]]));
        assert!(matches!(err, Err(RenderError::MalformedToken { .. })));

        let err = TokenTree::from_json(&json!({ "tokens": [] }));
        assert!(matches!(err, Err(RenderError::MalformedToken { .. })));
    }
}

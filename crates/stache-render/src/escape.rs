/*
 * escape.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output escaping for escaped tags.
//!
//! The renderer only calls the escaper for `{{tag}}` output; static text,
//! unescaped tags and partial content are written as they are. Which
//! alphabet to escape for is a deployment choice: pass any [`Escaper`] to
//! [`crate::Renderer::with_escaper`].

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::EscapeError;

/// Two-character marker that makes the next character literal.
pub const LITERAL_MARKER: &str = "@!";

// An optional literal marker followed by one character outside ASCII [A-Za-z0-9]
static ESCAPABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(@!)?[^A-Za-z0-9]").expect("escape pattern is valid"));

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@!").expect("marker pattern is valid"));

/// A strategy for escaping tag output into one target alphabet.
pub trait Escaper: Send + Sync {
    fn escape(&self, raw: &str) -> Result<String, EscapeError>;
}

impl<F> Escaper for F
where
    F: Fn(&str) -> Result<String, EscapeError> + Send + Sync,
{
    fn escape(&self, raw: &str) -> Result<String, EscapeError> {
        self(raw)
    }
}

/// Escaper driven by a character substitution table.
///
/// Every character other than an ASCII letter or digit is looked up in the
/// table and replaced by its entry; characters without an entry pass through. A
/// character preceded by [`LITERAL_MARKER`] is written verbatim and the
/// marker is dropped.
#[derive(Debug, Clone, Copy)]
pub struct TableEscaper {
    alphabet: &'static str,
    table: fn(char) -> Option<&'static str>,
}

impl TableEscaper {
    pub fn new(alphabet: &'static str, table: fn(char) -> Option<&'static str>) -> Self {
        Self { alphabet, table }
    }

    /// Escaping for LaTeX output. This is the renderer's default.
    pub fn latex() -> Self {
        Self::new("latex", latex_table)
    }

    /// Escaping for HTML output.
    pub fn html() -> Self {
        Self::new("html", html_table)
    }

    /// Name of the target alphabet.
    pub fn alphabet(&self) -> &'static str {
        self.alphabet
    }
}

impl Default for TableEscaper {
    fn default() -> Self {
        Self::latex()
    }
}

impl Escaper for TableEscaper {
    fn escape(&self, raw: &str) -> Result<String, EscapeError> {
        let escaped = ESCAPABLE.replace_all(raw, |caps: &Captures| {
            let matched = &caps[0];
            if caps.get(1).is_some() {
                // Literal: drop the marker, keep the character
                return matched[LITERAL_MARKER.len()..].to_string();
            }
            let c = matched.chars().next().unwrap_or_default();
            match (self.table)(c) {
                Some(replacement) => replacement.to_string(),
                None => matched.to_string(),
            }
        });
        Ok(escaped.into_owned())
    }
}

/// Writes tag output unchanged apart from removing literal markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl Escaper for Verbatim {
    fn escape(&self, raw: &str) -> Result<String, EscapeError> {
        Ok(MARKER.replace_all(raw, "").into_owned())
    }
}

fn latex_table(c: char) -> Option<&'static str> {
    let replacement = match c {
        '{' => r"\{",
        '}' => r"\}",
        '_' => r"\_",
        '#' => r"\#",
        '&' => r"\&",
        '$' => r"\$",
        '%' => r"\%",
        '\n' => r"\\",
        // The text* commands below need the textcomp package
        '~' => r"\textasciitilde ",
        '\\' => r"\textbackslash ",
        '^' => r"\textasciicircum ",
        '>' => r"\textgreater ",
        '<' => r"\textless ",
        '¢' => r"\textcent ",
        '°' => r"\textdegree ",
        '¶' => r"\P ",
        '†' => r"\dag ",
        '‡' => r"\ddag ",
        '|' => r"\textbar ",
        '™' => r"\texttrademark ",
        '¡' => r"\textexclamdown ",
        '£' => r"\pounds ",
        '§' => r"\S ",
        '®' => r"\textregistered ",
        '¿' => r"\textquestiondown ",
        '©' => r"\textcopyright ",
        _ => return None,
    };
    Some(replacement)
}

fn html_table(c: char) -> Option<&'static str> {
    let replacement = match c {
        '&' => "&amp;",
        '<' => "&lt;",
        '>' => "&gt;",
        '"' => "&quot;",
        '\'' => "&#39;",
        _ => return None,
    };
    Some(replacement)
}

//! A position-preserving Liquid parser.
//!
//! The parser keeps exact byte spans for every element it produces so that
//! offenses can point back at the original source. It understands the
//! standard Liquid tags plus the theme tags (`section`, `schema`, `style`,
//! `form`, `paginate`, ...). Anything else parses as [`NodeType::Unknown`].

pub mod ast;
mod expression;
mod lexer;
mod parser;

pub use ast::{Child, Document, Element, NodeType};
pub(crate) use lexer::excerpt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the parser reacts to recoverable syntax problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Fail on the first problem.
    Strict,
    /// Recover and collect every problem as a warning.
    #[default]
    Warn,
    /// Recover silently.
    Lax,
}

impl std::fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Warn => write!(f, "warn"),
            Self::Lax => write!(f, "lax"),
        }
    }
}

/// A Liquid syntax problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Liquid syntax error (line {line_number}): {message}")]
pub struct ParseError {
    /// Human-readable description.
    pub message: String,
    /// 1-indexed line where the problem starts.
    pub line_number: usize,
    /// Offending markup, shortened to its first line.
    pub markup: String,
}

impl ParseError {
    /// Creates a parse error.
    #[must_use]
    pub fn new(message: impl Into<String>, line_number: usize, markup: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line_number,
            markup: markup.into(),
        }
    }
}

/// Parses a Liquid template.
///
/// In [`ErrorMode::Warn`] and [`ErrorMode::Lax`] the parser recovers from
/// syntax problems and returns a partial tree. Nesting deeper than 100
/// blocks is an error in every mode.
///
/// # Errors
///
/// Returns the first problem found in strict mode, or a nesting error.
pub fn parse(source: &str, mode: ErrorMode) -> Result<Document, ParseError> {
    parser::parse_document(source, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mode_parses_from_lowercase() {
        let mode: ErrorMode = toml::from_str::<toml::Table>("mode = 'strict'")
            .ok()
            .and_then(|t| t.get("mode").cloned())
            .and_then(|v| v.try_into().ok())
            .unwrap_or_default();
        assert_eq!(mode, ErrorMode::Strict);
        assert_eq!(ErrorMode::default(), ErrorMode::Warn);
    }

    #[test]
    fn parse_error_display() {
        let error = ParseError::new("Unknown tag 'foo'", 3, "{% foo %}");
        assert_eq!(
            error.to_string(),
            "Liquid syntax error (line 3): Unknown tag 'foo'"
        );
    }
}

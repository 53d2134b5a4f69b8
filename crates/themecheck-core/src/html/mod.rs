//! HTML support for Liquid files.
//!
//! Liquid regions are replaced with same-length placeholders (see
//! [`bridge`]) so that a plain HTML parser can process the file. Every
//! accessor on [`HtmlNode`] restores the placeholders before returning text,
//! and every span is valid on the original source.

pub mod bridge;
mod node;
mod parser;

pub use bridge::{substitute, PlaceholderTable, Substitution, DELIMITER};
pub use node::{HtmlAttribute, HtmlNode, HtmlTree, MarkupMismatch};
pub use parser::{parse_fragment, Fragment, Limits, RawAttribute, RawKind, RawNode};

use thiserror::Error;

/// Failure of the HTML parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HtmlParseError {
    /// The fragment exceeds one of the configured [`Limits`].
    #[error("HTML {limit} of {max} exceeded on line {line}")]
    LimitsExceeded {
        /// Name of the limit.
        limit: &'static str,
        /// Configured ceiling.
        max: usize,
        /// Line where the limit was crossed.
        line: usize,
    },
}

/// Failure to build placeholders for a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A placeholder cannot be encoded without ambiguity.
    #[error("cannot substitute Liquid on line {line}: {detail}")]
    PlaceholderOverflow {
        /// Line of the offending region.
        line: usize,
        /// What went wrong.
        detail: String,
    },
}

/// Reasons an HTML tree is unavailable for a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HtmlError {
    /// Placeholder substitution failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// The HTML parser gave up.
    #[error(transparent)]
    Parse(#[from] HtmlParseError),
}

impl HtmlError {
    /// Line the problem was found on.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Bridge(BridgeError::PlaceholderOverflow { line, .. })
            | Self::Parse(HtmlParseError::LimitsExceeded { line, .. }) => *line,
        }
    }
}

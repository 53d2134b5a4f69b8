//! The interface every check implements.
//!
//! A check declares the [`Event`]s it wants with [`Check::subscriptions`]
//! and receives them through [`Check::handle`]. Events mirror the traversal:
//! `on_<type>` before a node's children are visited, `after_<type>` once
//! they have been, plus whole-file and whole-run events.
//!
//! ```ignore
//! use themecheck_core::{Check, CheckContext, CheckError, CheckMeta, Event, EventArgs, NodeType};
//!
//! #[derive(Debug, Default)]
//! struct NoAssign;
//!
//! impl Check for NoAssign {
//!     fn meta(&self) -> CheckMeta {
//!         CheckMeta::new("NoAssign", "XX001")
//!     }
//!
//!     fn subscriptions(&self) -> Vec<Event> {
//!         vec![Event::on(NodeType::Assign)]
//!     }
//!
//!     fn handle(&mut self, _: &Event, args: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
//!         if let EventArgs::Liquid(node) = args {
//!             cx.add_offense(node, "Avoid assign");
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::CheckConfig;
use crate::html::{HtmlError, HtmlNode};
use crate::liquid::{NodeType, ParseError};
use crate::node::{LocateError, Node};
use crate::theme::{JsonFile, Theme};
use crate::types::{Location, Offense, Severity};
use crate::watchdog::CancelToken;

/// Area a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Liquid syntax and usage.
    Liquid,
    /// HTML inside templates.
    Html,
    /// JSON files and schemas.
    Json,
    /// Page speed.
    Performance,
    /// Theme structure.
    Theme,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Liquid => "liquid",
            Self::Html => "html",
            Self::Json => "json",
            Self::Performance => "performance",
            Self::Theme => "theme",
        };
        f.write_str(name)
    }
}

/// Static description of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckMeta {
    /// Name used in configuration and directives (e.g. "UnusedAssign").
    pub name: &'static str,
    /// Short code (e.g. "TC003").
    pub code: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Default severity.
    pub severity: Severity,
    /// Areas the check covers.
    pub categories: &'static [Category],
    /// Documentation link.
    pub doc_url: Option<&'static str>,
    /// Whether `theme-check-disable` can suppress the check.
    pub can_disable: bool,
    /// Whether the check only looks at one file at a time.
    pub single_file: bool,
}

impl CheckMeta {
    /// Metadata with defaults: error severity, disableable, single-file.
    #[must_use]
    pub const fn new(name: &'static str, code: &'static str) -> Self {
        Self {
            name,
            code,
            description: "",
            severity: Severity::Error,
            categories: &[],
            doc_url: None,
            can_disable: true,
            single_file: true,
        }
    }

    /// Sets the description.
    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the default severity.
    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the categories.
    #[must_use]
    pub const fn categories(mut self, categories: &'static [Category]) -> Self {
        self.categories = categories;
        self
    }

    /// Sets the documentation link.
    #[must_use]
    pub const fn doc_url(mut self, url: &'static str) -> Self {
        self.doc_url = Some(url);
        self
    }

    /// Makes the check immune to disable directives.
    #[must_use]
    pub const fn mandatory(mut self) -> Self {
        self.can_disable = false;
        self
    }

    /// Marks the check as needing the whole theme (`on_end`).
    #[must_use]
    pub const fn whole_theme(mut self) -> Self {
        self.single_file = false;
        self
    }
}

/// What an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// Any Liquid node.
    Node,
    /// Any Liquid tag.
    Tag,
    /// A Liquid node type.
    Liquid(NodeType),
    /// Any real HTML element.
    Element,
    /// An HTML node by name: an element name such as `img`, or `text`,
    /// `comment`, `doctype`, `document`.
    Html(String),
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node => f.write_str("node"),
            Self::Tag => f.write_str("tag"),
            Self::Liquid(node_type) => f.write_str(node_type.as_str()),
            Self::Element => f.write_str("element"),
            Self::Html(name) => f.write_str(name),
        }
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    /// Entering a node, before its children.
    On(Subject),
    /// Leaving a node, after its children. Not fired for literals.
    After(Subject),
    /// A Liquid file failed to parse.
    Error,
    /// The HTML view of a Liquid file is unavailable.
    ParseError,
    /// A JSON file was read.
    JsonFile,
    /// Every file was visited. Fired once per full run.
    End,
}

impl Event {
    /// `on_<type>` for a Liquid node type.
    #[must_use]
    pub fn on(node_type: NodeType) -> Self {
        Self::On(Subject::Liquid(node_type))
    }

    /// `after_<type>` for a Liquid node type.
    #[must_use]
    pub fn after(node_type: NodeType) -> Self {
        Self::After(Subject::Liquid(node_type))
    }

    /// `on_<name>` for an HTML node name.
    #[must_use]
    pub fn on_html(name: impl Into<String>) -> Self {
        Self::On(Subject::Html(name.into().to_ascii_lowercase()))
    }

    /// `after_<name>` for an HTML node name.
    #[must_use]
    pub fn after_html(name: impl Into<String>) -> Self {
        Self::After(Subject::Html(name.into().to_ascii_lowercase()))
    }

    /// Returns true for events raised by the HTML visitor.
    #[must_use]
    pub fn is_html(&self) -> bool {
        matches!(
            self,
            Self::On(Subject::Element | Subject::Html(_))
                | Self::After(Subject::Element | Subject::Html(_))
                | Self::ParseError
        )
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On(subject) => write!(f, "on_{subject}"),
            Self::After(subject) => write!(f, "after_{subject}"),
            Self::Error => f.write_str("on_error"),
            Self::ParseError => f.write_str("on_parse_error"),
            Self::JsonFile => f.write_str("on_json_file"),
            Self::End => f.write_str("on_end"),
        }
    }
}

/// Payload of an event.
#[derive(Debug, Clone, Copy)]
pub enum EventArgs<'a> {
    /// A Liquid node.
    Liquid(Node<'a>),
    /// An HTML node.
    Html(HtmlNode<'a>),
    /// A Liquid file that failed to parse.
    Error {
        /// File path.
        file: &'a Path,
        /// Full source of the file.
        source: &'a str,
        /// The parser's error.
        error: &'a ParseError,
    },
    /// A Liquid file without an HTML view.
    ParseError {
        /// File path.
        file: &'a Path,
        /// Full source of the file.
        source: &'a str,
        /// Why the HTML view is missing.
        error: &'a HtmlError,
    },
    /// A JSON file.
    JsonFile(&'a JsonFile),
    /// End of the run.
    End,
}

impl<'a> EventArgs<'a> {
    /// File the event is about.
    #[must_use]
    pub fn file(&self) -> Option<&'a Path> {
        match *self {
            Self::Liquid(node) => Some(node.path()),
            Self::Html(node) => Some(node.path()),
            Self::Error { file, .. } | Self::ParseError { file, .. } => Some(file),
            Self::JsonFile(json) => Some(json.path()),
            Self::End => None,
        }
    }

    /// The Liquid node, if any.
    #[must_use]
    pub fn node(&self) -> Option<Node<'a>> {
        match *self {
            Self::Liquid(node) => Some(node),
            _ => None,
        }
    }

    /// The HTML node, if any.
    #[must_use]
    pub fn html(&self) -> Option<HtmlNode<'a>> {
        match *self {
            Self::Html(node) => Some(node),
            _ => None,
        }
    }

    /// Line and first-line excerpt of the node, for bug reports.
    #[must_use]
    pub fn describe(&self) -> (Option<usize>, Option<String>) {
        match *self {
            Self::Liquid(node) => (Some(node.line_number()), Some(node.excerpt())),
            Self::Html(node) => (Some(node.line_number()), Some(node.excerpt())),
            Self::Error { error, .. } => (Some(error.line_number), Some(error.markup.clone())),
            Self::ParseError { error, .. } => (Some(error.line()), None),
            Self::JsonFile(_) | Self::End => (None, None),
        }
    }
}

/// Errors a check returns from [`Check::handle`].
#[derive(Debug, Error)]
pub enum CheckError {
    /// A Liquid syntax error; aborts the run as [`EngineError::Parse`].
    ///
    /// [`EngineError::Parse`]: crate::EngineError::Parse
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A node could not be located.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// Anything else. Treated as a bug in the check.
    #[error("{0}")]
    Other(String),
}

impl CheckError {
    /// Creates an [`CheckError::Other`].
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A lint check.
///
/// One instance lives for the whole run and may accumulate state across
/// events and files. The `Debug` output is included in bug reports as the
/// check's configuration.
pub trait Check: Send + std::fmt::Debug {
    /// Static metadata.
    fn meta(&self) -> CheckMeta;

    /// Events this check handles.
    fn subscriptions(&self) -> Vec<Event>;

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole run.
    fn handle(
        &mut self,
        event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError>;

    /// Applies options from the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid options.
    fn configure(&mut self, _config: &CheckConfig) -> Result<(), CheckError> {
        Ok(())
    }

    /// Clears state accumulated by a previous run.
    fn reset(&mut self) {}
}

/// Type alias for boxed Check trait objects.
pub type CheckBox = Box<dyn Check>;

/// What a check sees while handling an event.
#[derive(Debug)]
pub struct CheckContext<'a> {
    theme: &'a Theme,
    meta: CheckMeta,
    severity: Severity,
    offenses: &'a mut Vec<Offense>,
    cancel: &'a CancelToken,
}

impl<'a> CheckContext<'a> {
    /// Creates a context that reports into `offenses`.
    pub fn new(
        theme: &'a Theme,
        meta: CheckMeta,
        severity: Severity,
        offenses: &'a mut Vec<Offense>,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            theme,
            meta,
            severity,
            offenses,
            cancel,
        }
    }

    /// The theme being analyzed.
    #[must_use]
    pub fn theme(&self) -> &'a Theme {
        self.theme
    }

    /// Metadata of the running check.
    #[must_use]
    pub fn meta(&self) -> CheckMeta {
        self.meta
    }

    /// Effective severity of the running check.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns true once the invocation exceeded its time budget. Long
    /// loops should poll this and return early.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// An offense of the running check, not yet reported.
    #[must_use]
    pub fn offense(&self, file: impl Into<PathBuf>, message: impl Into<String>) -> Offense {
        let offense = Offense::new(self.meta.name, self.meta.code, self.severity, file, message);
        match self.meta.doc_url {
            Some(url) => offense.with_doc_url(url),
            None => offense,
        }
    }

    /// Reports an offense.
    pub fn report(&mut self, offense: Offense) {
        self.offenses.push(offense);
    }

    /// Reports an offense at a Liquid node.
    pub fn add_offense(&mut self, node: Node<'_>, message: impl Into<String>) {
        let offense = self.offense(node.path(), message).at(Location::of_node(node));
        self.report(offense);
    }

    /// Reports an offense at an HTML node.
    pub fn add_html_offense(&mut self, node: HtmlNode<'_>, message: impl Into<String>) {
        let offense = self.offense(node.path(), message).at(Location::of_html(node));
        self.report(offense);
    }

    /// Reports an offense on a whole file.
    pub fn add_file_offense(&mut self, file: impl Into<PathBuf>, message: impl Into<String>) {
        let offense = self.offense(file, message);
        self.report(offense);
    }
}

//! Errors that stop an analysis.
//!
//! Problems in the theme are offenses, not errors. An [`EngineError`] means
//! the run could not complete: a strict-mode syntax error a check chose to
//! propagate, a storage failure, or a bug in a check or in the engine. Bugs
//! carry a [`BugReport`] and are rendered with [`BugReport::render`].

use std::fmt::Write;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::liquid::ParseError;
use crate::storage::StorageError;

/// Where new issues are filed.
pub const ISSUES_URL: &str = "https://github.com/themecheck/themecheck/issues";

/// Everything known about a failed check invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BugReport {
    /// Name of the check, if a check was running.
    pub check: Option<String>,
    /// Event being dispatched, e.g. `on_assign`.
    pub event: Option<String>,
    /// File being analyzed.
    pub file: Option<PathBuf>,
    /// 1-indexed line of the node.
    pub line: Option<usize>,
    /// First line of the node's markup.
    pub excerpt: Option<String>,
    /// What went wrong.
    pub message: String,
    /// The check's configuration, as `Debug` output.
    pub config: Option<String>,
    /// Backtrace captured when the failure was observed.
    pub backtrace: Option<String>,
}

impl BugReport {
    /// Creates a report with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// One-line description used as the error message.
    #[must_use]
    pub fn headline(&self) -> String {
        let mut line = match (&self.check, &self.event) {
            (Some(check), Some(event)) => format!("{check} failed in {event}"),
            (Some(check), None) => format!("{check} failed"),
            (None, _) => "engine failure".to_string(),
        };
        if let Some(file) = &self.file {
            let _ = write!(line, " while analyzing {}", file.display());
            if let Some(n) = self.line {
                let _ = write!(line, ":{n}");
            }
        }
        let _ = write!(line, ": {}", self.message);
        line
    }

    /// Full report printed when a run aborts.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Whoops! It looks like you found a bug in themecheck.");
        let _ = writeln!(out, "Please report it at {ISSUES_URL} with the following details.");
        let _ = writeln!(out);
        let _ = writeln!(out, "  message: {}", self.message);
        if let Some(check) = &self.check {
            let _ = writeln!(out, "  check:   {check}");
        }
        if let Some(event) = &self.event {
            let _ = writeln!(out, "  event:   {event}");
        }
        if let Some(file) = &self.file {
            match self.line {
                Some(n) => {
                    let _ = writeln!(out, "  file:    {}:{n}", file.display());
                }
                None => {
                    let _ = writeln!(out, "  file:    {}", file.display());
                }
            }
        }
        if let Some(excerpt) = &self.excerpt {
            let _ = writeln!(out, "  node:    {excerpt}");
        }
        let _ = writeln!(out, "  version: {}", env!("CARGO_PKG_VERSION"));
        if let Some(config) = &self.config {
            let _ = writeln!(out, "\nconfiguration:\n{config}");
        }
        if let Some(backtrace) = &self.backtrace {
            let _ = writeln!(out, "\nbacktrace:\n{backtrace}");
        }
        out
    }
}

impl std::fmt::Display for BugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.headline())
    }
}

/// Errors that abort an analysis.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// A Liquid syntax error a check propagated.
    #[error("Liquid syntax error in {path}: {source}")]
    #[diagnostic(code(themecheck::parse))]
    Parse {
        /// File being analyzed.
        path: PathBuf,
        /// The parser's error.
        source: ParseError,
    },

    /// A check or the engine misbehaved.
    #[error("internal bug: {0}")]
    #[diagnostic(
        code(themecheck::internal_bug),
        help("this is a bug in themecheck, not in your theme; please report it")
    )]
    InternalBug(Box<BugReport>),

    /// A check did not return in time.
    #[error("check timed out: {0}")]
    #[diagnostic(
        code(themecheck::timeout),
        help("a check hung on this input; please report it with the file attached")
    )]
    Timeout(Box<BugReport>),

    /// Reading or writing theme files failed.
    #[error(transparent)]
    #[diagnostic(code(themecheck::storage))]
    Storage(#[from] StorageError),

    /// The configuration is invalid.
    #[error(transparent)]
    #[diagnostic(code(themecheck::config))]
    Config(#[from] ConfigError),

    /// The run was cancelled between files.
    #[error("analysis cancelled")]
    #[diagnostic(code(themecheck::cancelled))]
    Cancelled,
}

impl EngineError {
    /// The bug report of an internal failure.
    #[must_use]
    pub fn bug_report(&self) -> Option<&BugReport> {
        match self {
            Self::InternalBug(report) | Self::Timeout(report) => Some(report),
            _ => None,
        }
    }

    /// Returns true for failures caused by the engine or a check rather
    /// than by the environment.
    #[must_use]
    pub fn is_bug(&self) -> bool {
        self.bug_report().is_some()
    }
}

//! # themecheck-core
//!
//! Engine of a static analyzer for Liquid themes.
//!
//! Each file of a [`Theme`] is parsed into a [`LiquidTree`] and walked
//! depth-first; checks subscribe to [`Event`]s and report [`Offense`]s. Checks
//! that need HTML also receive an [`HtmlTree`] built from the same source with
//! Liquid regions replaced by same-length placeholders, so every position is
//! valid on the original file. Inline `theme-check-disable` /
//! `theme-check-enable` comments are tracked by [`DisabledRanges`] and
//! filter the final offense list.
//!
//! This crate provides:
//!
//! - [`Check`] trait and [`CheckMeta`] for writing checks
//! - [`CheckRegistry`] for dispatching events under a timeout and a panic
//!   boundary
//! - [`Analyzer`] for orchestrating a run
//! - [`Corrector`] for applying auto-corrections
//!
//! ## Example
//!
//! ```ignore
//! use themecheck_core::{Analyzer, InMemoryStorage};
//!
//! let mut analyzer = Analyzer::builder()
//!     .storage(InMemoryStorage::from_files([("templates/index.liquid", "{% assign x = 1 %}")]))
//!     .check(MyCheck::default())
//!     .build()?;
//!
//! let result = analyzer.analyze_theme()?;
//! result.print_report();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analyzer;
mod check;
mod config;
pub mod corrector;
mod disabled;
mod error;
pub mod html;
pub mod liquid;
mod node;
pub mod position;
mod registry;
mod storage;
mod theme;
mod types;
mod visitor;
mod watchdog;

pub use analyzer::{Analyzer, AnalyzerBuilder, ProgressFn};
pub use check::{
    Category, Check, CheckBox, CheckContext, CheckError, CheckMeta, Event, EventArgs, Subject,
};
pub use config::{AnalyzerConfig, CheckConfig, Config, ConfigError};
pub use corrector::{Correction, CorrectionSummary, Corrector};
pub use disabled::{
    CheckScope, Directive, DisabledCheck, DisabledRanges, DISABLE_PREFIX, ENABLE_PREFIX,
};
pub use error::{BugReport, EngineError, ISSUES_URL};
pub use html::{HtmlAttribute, HtmlError, HtmlNode, HtmlTree, Limits};
pub use liquid::{ErrorMode, NodeType, ParseError};
pub use node::{LiquidTree, LocateError, Node, NodeId};
pub use position::{Position, Span};
pub use registry::{CheckRegistry, Scope, DEFAULT_TIMEOUT};
pub use storage::{FileSystemStorage, InMemoryStorage, Storage, StorageError};
pub use theme::{FileFormat, FileKind, JsonError, JsonFile, Theme, ThemeFile};
pub use types::{LintResult, Location, Offense, OffenseDiagnostic, Severity};
pub use visitor::{HtmlVisitor, LiquidVisitor};
pub use watchdog::{AnalysisCancel, CancelToken, HangPolicy, Invocation, Watchdog};

//! Core types for offenses and results.

use miette::{Diagnostic, SourceSpan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::corrector::Correction;
use crate::html::HtmlNode;
use crate::node::Node;
use crate::position::{index_to_line_number, index_to_row_column, Position, Span};

/// Severity level for offenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Formatting and consistency.
    Style,
    /// Improvements that are not required.
    Suggestion,
    /// Problems that break the theme.
    Error,
}

impl Severity {
    /// Parses a severity name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "style" => Some(Self::Style),
            "suggestion" => Some(Self::Suggestion),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Style => write!(f, "style"),
            Self::Suggestion => write!(f, "suggestion"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Position of an offense inside its file.
///
/// Rows and columns are 0-indexed byte positions, `line` is 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Byte offset of the first byte.
    pub start_index: usize,
    /// Byte offset just past the last byte.
    pub end_index: usize,
    /// Row of `start_index`.
    pub start_row: usize,
    /// Column of `start_index`.
    pub start_column: usize,
    /// Row of `end_index`.
    pub end_row: usize,
    /// Column of `end_index`.
    pub end_column: usize,
    /// 1-indexed line of `start_index`.
    pub line: usize,
}

impl Location {
    /// Location of a byte span of `source`.
    #[must_use]
    pub fn of_span(source: &str, span: Span) -> Self {
        let (start_row, start_column) = index_to_row_column(source, span.start);
        let (end_row, end_column) = index_to_row_column(source, span.end);
        Self {
            start_index: span.start.min(source.len()),
            end_index: span.end.min(source.len()),
            start_row,
            start_column,
            end_row,
            end_column,
            line: index_to_line_number(source, span.start),
        }
    }

    /// Location of `markup` searched on the 1-indexed `line` of `source`.
    #[must_use]
    pub fn of_markup(source: &str, markup: &str, line: Option<usize>) -> Self {
        Self::of_span(source, Position::new(markup, source, line).span())
    }

    /// Location of a Liquid node.
    #[must_use]
    pub fn of_node(node: Node<'_>) -> Self {
        Self::of_span(node.source(), node.span())
    }

    /// Location of an HTML node.
    #[must_use]
    pub fn of_html(node: HtmlNode<'_>) -> Self {
        Self::of_span(node.source(), node.span())
    }

    /// The byte span.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.start_index, self.end_index)
    }
}

impl From<Node<'_>> for Location {
    fn from(node: Node<'_>) -> Self {
        Self::of_node(node)
    }
}

impl From<HtmlNode<'_>> for Location {
    fn from(node: HtmlNode<'_>) -> Self {
        Self::of_html(node)
    }
}

/// A lint finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offense {
    /// Name of the check (e.g. "UnusedAssign").
    pub check: String,
    /// Code of the check (e.g. "TC003").
    pub code: String,
    /// Severity of this offense.
    pub severity: Severity,
    /// File path relative to the theme root.
    pub file: PathBuf,
    /// Position in the file, if the offense points at a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Human-readable message.
    pub message: String,
    /// Documentation of the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
    /// Whether a correction is attached.
    #[serde(default)]
    pub correctable: bool,
    #[serde(skip)]
    correction: Option<Correction>,
}

impl Offense {
    /// Creates an offense without a location.
    #[must_use]
    pub fn new(
        check: impl Into<String>,
        code: impl Into<String>,
        severity: Severity,
        file: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check: check.into(),
            code: code.into(),
            severity,
            file: file.into(),
            location: None,
            message: message.into(),
            doc_url: None,
            correctable: false,
            correction: None,
        }
    }

    /// Sets the position of the offense.
    #[must_use]
    pub fn at(mut self, location: impl Into<Location>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Adds a documentation link.
    #[must_use]
    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }

    /// Attaches a correction.
    #[must_use]
    pub fn with_correction(mut self, correction: impl Into<Correction>) -> Self {
        self.correction = Some(correction.into());
        self.correctable = true;
        self
    }

    /// The attached correction.
    #[must_use]
    pub fn correction(&self) -> Option<&Correction> {
        self.correction.as_ref()
    }

    /// Byte offset used for directive suppression; offenses without a
    /// location count as offset 0.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.location.map_or(0, |l| l.start_index)
    }

    /// 1-indexed line, 0 without a location.
    #[must_use]
    pub fn line(&self) -> usize {
        self.location.map_or(0, |l| l.line)
    }

    /// 1-indexed column, 0 without a location.
    #[must_use]
    pub fn column(&self) -> usize {
        self.location.map_or(0, |l| l.start_column + 1)
    }

    /// Formats the offense for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!(
            "{} {} at {}:{}:{}\n",
            self.code,
            self.check,
            self.file.display(),
            self.line(),
            self.column(),
        );
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        if self.correctable {
            let _ = writeln!(output, "  = help: run with --auto-correct to fix");
        }
        if let Some(url) = &self.doc_url {
            let _ = writeln!(output, "  = see: {url}");
        }
        output
    }
}

impl PartialEq for Offense {
    fn eq(&self, other: &Self) -> bool {
        self.check == other.check
            && self.code == other.code
            && self.severity == other.severity
            && self.file == other.file
            && self.location == other.location
            && self.message == other.message
            && self.correctable == other.correctable
    }
}

impl Eq for Offense {}

impl std::fmt::Display for Offense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}] {}",
            self.file.display(),
            self.line(),
            self.column(),
            self.severity,
            self.check,
            self.message
        )
    }
}

/// An offense rendered through miette.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{message}")]
pub struct OffenseDiagnostic {
    message: String,
    #[help]
    help: Option<String>,
    #[label("{label_message}")]
    span: SourceSpan,
    label_message: String,
    file: String,
    #[source_code]
    source_code: miette::NamedSource<String>,
}

impl OffenseDiagnostic {
    /// Attaches the file contents so the label can be rendered in place.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_code = miette::NamedSource::new(self.file.clone(), source.into());
        self
    }
}

impl From<&Offense> for OffenseDiagnostic {
    fn from(o: &Offense) -> Self {
        let span = o
            .location
            .map_or((0, 0), |l| (l.start_index, l.end_index - l.start_index));
        Self {
            message: format!("[{}] {}", o.check, o.message),
            help: o.doc_url.clone(),
            span: SourceSpan::from(span),
            label_message: o.severity.to_string(),
            file: o.file.display().to_string(),
            source_code: miette::NamedSource::new(o.file.display().to_string(), String::new()),
        }
    }
}

/// Result of running an analysis.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LintResult {
    /// All offenses, sorted by file and position.
    pub offenses: Vec<Offense>,
    /// Number of files inspected.
    pub files_checked: usize,
}

impl LintResult {
    /// Creates a new empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no offenses.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.offenses.is_empty()
    }

    /// Offenses grouped by file, in path order.
    #[must_use]
    pub fn by_file(&self) -> BTreeMap<&Path, Vec<&Offense>> {
        let mut grouped: BTreeMap<&Path, Vec<&Offense>> = BTreeMap::new();
        for offense in &self.offenses {
            grouped.entry(&offense.file).or_default().push(offense);
        }
        grouped
    }

    /// Returns offenses filtered by severity.
    #[must_use]
    pub fn by_severity(&self, severity: Severity) -> Vec<&Offense> {
        self.offenses
            .iter()
            .filter(|o| o.severity == severity)
            .collect()
    }

    /// Counts offenses by severity as `(errors, suggestions, style)`.
    #[must_use]
    pub fn count_by_severity(&self) -> (usize, usize, usize) {
        let count = |severity| self.offenses.iter().filter(|o| o.severity == severity).count();
        (
            count(Severity::Error),
            count(Severity::Suggestion),
            count(Severity::Style),
        )
    }

    /// Number of offenses carrying a correction.
    #[must_use]
    pub fn correctable_count(&self) -> usize {
        self.offenses.iter().filter(|o| o.correctable).count()
    }

    /// Checks if any offense meets or exceeds the given severity.
    #[must_use]
    pub fn has_offenses_at(&self, severity: Severity) -> bool {
        self.offenses.iter().any(|o| o.severity >= severity)
    }

    /// One-line summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let (errors, suggestions, style) = self.count_by_severity();
        let correctable = self.correctable_count();
        let mut line = format!(
            "{} file(s) inspected, {} offense(s) detected ({errors} error(s), {suggestions} suggestion(s), {style} style)",
            self.files_checked,
            self.offenses.len(),
        );
        if correctable > 0 {
            line.push_str(&format!(", {correctable} offense(s) auto-correctable"));
        }
        line
    }

    /// Prints a report to stdout.
    pub fn print_report(&self) {
        for offense in &self.offenses {
            println!("{}", offense.format());
        }
        println!("\n{}", self.summary());
    }

    /// Formats offenses as a test failure report.
    ///
    /// Produces a multi-line report suitable for `panic!()` messages.
    #[must_use]
    pub fn format_test_report(&self, fail_on: Severity) -> String {
        use std::fmt::Write;

        let failing: Vec<&Offense> = self
            .offenses
            .iter()
            .filter(|o| o.severity >= fail_on)
            .collect();

        let mut report = String::new();
        let _ = writeln!(report, "\n=== themecheck: {} offense(s) ===\n", failing.len());
        for offense in &failing {
            let _ = writeln!(report, "{}", offense.format());
        }
        let _ = writeln!(report, "{}", self.summary());
        report
    }

    /// Adds offenses from another result.
    pub fn extend(&mut self, other: Self) {
        self.offenses.extend(other.offenses);
        self.files_checked += other.files_checked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquid::ErrorMode;
    use crate::node::LiquidTree;

    fn make_offense(severity: Severity) -> Offense {
        Offense::new(
            "UnusedAssign",
            "TC003",
            severity,
            "snippets/card.liquid",
            "`x` is never used",
        )
    }

    #[test]
    fn severity_orders_style_below_error() {
        assert!(Severity::Style < Severity::Suggestion);
        assert!(Severity::Suggestion < Severity::Error);
        assert_eq!(Severity::from_name("Suggestion"), Some(Severity::Suggestion));
        assert_eq!(Severity::from_name("warning"), None);
    }

    #[test]
    fn location_of_node() {
        let tree = LiquidTree::parse("a.liquid", "x\n  {% assign y = 1 %}", ErrorMode::Warn)
            .unwrap();
        let node = tree.root().children().nth(1).unwrap();
        let location = Location::of_node(node);
        assert_eq!(location.line, 2);
        assert_eq!((location.start_row, location.start_column), (1, 2));
        assert_eq!(location.start_index, 4);
        assert_eq!(location.end_index, 22);
    }

    #[test]
    fn offense_without_location_starts_at_zero() {
        let offense = make_offense(Severity::Error);
        assert_eq!(offense.start_index(), 0);
        assert_eq!(offense.line(), 0);
        assert!(!offense.correctable);
    }

    #[test]
    fn display_and_format() {
        let offense = make_offense(Severity::Suggestion)
            .at(Location::of_span("{% assign x = 1 %}", Span::new(0, 18)))
            .with_doc_url("https://example.com/unused-assign");
        assert_eq!(
            offense.to_string(),
            "snippets/card.liquid:1:1: suggestion [UnusedAssign] `x` is never used"
        );
        let formatted = offense.format();
        assert!(formatted.contains("= see: https://example.com/unused-assign"));
        assert!(!formatted.contains("--auto-correct"));
    }

    #[test]
    fn counts_and_summary() {
        let mut result = LintResult::new();
        result.files_checked = 3;
        result.offenses.push(make_offense(Severity::Error));
        result.offenses.push(make_offense(Severity::Style));
        result.offenses.push(
            make_offense(Severity::Style).with_correction(|c: &mut crate::Corrector| {
                c.remove(Span::new(0, 1));
            }),
        );

        assert_eq!(result.count_by_severity(), (1, 0, 2));
        assert_eq!(result.correctable_count(), 1);
        assert!(result.has_offenses_at(Severity::Error));
        insta::assert_snapshot!(
            result.summary(),
            @"3 file(s) inspected, 3 offense(s) detected (1 error(s), 0 suggestion(s), 2 style), 1 offense(s) auto-correctable"
        );
    }

    #[test]
    fn groups_by_file() {
        let mut result = LintResult::new();
        result.offenses.push(make_offense(Severity::Error));
        let mut other = make_offense(Severity::Error);
        other.file = PathBuf::from("layout/theme.liquid");
        result.offenses.push(other);

        let grouped = result.by_file();
        let files: Vec<_> = grouped.keys().collect();
        assert_eq!(
            files,
            vec![&Path::new("layout/theme.liquid"), &Path::new("snippets/card.liquid")]
        );
    }

    #[test]
    fn test_report_filters_by_severity() {
        let mut result = LintResult::new();
        result.files_checked = 1;
        result.offenses.push(make_offense(Severity::Style));
        result.offenses.push(make_offense(Severity::Error));

        let report = result.format_test_report(Severity::Error);
        assert!(report.contains("1 offense(s) ==="));
        assert!(report.contains("1 error(s)"));
    }

    #[test]
    fn serializes_without_correction() {
        let offense = make_offense(Severity::Error);
        let json = serde_json::to_value(&offense).unwrap();
        assert_eq!(json["check"], "UnusedAssign");
        assert_eq!(json["severity"], "error");
        assert!(json.get("location").is_none());
        assert_eq!(json["correctable"], false);
    }
}

//! Check reporting templates whose HTML cannot be analyzed.
//!
//! # Rationale
//!
//! When the HTML of a template exceeds the parser limits, or its Liquid
//! cannot be substituted, every HTML check silently skips the file. This
//! check makes the gap visible.

use themecheck_core::position::line_start_index;
use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Event, EventArgs, Location, Severity,
    Span,
};

/// Check code for HtmlParsingError.
pub const CODE: &str = "TC013";

/// Check name for HtmlParsingError.
pub const NAME: &str = "HtmlParsingError";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports templates whose HTML cannot be parsed")
    .severity(Severity::Error)
    .categories(&[Category::Html]);

/// Reports HTML parse failures.
#[derive(Debug, Clone, Default)]
pub struct HtmlParsingError;

impl HtmlParsingError {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Check for HtmlParsingError {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::ParseError]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        let EventArgs::ParseError {
            file,
            source,
            error,
        } = args
        else {
            return Ok(());
        };
        let at = line_start_index(source, error.line().saturating_sub(1));
        let offense = cx
            .offense(file, format!("HTML in this template can not be parsed: {error}"))
            .at(Location::of_span(source, Span::new(at, at)));
        cx.report(offense);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::analyze_with;
    use themecheck_core::Config;

    #[test]
    fn test_reports_exceeded_limits() {
        let config = Config::parse("[analyzer]\nmax_html_depth = 2\n").unwrap();
        let result = analyze_with(
            &[("templates/index.liquid", "<div>\n<div>\n<div></div></div></div>")],
            Box::new(HtmlParsingError::new()),
            config,
        );
        assert_eq!(result.offenses.len(), 1);
        assert_eq!(result.offenses[0].line(), 3);
        insta::assert_snapshot!(
            result.offenses[0].message,
            @"HTML in this template can not be parsed: HTML max_tree_depth of 2 exceeded on line 3"
        );
    }

    #[test]
    fn test_parsable_html() {
        let result = analyze_with(
            &[("templates/index.liquid", "<div><p>{{ x }}</p></div>")],
            Box::new(HtmlParsingError::new()),
            Config::default(),
        );
        assert!(result.is_clean());
    }
}

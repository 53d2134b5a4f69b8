//! Check reporting Liquid syntax errors.
//!
//! # Rationale
//!
//! A template that does not parse renders an error page or, worse, renders
//! partially. Strict-mode parse failures arrive as `on_error`; problems the
//! parser recovered from are read from the tree on `on_document`.

use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Event, EventArgs, Location, NodeType,
    ParseError, Severity,
};

/// Check code for SyntaxError.
pub const CODE: &str = "TC001";

/// Check name for SyntaxError.
pub const NAME: &str = "SyntaxError";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports Liquid syntax errors")
    .severity(Severity::Error)
    .categories(&[Category::Liquid]);

/// Reports Liquid syntax errors.
#[derive(Debug, Clone, Default)]
pub struct SyntaxError;

impl SyntaxError {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn report(cx: &mut CheckContext<'_>, file: &std::path::Path, source: &str, error: &ParseError) {
    let location = Location::of_markup(source, &error.markup, Some(error.line_number));
    let offense = cx.offense(file, error.message.clone()).at(location);
    cx.report(offense);
}

impl Check for SyntaxError {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::Error, Event::on(NodeType::Document)]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        match args {
            EventArgs::Error {
                file,
                source,
                error,
            } => report(cx, file, source, error),
            EventArgs::Liquid(document) => {
                let tree = document.tree();
                for warning in tree.warnings() {
                    report(cx, tree.path(), tree.source(), warning);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, analyze_with, messages};
    use themecheck_core::Config;

    #[test]
    fn test_reports_recovered_errors() {
        let result = analyze(
            &[("templates/index.liquid", "<p>\n{% if a %}\n{% frobnicate %}</p>")],
            Box::new(SyntaxError::new()),
        );
        assert_eq!(
            messages(&result),
            vec!["'if' tag was never closed", "Unknown tag 'frobnicate'"]
        );
        assert_eq!(result.offenses[0].line(), 2);
        assert_eq!(result.offenses[1].line(), 3);
        assert_eq!(result.offenses.len(), 2);
        assert!(result.offenses.iter().all(|o| o.code == CODE));
    }

    #[test]
    fn test_reports_strict_failure() {
        let config = Config::parse("[analyzer]\nliquid_error_mode = \"strict\"\n").unwrap();
        let result = analyze_with(
            &[("snippets/a.liquid", "ok\n{% for x in xs %}")],
            Box::new(SyntaxError::new()),
            config,
        );
        assert_eq!(messages(&result), vec!["'for' tag was never closed"]);
        assert_eq!(result.offenses[0].line(), 2);
    }

    #[test]
    fn test_clean_template() {
        let result = analyze(
            &[("snippets/a.liquid", "{% if a %}{{ a }}{% endif %}")],
            Box::new(SyntaxError::new()),
        );
        assert!(result.is_clean());
    }
}

//! Check reporting `theme-check-disable` comments that are never closed.
//!
//! # Rationale
//!
//! A disable left open silently turns off checks for the rest of the file.
//! Disabling on the first line is the idiom for turning checks off in a
//! whole file and is not reported.
//!
//! This check cannot itself be disabled.

use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, CheckScope, DisabledRanges, Event,
    EventArgs, NodeType, Severity,
};

/// Check code for MissingEnableComment.
pub const CODE: &str = "TC002";

/// Check name for MissingEnableComment.
pub const NAME: &str = "MissingEnableComment";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports theme-check-disable comments without a matching theme-check-enable")
    .severity(Severity::Error)
    .categories(&[Category::Liquid])
    .mandatory();

/// Reports unclosed disable directives.
#[derive(Debug, Clone, Default)]
pub struct MissingEnableComment {
    ranges: DisabledRanges,
}

impl MissingEnableComment {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn message(scopes: &[CheckScope]) -> String {
    if scopes.contains(&CheckScope::All) {
        return "All checks were disabled but not re-enabled with theme-check-enable".to_string();
    }
    let names = scopes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let verb = if scopes.len() == 1 { "was" } else { "were" };
    format!("{names} {verb} disabled but not re-enabled with theme-check-enable")
}

impl Check for MissingEnableComment {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![
            Event::on(NodeType::Comment),
            Event::on(NodeType::InlineComment),
            Event::after(NodeType::Document),
        ]
    }

    fn handle(
        &mut self,
        event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        let Some(node) = args.node() else {
            return Ok(());
        };
        if !node.is_document() {
            self.ranges.update(node);
            return Ok(());
        }
        debug_assert_eq!(*event, Event::after(NodeType::Document));
        let missing = self.ranges.missing_end_index(node.path());
        if !missing.is_empty() {
            cx.add_offense(node, message(&missing));
        }
        self.ranges.clear(node.path());
        Ok(())
    }

    fn reset(&mut self) {
        self.ranges = DisabledRanges::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, messages};

    fn check(source: &str) -> Vec<String> {
        let result = analyze(
            &[("templates/index.liquid", source)],
            Box::new(MissingEnableComment::new()),
        );
        messages(&result).into_iter().map(String::from).collect()
    }

    #[test]
    fn test_unclosed_disable_all() {
        assert_eq!(
            check("<p>\n{% comment %}theme-check-disable{% endcomment %}\n{{ x }}"),
            vec!["All checks were disabled but not re-enabled with theme-check-enable"]
        );
    }

    #[test]
    fn test_names_still_disabled_checks() {
        assert_eq!(
            check("\n{% # theme-check-disable UnusedAssign, TemplateLength %}\n{% # theme-check-enable TemplateLength %}"),
            vec!["UnusedAssign was disabled but not re-enabled with theme-check-enable"]
        );
        assert_eq!(
            check("\n{% # theme-check-disable UnusedAssign, TemplateLength %}"),
            vec!["TemplateLength, UnusedAssign were disabled but not re-enabled with theme-check-enable"]
        );
    }

    #[test]
    fn test_first_line_disable_is_the_whole_file_idiom() {
        assert!(check("{% comment %}theme-check-disable{% endcomment %}\n{{ x }}").is_empty());
    }

    #[test]
    fn test_closed_disable() {
        assert!(check(
            "<p>\n{% comment %}theme-check-disable{% endcomment %}\n{{ x }}\n{% comment %}theme-check-enable{% endcomment %}"
        )
        .is_empty());
    }

    #[test]
    fn test_cannot_be_disabled() {
        assert!(!META.can_disable);
        let result = analyze(
            &[(
                "templates/index.liquid",
                "<p>\n{% comment %}theme-check-disable MissingEnableComment{% endcomment %}",
            )],
            Box::new(MissingEnableComment::new()),
        );
        assert_eq!(result.offenses.len(), 1);
    }
}

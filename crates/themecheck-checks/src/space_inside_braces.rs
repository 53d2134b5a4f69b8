//! Check enforcing one space inside `{{ }}` and `{% %}` delimiters.
//!
//! # Rationale
//!
//! `{{x}}` and `{%  if x%}` read poorly next to the rest of a theme. Exactly
//! one space is expected after the opening delimiter and before the closing
//! one. Whitespace-control dashes (`{{-`, `-%}`) and line breaks are accepted.
//!
//! The offense is correctable.

use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Correction, Event, EventArgs, Location,
    Node, NodeType, Severity, Span, Subject,
};

/// Check code for SpaceInsideBraces.
pub const CODE: &str = "TC004";

/// Check name for SpaceInsideBraces.
pub const NAME: &str = "SpaceInsideBraces";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Ensures consistent spacing inside Liquid delimiters")
    .severity(Severity::Style)
    .categories(&[Category::Liquid]);

/// Checks spacing inside Liquid delimiters.
#[derive(Debug, Clone, Default)]
pub struct SpaceInsideBraces;

impl SpaceInsideBraces {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// A spacing problem inside one delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Problem {
    MissingAfter { open: &'static str, at: usize },
    TooManyAfter { open: &'static str, space: Span },
    MissingBefore { close: &'static str, at: usize },
    TooManyBefore { close: &'static str, space: Span },
}

impl Problem {
    fn message(&self) -> String {
        match self {
            Self::MissingAfter { open, .. } => format!("Space missing after '{open}'"),
            Self::TooManyAfter { open, .. } => format!("Too many spaces after '{open}'"),
            Self::MissingBefore { close, .. } => format!("Space missing before '{close}'"),
            Self::TooManyBefore { close, .. } => format!("Too many spaces before '{close}'"),
        }
    }

    fn span(&self) -> Span {
        match *self {
            Self::MissingAfter { at, .. } | Self::MissingBefore { at, .. } => Span::new(at, at),
            Self::TooManyAfter { space, .. } | Self::TooManyBefore { space, .. } => space,
        }
    }

    fn correction(&self) -> Correction {
        let span = self.span();
        Correction::new(move |c| {
            c.replace(span, " ");
        })
    }
}

/// Inspects `source[span]`, which must be a full `{{ }}` or `{% %}` region.
fn inspect(source: &str, span: Span) -> Vec<Problem> {
    let Some(text) = source.get(span.start..span.end) else {
        return Vec::new();
    };
    let (open, close) = if text.starts_with("{{") && text.ends_with("}}") {
        ("{{", "}}")
    } else if text.starts_with("{%") && text.ends_with("%}") {
        ("{%", "%}")
    } else {
        return Vec::new();
    };
    if text.len() < 4 {
        return Vec::new();
    }

    let bytes = text.as_bytes();
    let mut inner_start = 2;
    if bytes.get(2) == Some(&b'-') {
        inner_start += 1;
    }
    let mut inner_end = text.len() - 2;
    if inner_end > inner_start && bytes[inner_end - 1] == b'-' {
        inner_end -= 1;
    }
    if inner_end <= inner_start {
        return Vec::new();
    }
    let inner = &text[inner_start..inner_end];
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut problems = Vec::new();
    let leading = &inner[..inner.len() - inner.trim_start().len()];
    let after = span.start + inner_start;
    if leading.is_empty() {
        problems.push(Problem::MissingAfter { open, at: after });
    } else if leading.len() > 1 && !leading.contains('\n') {
        problems.push(Problem::TooManyAfter {
            open,
            space: Span::new(after, after + leading.len()),
        });
    }

    let trailing = &inner[inner.trim_end().len()..];
    let before = span.start + inner_end;
    if trailing.is_empty() {
        problems.push(Problem::MissingBefore { close, at: before });
    } else if trailing.len() > 1 && !trailing.contains('\n') {
        problems.push(Problem::TooManyBefore {
            close,
            space: Span::new(before - trailing.len(), before),
        });
    }
    problems
}

fn regions(node: Node<'_>) -> Vec<Span> {
    let mut spans = vec![node.span()];
    if let Some(end) = node.end_tag_span() {
        spans.push(end);
    }
    spans
}

impl Check for SpaceInsideBraces {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![
            Event::On(Subject::Tag),
            Event::on(NodeType::Variable),
            Event::on(NodeType::Condition),
            Event::on(NodeType::ElseCondition),
        ]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        let Some(node) = args.node() else {
            return Ok(());
        };
        // The first branch of an `if` shares the opening tag of its parent.
        if matches!(node.node_type(), NodeType::Condition | NodeType::ElseCondition)
            && node.parent().is_some_and(|parent| parent.span() == node.span())
        {
            return Ok(());
        }
        let source = node.source();
        for span in regions(node) {
            for problem in inspect(source, span) {
                let offense = cx
                    .offense(node.path(), problem.message())
                    .at(Location::of_span(source, problem.span()))
                    .with_correction(problem.correction());
                cx.report(offense);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, correct, messages};

    fn check(source: &str) -> Vec<String> {
        let result = analyze(
            &[("templates/index.liquid", source)],
            Box::new(SpaceInsideBraces::new()),
        );
        messages(&result).into_iter().map(String::from).collect()
    }

    #[test]
    fn test_missing_spaces() {
        assert_eq!(
            check("{{x}}"),
            vec!["Space missing after '{{'", "Space missing before '}}'"]
        );
        assert_eq!(
            check("{%if x %}y{% endif%}"),
            vec!["Space missing after '{%'", "Space missing before '%}'"]
        );
    }

    #[test]
    fn test_too_many_spaces() {
        assert_eq!(check("{{  x }}"), vec!["Too many spaces after '{{'"]);
        assert_eq!(check("{% assign x = 1   %}{{ x }}"), vec!["Too many spaces before '%}'"]);
    }

    #[test]
    fn test_accepted_forms() {
        assert!(check("{{ x }}{{- x -}}{%- if x -%}{% endif %}").is_empty());
        assert!(check("{%\n  liquid\n  echo x\n%}").is_empty());
        assert!(check("{% assign y = x | default: 1 %}").is_empty());
        assert!(check("{% if a %}1{% elsif b %}2{% else %}3{% endif %}").is_empty());
    }

    #[test]
    fn test_branch_tags_are_checked_once() {
        assert_eq!(
            check("{% if a %}1{%else%}2{% endif %}"),
            vec!["Space missing after '{%'", "Space missing before '%}'"]
        );
        assert_eq!(check("{%if a %}1{% endif %}"), vec!["Space missing after '{%'"]);
    }

    #[test]
    fn test_offense_points_at_the_whitespace() {
        let result = analyze(
            &[("templates/index.liquid", "\n{{   x }}")],
            Box::new(SpaceInsideBraces::new()),
        );
        let location = result.offenses[0].location.unwrap();
        assert_eq!(location.line, 2);
        assert_eq!(location.start_column, 2);
        assert_eq!(location.end_column, 5);
    }

    #[test]
    fn test_correction() {
        let corrected = correct(
            &[("templates/index.liquid", "{{x}} {%  if x   %}{%endif%}")],
            Box::new(SpaceInsideBraces::new()),
            "templates/index.liquid",
        );
        assert_eq!(corrected.as_deref(), Some("{{ x }} {% if x %}{% endif %}"));
    }
}

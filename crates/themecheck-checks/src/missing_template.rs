//! Check reporting `render`, `include` and `section` tags that name a file
//! missing from the theme.
//!
//! # Rationale
//!
//! A missing snippet renders an error message in the storefront.
//!
//! # Configuration
//!
//! - `ignore_missing` (default empty): glob patterns of paths that may be
//!   missing, e.g. `snippets/icon-*.liquid`

use std::path::PathBuf;

use themecheck_core::{
    Category, Check, CheckConfig, CheckContext, CheckError, CheckMeta, Event, EventArgs, NodeType,
    Severity,
};

/// Check code for MissingTemplate.
pub const CODE: &str = "TC007";

/// Check name for MissingTemplate.
pub const NAME: &str = "MissingTemplate";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports missing snippets and sections")
    .severity(Severity::Error)
    .categories(&[Category::Liquid, Category::Theme]);

/// Reports references to missing templates.
#[derive(Debug, Clone, Default)]
pub struct MissingTemplate {
    ignore_missing: Vec<glob::Pattern>,
}

impl MissingTemplate {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Check for MissingTemplate {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![
            Event::on(NodeType::Render),
            Event::on(NodeType::Include),
            Event::on(NodeType::Section),
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
        let Some(name) = node.name() else {
            return Ok(());
        };
        let directory = if node.node_type() == NodeType::Section {
            "sections"
        } else {
            "snippets"
        };
        let path = PathBuf::from(format!("{directory}/{name}.liquid"));
        if cx.theme().contains(&path) {
            return Ok(());
        }
        let display = path.to_string_lossy();
        if self.ignore_missing.iter().any(|p| p.matches(&display)) {
            return Ok(());
        }
        cx.add_offense(node, format!("'{display}' is not found"));
        Ok(())
    }

    fn configure(&mut self, config: &CheckConfig) -> Result<(), CheckError> {
        self.ignore_missing = config
            .get_str_array("ignore_missing")
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| CheckError::other(format!("invalid pattern '{p}': {e}")))
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, analyze_with, messages};
    use themecheck_core::Config;

    #[test]
    fn test_reports_missing_snippets_and_sections() {
        let result = analyze(
            &[
                (
                    "templates/index.liquid",
                    "{% render 'card' %}\n{% render 'missing' %}\n{% include 'gone' %}\n{% section 'footer' %}",
                ),
                ("snippets/card.liquid", ""),
            ],
            Box::new(MissingTemplate::new()),
        );
        assert_eq!(
            messages(&result),
            vec![
                "'snippets/missing.liquid' is not found",
                "'snippets/gone.liquid' is not found",
                "'sections/footer.liquid' is not found",
            ]
        );
        assert_eq!(result.offenses[0].line(), 2);
    }

    #[test]
    fn test_dynamic_names_are_skipped() {
        let result = analyze(
            &[("templates/index.liquid", "{% include name %}")],
            Box::new(MissingTemplate::new()),
        );
        assert!(result.is_clean());
    }

    #[test]
    fn test_ignore_missing() {
        let config = Config::parse("[checks.MissingTemplate]\nignore_missing = [\"snippets/icon-*\"]\n")
            .unwrap();
        let result = analyze_with(
            &[("templates/index.liquid", "{% render 'icon-cart' %}{% render 'other' %}")],
            Box::new(MissingTemplate::new()),
            config,
        );
        assert_eq!(messages(&result), vec!["'snippets/other.liquid' is not found"]);
    }
}

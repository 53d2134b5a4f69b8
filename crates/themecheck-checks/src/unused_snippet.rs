//! Check reporting snippets that are never rendered.
//!
//! # Rationale
//!
//! Dead snippets grow the theme and confuse whoever edits it next. Runs that
//! see a `render` or `include` with a computed name cannot tell which
//! snippets are used, so nothing is reported.
//!
//! This check needs the whole theme and is skipped when single files are
//! analyzed. The offense is correctable: the snippet file is removed.

use std::collections::HashSet;

use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Correction, Event, EventArgs, NodeType,
    Severity,
};
use tracing::debug;

/// Check code for UnusedSnippet.
pub const CODE: &str = "TC008";

/// Check name for UnusedSnippet.
pub const NAME: &str = "UnusedSnippet";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports snippets that are not used")
    .severity(Severity::Suggestion)
    .categories(&[Category::Theme])
    .whole_theme();

/// Reports unused snippets.
#[derive(Debug, Clone, Default)]
pub struct UnusedSnippet {
    used: HashSet<String>,
    dynamic: bool,
}

impl UnusedSnippet {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Check for UnusedSnippet {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![
            Event::on(NodeType::Render),
            Event::on(NodeType::Include),
            Event::End,
        ]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        if let Some(node) = args.node() {
            match node.name() {
                Some(name) => {
                    self.used.insert(name.to_string());
                }
                None => self.dynamic = true,
            }
            return Ok(());
        }
        if self.dynamic {
            debug!("snippet names computed at render time, skipping unused snippets");
            return Ok(());
        }
        for (name, file) in cx.theme().snippets() {
            if self.used.contains(&name) {
                continue;
            }
            let path = file.path().to_path_buf();
            let target = path.clone();
            let offense = cx
                .offense(path, "This snippet is not used")
                .with_correction(Correction::new(move |c| {
                    c.remove_file(target.clone());
                }));
            cx.report(offense);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.used.clear();
        self.dynamic = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, correct};

    fn files(result: &themecheck_core::LintResult) -> Vec<String> {
        result
            .offenses
            .iter()
            .map(|o| o.file.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_reports_unused_snippets() {
        let result = analyze(
            &[
                ("templates/index.liquid", "{% render 'used' %}"),
                ("snippets/used.liquid", "{% include 'nested/inner' %}"),
                ("snippets/nested/inner.liquid", ""),
                ("snippets/unused.liquid", "x"),
            ],
            Box::new(UnusedSnippet::new()),
        );
        assert_eq!(files(&result), vec!["snippets/unused.liquid"]);
        assert_eq!(result.offenses[0].message, "This snippet is not used");
        assert!(result.offenses[0].correctable);
    }

    #[test]
    fn test_dynamic_include_disables_the_check() {
        let result = analyze(
            &[
                ("templates/index.liquid", "{% include section.settings.snippet %}"),
                ("snippets/unused.liquid", "x"),
            ],
            Box::new(UnusedSnippet::new()),
        );
        assert!(result.is_clean());
    }

    #[test]
    fn test_correction_removes_the_file() {
        let content = correct(
            &[
                ("templates/index.liquid", ""),
                ("snippets/unused.liquid", "x"),
            ],
            Box::new(UnusedSnippet::new()),
            "snippets/unused.liquid",
        );
        assert_eq!(content, None);
    }
}

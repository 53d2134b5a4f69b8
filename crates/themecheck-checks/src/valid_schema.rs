//! Check validating `{% schema %}` blocks of sections.
//!
//! # Rationale
//!
//! The schema of a section drives the theme editor. Broken JSON hides the
//! section from the editor, and settings without an `id` or with a repeated
//! one cannot be saved.
//!
//! Settings of the top-level `settings` array and of every block are
//! checked. `header` and `paragraph` settings are informational and need no
//! `id`.

use std::collections::HashSet;

use serde_json::Value;
use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Event, EventArgs, NodeType, Severity,
};

/// Check code for ValidSchema.
pub const CODE: &str = "TC010";

/// Check name for ValidSchema.
pub const NAME: &str = "ValidSchema";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports invalid section schemas")
    .severity(Severity::Error)
    .categories(&[Category::Json, Category::Theme]);

const INFORMATIONAL: &[&str] = &["header", "paragraph"];

/// Validates section schemas.
#[derive(Debug, Clone, Default)]
pub struct ValidSchema;

impl ValidSchema {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Problems of one `settings` array.
fn setting_problems(settings: &Value, scope: &str, problems: &mut Vec<String>) {
    let Some(settings) = settings.as_array() else {
        problems.push(format!("{scope} must be an array"));
        return;
    };
    let mut ids = HashSet::new();
    for (index, setting) in settings.iter().enumerate() {
        let Some(kind) = setting.get("type").and_then(Value::as_str) else {
            problems.push(format!("{scope}[{index}] is missing a type"));
            continue;
        };
        if INFORMATIONAL.contains(&kind) {
            continue;
        }
        match setting.get("id").and_then(Value::as_str) {
            None => problems.push(format!(
                "{scope}[{index}] of type '{kind}' is missing an id"
            )),
            Some(id) if !ids.insert(id) => {
                problems.push(format!("Duplicate setting id '{id}' in {scope}"));
            }
            Some(_) => {}
        }
    }
}

fn schema_problems(body: &str) -> Vec<String> {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(e) => return vec![format!("Invalid syntax in schema: {e}")],
    };
    let Some(schema) = value.as_object() else {
        return vec!["Schema must be a JSON object".to_string()];
    };
    let mut problems = Vec::new();
    if let Some(settings) = schema.get("settings") {
        setting_problems(settings, "settings", &mut problems);
    }
    if let Some(blocks) = schema.get("blocks").and_then(Value::as_array) {
        for (index, block) in blocks.iter().enumerate() {
            if let Some(settings) = block.get("settings") {
                setting_problems(settings, &format!("blocks[{index}].settings"), &mut problems);
            }
        }
    }
    problems
}

impl Check for ValidSchema {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on(NodeType::Schema)]
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
        for problem in schema_problems(node.inner_markup()) {
            cx.add_offense(node, problem);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, messages};

    fn check(schema: &str) -> Vec<String> {
        let source = format!("<div></div>\n{{% schema %}}\n{schema}\n{{% endschema %}}");
        let result = analyze(&[("sections/a.liquid", &source)], Box::new(ValidSchema::new()));
        assert!(result.offenses.iter().all(|o| o.line() == 2));
        messages(&result).into_iter().map(String::from).collect()
    }

    #[test]
    fn test_valid_schema() {
        assert!(check(
            r#"{"name": "A", "settings": [{"type": "header", "content": "x"}, {"type": "text", "id": "title"}],
                "blocks": [{"type": "b", "settings": [{"type": "text", "id": "title"}]}]}"#
        )
        .is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let problems = check("{\"name\": }");
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("Invalid syntax in schema: "));
        assert_eq!(check("[]"), vec!["Schema must be a JSON object"]);
    }

    #[test]
    fn test_setting_problems() {
        assert_eq!(
            check(
                r#"{"settings": [{"id": "a"}, {"type": "text"}, {"type": "text", "id": "t"}, {"type": "range", "id": "t"}],
                    "blocks": [{"settings": {}}]}"#
            ),
            vec![
                "settings[0] is missing a type",
                "settings[1] of type 'text' is missing an id",
                "Duplicate setting id 't' in settings",
                "blocks[0].settings must be an array",
            ]
        );
    }
}

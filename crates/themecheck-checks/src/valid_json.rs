//! Check reporting JSON files that do not parse.
//!
//! # Rationale
//!
//! Invalid JSON templates, locales or settings fail to upload.

use themecheck_core::position::row_column_to_index;
use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Event, EventArgs, Location, Severity,
    Span,
};

/// Check code for ValidJson.
pub const CODE: &str = "TC009";

/// Check name for ValidJson.
pub const NAME: &str = "ValidJson";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports invalid JSON files")
    .severity(Severity::Error)
    .categories(&[Category::Json]);

/// Reports JSON syntax errors.
#[derive(Debug, Clone, Default)]
pub struct ValidJson;

impl ValidJson {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Check for ValidJson {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::JsonFile]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        let EventArgs::JsonFile(json) = args else {
            return Ok(());
        };
        let Err(error) = json.value() else {
            return Ok(());
        };
        let content = json.content();
        let index = row_column_to_index(
            content,
            error.line.saturating_sub(1),
            error.column.saturating_sub(1),
        );
        let offense = cx
            .offense(json.path(), error.message.clone())
            .at(Location::of_span(content, Span::new(index, index)));
        cx.report(offense);
        Ok(())
    }
}

//! Check reporting scripts that block the HTML parser.
//!
//! # Rationale
//!
//! A `<script src>` without `defer` or `async` stops parsing until the script
//! is downloaded and run. The `script_tag` filter emits such a tag and is
//! reported too. Module scripts are deferred by default.

use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Event, EventArgs, NodeType, Severity,
};

/// Check code for ParserBlockingJavaScript.
pub const CODE: &str = "TC012";

/// Check name for ParserBlockingJavaScript.
pub const NAME: &str = "ParserBlockingJavaScript";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports parser-blocking scripts")
    .severity(Severity::Error)
    .categories(&[Category::Html, Category::Performance]);

/// Reports parser-blocking scripts.
#[derive(Debug, Clone, Default)]
pub struct ParserBlockingJavaScript;

impl ParserBlockingJavaScript {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Check for ParserBlockingJavaScript {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on_html("script"), Event::on(NodeType::Filter)]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        match args {
            EventArgs::Html(script) => {
                let blocking = script.has_attribute("src")
                    && !script.has_attribute("defer")
                    && !script.has_attribute("async")
                    && script
                        .attribute("type")
                        .map_or(true, |t| !t.trim().eq_ignore_ascii_case("module"));
                if blocking {
                    cx.add_html_offense(script, "Missing async or defer attribute on script tag");
                }
            }
            EventArgs::Liquid(filter) if filter.name() == Some("script_tag") => {
                cx.add_offense(
                    filter,
                    "The script_tag filter is parser-blocking. Use a script tag with the async or defer attribute",
                );
            }
            _ => {}
        }
        Ok(())
    }
}

//! Check reporting templates with too many lines.
//!
//! # Rationale
//!
//! Very long templates are hard to maintain and usually hide markup that
//! belongs in snippets or sections.
//!
//! # Configuration
//!
//! - `max_length` (default 600)
//! - `exclude_schema` (default true): do not count `{% schema %}` blocks
//! - `exclude_stylesheet` (default true): do not count `{% stylesheet %}`
//!   and `{% style %}` blocks
//! - `exclude_javascript` (default true): do not count `{% javascript %}`
//!   blocks

use themecheck_core::{
    Category, Check, CheckConfig, CheckContext, CheckError, CheckMeta, Event, EventArgs, Node,
    NodeType, Severity,
};

/// Check code for TemplateLength.
pub const CODE: &str = "TC006";

/// Check name for TemplateLength.
pub const NAME: &str = "TemplateLength";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports templates with too many lines")
    .severity(Severity::Suggestion)
    .categories(&[Category::Liquid]);

const DEFAULT_MAX_LENGTH: usize = 600;

/// Reports long templates.
#[derive(Debug, Clone)]
pub struct TemplateLength {
    max_length: usize,
    exclude_schema: bool,
    exclude_stylesheet: bool,
    exclude_javascript: bool,
    excluded_lines: usize,
}

impl Default for TemplateLength {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            exclude_schema: true,
            exclude_stylesheet: true,
            exclude_javascript: true,
            excluded_lines: 0,
        }
    }
}

impl TemplateLength {
    /// Creates the check with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of lines.
    #[must_use]
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    fn excludes(&self, node_type: NodeType) -> bool {
        match node_type {
            NodeType::Schema => self.exclude_schema,
            NodeType::Stylesheet | NodeType::Style => self.exclude_stylesheet,
            NodeType::Javascript => self.exclude_javascript,
            _ => false,
        }
    }
}

fn line_count(text: &str) -> usize {
    text.lines().count()
}

/// Lines spanned by a block, tags included.
fn block_lines(node: Node<'_>) -> usize {
    let span = node.block_span();
    node.source()
        .get(span.start..span.end)
        .map_or(0, |text| text.matches('\n').count() + 1)
}

impl Check for TemplateLength {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![
            Event::on(NodeType::Document),
            Event::on(NodeType::Schema),
            Event::on(NodeType::Stylesheet),
            Event::on(NodeType::Style),
            Event::on(NodeType::Javascript),
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
            if self.excludes(node.node_type()) {
                self.excluded_lines += block_lines(node);
            }
            return Ok(());
        }
        if *event == Event::on(NodeType::Document) {
            self.excluded_lines = 0;
            return Ok(());
        }
        let lines = line_count(node.source()).saturating_sub(self.excluded_lines);
        if lines > self.max_length {
            cx.add_file_offense(
                node.path(),
                format!("Template has too many lines [{lines}/{}]", self.max_length),
            );
        }
        Ok(())
    }

    fn configure(&mut self, config: &CheckConfig) -> Result<(), CheckError> {
        if let Some(max) = config.get_option::<i64>("max_length") {
            self.max_length = usize::try_from(max)
                .map_err(|_| CheckError::other(format!("max_length must be positive, got {max}")))?;
        }
        self.exclude_schema = config.get_bool("exclude_schema", self.exclude_schema);
        self.exclude_stylesheet = config.get_bool("exclude_stylesheet", self.exclude_stylesheet);
        self.exclude_javascript = config.get_bool("exclude_javascript", self.exclude_javascript);
        Ok(())
    }

    fn reset(&mut self) {
        self.excluded_lines = 0;
    }
}

//! Check recommending `{% liquid %}` for runs of consecutive tags.
//!
//! # Rationale
//!
//! A long run of `{% %}` tags separated only by whitespace is easier to read
//! as a single `{% liquid %}` block.
//!
//! # Configuration
//!
//! - `min_consecutive_statements` (default 5): shortest run reported.

use themecheck_core::{
    Category, Check, CheckConfig, CheckContext, CheckError, CheckMeta, Event, EventArgs, Node,
    NodeType, Severity,
};

/// Check code for LiquidTag.
pub const CODE: &str = "TC005";

/// Check name for LiquidTag.
pub const NAME: &str = "LiquidTag";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Recommends using {% liquid %} for multiple consecutive tags")
    .severity(Severity::Suggestion)
    .categories(&[Category::Liquid]);

const DEFAULT_MIN_CONSECUTIVE: usize = 5;

/// Recommends `{% liquid %}` blocks.
#[derive(Debug, Clone)]
pub struct LiquidTag {
    min_consecutive: usize,
}

impl Default for LiquidTag {
    fn default() -> Self {
        Self {
            min_consecutive: DEFAULT_MIN_CONSECUTIVE,
        }
    }
}

impl LiquidTag {
    /// Creates the check with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shortest run reported.
    #[must_use]
    pub fn min_consecutive(mut self, count: usize) -> Self {
        self.min_consecutive = count.max(2);
        self
    }

    fn report_run(&self, run: &[Node<'_>], cx: &mut CheckContext<'_>) {
        if run.len() < self.min_consecutive {
            return;
        }
        let Some(first) = run.first() else {
            return;
        };
        cx.add_offense(*first, "Use {% liquid ... %} to write multiple tags");
    }
}

/// Tags that can move into a `{% liquid %}` block.
fn is_statement(node: Node<'_>) -> bool {
    node.is_tag()
        && !matches!(
            node.node_type(),
            NodeType::Liquid | NodeType::Comment | NodeType::Raw | NodeType::Unknown
        )
        && node.markup().starts_with("{%")
}

impl Check for LiquidTag {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on(NodeType::Document), Event::on(NodeType::BlockBody)]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        let Some(body) = args.node() else {
            return Ok(());
        };
        let mut run = Vec::new();
        for child in body.children() {
            if is_statement(child) {
                run.push(child);
            } else if child.node_type() == NodeType::Text && child.markup().trim().is_empty() {
                continue;
            } else {
                self.report_run(&run, cx);
                run.clear();
            }
        }
        self.report_run(&run, cx);
        Ok(())
    }

    fn configure(&mut self, config: &CheckConfig) -> Result<(), CheckError> {
        let Some(count) = config.get_option::<i64>("min_consecutive_statements") else {
            return Ok(());
        };
        let count = usize::try_from(count).map_err(|_| {
            CheckError::other(format!("min_consecutive_statements must be positive, got {count}"))
        })?;
        self.min_consecutive = count.max(2);
        Ok(())
    }
}

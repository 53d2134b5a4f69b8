//! Check reporting variables that are assigned but never read.
//!
//! # Rationale
//!
//! An unused `assign` costs render time and usually hides a typo in the
//! variable that was meant to be used. Names starting with `_` are treated as
//! intentionally unused. Files using `{% include %}` are skipped because the
//! included snippet shares their scope.
//!
//! The offense is correctable: the `assign` tag is removed.

use std::collections::HashSet;

use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Correction, Event, EventArgs, NodeId,
    NodeType, Severity,
};

/// Check code for UnusedAssign.
pub const CODE: &str = "TC003";

/// Check name for UnusedAssign.
pub const NAME: &str = "UnusedAssign";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports variables that are assigned but not used")
    .severity(Severity::Suggestion)
    .categories(&[Category::Liquid, Category::Performance]);

/// Reports unused `assign` targets.
#[derive(Debug, Clone, Default)]
pub struct UnusedAssign {
    assigns: Vec<(String, NodeId)>,
    used: HashSet<String>,
    includes: bool,
}

impl UnusedAssign {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// `product.title` assigns into `product`.
fn root_name(target: &str) -> &str {
    target.split(['.', '[']).next().unwrap_or(target)
}

impl Check for UnusedAssign {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![
            Event::on(NodeType::Document),
            Event::on(NodeType::Assign),
            Event::on(NodeType::VariableLookup),
            Event::on(NodeType::Include),
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
        match node.node_type() {
            NodeType::Document if *event == Event::on(NodeType::Document) => self.reset(),
            NodeType::Assign => {
                if let Some(name) = node.name() {
                    self.assigns.push((root_name(name).to_string(), node.id()));
                }
            }
            NodeType::VariableLookup => {
                if let Some(name) = node.name() {
                    self.used.insert(name.to_string());
                }
            }
            NodeType::Include => self.includes = true,
            NodeType::Document => {
                if self.includes {
                    return Ok(());
                }
                let tree = node.tree();
                for (name, id) in &self.assigns {
                    if name.starts_with('_') || self.used.contains(name) {
                        continue;
                    }
                    let Some(assign) = tree.get(*id) else {
                        continue;
                    };
                    let span = assign.span();
                    let offense = cx
                        .offense(assign.path(), format!("`{name}` is never used"))
                        .at(assign)
                        .with_correction(Correction::new(move |c| {
                            c.remove(span);
                        }));
                    cx.report(offense);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.assigns.clear();
        self.used.clear();
        self.includes = false;
    }
}

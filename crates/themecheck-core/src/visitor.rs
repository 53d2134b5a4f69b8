//! Depth-first traversal drivers.
//!
//! Both visitors fire `on_*` events in pre-order and `after_*` events in
//! post-order, strictly following source order. Literals get no `after_*`.

use crate::check::{Event, EventArgs, Subject};
use crate::disabled::DisabledRanges;
use crate::error::EngineError;
use crate::html::{HtmlError, HtmlNode, HtmlTree};
use crate::node::{LiquidTree, Node};
use crate::registry::CheckRegistry;
use crate::theme::Theme;
use crate::types::Offense;

/// Walks a Liquid tree.
///
/// For every node: `on_node`, `on_tag` (tags only), `on_<type>`, the
/// children, then unless the node is a literal `after_<type>`, `after_tag`
/// and `after_node`. Comment nodes update the disabled ranges once their
/// own events have fired.
pub struct LiquidVisitor<'a> {
    registry: &'a mut CheckRegistry,
    theme: &'a Theme,
    offenses: &'a mut Vec<Offense>,
    disabled: &'a mut DisabledRanges,
}

impl<'a> LiquidVisitor<'a> {
    /// Creates a visitor dispatching to `registry`.
    pub fn new(
        registry: &'a mut CheckRegistry,
        theme: &'a Theme,
        offenses: &'a mut Vec<Offense>,
        disabled: &'a mut DisabledRanges,
    ) -> Self {
        Self {
            registry,
            theme,
            offenses,
            disabled,
        }
    }

    /// Visits every node of `tree`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by dispatch.
    pub fn visit_tree(&mut self, tree: &LiquidTree) -> Result<(), EngineError> {
        self.visit(tree.root())
    }

    fn call(&mut self, event: &Event, node: Node<'_>) -> Result<(), EngineError> {
        self.registry
            .call(event, EventArgs::Liquid(node), self.theme, self.offenses)
    }

    fn visit(&mut self, node: Node<'_>) -> Result<(), EngineError> {
        let subject = Subject::Liquid(node.node_type());
        self.call(&Event::On(Subject::Node), node)?;
        if node.is_tag() {
            self.call(&Event::On(Subject::Tag), node)?;
        }
        self.call(&Event::On(subject.clone()), node)?;

        for child in node.children() {
            self.visit(child)?;
        }

        if !node.is_literal() {
            self.call(&Event::After(subject), node)?;
            if node.is_tag() {
                self.call(&Event::After(Subject::Tag), node)?;
            }
            self.call(&Event::After(Subject::Node), node)?;
        }

        if node.is_comment() {
            self.disabled.update(node);
        }
        Ok(())
    }
}

/// Walks the HTML view of a Liquid file.
///
/// For every node: `on_element` (real elements only), `on_<name>`, the
/// children, then unless the node is text, a comment or a doctype,
/// `after_<name>` and `after_element`.
pub struct HtmlVisitor<'a> {
    registry: &'a mut CheckRegistry,
    theme: &'a Theme,
    offenses: &'a mut Vec<Offense>,
}

impl<'a> HtmlVisitor<'a> {
    /// Creates a visitor dispatching to `registry`.
    pub fn new(
        registry: &'a mut CheckRegistry,
        theme: &'a Theme,
        offenses: &'a mut Vec<Offense>,
    ) -> Self {
        Self {
            registry,
            theme,
            offenses,
        }
    }

    /// Builds the HTML view of a file and visits it. When the view cannot
    /// be built, `on_parse_error` fires instead.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by dispatch.
    pub fn visit_result(
        &mut self,
        file: &std::path::Path,
        source: &str,
        tree: Result<&HtmlTree, &HtmlError>,
    ) -> Result<(), EngineError> {
        match tree {
            Ok(tree) => self.visit(tree.root()),
            Err(error) => {
                tracing::debug!(file = %file.display(), %error, "no HTML view");
                self.registry.call(
                    &Event::ParseError,
                    EventArgs::ParseError {
                        file,
                        source,
                        error,
                    },
                    self.theme,
                    self.offenses,
                )
            }
        }
    }

    fn call(&mut self, event: &Event, node: HtmlNode<'_>) -> Result<(), EngineError> {
        self.registry
            .call(event, EventArgs::Html(node), self.theme, self.offenses)
    }

    fn visit(&mut self, node: HtmlNode<'_>) -> Result<(), EngineError> {
        let subject = Subject::Html(node.type_name().to_ascii_lowercase());
        if node.is_element() {
            self.call(&Event::On(Subject::Element), node)?;
        }
        self.call(&Event::On(subject.clone()), node)?;

        for child in node.children() {
            self.visit(child)?;
        }

        if !node.is_literal() {
            self.call(&Event::After(subject), node)?;
            if node.is_element() {
                self.call(&Event::After(Subject::Element), node)?;
            }
        }
        Ok(())
    }
}

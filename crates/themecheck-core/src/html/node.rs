//! HTML view of a Liquid file.

use std::borrow::Cow;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::bridge::{substitute, PlaceholderTable, Substitution, DELIMITER};
use super::parser::{parse_fragment, Fragment, Limits, RawAttribute, RawKind, RawNode};
use super::HtmlError;
use crate::position::{index_to_row_column, LineIndex, Span};

/// Markup of an HTML node that does not match the original source once
/// placeholders are restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("markup of `{node_type}` on line {line} of {path} does not match the source: expected `{expected}`, found `{found}`")]
pub struct MarkupMismatch {
    /// File the node belongs to.
    pub path: PathBuf,
    /// Type name of the node.
    pub node_type: String,
    /// 1-indexed line of the node.
    pub line: usize,
    /// Excerpt of the original source.
    pub expected: String,
    /// Excerpt of the restored markup.
    pub found: String,
}

/// The HTML parse of a file, built from its placeholder-substituted source.
#[derive(Debug)]
pub struct HtmlTree {
    path: PathBuf,
    source: Arc<str>,
    substitution: Substitution,
    fragment: Fragment,
    lines: LineIndex,
    failures: RefCell<Vec<MarkupMismatch>>,
}

impl HtmlTree {
    /// Substitutes Liquid regions and parses the result.
    ///
    /// # Errors
    ///
    /// Returns [`HtmlError::Bridge`] when placeholders cannot be built and
    /// [`HtmlError::Parse`] when `limits` are exceeded.
    pub fn build(
        path: impl Into<PathBuf>,
        source: Arc<str>,
        limits: Limits,
    ) -> Result<Self, HtmlError> {
        let substitution = substitute(&source)?;
        let fragment = parse_fragment(&substitution.text, limits)?;
        Ok(Self {
            path: path.into(),
            lines: LineIndex::new(&source),
            source,
            substitution,
            fragment,
            failures: RefCell::new(Vec::new()),
        })
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Original source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Source with placeholders.
    #[must_use]
    pub fn substituted(&self) -> &str {
        &self.substitution.text
    }

    /// Placeholder table shared by every node.
    #[must_use]
    pub fn placeholders(&self) -> &PlaceholderTable {
        &self.substitution.table
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragment.nodes.len()
    }

    /// Always false: a tree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragment.nodes.is_empty()
    }

    /// The fragment root.
    #[must_use]
    pub fn root(&self) -> HtmlNode<'_> {
        HtmlNode { tree: self, id: 0 }
    }

    /// Node by index.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<HtmlNode<'_>> {
        (id < self.len()).then_some(HtmlNode { tree: self, id })
    }

    /// Removes and returns the first mismatch recorded by
    /// [`HtmlNode::markup`] since the last call.
    pub fn take_failure(&self) -> Option<MarkupMismatch> {
        let mut failures = self.failures.borrow_mut();
        if failures.is_empty() {
            None
        } else {
            Some(failures.remove(0))
        }
    }

    /// Original text under `span`. Substitution keeps byte lengths, so the
    /// span addresses the same text in both sources.
    fn original<'a>(&'a self, span: Span) -> Cow<'a, str> {
        let end = span.end.min(self.source.len());
        let start = span.start.min(end);
        match self.source.get(start..end) {
            Some(text) => Cow::Borrowed(text),
            None => self.restore(span),
        }
    }

    fn restore<'a>(&'a self, span: Span) -> Cow<'a, str> {
        let span = Span::new(span.start.min(self.source.len()), span.end.min(self.source.len()));
        self.substitution
            .table
            .restore(&self.substitution.text[span.start..span.end])
    }
}

/// An attribute with placeholders restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlAttribute<'t> {
    /// Attribute name.
    pub name: Cow<'t, str>,
    /// Attribute value without quotes, `None` for bare attributes.
    pub value: Option<Cow<'t, str>>,
    /// Span of the name.
    pub name_span: Span,
    /// Span of the value.
    pub value_span: Option<Span>,
}

/// A handle to one node of an [`HtmlTree`].
#[derive(Clone, Copy)]
pub struct HtmlNode<'t> {
    tree: &'t HtmlTree,
    id: usize,
}

impl std::fmt::Debug for HtmlNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlNode")
            .field("id", &self.id)
            .field("type", &self.type_name())
            .field("line", &self.raw().line)
            .finish()
    }
}

impl PartialEq for HtmlNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for HtmlNode<'_> {}

impl<'t> HtmlNode<'t> {
    fn raw(&self) -> &'t RawNode {
        &self.tree.fragment.nodes[self.id]
    }

    fn at(&self, id: usize) -> HtmlNode<'t> {
        HtmlNode {
            tree: self.tree,
            id,
        }
    }

    /// Index of the node in document order.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The tree this node belongs to.
    #[must_use]
    pub fn tree(&self) -> &'t HtmlTree {
        self.tree
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &'t Path {
        &self.tree.path
    }

    /// Original source of the file.
    #[must_use]
    pub fn source(&self) -> &'t str {
        &self.tree.source
    }

    /// Lowercased tag name for elements; `text`, `comment`, `doctype` or
    /// `document` otherwise.
    #[must_use]
    pub fn type_name(&self) -> &'t str {
        match &self.raw().kind {
            RawKind::Element { name, .. } => name.as_str(),
            RawKind::Text(_) => "text",
            RawKind::Comment(_) => "comment",
            RawKind::Doctype(_) => "doctype",
            RawKind::Document => "document",
        }
    }

    /// Tag name with placeholders restored.
    #[must_use]
    pub fn name(&self) -> Option<Cow<'t, str>> {
        match &self.raw().kind {
            RawKind::Element { name, .. } => Some(self.tree.placeholders().restore(name)),
            _ => None,
        }
    }

    /// True for real elements.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self.raw().kind, RawKind::Element { .. })
    }

    /// True for character data.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.raw().kind, RawKind::Text(_))
    }

    /// True for HTML comments.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        matches!(self.raw().kind, RawKind::Comment(_))
    }

    /// True for the fragment root.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self.raw().kind, RawKind::Document)
    }

    /// True for leaves without an enter/exit distinction.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(
            self.raw().kind,
            RawKind::Text(_) | RawKind::Comment(_) | RawKind::Doctype(_)
        )
    }

    /// Children in source order.
    pub fn children(&self) -> impl Iterator<Item = HtmlNode<'t>> + 't {
        let tree = self.tree;
        self.raw()
            .children
            .iter()
            .map(move |&id| HtmlNode { tree, id })
    }

    /// Parent node, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<HtmlNode<'t>> {
        self.raw().parent.map(|id| self.at(id))
    }

    /// Parents from the nearest up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = HtmlNode<'t>> + 't {
        std::iter::successors(self.parent(), HtmlNode::parent)
    }

    /// Span of the start tag for elements, of the whole node otherwise.
    #[must_use]
    pub fn span(&self) -> Span {
        match &self.raw().kind {
            RawKind::Element { open, .. } => *open,
            RawKind::Text(span) | RawKind::Comment(span) | RawKind::Doctype(span) => *span,
            RawKind::Document => Span::new(0, self.tree.source.len()),
        }
    }

    /// Span from the start tag through the end tag, or through the last
    /// descendant when the element is never closed.
    #[must_use]
    pub fn outer_span(&self) -> Span {
        match &self.raw().kind {
            RawKind::Element {
                open,
                close: Some(close),
                ..
            } => Span::new(open.start, close.end),
            RawKind::Element { open, .. } => {
                let end = self
                    .children()
                    .last()
                    .map_or(open.end, |child| child.outer_span().end);
                Span::new(open.start, end)
            }
            _ => self.span(),
        }
    }

    fn inner_span(&self) -> Span {
        match &self.raw().kind {
            RawKind::Element { open, close, .. } => {
                let end = close.map_or_else(|| self.outer_span().end, |c| c.start);
                Span::new(open.end, end)
            }
            RawKind::Comment(span) => {
                let text = &self.tree.substitution.text[span.start..span.end];
                let start = if text.starts_with("<!--") { span.start + 4 } else { span.start };
                let end = if text.len() >= 7 && text.ends_with("-->") {
                    span.end - 3
                } else {
                    span.end
                };
                Span::new(start, end.max(start))
            }
            _ => self.span(),
        }
    }

    /// Original source of the node, verified against the substituted text.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupMismatch`] when restoring placeholders in the
    /// substituted markup does not give back the original source.
    pub fn try_markup(&self) -> Result<&'t str, MarkupMismatch> {
        let span = self.span();
        let expected = &self.tree.source[span.start..span.end];
        let found = self.tree.restore(span);
        if found == expected {
            Ok(expected)
        } else {
            Err(MarkupMismatch {
                path: self.tree.path.clone(),
                node_type: self.type_name().to_string(),
                line: self.line_number(),
                expected: crate::liquid::excerpt(expected),
                found: crate::liquid::excerpt(&found),
            })
        }
    }

    /// Infallible variant of [`HtmlNode::try_markup`]. A mismatch is
    /// recorded on the tree and the original source is returned.
    #[must_use]
    pub fn markup(&self) -> &'t str {
        match self.try_markup() {
            Ok(markup) => markup,
            Err(mismatch) => {
                self.tree.failures.borrow_mut().push(mismatch);
                let span = self.span();
                &self.tree.source[span.start..span.end]
            }
        }
    }

    /// Text content: the characters of a text node, the body of a comment,
    /// or everything between an element's tags.
    #[must_use]
    pub fn content(&self) -> Cow<'t, str> {
        self.tree.original(self.inner_span())
    }

    /// Attributes in source order.
    #[must_use]
    pub fn attributes(&self) -> Vec<HtmlAttribute<'t>> {
        match &self.raw().kind {
            RawKind::Element { attributes, .. } => {
                attributes.iter().map(|a| self.attribute_view(a)).collect()
            }
            _ => Vec::new(),
        }
    }

    fn attribute_view(&self, attribute: &'t RawAttribute) -> HtmlAttribute<'t> {
        let name = if attribute.name.contains(DELIMITER) {
            self.tree.original(attribute.name_span)
        } else {
            Cow::Borrowed(attribute.name.as_str())
        };
        HtmlAttribute {
            name,
            value: attribute.value_span.map(|span| self.tree.original(span)),
            name_span: attribute.name_span,
            value_span: attribute.value_span,
        }
    }

    /// Value of the first attribute called `name` (ASCII case-insensitive).
    /// Bare attributes have an empty value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Cow<'t, str>> {
        let RawKind::Element { attributes, .. } = &self.raw().kind else {
            return None;
        };
        attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| {
                a.value_span
                    .map_or(Cow::Borrowed(""), |span| self.tree.original(span))
            })
    }

    /// Returns true if the element has an attribute called `name`.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Byte offset of the first byte.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.span().start
    }

    /// Byte offset just past the node's markup.
    #[must_use]
    pub fn end_index(&self) -> usize {
        self.span().end
    }

    /// 1-indexed line of the first byte.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.tree.lines.line_of(self.start_index())
    }

    /// 0-indexed row of the first byte.
    #[must_use]
    pub fn start_row(&self) -> usize {
        index_to_row_column(self.source(), self.start_index()).0
    }

    /// 0-indexed column of the first byte.
    #[must_use]
    pub fn start_column(&self) -> usize {
        index_to_row_column(self.source(), self.start_index()).1
    }

    /// 0-indexed row of the end offset.
    #[must_use]
    pub fn end_row(&self) -> usize {
        index_to_row_column(self.source(), self.end_index()).0
    }

    /// 0-indexed column of the end offset.
    #[must_use]
    pub fn end_column(&self) -> usize {
        index_to_row_column(self.source(), self.end_index()).1
    }

    /// Short first-line excerpt used in bug reports.
    #[must_use]
    pub fn excerpt(&self) -> String {
        let span = self.span();
        crate::liquid::excerpt(&self.tree.source[span.start..span.end])
    }
}

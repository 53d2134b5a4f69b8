//! Arena-backed view over a parsed Liquid template.
//!
//! [`LiquidTree`] flattens a [`Document`] into slots addressed by [`NodeId`].
//! Each slot knows its parent and its children in source order, so walking
//! up or down the tree never needs reference counting. [`Node`] is a cheap
//! `Copy` handle that checks receive from the visitor.

use std::cell::{OnceCell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::liquid::{self, Child, Document, Element, ErrorMode, NodeType, ParseError};
use crate::position::{index_to_row_column, line_start_index, LineIndex, Position, Span};

/// Index of a node inside its [`LiquidTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The document root.
    pub const ROOT: Self = Self(0);

    /// Position of the node in document order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node whose markup could not be found in the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not locate `{excerpt}` ({node_type}) on line {line} of {path}")]
pub struct LocateError {
    /// File the node belongs to.
    pub path: PathBuf,
    /// Type name of the node.
    pub node_type: &'static str,
    /// Best-known line of the node.
    pub line: usize,
    /// The markup that was searched for.
    pub excerpt: String,
}

#[derive(Debug)]
struct Slot {
    element: Element,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    span: OnceCell<Result<Span, LocateError>>,
}

/// A parsed Liquid file.
#[derive(Debug)]
pub struct LiquidTree {
    path: PathBuf,
    source: Arc<str>,
    lines: LineIndex,
    slots: Vec<Slot>,
    warnings: Vec<ParseError>,
    failures: RefCell<Vec<LocateError>>,
}

impl LiquidTree {
    /// Parses `source` and builds the tree.
    ///
    /// # Errors
    ///
    /// Returns the parser's error in strict mode or on excessive nesting.
    pub fn parse(
        path: impl Into<PathBuf>,
        source: impl Into<Arc<str>>,
        mode: ErrorMode,
    ) -> Result<Self, ParseError> {
        let source = source.into();
        let document = liquid::parse(&source, mode)?;
        Ok(Self::from_document(path, source, document))
    }

    /// Builds a tree from an already parsed document.
    #[must_use]
    pub fn from_document(path: impl Into<PathBuf>, source: Arc<str>, document: Document) -> Self {
        let mut tree = Self {
            path: path.into(),
            lines: LineIndex::new(&source),
            source,
            slots: Vec::new(),
            warnings: document.warnings,
            failures: RefCell::new(Vec::new()),
        };
        tree.insert(document.root, None);
        tree
    }

    fn insert(&mut self, mut element: Element, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.slots.len());
        let children = std::mem::take(&mut element.children);
        self.slots.push(Slot {
            element,
            parent,
            children: Vec::new(),
            span: OnceCell::new(),
        });
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Child::Node(element) => ids.push(self.insert(element, Some(id))),
                Child::Named(map) => {
                    for (_, element) in map {
                        ids.push(self.insert(element, Some(id)));
                    }
                }
            }
        }
        self.slots[id.0].children = ids;
        id
    }

    /// Path of the file relative to the theme root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Shared handle to the source text.
    #[must_use]
    pub fn source_arc(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// Problems the parser recovered from.
    #[must_use]
    pub fn warnings(&self) -> &[ParseError] {
        &self.warnings
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: a tree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The document node.
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: NodeId::ROOT,
        }
    }

    /// Returns the node with the given id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<Node<'_>> {
        (id.0 < self.slots.len()).then_some(Node { tree: self, id })
    }

    /// Removes and returns the first position failure recorded by an
    /// infallible accessor since the last call.
    pub fn take_failure(&self) -> Option<LocateError> {
        let mut failures = self.failures.borrow_mut();
        if failures.is_empty() {
            None
        } else {
            Some(failures.remove(0))
        }
    }

    fn slot(&self, id: NodeId) -> &Slot {
        &self.slots[id.0]
    }
}

/// A handle to one node of a [`LiquidTree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t LiquidTree,
    id: NodeId,
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type", &self.type_name())
            .field("line", &self.element().line_number)
            .finish()
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl<'t> Node<'t> {
    fn slot(&self) -> &'t Slot {
        self.tree.slot(self.id)
    }

    fn element(&self) -> &'t Element {
        &self.slot().element
    }

    fn at(&self, id: NodeId) -> Node<'t> {
        Node {
            tree: self.tree,
            id,
        }
    }

    /// Id of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The tree this node belongs to.
    #[must_use]
    pub fn tree(&self) -> &'t LiquidTree {
        self.tree
    }

    /// Path of the file this node belongs to.
    #[must_use]
    pub fn path(&self) -> &'t Path {
        &self.tree.path
    }

    /// Shape of the node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.element().node_type
    }

    /// Stable lower_snake_case type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.node_type().as_str()
    }

    /// Tag name, filter name, lookup root, or assigned variable.
    #[must_use]
    pub fn name(&self) -> Option<&'t str> {
        self.element().name.as_deref()
    }

    /// Name written after `{%` for tag nodes.
    #[must_use]
    pub fn tag_name(&self) -> Option<&'t str> {
        match self.node_type() {
            NodeType::InlineComment => Some("#"),
            NodeType::Unknown => self.name(),
            t if t.is_tag() => Some(t.as_str()),
            _ => None,
        }
    }

    /// Children in source order, keyword arguments flattened.
    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.slot()
            .children
            .iter()
            .map(move |&id| Node { tree, id })
    }

    /// Parent node, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Node<'t>> {
        self.slot().parent.map(|id| self.at(id))
    }

    /// Parents from the nearest up to the document.
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'t>> + 't {
        std::iter::successors(self.parent(), Node::parent)
    }

    /// True for text and expression literals.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.node_type().is_literal()
    }

    /// True for `{% ... %}` tags.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.node_type().is_tag()
    }

    /// True for tags with an `end` tag.
    #[must_use]
    pub fn is_block(&self) -> bool {
        self.node_type().is_block()
    }

    /// True for the root.
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.node_type() == NodeType::Document
    }

    /// True for `{% comment %}` blocks and `{% # %}` inline comments.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        matches!(
            self.node_type(),
            NodeType::Comment | NodeType::InlineComment
        )
    }

    /// Full source text of the file.
    #[must_use]
    pub fn source(&self) -> &'t str {
        &self.tree.source
    }

    /// Arguments of a tag as written, without the tag name.
    #[must_use]
    pub fn tag_markup(&self) -> &'t str {
        &self.element().markup
    }

    /// Span of the node in the source, relocating tags whose recorded
    /// offsets do not match the source.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError`] when the node cannot be found.
    pub fn try_span(&self) -> Result<Span, LocateError> {
        self.slot().span.get_or_init(|| self.locate()).clone()
    }

    /// Infallible variant of [`Node::try_span`].
    ///
    /// A failure is recorded on the tree (see [`LiquidTree::take_failure`])
    /// and an empty span at the start of the node's line is returned.
    #[must_use]
    pub fn span(&self) -> Span {
        match self.try_span() {
            Ok(span) => span,
            Err(error) => {
                let at = self.line_start();
                self.tree.failures.borrow_mut().push(error);
                Span::new(at, at)
            }
        }
    }

    fn line_start(&self) -> usize {
        let line = self.element().line_number.unwrap_or(1);
        line_start_index(self.source(), line.saturating_sub(1))
    }

    fn is_valid(&self, span: Span) -> bool {
        let source = self.source();
        if span.end > source.len()
            || !source.is_char_boundary(span.start)
            || !source.is_char_boundary(span.end)
        {
            return false;
        }
        match self.tag_name() {
            Some(name) => source[span.start..span.end].contains(name),
            None => true,
        }
    }

    fn locate(&self) -> Result<Span, LocateError> {
        let element = self.element();
        if let Some(span) = element.span.filter(|s| self.is_valid(*s)) {
            return Ok(span);
        }
        if let Some(name) = self.tag_name() {
            if let Some(span) = self.relocate_tag(name) {
                return Ok(span);
            }
        } else if !element.markup.is_empty() {
            let position = Position::new(&element.markup, self.source(), element.line_number);
            let span = position.span();
            if &self.source()[span.start..span.end] == element.markup {
                return Ok(span);
            }
        }
        Err(LocateError {
            path: self.tree.path.clone(),
            node_type: self.type_name(),
            line: element.line_number.unwrap_or(0),
            excerpt: element.markup.lines().next().unwrap_or_default().to_string(),
        })
    }

    /// Searches `{%` followed by the tag name from the start of the node's
    /// line.
    fn relocate_tag(&self, name: &str) -> Option<Span> {
        let source = self.source();
        let mut from = self.line_start();
        while let Some(offset) = source[from..].find("{%") {
            let start = from + offset;
            let rest = source[start + 2..].trim_start_matches('-').trim_start();
            if rest.starts_with(name) {
                let end = source[start..].find("%}").map(|i| start + i + 2)?;
                return Some(Span::new(start, end));
            }
            from = start + 2;
        }
        None
    }

    /// Exact source text of the node.
    #[must_use]
    pub fn markup(&self) -> &'t str {
        let span = self.span();
        &self.tree.source[span.start..span.end]
    }

    /// Byte offset of the first byte.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.span().start
    }

    /// Byte offset just past the last byte.
    #[must_use]
    pub fn end_index(&self) -> usize {
        self.span().end
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

    /// 1-indexed line of the first byte.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match self.try_span() {
            Ok(span) => self.tree.lines.line_of(span.start),
            Err(_) => self.element().line_number.unwrap_or(1),
        }
    }

    fn inner_span(&self) -> Span {
        let element = self.element();
        element
            .body_span
            .or(element.markup_span)
            .filter(|s| s.end <= self.tree.source.len())
            .unwrap_or_else(|| self.span())
    }

    /// Start of a block's body, or of a tag's arguments.
    #[must_use]
    pub fn inner_markup_start_index(&self) -> usize {
        self.inner_span().start
    }

    /// End of a block's body, or of a tag's arguments.
    #[must_use]
    pub fn inner_markup_end_index(&self) -> usize {
        self.inner_span().end
    }

    /// Source text of a block's body, or of a tag's arguments.
    #[must_use]
    pub fn inner_markup(&self) -> &'t str {
        let span = self.inner_span();
        &self.tree.source[span.start..span.end]
    }

    /// Span of the closing `end` tag of a block.
    #[must_use]
    pub fn end_tag_span(&self) -> Option<Span> {
        self.element().end_span
    }

    /// Span covering a block from its opening tag through its end tag.
    #[must_use]
    pub fn block_span(&self) -> Span {
        let span = self.span();
        match self.element().end_span {
            Some(end) if end.end >= span.start => Span::new(span.start, end.end),
            _ => span,
        }
    }

    /// Text of a comment: the body of `{% comment %}` or the inline comment
    /// with its `#` markers removed.
    #[must_use]
    pub fn comment_text(&self) -> Option<String> {
        match self.node_type() {
            NodeType::Comment => Some(self.inner_markup().trim().to_string()),
            NodeType::InlineComment => Some(
                self.tag_markup()
                    .lines()
                    .map(|line| line.trim().trim_start_matches('#').trim())
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim()
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Short first-line excerpt used in bug reports.
    #[must_use]
    pub fn excerpt(&self) -> String {
        let text = match self.try_span() {
            Ok(span) => &self.tree.source[span.start..span.end],
            Err(_) => self.tag_markup(),
        };
        crate::liquid::excerpt(text)
    }
}

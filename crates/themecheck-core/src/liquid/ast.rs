//! Parsed Liquid syntax tree.
//!
//! The parser produces an owned tree of [`Element`]s. The engine never walks
//! this tree directly: it is flattened into a [`crate::node::LiquidTree`]
//! arena, which adds parent links and memoized positions.

use crate::position::Span;

/// Closed set of Liquid node shapes.
///
/// [`NodeType::as_str`] is the stable name used to build dispatch events such
/// as `on_assign` or `after_document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum NodeType {
    // Containers
    Document,
    BlockBody,
    Condition,
    ElseCondition,
    // Output and text
    Text,
    Variable,
    Filter,
    // Expressions
    VariableLookup,
    String,
    Integer,
    Float,
    Range,
    Literal,
    // Tags
    Assign,
    Break,
    Capture,
    Case,
    Comment,
    Continue,
    Cycle,
    Decrement,
    Echo,
    For,
    Form,
    If,
    Include,
    Increment,
    InlineComment,
    Javascript,
    Layout,
    Liquid,
    Paginate,
    Raw,
    Render,
    Schema,
    Section,
    Sections,
    Style,
    Stylesheet,
    Tablerow,
    Unless,
    Unknown,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 42] = [
        Self::Document,
        Self::BlockBody,
        Self::Condition,
        Self::ElseCondition,
        Self::Text,
        Self::Variable,
        Self::Filter,
        Self::VariableLookup,
        Self::String,
        Self::Integer,
        Self::Float,
        Self::Range,
        Self::Literal,
        Self::Assign,
        Self::Break,
        Self::Capture,
        Self::Case,
        Self::Comment,
        Self::Continue,
        Self::Cycle,
        Self::Decrement,
        Self::Echo,
        Self::For,
        Self::Form,
        Self::If,
        Self::Include,
        Self::Increment,
        Self::InlineComment,
        Self::Javascript,
        Self::Layout,
        Self::Liquid,
        Self::Paginate,
        Self::Raw,
        Self::Render,
        Self::Schema,
        Self::Section,
        Self::Sections,
        Self::Style,
        Self::Stylesheet,
        Self::Tablerow,
        Self::Unless,
        Self::Unknown,
    ];

    /// Stable lower_snake_case name of this node type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::BlockBody => "block_body",
            Self::Condition => "condition",
            Self::ElseCondition => "else_condition",
            Self::Text => "text",
            Self::Variable => "variable",
            Self::Filter => "filter",
            Self::VariableLookup => "variable_lookup",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Range => "range",
            Self::Literal => "literal",
            Self::Assign => "assign",
            Self::Break => "break",
            Self::Capture => "capture",
            Self::Case => "case",
            Self::Comment => "comment",
            Self::Continue => "continue",
            Self::Cycle => "cycle",
            Self::Decrement => "decrement",
            Self::Echo => "echo",
            Self::For => "for",
            Self::Form => "form",
            Self::If => "if",
            Self::Include => "include",
            Self::Increment => "increment",
            Self::InlineComment => "inline_comment",
            Self::Javascript => "javascript",
            Self::Layout => "layout",
            Self::Liquid => "liquid",
            Self::Paginate => "paginate",
            Self::Raw => "raw",
            Self::Render => "render",
            Self::Schema => "schema",
            Self::Section => "section",
            Self::Sections => "sections",
            Self::Style => "style",
            Self::Stylesheet => "stylesheet",
            Self::Tablerow => "tablerow",
            Self::Unless => "unless",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a tag name to its node type. Unrecognized names map to `Unknown`.
    #[must_use]
    pub fn from_tag_name(name: &str) -> Self {
        match name {
            "assign" => Self::Assign,
            "break" => Self::Break,
            "capture" => Self::Capture,
            "case" => Self::Case,
            "comment" => Self::Comment,
            "continue" => Self::Continue,
            "cycle" => Self::Cycle,
            "decrement" => Self::Decrement,
            "echo" => Self::Echo,
            "for" => Self::For,
            "form" => Self::Form,
            "if" => Self::If,
            "include" => Self::Include,
            "increment" => Self::Increment,
            "#" => Self::InlineComment,
            "javascript" => Self::Javascript,
            "layout" => Self::Layout,
            "liquid" => Self::Liquid,
            "paginate" => Self::Paginate,
            "raw" => Self::Raw,
            "render" => Self::Render,
            "schema" => Self::Schema,
            "section" => Self::Section,
            "sections" => Self::Sections,
            "style" => Self::Style,
            "stylesheet" => Self::Stylesheet,
            "tablerow" => Self::Tablerow,
            "unless" => Self::Unless,
            _ => Self::Unknown,
        }
    }

    /// True for nodes produced by a `{% ... %}` tag.
    #[must_use]
    pub const fn is_tag(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::Break
                | Self::Capture
                | Self::Case
                | Self::Comment
                | Self::Continue
                | Self::Cycle
                | Self::Decrement
                | Self::Echo
                | Self::For
                | Self::Form
                | Self::If
                | Self::Include
                | Self::Increment
                | Self::InlineComment
                | Self::Javascript
                | Self::Layout
                | Self::Liquid
                | Self::Paginate
                | Self::Raw
                | Self::Render
                | Self::Schema
                | Self::Section
                | Self::Sections
                | Self::Style
                | Self::Stylesheet
                | Self::Tablerow
                | Self::Unless
                | Self::Unknown
        )
    }

    /// True for tags closed by a matching `end<name>` tag.
    #[must_use]
    pub const fn is_block(self) -> bool {
        matches!(
            self,
            Self::Capture
                | Self::Case
                | Self::Comment
                | Self::For
                | Self::Form
                | Self::If
                | Self::Javascript
                | Self::Paginate
                | Self::Raw
                | Self::Schema
                | Self::Style
                | Self::Stylesheet
                | Self::Tablerow
                | Self::Unless
        )
    }

    /// True for leaf values: raw text and expression literals.
    #[must_use]
    pub const fn is_literal(self) -> bool {
        matches!(
            self,
            Self::Text | Self::String | Self::Integer | Self::Float | Self::Literal
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child slot of an [`Element`].
///
/// Tags with keyword arguments (`render 'card', title: product.title`) keep
/// them as a named map; the node adapter flattens maps into their values.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    /// A positional child.
    Node(Element),
    /// Keyword arguments in source order.
    Named(Vec<(String, Element)>),
}

/// One parsed Liquid element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Shape of this element.
    pub node_type: NodeType,
    /// Name of the element: tag name, filter name, variable root name, or the
    /// target of an `assign`/`capture`.
    pub name: Option<String>,
    /// Tag arguments, raw text, or literal source text.
    pub markup: String,
    /// Span of the whole element in the source. For block tags this covers
    /// the opening tag only.
    pub span: Option<Span>,
    /// Span of `markup` in the source.
    pub markup_span: Option<Span>,
    /// Span between the opening and closing tags of a block.
    pub body_span: Option<Span>,
    /// Span of the closing `end<name>` tag.
    pub end_span: Option<Span>,
    /// 1-indexed line of the element's first byte.
    pub line_number: Option<usize>,
    /// Children in source order.
    pub children: Vec<Child>,
}

impl Element {
    /// Creates an element with no positions or children.
    #[must_use]
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            name: None,
            markup: String::new(),
            span: None,
            markup_span: None,
            body_span: None,
            end_span: None,
            line_number: None,
            children: Vec::new(),
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the markup.
    #[must_use]
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    /// Sets the element span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Sets the line number.
    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line_number = Some(line);
        self
    }

    /// Appends a positional child.
    pub fn push(&mut self, child: Element) {
        self.children.push(Child::Node(child));
    }

    /// Appends keyword arguments, skipping empty maps.
    pub fn push_named(&mut self, named: Vec<(String, Element)>) {
        if !named.is_empty() {
            self.children.push(Child::Named(named));
        }
    }
}

/// A parsed template: the root element plus recoverable warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Root element of type [`NodeType::Document`].
    pub root: Element,
    /// Problems the parser recovered from (empty in strict mode).
    pub warnings: Vec<super::ParseError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_are_unique() {
        let mut names: Vec<&str> = NodeType::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), NodeType::ALL.len());
    }

    #[test]
    fn tag_name_mapping_round_trips() {
        for node_type in NodeType::ALL {
            if node_type.is_tag() && node_type != NodeType::Unknown {
                let name = if node_type == NodeType::InlineComment {
                    "#"
                } else {
                    node_type.as_str()
                };
                assert_eq!(NodeType::from_tag_name(name), node_type);
            }
        }
        assert_eq!(NodeType::from_tag_name("frobnicate"), NodeType::Unknown);
    }

    #[test]
    fn blocks_are_tags_and_literals_are_not() {
        for node_type in NodeType::ALL {
            if node_type.is_block() {
                assert!(node_type.is_tag(), "{node_type} is a block but not a tag");
            }
            if node_type.is_literal() {
                assert!(!node_type.is_tag(), "{node_type} is a literal and a tag");
            }
        }
    }
}

//! Block structure: turns lexer tokens into a tree of [`Element`]s.

use super::ast::{Document, Element, NodeType};
use super::expression::{unquote, ExprParser};
use super::lexer::{excerpt, liquid_lines, Lexer, Token, TokenKind};
use super::{ErrorMode, ParseError};
use crate::position::{LineIndex, Span};

/// Maximum block nesting before parsing is aborted.
pub(crate) const MAX_DEPTH: usize = 100;

const IF_TERMINATORS: &[&str] = &["elsif", "else", "endif"];
const UNLESS_TERMINATORS: &[&str] = &["elsif", "else", "endunless"];
const CASE_TERMINATORS: &[&str] = &["when", "else", "endcase"];
const FOR_TERMINATORS: &[&str] = &["else", "endfor"];
const TABLEROW_TERMINATORS: &[&str] = &["endtablerow"];
const CAPTURE_TERMINATORS: &[&str] = &["endcapture"];
const FORM_TERMINATORS: &[&str] = &["endform"];
const PAGINATE_TERMINATORS: &[&str] = &["endpaginate"];
const STYLE_TERMINATORS: &[&str] = &["endstyle"];

pub(crate) fn parse_document(source: &str, mode: ErrorMode) -> Result<Document, ParseError> {
    let lines = LineIndex::new(source);
    let (tokens, lexer_warnings) = Lexer::new(source, &lines).tokenize();

    let mut parser = Parser::new(source, &lines, mode, tokens, source.len(), 0);
    for warning in lexer_warnings {
        parser.warn(warning)?;
    }
    let (nodes, _) = parser.parse_body(&[])?;

    let whole = Span::new(0, source.len());
    let mut root = Element::new(NodeType::Document)
        .with_span(whole)
        .with_line(1);
    root.markup_span = Some(whole);
    root.body_span = Some(whole);
    for node in nodes {
        root.push(node);
    }
    Ok(Document {
        root,
        warnings: parser.warnings,
    })
}

struct Parser<'s> {
    source: &'s str,
    lines: &'s LineIndex,
    mode: ErrorMode,
    tokens: Vec<Token>,
    pos: usize,
    /// Offset where this token stream ends.
    end: usize,
    warnings: Vec<ParseError>,
    /// Terminators of the enclosing blocks, innermost last.
    open: Vec<&'static [&'static str]>,
    depth: usize,
}

impl<'s> Parser<'s> {
    fn new(
        source: &'s str,
        lines: &'s LineIndex,
        mode: ErrorMode,
        tokens: Vec<Token>,
        end: usize,
        depth: usize,
    ) -> Self {
        Self {
            source,
            lines,
            mode,
            tokens,
            pos: 0,
            end,
            warnings: Vec::new(),
            open: Vec::new(),
            depth,
        }
    }

    fn warn(&mut self, error: ParseError) -> Result<(), ParseError> {
        match self.mode {
            ErrorMode::Strict => Err(error),
            ErrorMode::Warn => {
                self.warnings.push(error);
                Ok(())
            }
            ErrorMode::Lax => Ok(()),
        }
    }

    fn token_excerpt(&self, token: &Token) -> String {
        excerpt(&self.source[token.span.start..token.span.end])
    }

    fn warn_at(&mut self, token: &Token, message: impl Into<String>) -> Result<(), ParseError> {
        let error = ParseError::new(message, token.line, self.token_excerpt(token));
        self.warn(error)
    }

    fn current_offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.span.start)
    }

    /// Parses nodes until a tag named in `terminators` is consumed (and
    /// returned), a terminator of an enclosing block is reached (left
    /// unconsumed), or the tokens run out.
    fn parse_body(
        &mut self,
        terminators: &[&str],
    ) -> Result<(Vec<Element>, Option<Token>), ParseError> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.get(self.pos).cloned() {
            match token.kind {
                TokenKind::Text | TokenKind::RawBody => {
                    self.pos += 1;
                    nodes.push(self.text(&token));
                }
                TokenKind::Variable => {
                    self.pos += 1;
                    nodes.push(self.output(&token)?);
                }
                TokenKind::Tag => {
                    let name = token.name.as_str();
                    if terminators.contains(&name) {
                        self.pos += 1;
                        return Ok((nodes, Some(token)));
                    }
                    if self.open.iter().any(|outer| outer.contains(&name)) {
                        return Ok((nodes, None));
                    }
                    self.pos += 1;
                    if let Some(node) = self.tag(&token)? {
                        nodes.push(node);
                    }
                }
            }
        }
        Ok((nodes, None))
    }

    fn text(&self, token: &Token) -> Element {
        let mut text = Element::new(NodeType::Text)
            .with_markup(token.markup.clone())
            .with_span(token.span)
            .with_line(token.line);
        text.markup_span = Some(token.span);
        text
    }

    fn output(&mut self, token: &Token) -> Result<Element, ParseError> {
        let parsed = ExprParser::new(self.source, self.lines, token.markup_span)
            .and_then(|parser| parser.variable(token.span));
        match parsed {
            Ok(variable) => Ok(variable),
            Err(message) => {
                self.warn_at(token, message)?;
                Ok(self.bare(NodeType::Variable, token))
            }
        }
    }

    /// An element for `token` without any parsed children.
    fn bare(&self, node_type: NodeType, token: &Token) -> Element {
        let mut element = Element::new(node_type)
            .with_markup(token.markup.clone())
            .with_span(token.span)
            .with_line(token.line);
        element.markup_span = Some(token.markup_span);
        element
    }

    fn enter(&mut self, token: &Token, terminators: &'static [&'static str]) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new(
                "Nesting too deep",
                token.line,
                self.token_excerpt(token),
            ));
        }
        self.open.push(terminators);
        Ok(())
    }

    fn leave(&mut self) {
        self.open.pop();
        self.depth -= 1;
    }

    fn never_closed(&mut self, token: &Token) -> Result<(), ParseError> {
        self.warn_at(token, format!("'{}' tag was never closed", token.name))
    }

    fn tag(&mut self, token: &Token) -> Result<Option<Element>, ParseError> {
        let node_type = NodeType::from_tag_name(&token.name);
        let mut element = self.bare(node_type, token);
        element.name = Some(token.name.clone());

        let element = match node_type {
            NodeType::If => self.conditional(element, token, IF_TERMINATORS)?,
            NodeType::Unless => self.conditional(element, token, UNLESS_TERMINATORS)?,
            NodeType::Case => self.case(element, token)?,
            NodeType::For => self.for_loop(element, token, FOR_TERMINATORS)?,
            NodeType::Tablerow => self.for_loop(element, token, TABLEROW_TERMINATORS)?,
            NodeType::Capture => {
                element.name = Some(unquote(&token.markup).to_string());
                self.block(element, token, CAPTURE_TERMINATORS)?
            }
            NodeType::Form => {
                self.arguments(&mut element, token, &[])?;
                self.block(element, token, FORM_TERMINATORS)?
            }
            NodeType::Paginate => {
                self.arguments(&mut element, token, &["by"])?;
                self.block(element, token, PAGINATE_TERMINATORS)?
            }
            NodeType::Style => self.block(element, token, STYLE_TERMINATORS)?,
            NodeType::Comment
            | NodeType::Raw
            | NodeType::Schema
            | NodeType::Javascript
            | NodeType::Stylesheet => self.raw_block(element, token)?,
            NodeType::Liquid => self.liquid_tag(element, token)?,
            NodeType::Assign => self.assign(element, token)?,
            NodeType::Echo => {
                let parsed = ExprParser::new(self.source, self.lines, token.markup_span)
                    .and_then(|parser| parser.variable(token.markup_span));
                match parsed {
                    Ok(variable) => element.push(variable),
                    Err(message) => self.warn_at(token, message)?,
                }
                element
            }
            NodeType::Render | NodeType::Include => self.render(element, token)?,
            NodeType::Section | NodeType::Sections | NodeType::Layout => {
                element.name = Some(unquote(&token.markup).to_string());
                self.arguments(&mut element, token, &[])?;
                element
            }
            NodeType::Cycle => {
                self.arguments(&mut element, token, &[])?;
                element
            }
            NodeType::Increment | NodeType::Decrement => {
                element.name = Some(token.markup.trim().to_string());
                element
            }
            NodeType::InlineComment => {
                if token.markup.lines().skip(1).any(|line| {
                    let line = line.trim();
                    !line.is_empty() && !line.starts_with('#')
                }) {
                    self.warn_at(
                        token,
                        "Syntax error in tag '#' - Each line of comments must be prefixed by the '#' character",
                    )?;
                }
                element
            }
            NodeType::Break | NodeType::Continue => element,
            _ => {
                self.warn_at(token, format!("Unknown tag '{}'", token.name))?;
                if is_closing_name(&token.name) {
                    return Ok(None);
                }
                element
            }
        };
        Ok(Some(element))
    }

    fn arguments(
        &mut self,
        element: &mut Element,
        token: &Token,
        skip: &[&str],
    ) -> Result<(), ParseError> {
        let parsed = ExprParser::new(self.source, self.lines, token.markup_span)
            .and_then(|parser| parser.arguments(skip));
        match parsed {
            Ok((positional, named)) => {
                for argument in positional {
                    element.push(argument);
                }
                element.push_named(named);
                Ok(())
            }
            Err(message) => self.warn_at(token, message),
        }
    }

    fn assign(&mut self, mut element: Element, token: &Token) -> Result<Element, ParseError> {
        element.name = None;
        let split = ExprParser::new(self.source, self.lines, token.markup_span)
            .and_then(ExprParser::assignment);
        let Ok((target, value)) = split else {
            self.warn_at(
                token,
                "Syntax Error in 'assign' - Valid syntax: assign [var] = [source]",
            )?;
            return Ok(element);
        };
        element.name = Some(target);
        let parsed = ExprParser::new(self.source, self.lines, value)
            .and_then(|parser| parser.variable(value));
        match parsed {
            Ok(variable) => element.push(variable),
            Err(message) => self.warn_at(token, message)?,
        }
        Ok(element)
    }

    fn render(&mut self, mut element: Element, token: &Token) -> Result<Element, ParseError> {
        let parsed = ExprParser::new(self.source, self.lines, token.markup_span)
            .and_then(ExprParser::render_args);
        match parsed {
            Ok(args) => {
                if args.template.node_type == NodeType::String {
                    element.name = Some(unquote(&args.template.markup).to_string());
                } else if element.node_type == NodeType::Render {
                    self.warn_at(
                        token,
                        "Syntax error in tag 'render' - Template name must be a quoted string",
                    )?;
                }
                element.push(args.template);
                if let Some(variable) = args.variable {
                    element.push(variable);
                }
                element.push_named(args.attributes);
            }
            Err(message) => self.warn_at(token, message)?,
        }
        Ok(element)
    }

    /// Wraps `nodes` in a `block_body` spanning from `from` to `to`.
    fn block_body(&self, nodes: Vec<Element>, from: usize, to: usize) -> Element {
        let span = Span::new(from, to.max(from));
        let mut body = Element::new(NodeType::BlockBody)
            .with_span(span)
            .with_line(self.lines.line_of(span.start));
        body.markup_span = Some(span);
        for node in nodes {
            body.push(node);
        }
        body
    }

    /// Builds one branch of an `if`, `unless` or `case`.
    fn branch(
        &self,
        node_type: NodeType,
        token: &Token,
        nodes: Vec<Element>,
        body_end: usize,
        operands: Vec<Element>,
    ) -> Element {
        let mut branch = self.bare(node_type, token);
        for operand in operands {
            branch.push(operand);
        }
        branch.body_span = Some(Span::new(token.span.end, body_end.max(token.span.end)));
        branch.push(self.block_body(nodes, token.span.end, body_end));
        branch
    }

    fn operands(&mut self, token: &Token, when: bool) -> Result<Vec<Element>, ParseError> {
        let parsed = ExprParser::new(self.source, self.lines, token.markup_span).and_then(|parser| {
            if when {
                parser.arguments(&["or"]).map(|(positional, _)| positional)
            } else {
                parser.condition()
            }
        });
        match parsed {
            Ok(operands) => Ok(operands),
            Err(message) => {
                self.warn_at(token, message)?;
                Ok(Vec::new())
            }
        }
    }

    fn close(&mut self, element: &mut Element, open: &Token, end: Option<Token>) -> Result<(), ParseError> {
        match end {
            Some(end) => {
                element.body_span = Some(Span::new(open.span.end, end.span.start));
                element.end_span = Some(end.span);
                Ok(())
            }
            None => {
                element.body_span = Some(Span::new(open.span.end, self.current_offset()));
                self.never_closed(open)
            }
        }
    }

    fn conditional(
        &mut self,
        mut element: Element,
        token: &Token,
        terminators: &'static [&'static str],
    ) -> Result<Element, ParseError> {
        self.enter(token, terminators)?;
        let mut branch_token = token.clone();
        let mut branch_type = NodeType::Condition;
        let end = loop {
            let (nodes, end) = self.parse_body(terminators)?;
            let body_end = end.as_ref().map_or_else(|| self.current_offset(), |t| t.span.start);
            let operands = if branch_type == NodeType::Condition {
                self.operands(&branch_token, false)?
            } else {
                Vec::new()
            };
            let branch = self.branch(branch_type, &branch_token, nodes, body_end, operands);
            element.push(branch);
            match end {
                Some(next) if next.name == "elsif" => {
                    branch_type = NodeType::Condition;
                    branch_token = next;
                }
                Some(next) if next.name == "else" => {
                    branch_type = NodeType::ElseCondition;
                    branch_token = next;
                }
                other => break other,
            }
        };
        self.close(&mut element, token, end)?;
        self.leave();
        Ok(element)
    }

    fn case(&mut self, mut element: Element, token: &Token) -> Result<Element, ParseError> {
        self.arguments(&mut element, token, &[])?;
        self.enter(token, CASE_TERMINATORS)?;
        // Anything between `case` and the first `when` is discarded.
        let (_, mut end) = self.parse_body(CASE_TERMINATORS)?;
        let end = loop {
            match end {
                Some(branch_token) if branch_token.name == "when" || branch_token.name == "else" => {
                    let (nodes, next) = self.parse_body(CASE_TERMINATORS)?;
                    let body_end = next.as_ref().map_or_else(|| self.current_offset(), |t| t.span.start);
                    let (node_type, operands) = if branch_token.name == "when" {
                        (NodeType::Condition, self.operands(&branch_token, true)?)
                    } else {
                        (NodeType::ElseCondition, Vec::new())
                    };
                    let branch = self.branch(node_type, &branch_token, nodes, body_end, operands);
                    element.push(branch);
                    end = next;
                }
                other => break other,
            }
        };
        self.close(&mut element, token, end)?;
        self.leave();
        Ok(element)
    }

    fn for_loop(
        &mut self,
        mut element: Element,
        token: &Token,
        terminators: &'static [&'static str],
    ) -> Result<Element, ParseError> {
        let header = ExprParser::new(self.source, self.lines, token.markup_span)
            .and_then(ExprParser::loop_header);
        match header {
            Ok(header) => {
                element.name = Some(header.variable);
                element.push(header.collection);
                element.push_named(header.attributes);
            }
            Err(_) => {
                let label = if element.node_type == NodeType::For {
                    "for loop"
                } else {
                    "tablerow loop"
                };
                self.warn_at(
                    token,
                    format!(
                        "Syntax Error in '{label}' - Valid syntax: {} [item] in [collection]",
                        token.name
                    ),
                )?;
            }
        }

        self.enter(token, terminators)?;
        let (nodes, mut end) = self.parse_body(terminators)?;
        let body_end = end.as_ref().map_or_else(|| self.current_offset(), |t| t.span.start);
        element.push(self.block_body(nodes, token.span.end, body_end));
        while let Some(else_token) = end.take_if(|t| t.name == "else") {
            let (nodes, next) = self.parse_body(terminators)?;
            let body_end = next.as_ref().map_or_else(|| self.current_offset(), |t| t.span.start);
            let branch = self.branch(NodeType::ElseCondition, &else_token, nodes, body_end, Vec::new());
            element.push(branch);
            end = next;
        }
        self.close(&mut element, token, end)?;
        self.leave();
        Ok(element)
    }

    /// A block whose body nodes become direct children.
    fn block(
        &mut self,
        mut element: Element,
        token: &Token,
        terminators: &'static [&'static str],
    ) -> Result<Element, ParseError> {
        self.enter(token, terminators)?;
        let (nodes, end) = self.parse_body(terminators)?;
        for node in nodes {
            element.push(node);
        }
        self.close(&mut element, token, end)?;
        self.leave();
        Ok(element)
    }

    /// A block whose body is kept as raw text and not parsed.
    fn raw_block(&mut self, mut element: Element, token: &Token) -> Result<Element, ParseError> {
        let body = match self.tokens.get(self.pos) {
            Some(next) if next.kind == TokenKind::RawBody => {
                let span = next.span;
                self.pos += 1;
                span
            }
            _ => Span::new(token.span.end, token.span.end),
        };
        element.body_span = Some(body);
        let end_name = format!("end{}", token.name);
        match self.tokens.get(self.pos) {
            Some(next) if next.kind == TokenKind::Tag && next.name == end_name => {
                element.end_span = Some(next.span);
                self.pos += 1;
            }
            _ => self.never_closed(token)?,
        }
        Ok(element)
    }

    /// `{% liquid %}`: every line of the markup is a tag.
    fn liquid_tag(&mut self, mut element: Element, token: &Token) -> Result<Element, ParseError> {
        let body = token.markup_span;
        let tokens = liquid_lines(self.source, body, self.lines);
        let mut inner = Parser::new(self.source, self.lines, self.mode, tokens, body.end, self.depth + 1);
        if inner.depth > MAX_DEPTH {
            return Err(ParseError::new(
                "Nesting too deep",
                token.line,
                self.token_excerpt(token),
            ));
        }
        let (nodes, _) = inner.parse_body(&[])?;
        self.warnings.append(&mut inner.warnings);
        for node in nodes {
            element.push(node);
        }
        element.body_span = Some(body);
        Ok(element)
    }
}

fn is_closing_name(name: &str) -> bool {
    name.starts_with("end") || matches!(name, "else" | "elsif" | "when")
}

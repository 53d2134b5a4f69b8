//! Expressions inside tags and outputs: lookups, literals, ranges, filters
//! and conditions.
//!
//! Every element produced here carries absolute spans into the template
//! source.

use super::ast::{Element, NodeType};
use crate::position::{LineIndex, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Ident,
    String,
    Number,
    Comparison,
    Assign,
    Pipe,
    Colon,
    Comma,
    Dot,
    DotDot,
    OpenSquare,
    CloseSquare,
    OpenRound,
    CloseRound,
}

#[derive(Debug, Clone, Copy)]
struct Tok {
    kind: Kind,
    span: Span,
}

const LITERALS: &[&str] = &["true", "false", "nil", "null", "empty", "blank"];

fn tokenize(source: &str, span: Span) -> Result<Vec<Tok>, String> {
    let text = &source[span.start..span.end];
    let bytes = text.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];
        let kind = match b {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Kind::Comparison
            }
            b'=' => {
                i += 1;
                Kind::Assign
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Kind::Comparison
            }
            b'<' | b'>' => {
                i += 1;
                if matches!(bytes.get(i), Some(b'=' | b'>')) {
                    i += 1;
                }
                Kind::Comparison
            }
            b'|' => {
                i += 1;
                Kind::Pipe
            }
            b':' => {
                i += 1;
                Kind::Colon
            }
            b',' => {
                i += 1;
                Kind::Comma
            }
            b'[' => {
                i += 1;
                Kind::OpenSquare
            }
            b']' => {
                i += 1;
                Kind::CloseSquare
            }
            b'(' => {
                i += 1;
                Kind::OpenRound
            }
            b')' => {
                i += 1;
                Kind::CloseRound
            }
            b'.' if bytes.get(i + 1) == Some(&b'.') => {
                i += 2;
                Kind::DotDot
            }
            b'.' => {
                i += 1;
                Kind::Dot
            }
            b'\'' | b'"' => {
                let Some(close) = text[i + 1..].find(b as char) else {
                    return Err(format!("Unterminated string in \"{text}\""));
                };
                i += close + 2;
                Kind::String
            }
            b'0'..=b'9' => {
                i = scan_number(bytes, i);
                Kind::Number
            }
            b'-' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i = scan_number(bytes, i + 1);
                Kind::Number
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-')
                {
                    i += 1;
                }
                if bytes.get(i) == Some(&b'?') {
                    i += 1;
                }
                if &text[start..i] == "contains" {
                    Kind::Comparison
                } else {
                    Kind::Ident
                }
            }
            _ => {
                let c = text[i..].chars().next().unwrap_or('?');
                return Err(format!("Unexpected character {c} in \"{text}\""));
            }
        };
        toks.push(Tok {
            kind,
            span: Span::new(span.start + start, span.start + i),
        });
    }
    Ok(toks)
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    i
}

/// Header of a `for` or `tablerow` tag.
pub(crate) struct LoopHeader {
    pub variable: String,
    pub collection: Element,
    pub attributes: Vec<(String, Element)>,
}

/// Arguments of a `render` or `include` tag.
pub(crate) struct RenderArgs {
    pub template: Element,
    pub variable: Option<Element>,
    pub attributes: Vec<(String, Element)>,
}

/// Positional and keyword arguments of a tag.
pub(crate) type Arguments = (Vec<Element>, Vec<(String, Element)>);

pub(crate) struct ExprParser<'s> {
    source: &'s str,
    lines: &'s LineIndex,
    markup: Span,
    toks: Vec<Tok>,
    pos: usize,
}

impl<'s> ExprParser<'s> {
    pub fn new(source: &'s str, lines: &'s LineIndex, markup: Span) -> Result<Self, String> {
        Ok(Self {
            source,
            lines,
            markup,
            toks: tokenize(source, markup)?,
            pos: 0,
        })
    }

    fn text(&self, span: Span) -> &'s str {
        &self.source[span.start..span.end]
    }

    fn peek(&self) -> Option<Tok> {
        self.toks.get(self.pos).copied()
    }

    fn peek_kind(&self, offset: usize) -> Option<Kind> {
        self.toks.get(self.pos + offset).map(|t| t.kind)
    }

    fn is_word(&self, word: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == Kind::Ident && self.text(t.span) == word)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn consume(&mut self, kind: Kind) -> Result<Tok, String> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(format!(
                "Expected {kind:?} but found {:?} in \"{}\"",
                tok.kind,
                self.text(self.markup)
            )),
            None => Err(format!(
                "Expected {kind:?} but reached the end of \"{}\"",
                self.text(self.markup)
            )),
        }
    }

    fn consume_if(&mut self, kind: Kind) -> bool {
        if self.peek_kind(0) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_end(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(format!(
                "Unexpected '{}' in \"{}\"",
                self.text(tok.span),
                self.text(self.markup)
            )),
        }
    }

    fn element(&self, node_type: NodeType, span: Span) -> Element {
        let mut element = Element::new(node_type)
            .with_markup(self.text(span))
            .with_span(span)
            .with_line(self.lines.line_of(span.start));
        element.markup_span = Some(span);
        element
    }

    /// Parses a single value: literal, range or variable lookup.
    pub fn expression(&mut self) -> Result<Element, String> {
        let Some(tok) = self.advance() else {
            return Err(format!(
                "Expected an expression in \"{}\"",
                self.text(self.markup)
            ));
        };
        match tok.kind {
            Kind::String => Ok(self.element(NodeType::String, tok.span)),
            Kind::Number => {
                let node_type = if self.text(tok.span).contains('.') {
                    NodeType::Float
                } else {
                    NodeType::Integer
                };
                Ok(self.element(node_type, tok.span))
            }
            Kind::OpenRound => {
                let start = self.expression()?;
                self.consume(Kind::DotDot)?;
                let end = self.expression()?;
                let close = self.consume(Kind::CloseRound)?;
                let mut range = self.element(NodeType::Range, Span::new(tok.span.start, close.span.end));
                range.push(start);
                range.push(end);
                Ok(range)
            }
            Kind::Ident | Kind::OpenSquare => self.lookup(tok),
            _ => Err(format!(
                "Unexpected '{}' in \"{}\"",
                self.text(tok.span),
                self.text(self.markup)
            )),
        }
    }

    fn lookup(&mut self, first: Tok) -> Result<Element, String> {
        let mut children = Vec::new();
        let mut end = first.span.end;
        let name = if first.kind == Kind::OpenSquare {
            children.push(self.expression()?);
            end = self.consume(Kind::CloseSquare)?.span.end;
            None
        } else {
            Some(self.text(first.span).to_string())
        };

        loop {
            if self.consume_if(Kind::Dot) {
                end = self.consume(Kind::Ident)?.span.end;
            } else if self.consume_if(Kind::OpenSquare) {
                children.push(self.expression()?);
                end = self.consume(Kind::CloseSquare)?.span.end;
            } else {
                break;
            }
        }

        let span = Span::new(first.span.start, end);
        if let Some(name) = name.as_deref() {
            if children.is_empty() && span == first.span && LITERALS.contains(&name) {
                return Ok(self.element(NodeType::Literal, span));
            }
        }
        let mut lookup = self.element(NodeType::VariableLookup, span);
        lookup.name = name;
        for child in children {
            lookup.push(child);
        }
        Ok(lookup)
    }

    /// Parses an output expression with its filters into a `variable`
    /// element spanning `span`.
    pub fn variable(mut self, span: Span) -> Result<Element, String> {
        let mut variable = self.element(NodeType::Variable, span);
        variable.markup = self.text(self.markup).to_string();
        variable.markup_span = Some(self.markup);
        if self.at_end() {
            return Ok(variable);
        }
        if self.peek_kind(0) != Some(Kind::Pipe) {
            let value = self.expression()?;
            if value.node_type == NodeType::VariableLookup {
                variable.name.clone_from(&value.name);
            }
            variable.push(value);
        }
        while self.consume_if(Kind::Pipe) {
            let filter = self.filter()?;
            variable.push(filter);
        }
        self.expect_end()?;
        Ok(variable)
    }

    fn filter(&mut self) -> Result<Element, String> {
        let name = self.consume(Kind::Ident)?;
        let mut end = name.span.end;
        let mut positional = Vec::new();
        let mut named = Vec::new();
        if self.consume_if(Kind::Colon) {
            loop {
                if self.peek_kind(0) == Some(Kind::Ident) && self.peek_kind(1) == Some(Kind::Colon) {
                    let key = self.consume(Kind::Ident)?;
                    self.consume(Kind::Colon)?;
                    let value = self.expression()?;
                    end = value.span.map_or(end, |s| s.end);
                    named.push((self.text(key.span).to_string(), value));
                } else {
                    let value = self.expression()?;
                    end = value.span.map_or(end, |s| s.end);
                    positional.push(value);
                }
                if !self.consume_if(Kind::Comma) {
                    break;
                }
            }
        }
        let mut filter = self.element(NodeType::Filter, Span::new(name.span.start, end));
        filter.name = Some(self.text(name.span).to_string());
        for arg in positional {
            filter.push(arg);
        }
        filter.push_named(named);
        Ok(filter)
    }

    /// Parses the operands of an `if`/`elsif`/`unless` condition, dropping
    /// comparison operators and `and`/`or` connectives.
    pub fn condition(mut self) -> Result<Vec<Element>, String> {
        let mut operands = Vec::new();
        while !self.at_end() {
            operands.push(self.expression()?);
            if self.consume_if(Kind::Comparison) {
                operands.push(self.expression()?);
            }
            if self.is_word("and") || self.is_word("or") {
                self.pos += 1;
            } else {
                self.expect_end()?;
            }
        }
        Ok(operands)
    }

    /// Parses comma or space separated arguments, skipping `skip` words.
    pub fn arguments(mut self, skip: &[&str]) -> Result<Arguments, String> {
        let mut positional = Vec::new();
        let mut named = Vec::new();
        while !self.at_end() {
            if self.consume_if(Kind::Comma) {
                continue;
            }
            if skip.iter().any(|word| self.is_word(word)) {
                self.pos += 1;
                continue;
            }
            if self.peek_kind(0) == Some(Kind::Ident) && self.peek_kind(1) == Some(Kind::Colon) {
                let key = self.consume(Kind::Ident)?;
                self.consume(Kind::Colon)?;
                named.push((self.text(key.span).to_string(), self.expression()?));
            } else {
                positional.push(self.expression()?);
            }
        }
        Ok((positional, named))
    }

    /// Parses `item in collection reversed limit: n offset: m`.
    pub fn loop_header(mut self) -> Result<LoopHeader, String> {
        let variable = self.consume(Kind::Ident)?;
        if !self.is_word("in") {
            return Err(format!(
                "For loops require an 'in' clause in \"{}\"",
                self.text(self.markup)
            ));
        }
        self.pos += 1;
        let collection = self.expression()?;
        let mut attributes = Vec::new();
        while !self.at_end() {
            if self.is_word("reversed") {
                self.pos += 1;
                continue;
            }
            if self.consume_if(Kind::Comma) {
                continue;
            }
            let key = self.consume(Kind::Ident)?;
            self.consume(Kind::Colon)?;
            attributes.push((self.text(key.span).to_string(), self.expression()?));
        }
        Ok(LoopHeader {
            variable: self.text(variable.span).to_string(),
            collection,
            attributes,
        })
    }

    /// Parses `'name' (with|for expr (as alias)?)? (, key: value)*`.
    pub fn render_args(mut self) -> Result<RenderArgs, String> {
        let template = self.expression()?;
        let mut variable = None;
        if self.is_word("with") || self.is_word("for") {
            self.pos += 1;
            variable = Some(self.expression()?);
            if self.is_word("as") {
                self.pos += 1;
                self.consume(Kind::Ident)?;
            }
        }
        let (positional, attributes) = self.arguments(&[])?;
        if let Some(extra) = positional.first() {
            return Err(format!("Unexpected '{}' in render arguments", extra.markup));
        }
        Ok(RenderArgs {
            template,
            variable,
            attributes,
        })
    }

    /// Splits `name = value` at the assignment operator, returning the
    /// target name and the span of the value.
    pub fn assignment(mut self) -> Result<(String, Span), String> {
        let target = self.consume(Kind::Ident)?;
        let mut end = target.span.end;
        while self.consume_if(Kind::Dot) {
            end = self.consume(Kind::Ident)?.span.end;
        }
        let eq = self.consume(Kind::Assign)?;
        if self.at_end() {
            return Err(format!(
                "Missing value in \"{}\"",
                self.text(self.markup)
            ));
        }
        let value_start = self.toks[self.pos].span.start;
        Ok((
            self.text(Span::new(target.span.start, end)).to_string(),
            Span::new(value_start.max(eq.span.end), self.markup.end),
        ))
    }
}

/// Strips one level of matching quotes.
pub(crate) fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

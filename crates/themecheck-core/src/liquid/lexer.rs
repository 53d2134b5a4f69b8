//! Splits Liquid source into text, tag and output tokens.

use super::ParseError;
use crate::position::{LineIndex, Span};

const TAG_START: &str = "{%";
const TAG_END: &str = "%}";
const VARIABLE_START: &str = "{{";
const VARIABLE_END: &str = "}}";

/// Tags whose body is kept verbatim instead of being tokenized.
pub(crate) const RAW_BODY_TAGS: &[&str] = &["comment", "raw", "schema", "javascript", "stylesheet"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Text,
    Tag,
    Variable,
    RawBody,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Whole token, delimiters included.
    pub span: Span,
    pub line: usize,
    /// Tag name (`#` for inline comments). Empty for other kinds.
    pub name: String,
    /// Trimmed content after the tag name, or the output expression.
    pub markup: String,
    pub markup_span: Span,
}

impl Token {
    fn text(kind: TokenKind, source: &str, span: Span, lines: &LineIndex) -> Self {
        Self {
            kind,
            span,
            line: lines.line_of(span.start),
            name: String::new(),
            markup: source[span.start..span.end].to_string(),
            markup_span: span,
        }
    }
}

pub(crate) struct Lexer<'s> {
    source: &'s str,
    lines: &'s LineIndex,
    pos: usize,
    tokens: Vec<Token>,
    warnings: Vec<ParseError>,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str, lines: &'s LineIndex) -> Self {
        Self {
            source,
            lines,
            pos: 0,
            tokens: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Tokenizes the whole source. Unterminated delimiters are reported as
    /// warnings and the remainder of the source becomes text.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<ParseError>) {
        while self.pos < self.source.len() {
            let Some(start) = self.next_delimiter(self.pos) else {
                self.push_text(self.pos, self.source.len());
                break;
            };
            if start > self.pos {
                self.push_text(self.pos, start);
            }

            let is_tag = self.source[start..].starts_with(TAG_START);
            let end_delimiter = if is_tag { TAG_END } else { VARIABLE_END };
            let Some(close) = self.source[start + 2..].find(end_delimiter) else {
                let what = if is_tag { "Tag" } else { "Variable" };
                let opener = if is_tag { TAG_START } else { VARIABLE_START };
                self.warnings.push(ParseError::new(
                    format!("{what} '{opener}' was not properly terminated with '{end_delimiter}'"),
                    self.lines.line_of(start),
                    excerpt(&self.source[start..]),
                ));
                self.push_text(start, self.source.len());
                break;
            };
            let end = start + 2 + close + 2;

            if is_tag {
                let token = tag_token(self.source, Span::new(start, end), self.lines);
                let raw_name = RAW_BODY_TAGS
                    .iter()
                    .find(|name| **name == token.name)
                    .copied();
                self.tokens.push(token);
                self.pos = end;
                if let Some(name) = raw_name {
                    self.consume_raw_body(name);
                }
            } else {
                self.tokens
                    .push(variable_token(self.source, Span::new(start, end), self.lines));
                self.pos = end;
            }
        }
        (self.tokens, self.warnings)
    }

    fn next_delimiter(&self, from: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let mut i = from;
        while let Some(offset) = self.source[i..].find('{') {
            let at = i + offset;
            match bytes.get(at + 1) {
                Some(b'%' | b'{') => return Some(at),
                Some(_) => i = at + 1,
                None => return None,
            }
        }
        None
    }

    fn push_text(&mut self, start: usize, end: usize) {
        if end > start {
            self.tokens.push(Token::text(
                TokenKind::Text,
                self.source,
                Span::new(start, end),
                self.lines,
            ));
        }
    }

    fn consume_raw_body(&mut self, name: &str) {
        let body_start = self.pos;
        match find_end_tag(self.source, body_start, name) {
            Some(end_tag) => {
                self.tokens.push(Token::text(
                    TokenKind::RawBody,
                    self.source,
                    Span::new(body_start, end_tag.start),
                    self.lines,
                ));
                self.tokens.push(tag_token(self.source, end_tag, self.lines));
                self.pos = end_tag.end;
            }
            None => {
                self.tokens.push(Token::text(
                    TokenKind::RawBody,
                    self.source,
                    Span::new(body_start, self.source.len()),
                    self.lines,
                ));
                self.pos = self.source.len();
            }
        }
    }
}

/// Finds the `{% end<name> %}` tag closing a raw body starting at `from`.
fn find_end_tag(source: &str, from: usize, name: &str) -> Option<Span> {
    let end_name = format!("end{name}");
    let mut i = from;
    while let Some(offset) = source[i..].find(TAG_START) {
        let start = i + offset;
        let close = source[start + 2..].find(TAG_END)?;
        let end = start + 2 + close + 2;
        let inner = source[start + 2..end - 2]
            .trim_start_matches('-')
            .trim_end_matches('-')
            .trim();
        if inner == end_name {
            return Some(Span::new(start, end));
        }
        i = start + 2;
    }
    None
}

/// Strips `-` whitespace-control markers and surrounding whitespace from the
/// inside of a delimited token, returning the trimmed span.
fn trimmed_inner(source: &str, span: Span) -> Span {
    let mut start = span.start + 2;
    let mut end = span.end - 2;
    if source[start..end].starts_with('-') {
        start += 1;
    }
    if end > start && source[start..end].ends_with('-') {
        end -= 1;
    }
    let inner = &source[start..end];
    let leading = inner.len() - inner.trim_start().len();
    let trailing = inner.len() - inner.trim_end().len();
    if leading + trailing >= inner.len() {
        return Span::new(start + leading.min(inner.len()), start + leading.min(inner.len()));
    }
    Span::new(start + leading, end - trailing)
}

/// Splits trimmed tag content into its name and the span of the remaining
/// markup.
fn split_name(source: &str, inner: Span) -> (String, Span) {
    let text = &source[inner.start..inner.end];
    if let Some(rest) = text.strip_prefix('#') {
        let leading = rest.len() - rest.trim_start().len();
        return ("#".to_string(), Span::new(inner.start + 1 + leading, inner.end));
    }
    let name_len = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(i, _)| i);
    let rest = &text[name_len..];
    let leading = rest.len() - rest.trim_start().len();
    (
        text[..name_len].to_string(),
        Span::new(inner.start + name_len + leading, inner.end),
    )
}

fn tag_token(source: &str, span: Span, lines: &LineIndex) -> Token {
    let inner = trimmed_inner(source, span);
    let (name, markup_span) = split_name(source, inner);
    Token {
        kind: TokenKind::Tag,
        span,
        line: lines.line_of(span.start),
        name,
        markup: source[markup_span.start..markup_span.end].to_string(),
        markup_span,
    }
}

fn variable_token(source: &str, span: Span, lines: &LineIndex) -> Token {
    let inner = trimmed_inner(source, span);
    Token {
        kind: TokenKind::Variable,
        span,
        line: lines.line_of(span.start),
        name: String::new(),
        markup: source[inner.start..inner.end].to_string(),
        markup_span: inner,
    }
}

/// Tokenizes the body of a `{% liquid %}` tag, where every non-empty line is
/// a tag without delimiters.
pub(crate) fn liquid_lines(source: &str, body: Span, lines: &LineIndex) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut raw: Option<(String, usize)> = None;
    let mut line_start = body.start;

    for line in source[body.start..body.end].split('\n') {
        let this_start = line_start;
        line_start += line.len() + 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let leading = line.len() - line.trim_start().len();
        let span = Span::new(this_start + leading, this_start + leading + trimmed.len());
        let (name, markup_span) = split_name(source, span);

        if let Some((raw_name, raw_start)) = raw.take() {
            if name != format!("end{raw_name}") {
                raw = Some((raw_name, raw_start));
                continue;
            }
            tokens.push(Token::text(
                TokenKind::RawBody,
                source,
                Span::new(raw_start, this_start),
                lines,
            ));
        }

        if RAW_BODY_TAGS.contains(&name.as_str()) {
            raw = Some((name.clone(), line_start.min(body.end)));
        }
        tokens.push(Token {
            kind: TokenKind::Tag,
            span,
            line: lines.line_of(span.start),
            markup: source[markup_span.start..markup_span.end].to_string(),
            name,
            markup_span,
        });
    }

    if let Some((_, raw_start)) = raw {
        tokens.push(Token::text(
            TokenKind::RawBody,
            source,
            Span::new(raw_start.min(body.end), body.end),
            lines,
        ));
    }
    tokens
}

/// First line of `text`, shortened for error messages.
pub(crate) fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.len() > 60 {
        let cut = crate::position::floor_char_boundary(line, 60);
        format!("{}...", &line[..cut])
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Vec<ParseError>) {
        let lines = LineIndex::new(source);
        Lexer::new(source, &lines).tokenize()
    }

    #[test]
    fn splits_text_tags_and_variables() {
        let (tokens, warnings) = lex("<p>{% if a %}{{ a | upcase }}{% endif %}</p>");
        assert!(warnings.is_empty());
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Text,
                TokenKind::Tag,
                TokenKind::Variable,
                TokenKind::Tag,
                TokenKind::Text
            ]
        );
        assert_eq!(tokens[1].name, "if");
        assert_eq!(tokens[1].markup, "a");
        assert_eq!(tokens[2].markup, "a | upcase");
        assert_eq!(tokens[3].name, "endif");
    }

    #[test]
    fn handles_whitespace_control() {
        let source = "{%- assign x = 1 -%}{{- x -}}";
        let (tokens, _) = lex(source);
        assert_eq!(tokens[0].name, "assign");
        assert_eq!(tokens[0].markup, "x = 1");
        let span = tokens[0].markup_span;
        assert_eq!(&source[span.start..span.end], "x = 1");
        assert_eq!(tokens[1].markup, "x");
    }

    #[test]
    fn keeps_raw_bodies_verbatim() {
        let (tokens, _) = lex("{% comment %}{{ not a var }}{% endcomment %}after");
        assert_eq!(tokens[1].kind, TokenKind::RawBody);
        assert_eq!(tokens[1].markup, "{{ not a var }}");
        assert_eq!(tokens[2].name, "endcomment");
        assert_eq!(tokens[3].markup, "after");
    }

    #[test]
    fn reports_unterminated_tags() {
        let (tokens, warnings) = lex("hello {% if x ");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("not properly terminated"));
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Text));
    }

    #[test]
    fn inline_comment_name() {
        let (tokens, _) = lex("{% # theme-check-disable %}");
        assert_eq!(tokens[0].name, "#");
        assert_eq!(tokens[0].markup, "theme-check-disable");
    }

    #[test]
    fn tracks_line_numbers() {
        let (tokens, _) = lex("a\n{% if x %}\n\n{{ y }}");
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[3].line, 4);
    }

    #[test]
    fn liquid_tag_lines() {
        let source = "{% liquid\n  assign x = 1\n  echo x\n%}";
        let lines = LineIndex::new(source);
        let body = Span::new(10, source.len() - 2);
        let tokens = liquid_lines(source, body, &lines);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "assign");
        assert_eq!(tokens[0].line, 2);
        assert_eq!(&source[tokens[1].span.start..tokens[1].span.end], "echo x");
        assert_eq!(tokens[1].line, 3);
    }
}

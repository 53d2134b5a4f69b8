//! A forgiving HTML fragment parser that keeps byte spans.
//!
//! The parser never rejects markup: stray end tags are dropped, unclosed
//! elements run to the end of the input and a lone `<` is text. The only
//! failure is exceeding the configured [`Limits`].

use serde::{Deserialize, Serialize};

use super::bridge::DELIMITER;
use super::HtmlParseError;
use crate::position::{LineIndex, Span};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

const PLACEHOLDER_BYTE: u8 = DELIMITER as u8;

/// Ceilings that protect against pathological markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum number of attributes on one element.
    pub max_attributes: usize,
    /// Maximum depth of open elements.
    pub max_tree_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_attributes: 400,
            max_tree_depth: 400,
        }
    }
}

/// One attribute of a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    /// Lowercased attribute name.
    pub name: String,
    /// Span of the name.
    pub name_span: Span,
    /// Span of the value without its quotes.
    pub value_span: Option<Span>,
}

/// Shape of a fragment node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKind {
    /// The fragment root.
    Document,
    /// An element with its start tag span and optional end tag span.
    Element {
        /// Lowercased tag name.
        name: String,
        /// Attributes in source order.
        attributes: Vec<RawAttribute>,
        /// Span of `<name ...>`.
        open: Span,
        /// Span of `</name>`, if present.
        close: Option<Span>,
    },
    /// Character data.
    Text(Span),
    /// `<!-- ... -->`.
    Comment(Span),
    /// `<!DOCTYPE ...>` and other declarations.
    Doctype(Span),
}

/// A node of a parsed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    /// Node shape.
    pub kind: RawKind,
    /// Parent index, `None` for the root.
    pub parent: Option<usize>,
    /// Child indexes in source order.
    pub children: Vec<usize>,
    /// 1-indexed line of the first byte.
    pub line: usize,
}

/// A parsed HTML fragment stored as an arena. Index 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Nodes in document order.
    pub nodes: Vec<RawNode>,
}

/// Parses `source` as an HTML fragment.
///
/// # Errors
///
/// Returns [`HtmlParseError::LimitsExceeded`] when an element carries more
/// attributes, or the tree nests deeper, than `limits` allows.
pub fn parse_fragment(source: &str, limits: Limits) -> Result<Fragment, HtmlParseError> {
    let lines = LineIndex::new(source);
    let mut builder = Builder {
        source,
        bytes: source.as_bytes(),
        lines: &lines,
        limits,
        nodes: vec![RawNode {
            kind: RawKind::Document,
            parent: None,
            children: Vec::new(),
            line: 1,
        }],
        stack: Vec::new(),
        pos: 0,
    };
    builder.run()?;
    Ok(Fragment {
        nodes: builder.nodes,
    })
}

struct Builder<'s> {
    source: &'s str,
    bytes: &'s [u8],
    lines: &'s LineIndex,
    limits: Limits,
    nodes: Vec<RawNode>,
    /// Open elements, innermost last.
    stack: Vec<usize>,
    pos: usize,
}

impl Builder<'_> {
    fn current(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    fn add(&mut self, kind: RawKind, start: usize) -> usize {
        let id = self.nodes.len();
        let parent = self.current();
        self.nodes.push(RawNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            line: self.lines.line_of(start),
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn text(&mut self, start: usize, end: usize) {
        if end > start {
            self.add(RawKind::Text(Span::new(start, end)), start);
        }
    }

    fn run(&mut self) -> Result<(), HtmlParseError> {
        let mut text_start = 0;
        while let Some(offset) = self.source[self.pos..].find('<') {
            let at = self.pos + offset;
            let next = self.bytes.get(at + 1).copied();
            let handled = match next {
                Some(b'!') => {
                    self.text(text_start, at);
                    self.declaration(at);
                    true
                }
                Some(b'/') if self.bytes.get(at + 2).is_some_and(u8::is_ascii_alphabetic) => {
                    self.text(text_start, at);
                    self.end_tag(at);
                    true
                }
                Some(b) if b.is_ascii_alphabetic() => {
                    self.text(text_start, at);
                    self.start_tag(at)?;
                    true
                }
                _ => false,
            };
            if handled {
                text_start = self.pos;
            } else {
                self.pos = at + 1;
            }
        }
        self.text(text_start, self.source.len());
        Ok(())
    }

    fn declaration(&mut self, at: usize) {
        if self.source[at..].starts_with("<!--") {
            let end = self.source[at + 4..]
                .find("-->")
                .map_or(self.source.len(), |i| at + 4 + i + 3);
            self.add(RawKind::Comment(Span::new(at, end)), at);
            self.pos = end;
        } else {
            let end = self.source[at..]
                .find('>')
                .map_or(self.source.len(), |i| at + i + 1);
            self.add(RawKind::Doctype(Span::new(at, end)), at);
            self.pos = end;
        }
    }

    fn tag_name_end(&self, from: usize) -> usize {
        let mut i = from;
        while i < self.bytes.len() && !matches!(self.bytes[i], b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'/' | b'>') {
            i += 1;
        }
        i
    }

    fn end_tag(&mut self, at: usize) {
        let name_end = self.tag_name_end(at + 2);
        let name = self.source[at + 2..name_end].to_ascii_lowercase();
        let end = self.source[name_end..]
            .find('>')
            .map_or(self.source.len(), |i| name_end + i + 1);
        self.pos = end;

        let Some(depth) = self.stack.iter().rposition(|&id| {
            matches!(&self.nodes[id].kind, RawKind::Element { name: open, .. } if *open == name)
        }) else {
            return;
        };
        let id = self.stack[depth];
        self.stack.truncate(depth);
        if let RawKind::Element { close, .. } = &mut self.nodes[id].kind {
            *close = Some(Span::new(at, end));
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn start_tag(&mut self, at: usize) -> Result<(), HtmlParseError> {
        let name_end = self.tag_name_end(at + 1);
        let name = self.source[at + 1..name_end].to_ascii_lowercase();
        self.pos = name_end;

        let mut attributes = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            match self.bytes.get(self.pos) {
                None => break,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                }
                Some(_) => {
                    attributes.push(self.attribute());
                    if attributes.len() > self.limits.max_attributes {
                        return Err(HtmlParseError::LimitsExceeded {
                            limit: "max_attributes",
                            max: self.limits.max_attributes,
                            line: self.lines.line_of(at),
                        });
                    }
                }
            }
        }

        let open = Span::new(at, self.pos);
        let is_void = VOID_ELEMENTS.contains(&name.as_str());
        let is_raw = RAW_TEXT_ELEMENTS.contains(&name.as_str());
        let id = self.add(
            RawKind::Element {
                name: name.clone(),
                attributes,
                open,
                close: None,
            },
            at,
        );
        if is_void || self_closing {
            return Ok(());
        }

        if self.stack.len() + 1 > self.limits.max_tree_depth {
            return Err(HtmlParseError::LimitsExceeded {
                limit: "max_tree_depth",
                max: self.limits.max_tree_depth,
                line: self.lines.line_of(at),
            });
        }
        self.stack.push(id);
        if is_raw {
            self.raw_text(&name, id);
        }
        Ok(())
    }

    /// Consumes the content of `<script>` and friends up to the matching
    /// end tag as a single text node.
    fn raw_text(&mut self, name: &str, id: usize) {
        let content_start = self.pos;
        let needle = format!("</{name}");
        let lower = self.source[content_start..].to_ascii_lowercase();
        let content_end = lower.find(&needle).map_or(self.source.len(), |i| content_start + i);
        self.text(content_start, content_end);
        self.stack.pop();
        if content_end < self.source.len() {
            let end = self.source[content_end..]
                .find('>')
                .map_or(self.source.len(), |i| content_end + i + 1);
            if let RawKind::Element { close, .. } = &mut self.nodes[id].kind {
                *close = Some(Span::new(content_end, end));
            }
            self.pos = end;
        } else {
            self.pos = content_end;
        }
    }

    /// Steps over a whole placeholder when one starts at the cursor. Liquid
    /// regions keep their newlines, so a placeholder may contain whitespace
    /// that must not end a name or an unquoted value.
    fn skip_placeholder(&mut self) -> bool {
        if self.bytes.get(self.pos) != Some(&PLACEHOLDER_BYTE) {
            return false;
        }
        self.pos = self.bytes[self.pos + 1..]
            .iter()
            .position(|&b| b == PLACEHOLDER_BYTE)
            .map_or(self.bytes.len(), |i| self.pos + 1 + i + 1);
        true
    }

    fn attribute(&mut self) -> RawAttribute {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            if self.skip_placeholder() {
                continue;
            }
            if matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'=' | b'>')
                || (self.bytes[self.pos] == b'/' && self.bytes.get(self.pos + 1) == Some(&b'>'))
            {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            // A lone `=`: consume it as a nameless attribute.
            self.pos += 1;
        }
        let name_span = Span::new(start, self.pos);
        let name = self.source[start..self.pos].to_ascii_lowercase();

        let before_value = self.pos;
        self.skip_whitespace();
        if self.bytes.get(self.pos) != Some(&b'=') || name == "=" {
            self.pos = before_value;
            return RawAttribute {
                name,
                name_span,
                value_span: None,
            };
        }
        self.pos += 1;
        self.skip_whitespace();

        let value_span = match self.bytes.get(self.pos) {
            Some(&quote @ (b'"' | b'\'')) => {
                let value_start = self.pos + 1;
                let value_end = self.source[value_start..]
                    .find(quote as char)
                    .map_or(self.source.len(), |i| value_start + i);
                self.pos = (value_end + 1).min(self.source.len());
                Span::new(value_start, value_end)
            }
            _ => {
                let value_start = self.pos;
                while self.pos < self.bytes.len() {
                    if self.skip_placeholder() {
                        continue;
                    }
                    if self.bytes[self.pos].is_ascii_whitespace() || self.bytes[self.pos] == b'>' {
                        break;
                    }
                    self.pos += 1;
                }
                Span::new(value_start, self.pos)
            }
        };
        RawAttribute {
            name,
            name_span,
            value_span: Some(value_span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Fragment {
        parse_fragment(source, Limits::default()).unwrap()
    }

    fn element_names(fragment: &Fragment) -> Vec<&str> {
        fragment
            .nodes
            .iter()
            .filter_map(|n| match &n.kind {
                RawKind::Element { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nests_elements_and_text() {
        let fragment = parse("<div class=\"a\"><p>hi</p><br></div>");
        assert_eq!(element_names(&fragment), vec!["div", "p", "br"]);
        let div = &fragment.nodes[1];
        assert_eq!(div.children.len(), 2);
        let RawKind::Element { close, attributes, .. } = &div.kind else {
            panic!("expected element");
        };
        assert_eq!(*close, Some(Span::new(28, 34)));
        assert_eq!(attributes[0].name, "class");
        assert_eq!(attributes[0].value_span, Some(Span::new(12, 13)));
    }

    #[test]
    fn attribute_forms() {
        let source = "<input disabled value=x data-a = 'y' />";
        let fragment = parse(source);
        let RawKind::Element { attributes, open, .. } = &fragment.nodes[1].kind else {
            panic!("expected element");
        };
        let parsed: Vec<(&str, Option<&str>)> = attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value_span.map(|s| &source[s.start..s.end])))
            .collect();
        assert_eq!(
            parsed,
            vec![("disabled", None), ("value", Some("x")), ("data-a", Some("y"))]
        );
        assert_eq!(open.end, source.len());
    }

    #[test]
    fn placeholders_with_newlines_are_one_token() {
        let source = "<a \x1f0#\n#\x1fhref=\x1f1\n##\x1f>";
        let fragment = parse(source);
        let RawKind::Element { attributes, .. } = &fragment.nodes[1].kind else {
            panic!("expected element");
        };
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].name, "\x1f0#\n#\x1fhref");
        let value = attributes[0].value_span.unwrap();
        assert_eq!(&source[value.start..value.end], "\x1f1\n##\x1f");
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let fragment = parse("</span><b>x</i></b>");
        assert_eq!(element_names(&fragment), vec!["b"]);
        assert_eq!(fragment.nodes[0].children.len(), 1);
    }

    #[test]
    fn raw_text_elements_keep_content() {
        let source = "<script>if (a < b) { x(\"</p>\") }</script><p>";
        let fragment = parse(source);
        assert_eq!(element_names(&fragment), vec!["script", "p"]);
        let RawKind::Text(span) = fragment.nodes[2].kind else {
            panic!("expected text");
        };
        assert_eq!(&source[span.start..span.end], "if (a < b) { x(\"</p>\") }");
    }

    #[test]
    fn comments_and_doctype() {
        let fragment = parse("<!DOCTYPE html>\n<!-- note --><html></html>");
        assert!(matches!(fragment.nodes[1].kind, RawKind::Doctype(_)));
        assert!(matches!(fragment.nodes[3].kind, RawKind::Comment(_)));
        assert_eq!(fragment.nodes[3].line, 2);
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let fragment = parse("a < b");
        assert_eq!(fragment.nodes.len(), 2);
        assert!(matches!(fragment.nodes[1].kind, RawKind::Text(s) if s == Span::new(0, 5)));
    }

    #[test]
    fn limits_are_enforced() {
        let limits = Limits {
            max_attributes: 2,
            max_tree_depth: 3,
        };
        let error = parse_fragment("<a b c d>", limits).err();
        assert!(matches!(
            error,
            Some(HtmlParseError::LimitsExceeded { limit: "max_attributes", .. })
        ));
        let error = parse_fragment("<a><b><c><d>", limits).err();
        assert!(matches!(
            error,
            Some(HtmlParseError::LimitsExceeded { limit: "max_tree_depth", .. })
        ));
        assert!(parse_fragment("<a><b><c></c></b></a>", limits).is_ok());
    }
}

//! Conversions between byte offsets, rows/columns and line numbers.
//!
//! Every conversion clamps its inputs to the bounds of the content instead of
//! failing: checks routinely derive positions from heuristic matches that may
//! be off by one, and a slightly wrong position is preferable to no offense.
//!
//! Rows and columns are 0-indexed and measured in bytes. Line numbers are
//! 1-indexed.

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` within a source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Creates a span, swapping the bounds if they are reversed.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub fn len(self) -> usize {
        self.end - self.start
    }

    /// Returns true for zero-length spans.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Returns true if `index` falls inside the span.
    #[must_use]
    pub fn contains(self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    /// Returns true if the two spans share at least one byte.
    ///
    /// Empty spans overlap a non-empty span only when strictly inside it.
    #[must_use]
    pub fn overlaps(self, other: Span) -> bool {
        if self.is_empty() {
            return other.start < self.start && self.start < other.end;
        }
        if other.is_empty() {
            return self.start < other.start && other.start < self.end;
        }
        self.start < other.end && other.start < self.end
    }
}

/// Converts a byte index into a `(row, column)` pair.
///
/// The index is clamped to the last byte of `content`. Empty content always
/// yields `(0, 0)`.
#[must_use]
pub fn index_to_row_column(content: &str, index: usize) -> (usize, usize) {
    if content.is_empty() {
        return (0, 0);
    }
    let safe_index = floor_char_boundary(content, index.min(content.len() - 1));
    let before = &content[..safe_index];
    let row = before.bytes().filter(|&b| b == b'\n').count();
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (row, safe_index - line_start)
}

/// Converts a `(row, column)` pair into a byte index.
///
/// The row is clamped to the number of lines, the column to the length of the
/// selected line, and the result to the last byte of `content`. Empty content
/// always yields `0`.
#[must_use]
pub fn row_column_to_index(content: &str, row: usize, column: usize) -> usize {
    if content.is_empty() {
        return 0;
    }
    let line_count = content.bytes().filter(|&b| b == b'\n').count();
    let safe_row = row.min(line_count);
    let line_start = line_start_index(content, safe_row);
    let line_end = content[line_start..]
        .find('\n')
        .map_or(content.len(), |i| line_start + i);
    let index = line_start + column.min(line_end - line_start);
    floor_char_boundary(content, index.min(content.len() - 1))
}

/// Returns the 1-indexed line number containing `index`.
#[must_use]
pub fn index_to_line_number(content: &str, index: usize) -> usize {
    index_to_row_column(content, index).0 + 1
}

/// Returns the byte index where the 0-indexed `row` starts.
///
/// Rows past the end of the content map to the start of the last line.
#[must_use]
pub fn line_start_index(content: &str, row: usize) -> usize {
    if row == 0 {
        return 0;
    }
    let mut seen = 0;
    let mut last_start = 0;
    for (i, b) in content.bytes().enumerate() {
        if b == b'\n' {
            seen += 1;
            last_start = i + 1;
            if seen == row {
                return last_start;
            }
        }
    }
    last_start
}

/// Moves `index` backwards until it lands on a char boundary.
#[must_use]
pub fn floor_char_boundary(content: &str, index: usize) -> usize {
    let mut index = index.min(content.len());
    while index > 0 && !content.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Precomputed line starts for repeated offset-to-line lookups.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    /// Indexes every line start of `content`.
    #[must_use]
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            content
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// Returns the 1-indexed line containing `offset`.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

/// Locates a piece of markup on a given line of a source string.
///
/// Used when an offense is reported against raw markup instead of a node:
/// the needle is searched from the start of its line, and the start of the
/// line is used when the needle cannot be found there.
#[derive(Debug, Clone)]
pub struct Position<'a> {
    needle: &'a str,
    contents: &'a str,
    line_number: Option<usize>,
}

impl<'a> Position<'a> {
    /// Creates a locator for `needle` on the 1-indexed `line_number`.
    #[must_use]
    pub fn new(needle: &'a str, contents: &'a str, line_number: Option<usize>) -> Self {
        Self {
            needle,
            contents,
            line_number,
        }
    }

    fn line_start(&self) -> usize {
        match self.line_number {
            Some(line) if line > 0 => line_start_index(self.contents, line - 1),
            _ => 0,
        }
    }

    fn found_at(&self) -> Option<usize> {
        if self.needle.is_empty() {
            return None;
        }
        let from = self.line_start();
        self.contents[from..].find(self.needle).map(|i| from + i)
    }

    /// Byte index where the needle starts.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.found_at().unwrap_or_else(|| self.line_start())
    }

    /// Byte index just past the needle.
    #[must_use]
    pub fn end_index(&self) -> usize {
        self.found_at()
            .map_or_else(|| self.line_start(), |start| start + self.needle.len())
    }

    /// Span covered by the needle.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.start_index(), self.end_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_is_origin() {
        assert_eq!(index_to_row_column("", 0), (0, 0));
        assert_eq!(index_to_row_column("", 42), (0, 0));
        assert_eq!(row_column_to_index("", 0, 0), 0);
        assert_eq!(row_column_to_index("", 3, 7), 0);
    }

    #[test]
    fn index_to_row_column_counts_lines() {
        let content = "line1\nline2\nline3";
        assert_eq!(index_to_row_column(content, 0), (0, 0));
        assert_eq!(index_to_row_column(content, 5), (0, 5));
        assert_eq!(index_to_row_column(content, 6), (1, 0));
        assert_eq!(index_to_row_column(content, 8), (1, 2));
        assert_eq!(index_to_row_column(content, 16), (2, 4));
    }

    #[test]
    fn out_of_range_index_saturates() {
        let content = "ab\ncd";
        assert_eq!(index_to_row_column(content, 1000), (1, 1));
    }

    #[test]
    fn row_column_to_index_clamps() {
        let content = "line1\nline2\nline3";
        assert_eq!(row_column_to_index(content, 1, 0), 6);
        assert_eq!(row_column_to_index(content, 1, 100), 11);
        assert_eq!(row_column_to_index(content, 100, 0), 12);
        assert_eq!(row_column_to_index(content, 100, 100), 16);
    }

    #[test]
    fn round_trip_for_every_valid_position() {
        let content = "{% assign x = 1 %}\n\n  {{ x }}\nend";
        for (index, _) in content.char_indices() {
            let (row, column) = index_to_row_column(content, index);
            assert_eq!(row_column_to_index(content, row, column), index);
            assert_eq!(index_to_row_column(content, row_column_to_index(content, row, column)), (row, column));
        }
    }

    #[test]
    fn multibyte_content_lands_on_char_boundaries() {
        let content = "é\nü";
        assert_eq!(index_to_row_column(content, 1), (0, 0));
        assert_eq!(row_column_to_index(content, 1, 1), 3);
    }

    #[test]
    fn line_numbers_are_one_indexed() {
        let content = "a\nb\nc";
        assert_eq!(index_to_line_number(content, 0), 1);
        assert_eq!(index_to_line_number(content, 4), 3);
    }

    #[test]
    fn line_index_matches_line_numbers() {
        let content = "a\nbc\n\nd";
        let index = LineIndex::new(content);
        assert_eq!(index.line_count(), 4);
        for offset in 0..content.len() {
            assert_eq!(index.line_of(offset), index_to_line_number(content, offset));
        }
    }

    #[test]
    fn position_finds_needle_on_line() {
        let contents = "foo\nbar baz\nbaz";
        let position = Position::new("baz", contents, Some(2));
        assert_eq!(position.start_index(), 8);
        assert_eq!(position.end_index(), 11);
    }

    #[test]
    fn position_falls_back_to_line_start() {
        let contents = "foo\nbar\n";
        let position = Position::new("missing", contents, Some(2));
        assert_eq!(position.span(), Span::new(4, 4));
    }

    #[test]
    fn span_overlap() {
        assert!(Span::new(0, 5).overlaps(Span::new(4, 6)));
        assert!(!Span::new(0, 5).overlaps(Span::new(5, 6)));
        assert!(!Span::new(5, 5).overlaps(Span::new(0, 5)));
        assert!(Span::new(3, 3).overlaps(Span::new(0, 5)));
    }
}

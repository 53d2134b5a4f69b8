//! Placeholder substitution between Liquid and HTML.
//!
//! Liquid tags and outputs are swapped for placeholders of exactly the same
//! byte length before the HTML parser runs. A placeholder starts and ends
//! with [`DELIMITER`], keeps every newline of the original region and fills
//! the remaining bytes with `#`, except for the leading ones that spell the
//! region's index in base 36. Offsets, rows and columns computed on the
//! substituted text are therefore valid on the original text.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::BridgeError;
use crate::position::index_to_line_number;

/// First and last byte of every placeholder.
pub const DELIMITER: char = '\u{1f}';

/// Regions this short or shorter are left untouched.
const MIN_REGION_LEN: usize = 4;

const FILLER: u8 = b'#';

#[allow(clippy::expect_used)]
static LIQUID_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}").expect("liquid region pattern is valid")
});

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\x1f([0-9a-z#\n]+)\x1f").expect("placeholder pattern is valid")
});

/// Original text of every substituted region, indexed by placeholder key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderTable {
    entries: Vec<String>,
}

impl PlaceholderTable {
    /// Number of substituted regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was substituted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original text for a key.
    #[must_use]
    pub fn get(&self, key: usize) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Replaces every placeholder in `text` with its original region.
    ///
    /// Placeholders with an unknown key are left as they are.
    #[must_use]
    pub fn restore<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.contains(DELIMITER) {
            return Cow::Borrowed(text);
        }
        PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let key: String = caps[1].chars().filter(char::is_ascii_alphanumeric).collect();
            usize::from_str_radix(&key, 36)
                .ok()
                .and_then(|key| self.get(key))
                .map_or_else(|| caps[0].to_string(), str::to_string)
        })
    }
}

/// Result of substituting a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Source with every Liquid region replaced by a placeholder.
    pub text: String,
    /// Originals of the replaced regions.
    pub table: PlaceholderTable,
}

/// Replaces the Liquid regions of `source` with placeholders.
///
/// # Errors
///
/// Returns [`BridgeError::PlaceholderOverflow`] when `source` already
/// contains [`DELIMITER`], or when a region has too few bytes to hold its
/// key.
pub fn substitute(source: &str) -> Result<Substitution, BridgeError> {
    if let Some(offset) = source.find(DELIMITER) {
        return Err(BridgeError::PlaceholderOverflow {
            line: index_to_line_number(source, offset),
            detail: "source already contains the placeholder delimiter".to_string(),
        });
    }

    let mut bytes = source.as_bytes().to_vec();
    let mut table = PlaceholderTable::default();
    for region in LIQUID_REGION.find_iter(source) {
        if region.len() <= MIN_REGION_LEN {
            continue;
        }
        let key = to_base36(table.len());
        let target = &mut bytes[region.start()..region.end()];
        if !write_placeholder(target, &key) {
            return Err(BridgeError::PlaceholderOverflow {
                line: index_to_line_number(source, region.start()),
                detail: format!(
                    "region of {} bytes cannot hold placeholder key `{key}`",
                    region.len()
                ),
            });
        }
        table.entries.push(region.as_str().to_string());
    }

    // Only ASCII bytes were written, over whole regions whose bounds are
    // ASCII braces, so the buffer is still UTF-8.
    let text = String::from_utf8(bytes).map_err(|e| BridgeError::PlaceholderOverflow {
        line: 1,
        detail: e.to_string(),
    })?;
    Ok(Substitution { text, table })
}

fn write_placeholder(target: &mut [u8], key: &str) -> bool {
    let last = target.len() - 1;
    target[0] = DELIMITER as u8;
    target[last] = DELIMITER as u8;
    let mut digits = key.bytes();
    for byte in &mut target[1..last] {
        if *byte == b'\n' {
            continue;
        }
        *byte = digits.next().unwrap_or(FILLER);
    }
    digits.next().is_none()
}

fn to_base36(mut n: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[n % 36]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substituted(source: &str) -> Substitution {
        substitute(source).unwrap()
    }

    #[test]
    fn placeholders_keep_length_and_newlines() {
        let source = "<p class=\"{{ a }}\">{% if b %}\nx\n{% endif %}</p>";
        let result = substituted(source);
        assert_eq!(result.text.len(), source.len());
        assert_eq!(
            result.text.matches('\n').count(),
            source.matches('\n').count()
        );
        assert!(!result.text.contains("{{"));
        assert!(!result.text.contains("{%"));
        assert_eq!(result.table.len(), 3);
        assert!(result.text.starts_with("<p class=\"\u{1f}0####\u{1f}\">"));
    }

    #[test]
    fn round_trip_restores_every_region() {
        let source = "<img src=\"{{ 'a.png'\n  | asset_url: \"x\" }}\" {% if w %}width=\"{{ w }}\"{% endif %}>{{x}}{{}}";
        let result = substituted(source);
        assert_eq!(result.table.restore(&result.text), source);
        for region in LIQUID_REGION.find_iter(source) {
            let slice = &result.text[region.start()..region.end()];
            assert_eq!(result.table.restore(slice), region.as_str());
        }
    }

    #[test]
    fn short_regions_are_kept() {
        let result = substituted("{{}}{%%}");
        assert_eq!(result.text, "{{}}{%%}");
        assert!(result.table.is_empty());
    }

    #[test]
    fn multi_line_region_keeps_key_on_first_bytes() {
        let source = "{{\n\n x }}";
        let result = substituted(source);
        assert_eq!(result.text, "\u{1f}0\n\n####\u{1f}");
        assert_eq!(result.table.restore(&result.text), source);
    }

    #[test]
    fn keys_beyond_one_digit() {
        let source = "{{ x }}".repeat(40);
        let result = substituted(&source);
        assert_eq!(result.table.len(), 40);
        assert!(result.text.contains("\u{1f}10###\u{1f}"));
        assert_eq!(result.table.restore(&result.text), source);
    }

    #[test]
    fn overflow_is_an_error() {
        // Key 1296 needs three digits but "{{\n\n}}" only has two free bytes.
        let source = format!("{}{{{{\n\n}}}}", "{{ y }}".repeat(1296));
        let error = substitute(&source).err();
        assert!(matches!(error, Some(BridgeError::PlaceholderOverflow { .. })));
    }

    #[test]
    fn delimiter_in_source_is_an_error() {
        let error = substitute("a\u{1f}b").err();
        assert!(matches!(
            error,
            Some(BridgeError::PlaceholderOverflow { line: 1, .. })
        ));
    }

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}

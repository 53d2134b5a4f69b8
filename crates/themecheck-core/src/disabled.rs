//! Inline `theme-check-disable` / `theme-check-enable` directives.
//!
//! Directives live in Liquid comments:
//!
//! ```liquid
//! {% comment %}theme-check-disable UnusedAssign, TemplateLength{% endcomment %}
//! {% # theme-check-enable %}
//! ```
//!
//! A disable without names disables every check. An enable without names
//! re-enables everything that is disabled in the file. A disable on the
//! first line of a file also suppresses offenses that have no position.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::node::Node;

/// Keyword that starts a disable directive.
pub const DISABLE_PREFIX: &str = "theme-check-disable";
/// Keyword that starts an enable directive.
pub const ENABLE_PREFIX: &str = "theme-check-enable";

/// What a directive applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckScope {
    /// Every check.
    All,
    /// One check, by name.
    Named(String),
}

impl std::fmt::Display for CheckScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// A parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Start suppressing the scopes.
    Disable(Vec<CheckScope>),
    /// Stop suppressing the scopes.
    Enable(Vec<CheckScope>),
}

impl Directive {
    /// Parses the text of a comment. Returns `None` for ordinary comments.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(rest) = strip_keyword(text, DISABLE_PREFIX) {
            Some(Self::Disable(scopes(rest)))
        } else {
            strip_keyword(text, ENABLE_PREFIX).map(|rest| Self::Enable(scopes(rest)))
        }
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}

fn scopes(rest: &str) -> Vec<CheckScope> {
    let names: Vec<CheckScope> = rest
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| CheckScope::Named(name.to_string()))
        .collect();
    if names.is_empty() {
        vec![CheckScope::All]
    } else {
        names
    }
}

/// Half-open suppression ranges of one scope in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisabledCheck {
    first_line: bool,
    ranges: Vec<(usize, Option<usize>)>,
}

impl DisabledCheck {
    /// Opens a range at `index` unless one is already open.
    pub fn start(&mut self, index: usize) {
        if self.ranges.last().is_some_and(|(_, end)| end.is_none()) {
            return;
        }
        self.ranges.push((index, None));
    }

    /// Closes the open range at `index`. No-op when nothing is open.
    pub fn end(&mut self, index: usize) {
        if let Some((start, end @ None)) = self.ranges.last_mut() {
            *end = Some(index.max(*start));
        }
    }

    /// Marks the scope as disabled from the first line.
    pub fn set_first_line(&mut self) {
        self.first_line = true;
    }

    /// Returns true if `index` is suppressed.
    #[must_use]
    pub fn is_disabled(&self, index: usize) -> bool {
        (index == 0 && self.first_line)
            || self.ranges.iter().any(|&(start, end)| {
                start <= index && end.map_or(true, |end| index < end)
            })
    }

    /// Returns true if the last range was never closed. A single range
    /// opened on the first line is the whole-file idiom and does not count.
    #[must_use]
    pub fn missing_end_index(&self) -> bool {
        if self.first_line && self.ranges.len() == 1 {
            return false;
        }
        self.ranges.last().is_some_and(|(_, end)| end.is_none())
    }

    /// Recorded ranges; `None` ends extend to the end of the file.
    #[must_use]
    pub fn ranges(&self) -> &[(usize, Option<usize>)] {
        &self.ranges
    }

    /// Whether a disable directive was found on line 1.
    #[must_use]
    pub fn first_line(&self) -> bool {
        self.first_line
    }
}

/// Suppression state of every file, filled while files are visited.
#[derive(Debug, Clone, Default)]
pub struct DisabledRanges {
    files: HashMap<PathBuf, BTreeMap<CheckScope, DisabledCheck>>,
}

impl DisabledRanges {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a comment node. Other nodes and ordinary comments are ignored.
    pub fn update(&mut self, node: Node<'_>) {
        let Some(directive) = node.comment_text().as_deref().and_then(Directive::parse) else {
            return;
        };
        self.apply(
            node.path(),
            &directive,
            node.line_number(),
            node.inner_markup_start_index(),
            node.inner_markup_end_index(),
        );
    }

    /// Applies a directive found at `line`. Disables start at `start`,
    /// enables end at `end`.
    pub fn apply(&mut self, path: &Path, directive: &Directive, line: usize, start: usize, end: usize) {
        let file = self.files.entry(path.to_path_buf()).or_default();
        match directive {
            Directive::Disable(scopes) => {
                for scope in scopes {
                    debug!(file = %path.display(), line, %scope, "disabling");
                    let check = file.entry(scope.clone()).or_default();
                    check.start(start);
                    if line == 1 {
                        check.set_first_line();
                    }
                }
            }
            Directive::Enable(scopes) if scopes == &[CheckScope::All] => {
                debug!(file = %path.display(), line, "enabling all");
                for check in file.values_mut() {
                    check.end(end);
                }
            }
            Directive::Enable(scopes) => {
                for scope in scopes {
                    if let Some(check) = file.get_mut(scope) {
                        debug!(file = %path.display(), line, %scope, "enabling");
                        check.end(end);
                    }
                }
            }
        }
    }

    /// Returns true if offenses of `check` at `index` in `path` are
    /// suppressed.
    #[must_use]
    pub fn is_disabled(&self, check: &str, path: &Path, index: usize) -> bool {
        let Some(file) = self.files.get(path) else {
            return false;
        };
        file.iter().any(|(scope, disabled)| {
            let applies = match scope {
                CheckScope::All => true,
                CheckScope::Named(name) => name == check,
            };
            applies && disabled.is_disabled(index)
        })
    }

    /// State of one scope in one file.
    #[must_use]
    pub fn get(&self, path: &Path, scope: &CheckScope) -> Option<&DisabledCheck> {
        self.files.get(path)?.get(scope)
    }

    /// Scopes of `path` whose last range is never closed, in name order
    /// with [`CheckScope::All`] first.
    #[must_use]
    pub fn missing_end_index(&self, path: &Path) -> Vec<CheckScope> {
        self.files.get(path).map_or_else(Vec::new, |file| {
            file.iter()
                .filter(|(_, check)| check.missing_end_index())
                .map(|(scope, _)| scope.clone())
                .collect()
        })
    }

    /// Forgets everything recorded for `path`.
    pub fn clear(&mut self, path: &Path) {
        self.files.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquid::{ErrorMode, NodeType};
    use crate::node::LiquidTree;

    fn tracker(source: &str) -> (LiquidTree, DisabledRanges) {
        let tree = LiquidTree::parse("templates/index.liquid", source, ErrorMode::Warn)
            .unwrap();
        let mut ranges = DisabledRanges::new();
        fn walk(node: Node<'_>, ranges: &mut DisabledRanges) {
            for child in node.children() {
                walk(child, ranges);
            }
            if node.is_comment() {
                ranges.update(node);
            }
        }
        walk(tree.root(), &mut ranges);
        (tree, ranges)
    }

    fn path() -> &'static Path {
        Path::new("templates/index.liquid")
    }

    #[test]
    fn parses_directives() {
        assert_eq!(
            Directive::parse(" theme-check-disable "),
            Some(Directive::Disable(vec![CheckScope::All]))
        );
        assert_eq!(
            Directive::parse("theme-check-enable A, B"),
            Some(Directive::Enable(vec![
                CheckScope::Named("A".into()),
                CheckScope::Named("B".into())
            ]))
        );
        assert_eq!(Directive::parse("theme-check-disabled"), None);
        assert_eq!(Directive::parse("just a comment"), None);
    }

    #[test]
    fn disable_enable_all() {
        let source = "a{% comment %}theme-check-disable{% endcomment %}b{% comment %}theme-check-enable{% endcomment %}c";
        let (_, ranges) = tracker(source);
        let b = source.find('b').unwrap_or_default();
        let c = source.rfind('c').unwrap_or_default();
        assert!(!ranges.is_disabled("Any", path(), 0));
        assert!(ranges.is_disabled("Any", path(), b));
        assert!(!ranges.is_disabled("Any", path(), c));
        assert!(ranges.missing_end_index(path()).is_empty());
    }

    #[test]
    fn named_checks_are_independent() {
        let source = "{% # x %}\n{% # theme-check-disable A %}1{% # theme-check-disable B %}2{% # theme-check-enable A %}3{% # theme-check-enable B %}4";
        let (_, ranges) = tracker(source);
        let at = |s: &str| source.find(s).unwrap_or_default();
        assert!(ranges.is_disabled("A", path(), at("1")));
        assert!(!ranges.is_disabled("B", path(), at("1")));
        assert!(ranges.is_disabled("A", path(), at("2")));
        assert!(ranges.is_disabled("B", path(), at("2")));
        assert!(!ranges.is_disabled("A", path(), at("3")));
        assert!(ranges.is_disabled("B", path(), at("3")));
        assert!(!ranges.is_disabled("B", path(), at("4")));
    }

    #[test]
    fn enable_without_names_closes_named_ranges() {
        let source = "{% # theme-check-disable A, B %}x{% # theme-check-enable %}y";
        let (_, ranges) = tracker(source);
        let y = source.rfind('y').unwrap_or_default();
        assert!(!ranges.is_disabled("A", path(), y));
        assert!(!ranges.is_disabled("B", path(), y));
        assert!(ranges.missing_end_index(path()).is_empty());
    }

    #[test]
    fn first_line_disable_covers_whole_file() {
        let source = "{% comment %}theme-check-disable{% endcomment %}\n{% assign x = 1 %}";
        let (_, ranges) = tracker(source);
        assert!(ranges.is_disabled("UnusedAssign", path(), 0));
        assert!(ranges.is_disabled("UnusedAssign", path(), source.len() - 1));
        assert!(ranges.missing_end_index(path()).is_empty());
    }

    #[test]
    fn unclosed_disable_is_missing_end() {
        let source = "\n{% # theme-check-disable B, A %}\n";
        let (_, ranges) = tracker(source);
        assert_eq!(
            ranges.missing_end_index(path()),
            vec![CheckScope::Named("A".into()), CheckScope::Named("B".into())]
        );
    }

    #[test]
    fn tolerates_stray_and_unknown_directives() {
        let source = "{% # x %}\n{% # theme-check-enable Nope %}{% # theme-check-disable DoesNotExist %}z{% # theme-check-enable DoesNotExist %}";
        let (_, ranges) = tracker(source);
        let z = source.find('z').unwrap_or_default();
        assert!(ranges.is_disabled("DoesNotExist", path(), z));
        assert!(!ranges.is_disabled("Other", path(), z));
        assert!(ranges.get(path(), &CheckScope::Named("Nope".into())).is_none());
    }

    #[test]
    fn repeated_disable_does_not_open_a_second_range() {
        let mut check = DisabledCheck::default();
        check.start(5);
        check.start(9);
        check.end(12);
        check.end(20);
        assert_eq!(check.ranges(), &[(5, Some(12))]);
        assert!(!check.missing_end_index());
    }

    #[test]
    fn comment_nodes_are_the_only_input() {
        let (tree, ranges) = tracker("{{ 'theme-check-disable' }}");
        assert!(ranges.files.is_empty());
        assert_eq!(tree.root().children().next().map(|n| n.node_type()), Some(NodeType::Variable));
    }
}

//! Position-addressed rewriting of theme files.
//!
//! Offenses carry a [`Correction`]: a closure that records edits on a
//! [`Corrector`]. Nothing touches storage until every correction of a run
//! has been collected; [`apply`] then resolves conflicts and writes each
//! file once.
//!
//! Text edits are accepted in registration order. An edit that overlaps an
//! already accepted one is rejected and counted as a conflict. Insertions at
//! the same offset are applied in registration order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::position::Span;
use crate::storage::{Storage, StorageError};

/// A deferred fix attached to an offense.
#[derive(Clone)]
pub struct Correction(Arc<dyn Fn(&mut Corrector) + Send + Sync>);

impl Correction {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&mut Corrector) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Records the correction's edits.
    pub fn run(&self, corrector: &mut Corrector) {
        (self.0)(corrector);
    }
}

impl<F> From<F> for Correction
where
    F: Fn(&mut Corrector) + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

impl std::fmt::Debug for Correction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Correction(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TextEdit {
    file: PathBuf,
    span: Span,
    text: String,
}

#[derive(Debug, Clone, PartialEq)]
enum JsonEdit {
    Set(String, Value),
    Remove(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileOp {
    Create(PathBuf, String),
    Remove(PathBuf),
    Mkdir(PathBuf),
}

/// Collects the edits of every correction of a run.
#[derive(Debug, Default)]
pub struct Corrector {
    file: PathBuf,
    edits: Vec<TextEdit>,
    json: Vec<(PathBuf, JsonEdit)>,
    files: Vec<FileOp>,
}

impl Corrector {
    /// Creates an empty corrector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file that text and JSON edits apply to.
    pub fn focus(&mut self, file: impl Into<PathBuf>) -> &mut Self {
        self.file = file.into();
        self
    }

    /// File that text and JSON edits currently apply to.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Replaces `span` with `text`.
    pub fn replace(&mut self, span: Span, text: impl Into<String>) -> &mut Self {
        self.edits.push(TextEdit {
            file: self.file.clone(),
            span,
            text: text.into(),
        });
        self
    }

    /// Inserts `text` before `span`.
    pub fn insert_before(&mut self, span: Span, text: impl Into<String>) -> &mut Self {
        self.replace(Span::new(span.start, span.start), text)
    }

    /// Inserts `text` after `span`.
    pub fn insert_after(&mut self, span: Span, text: impl Into<String>) -> &mut Self {
        self.replace(Span::new(span.end, span.end), text)
    }

    /// Removes `span`.
    pub fn remove(&mut self, span: Span) -> &mut Self {
        self.replace(span, "")
    }

    /// Creates (or overwrites) a file.
    pub fn create_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> &mut Self {
        self.files.push(FileOp::Create(path.into(), content.into()));
        self
    }

    /// Removes a file.
    pub fn remove_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.files.push(FileOp::Remove(path.into()));
        self
    }

    /// Creates a directory.
    pub fn mkdir(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.files.push(FileOp::Mkdir(path.into()));
        self
    }

    /// Sets the value at a JSON pointer (`/a/b/0`) of the focused file,
    /// creating intermediate objects.
    pub fn set_json_value(&mut self, pointer: impl Into<String>, value: Value) -> &mut Self {
        self.json
            .push((self.file.clone(), JsonEdit::Set(pointer.into(), value)));
        self
    }

    /// Removes the value at a JSON pointer of the focused file.
    pub fn remove_json_value(&mut self, pointer: impl Into<String>) -> &mut Self {
        self.json
            .push((self.file.clone(), JsonEdit::Remove(pointer.into())));
        self
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.json.is_empty() && self.files.is_empty()
    }
}

/// Outcome of applying corrections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionSummary {
    /// Files whose contents were rewritten, created or removed.
    pub files_changed: Vec<PathBuf>,
    /// Number of edits applied.
    pub applied: usize,
    /// Number of edits rejected because they overlapped an earlier one or
    /// did not fall on character boundaries of the file.
    pub conflicts: usize,
}

/// Applies everything recorded in `corrector` to `storage`.
///
/// # Errors
///
/// Returns the first storage failure. Edits of files written before the
/// failure stay applied.
pub fn apply(corrector: Corrector, storage: &mut dyn Storage) -> Result<CorrectionSummary, StorageError> {
    let mut summary = CorrectionSummary::default();

    let mut by_file: BTreeMap<PathBuf, Vec<TextEdit>> = BTreeMap::new();
    for edit in corrector.edits {
        by_file.entry(edit.file.clone()).or_default().push(edit);
    }
    let mut json_by_file: BTreeMap<PathBuf, Vec<JsonEdit>> = BTreeMap::new();
    for (file, edit) in corrector.json {
        json_by_file.entry(file).or_default().push(edit);
    }

    let mut touched: Vec<PathBuf> = by_file.keys().chain(json_by_file.keys()).cloned().collect();
    touched.sort();
    touched.dedup();

    for file in touched {
        let Some(original) = storage.read(&file)? else {
            warn!(file = %file.display(), "skipping corrections of a missing file");
            continue;
        };
        let mut content = original.clone();
        if let Some(edits) = by_file.remove(&file) {
            let (accepted, conflicts) = resolve(edits, &content);
            summary.conflicts += conflicts;
            summary.applied += accepted.len();
            content = rewrite(&content, &accepted);
        }
        if let Some(edits) = json_by_file.remove(&file) {
            match serde_json::from_str::<Value>(&content) {
                Ok(mut value) => {
                    for edit in &edits {
                        match edit {
                            JsonEdit::Set(pointer, new) => set_pointer(&mut value, pointer, new.clone()),
                            JsonEdit::Remove(pointer) => remove_pointer(&mut value, pointer),
                        }
                    }
                    summary.applied += edits.len();
                    content = serde_json::to_string_pretty(&value)
                        .map_err(|e| StorageError::Json {
                            path: file.clone(),
                            message: e.to_string(),
                        })?;
                    content.push('\n');
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping JSON corrections of invalid JSON");
                }
            }
        }
        if content != original {
            debug!(file = %file.display(), "writing corrections");
            storage.write(&file, &content)?;
            summary.files_changed.push(file);
        }
    }

    for op in corrector.files {
        match op {
            FileOp::Create(path, content) => {
                storage.write(&path, &content)?;
                summary.files_changed.push(path);
            }
            FileOp::Remove(path) => {
                storage.remove(&path)?;
                summary.files_changed.push(path);
            }
            FileOp::Mkdir(path) => storage.mkdir(&path)?,
        }
        summary.applied += 1;
    }

    if summary.conflicts > 0 {
        warn!(conflicts = summary.conflicts, "rejected overlapping corrections");
    }
    Ok(summary)
}

fn conflicts(a: Span, b: Span) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => false,
        (true, false) => b.start < a.start && a.start < b.end,
        (false, true) => a.start < b.start && b.start < a.end,
        (false, false) => a.overlaps(b),
    }
}

/// Keeps edits in registration order, rejecting the ones that overlap an
/// accepted edit or split a character of `source`. Returns them sorted for
/// rewriting.
fn resolve(edits: Vec<TextEdit>, source: &str) -> (Vec<TextEdit>, usize) {
    let mut accepted: Vec<TextEdit> = Vec::with_capacity(edits.len());
    let mut rejected = 0;
    for edit in edits {
        let valid = edit.span.start <= edit.span.end
            && source.is_char_boundary(edit.span.start)
            && source.is_char_boundary(edit.span.end);
        if !valid || accepted.iter().any(|a| conflicts(a.span, edit.span)) {
            warn!(
                file = %edit.file.display(),
                start = edit.span.start,
                end = edit.span.end,
                "rejecting correction"
            );
            rejected += 1;
            continue;
        }
        accepted.push(edit);
    }
    // Stable: insertions at one offset keep their registration order and
    // come before a replacement starting there.
    accepted.sort_by_key(|e| (e.span.start, !e.span.is_empty()));
    (accepted, rejected)
}

fn rewrite(source: &str, edits: &[TextEdit]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&source[cursor..edit.span.start]);
        out.push_str(&edit.text);
        cursor = edit.span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

fn pointer_tokens(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn set_pointer(root: &mut Value, pointer: &str, new: Value) {
    let tokens = pointer_tokens(pointer);
    let Some((last, parents)) = tokens.split_last() else {
        *root = new;
        return;
    };
    let mut current = root;
    for token in parents {
        if !current.is_object() && !current.is_array() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            Value::Array(items) => match token.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(item) => item,
                None => return,
            },
            _ => return,
        };
    }
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), new);
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => items[i] = new,
            _ if last == "-" => items.push(new),
            _ => {}
        },
        other => {
            let mut map = serde_json::Map::new();
            map.insert(last.clone(), new);
            *other = Value::Object(map);
        }
    }
}

fn remove_pointer(root: &mut Value, pointer: &str) {
    let tokens = pointer_tokens(pointer);
    let Some((last, parents)) = tokens.split_last() else {
        return;
    };
    let mut current = root;
    for token in parents {
        current = match current {
            Value::Object(map) => match map.get_mut(token) {
                Some(next) => next,
                None => return,
            },
            Value::Array(items) => match token.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(next) => next,
                None => return,
            },
            _ => return,
        };
    }
    match current {
        Value::Object(map) => {
            map.shift_remove(last);
        }
        Value::Array(items) => {
            if let Ok(i) = last.parse::<usize>() {
                if i < items.len() {
                    items.remove(i);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    fn storage(files: &[(&str, &str)]) -> InMemoryStorage {
        InMemoryStorage::from_files(files.iter().copied())
    }

    fn read(storage: &InMemoryStorage, path: &str) -> String {
        storage
            .read(Path::new(path))
            .unwrap()
            .unwrap_or_default()
    }

    #[test]
    fn replaces_and_inserts() {
        let mut store = storage(&[("a.liquid", "{{x}} {{y}}")]);
        let mut corrector = Corrector::new();
        corrector
            .focus("a.liquid")
            .replace(Span::new(0, 5), "{{ x }}")
            .insert_after(Span::new(6, 11), "!")
            .insert_before(Span::new(6, 11), "<");
        let summary = apply(corrector, &mut store).unwrap();
        assert_eq!(read(&store, "a.liquid"), "{{ x }} <{{y}}!");
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.conflicts, 0);
        assert_eq!(summary.files_changed, vec![PathBuf::from("a.liquid")]);
    }

    #[test]
    fn first_registered_overlap_wins() {
        let mut store = storage(&[("a.liquid", "abcdef")]);
        let mut corrector = Corrector::new();
        corrector
            .focus("a.liquid")
            .replace(Span::new(1, 4), "X")
            .replace(Span::new(3, 5), "Y")
            .remove(Span::new(2, 3));
        let summary = apply(corrector, &mut store).unwrap();
        assert_eq!(read(&store, "a.liquid"), "aXef");
        assert_eq!(summary.conflicts, 2);
    }

    #[test]
    fn insertions_at_one_offset_keep_order() {
        let mut store = storage(&[("a.liquid", "ab")]);
        let mut corrector = Corrector::new();
        corrector
            .focus("a.liquid")
            .replace(Span::new(1, 2), "B")
            .insert_before(Span::new(1, 2), "1")
            .insert_before(Span::new(1, 2), "2");
        apply(corrector, &mut store).unwrap();
        assert_eq!(read(&store, "a.liquid"), "a12B");
    }

    #[test]
    fn out_of_bounds_edit_is_rejected() {
        let mut store = storage(&[("a.liquid", "ab")]);
        let mut corrector = Corrector::new();
        corrector.focus("a.liquid").replace(Span::new(1, 9), "x");
        let summary = apply(corrector, &mut store).unwrap();
        assert_eq!(summary.conflicts, 1);
        assert!(summary.files_changed.is_empty());
    }

    #[test]
    fn edit_inside_a_character_is_rejected() {
        let mut store = storage(&[("a.liquid", "é{{x}}")]);
        let mut corrector = Corrector::new();
        corrector
            .focus("a.liquid")
            .replace(Span::new(1, 2), "e")
            .replace(Span::new(2, 7), "{{ x }}");
        let summary = apply(corrector, &mut store).unwrap();
        assert_eq!(read(&store, "a.liquid"), "é{{ x }}");
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.conflicts, 1);
    }

    #[test]
    fn json_edits() {
        let mut store = storage(&[("locales/en.default.json", r#"{"a": {"b": 1}, "c": 2}"#)]);
        let mut corrector = Corrector::new();
        corrector
            .focus("locales/en.default.json")
            .set_json_value("/a/d/e", json!("x"))
            .remove_json_value("/c");
        apply(corrector, &mut store).unwrap();
        let value: Value = serde_json::from_str(&read(&store, "locales/en.default.json"))
            .unwrap();
        assert_eq!(value, json!({"a": {"b": 1, "d": {"e": "x"}}}));
    }

    #[test]
    fn file_operations() {
        let mut store = storage(&[("snippets/old.liquid", "x")]);
        let mut corrector = Corrector::new();
        corrector
            .remove_file("snippets/old.liquid")
            .mkdir("templates")
            .create_file("templates/index.liquid", "hello");
        let summary = apply(corrector, &mut store).unwrap();
        assert_eq!(read(&store, "templates/index.liquid"), "hello");
        assert!(store
            .read(Path::new("snippets/old.liquid"))
            .unwrap()
            .is_none());
        assert_eq!(summary.files_changed.len(), 2);
    }

    #[test]
    fn correction_runs_closure() {
        let correction = Correction::from(|c: &mut Corrector| {
            c.remove(Span::new(0, 1));
        });
        let mut corrector = Corrector::new();
        assert!(corrector.is_empty());
        correction.run(&mut corrector);
        assert!(!corrector.is_empty());
        assert_eq!(format!("{correction:?}"), "Correction(..)");
    }
}

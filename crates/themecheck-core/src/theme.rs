//! The files of a theme.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{Storage, StorageError};

/// Directory a theme file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// `layout/`
    Layout,
    /// `templates/` and its subdirectories.
    Template,
    /// `sections/`
    Section,
    /// `snippets/`
    Snippet,
    /// `locales/`
    Locale,
    /// `config/`
    Config,
    /// `assets/`
    Asset,
    /// Anything else.
    Other,
}

impl FileKind {
    /// Classifies a path by its first directory.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        let first = path
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_default();
        match first.as_str() {
            "layout" => Self::Layout,
            "templates" => Self::Template,
            "sections" => Self::Section,
            "snippets" => Self::Snippet,
            "locales" => Self::Locale,
            "config" => Self::Config,
            "assets" => Self::Asset,
            _ => Self::Other,
        }
    }
}

/// How a theme file is analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// `.liquid`
    Liquid,
    /// `.json`
    Json,
    /// Anything else.
    Asset,
}

impl FileFormat {
    /// Classifies a path by its extension.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("liquid") => Self::Liquid,
            Some("json") => Self::Json,
            _ => Self::Asset,
        }
    }
}

/// One file of the theme, with its contents read on first use.
#[derive(Debug)]
pub struct ThemeFile {
    path: PathBuf,
    kind: FileKind,
    format: FileFormat,
    content: OnceCell<Option<Arc<str>>>,
}

impl ThemeFile {
    fn new(path: PathBuf) -> Self {
        Self {
            kind: FileKind::of(&path),
            format: FileFormat::of(&path),
            path,
            content: OnceCell::new(),
        }
    }

    /// Path relative to the theme root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory classification.
    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Extension classification.
    #[must_use]
    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Path without its extension, e.g. `templates/index`.
    #[must_use]
    pub fn name(&self) -> String {
        self.path.with_extension("").to_string_lossy().replace('\\', "/")
    }

    /// Name used by `{% render %}` for snippets, e.g. `card` for
    /// `snippets/card.liquid`.
    #[must_use]
    pub fn snippet_name(&self) -> Option<String> {
        if self.kind != FileKind::Snippet || self.format != FileFormat::Liquid {
            return None;
        }
        self.path
            .strip_prefix("snippets")
            .ok()
            .map(|p| p.with_extension("").to_string_lossy().replace('\\', "/"))
    }

    /// Returns true for `.liquid` files.
    #[must_use]
    pub fn is_liquid(&self) -> bool {
        self.format == FileFormat::Liquid
    }

    /// Returns true for `.json` files.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == FileFormat::Json
    }
}

/// A theme: its storage and the files found in it.
#[derive(Debug)]
pub struct Theme {
    storage: Box<dyn Storage>,
    files: Vec<ThemeFile>,
}

impl Theme {
    /// Lists the files of `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be listed.
    pub fn new(storage: impl Storage + 'static) -> Result<Self, StorageError> {
        Self::from_box(Box::new(storage))
    }

    /// Like [`Theme::new`] for an already boxed storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be listed.
    pub fn from_box(storage: Box<dyn Storage>) -> Result<Self, StorageError> {
        let mut files = storage.files()?.into_iter().map(ThemeFile::new).collect::<Vec<_>>();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        info!("Found {} theme files", files.len());
        Ok(Self { storage, files })
    }

    /// Every file, in path order.
    #[must_use]
    pub fn files(&self) -> &[ThemeFile] {
        &self.files
    }

    /// Looks a file up by path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&ThemeFile> {
        self.files
            .binary_search_by(|f| f.path.as_path().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    /// Returns true if the theme holds `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Files of one directory kind.
    pub fn of_kind(&self, kind: FileKind) -> impl Iterator<Item = &ThemeFile> {
        self.files.iter().filter(move |f| f.kind == kind)
    }

    /// `.liquid` files.
    pub fn liquid_files(&self) -> impl Iterator<Item = &ThemeFile> {
        self.files.iter().filter(|f| f.is_liquid())
    }

    /// `.json` files.
    pub fn json_files(&self) -> impl Iterator<Item = &ThemeFile> {
        self.files.iter().filter(|f| f.is_json())
    }

    /// Snippets, by `{% render %}` name.
    pub fn snippets(&self) -> impl Iterator<Item = (String, &ThemeFile)> {
        self.files
            .iter()
            .filter_map(|f| f.snippet_name().map(|name| (name, f)))
    }

    /// Contents of a file, read once and cached.
    ///
    /// Returns `None` for files that are not part of the theme or vanished
    /// from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fails.
    pub fn read(&self, path: &Path) -> Result<Option<Arc<str>>, StorageError> {
        let Some(file) = self.get(path) else {
            return Ok(None);
        };
        if let Some(content) = file.content.get() {
            return Ok(content.clone());
        }
        debug!(file = %path.display(), "reading");
        let content = self.storage.read(path)?.map(Arc::<str>::from);
        Ok(file.content.get_or_init(|| content).clone())
    }

    /// The storage, for corrections.
    pub fn storage_mut(&mut self) -> &mut dyn Storage {
        self.storage.as_mut()
    }

    /// Forgets cached contents and lists the files again.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be listed.
    pub fn refresh(&mut self) -> Result<(), StorageError> {
        self.files = self.storage.files()?.into_iter().map(ThemeFile::new).collect();
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(())
    }
}

/// A JSON syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line} column {column}")]
pub struct JsonError {
    /// Parser message.
    pub message: String,
    /// 1-indexed line.
    pub line: usize,
    /// 1-indexed column.
    pub column: usize,
}

/// A parsed `.json` theme file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
    content: Arc<str>,
    value: Result<Value, JsonError>,
}

impl JsonFile {
    /// Parses `content`. Syntax errors are kept, not returned.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, content: Arc<str>) -> Self {
        let value = serde_json::from_str::<Value>(&content).map_err(|e| JsonError {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        });
        Self {
            path: path.into(),
            content,
            value,
        }
    }

    /// Path relative to the theme root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw contents.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The parsed value or the syntax error.
    #[must_use]
    pub fn value(&self) -> Result<&Value, &JsonError> {
        self.value.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn theme() -> Theme {
        Theme::new(InMemoryStorage::from_files([
            ("layout/theme.liquid", "{{ content_for_layout }}"),
            ("templates/index.json", "{}"),
            ("templates/customers/account.liquid", ""),
            ("snippets/card.liquid", "card"),
            ("snippets/icons/cart.liquid", ""),
            ("locales/en.default.json", "{}"),
            ("assets/theme.js", ""),
        ]))
        .unwrap()
    }

    #[test]
    fn classifies_files() {
        let theme = theme();
        let file = theme
            .get(Path::new("templates/customers/account.liquid"))
            .unwrap();
        assert_eq!(file.kind(), FileKind::Template);
        assert_eq!(file.format(), FileFormat::Liquid);
        assert_eq!(file.name(), "templates/customers/account");
        assert_eq!(theme.liquid_files().count(), 4);
        assert_eq!(theme.json_files().count(), 2);
        assert_eq!(theme.of_kind(FileKind::Asset).count(), 1);
    }

    #[test]
    fn snippet_names() {
        let theme = theme();
        let names: Vec<String> = theme.snippets().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["card", "icons/cart"]);
    }

    #[test]
    fn reads_are_cached() {
        let mut theme = theme();
        let first = theme
            .read(Path::new("snippets/card.liquid"))
            .unwrap();
        theme
            .storage_mut()
            .write(Path::new("snippets/card.liquid"), "changed")
            .unwrap();
        let second = theme
            .read(Path::new("snippets/card.liquid"))
            .unwrap();
        assert_eq!(first.as_deref(), Some("card"));
        assert_eq!(second.as_deref(), Some("card"));

        theme.refresh().unwrap();
        let third = theme
            .read(Path::new("snippets/card.liquid"))
            .unwrap();
        assert_eq!(third.as_deref(), Some("changed"));
        assert!(theme.read(Path::new("nope.liquid")).unwrap().is_none());
    }

    #[test]
    fn json_files_keep_syntax_errors() {
        let ok = JsonFile::parse("config/settings_data.json", Arc::from(r#"{"current": "Default"}"#));
        assert_eq!(
            ok.value().ok().and_then(|v| v["current"].as_str()),
            Some("Default")
        );

        let broken = JsonFile::parse("locales/en.default.json", Arc::from("{\n  \"a\": \n}"));
        let error = broken.value().err().cloned().unwrap();
        assert_eq!(error.line, 3);
        assert_eq!(broken.content(), "{\n  \"a\": \n}");
    }
}

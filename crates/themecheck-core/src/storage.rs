//! Where theme files live.
//!
//! Paths handed to and returned by a [`Storage`] are relative to the theme
//! root and use `/` separators on every platform.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error on a theme file.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path relative to the theme root.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Error while walking the theme directory.
    #[error("Failed to list theme files: {0}")]
    Walk(#[from] walkdir::Error),

    /// A JSON rewrite could not be serialized.
    #[error("Failed to serialize {path}: {message}")]
    Json {
        /// Path relative to the theme root.
        path: PathBuf,
        /// Serializer message.
        message: String,
    },
}

/// Read and write access to the files of a theme.
pub trait Storage: Send + std::fmt::Debug {
    /// Reads a file. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    fn read(&self, path: &Path) -> Result<Option<String>, StorageError>;

    /// Writes a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&mut self, path: &Path, content: &str) -> Result<(), StorageError>;

    /// Removes a file. Removing a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn remove(&mut self, path: &Path) -> Result<(), StorageError>;

    /// Creates a directory and its parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn mkdir(&mut self, path: &Path) -> Result<(), StorageError>;

    /// Every file, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn files(&self) -> Result<Vec<PathBuf>, StorageError>;

    /// Every directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn directories(&self) -> Result<Vec<PathBuf>, StorageError>;

    /// Root on disk, for backends that have one.
    fn root(&self) -> Option<&Path> {
        None
    }
}

/// Storage backed by a directory.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    /// Creates a storage rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn walk(&self, want_dirs: bool) -> Result<Vec<PathBuf>, StorageError> {
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() != want_dirs {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                out.push(normalize(relative));
            }
        }
        out.sort();
        Ok(out)
    }
}

fn normalize(path: &Path) -> PathBuf {
    PathBuf::from(
        path.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

impl Storage for FileSystemStorage {
    fn read(&self, path: &Path) -> Result<Option<String>, StorageError> {
        let full = self.root.join(path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io(path)(e)),
        }
    }

    fn write(&mut self, path: &Path, content: &str) -> Result<(), StorageError> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(Self::io(path))?;
        }
        debug!(file = %path.display(), "writing");
        std::fs::write(&full, content).map_err(Self::io(path))
    }

    fn remove(&mut self, path: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(self.root.join(path)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(Self::io(path)(e)),
            _ => Ok(()),
        }
    }

    fn mkdir(&mut self, path: &Path) -> Result<(), StorageError> {
        std::fs::create_dir_all(self.root.join(path)).map_err(Self::io(path))
    }

    fn files(&self) -> Result<Vec<PathBuf>, StorageError> {
        self.walk(false)
    }

    fn directories(&self) -> Result<Vec<PathBuf>, StorageError> {
        self.walk(true)
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// Storage held in memory, used by tests and editors.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    files: BTreeMap<PathBuf, String>,
    directories: BTreeSet<PathBuf>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage holding `files`.
    pub fn from_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: Into<String>,
    {
        let mut storage = Self::default();
        for (path, content) in files {
            storage.insert(path, content);
        }
        storage
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    fn add_parents(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.directories.insert(ancestor.to_path_buf());
        }
    }
}

impl Storage for InMemoryStorage {
    fn read(&self, path: &Path) -> Result<Option<String>, StorageError> {
        Ok(self.files.get(path).cloned())
    }

    fn write(&mut self, path: &Path, content: &str) -> Result<(), StorageError> {
        self.insert(path, content);
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<(), StorageError> {
        self.files.remove(path);
        Ok(())
    }

    fn mkdir(&mut self, path: &Path) -> Result<(), StorageError> {
        self.add_parents(path);
        self.directories.insert(path.to_path_buf());
        Ok(())
    }

    fn files(&self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn directories(&self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.directories.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: &mut dyn Storage) {
        storage
            .write(Path::new("snippets/card.liquid"), "card")
            .unwrap();
        storage
            .write(Path::new("layout/theme.liquid"), "layout")
            .unwrap();
        storage.mkdir(Path::new("assets")).unwrap();

        assert_eq!(
            storage.files().unwrap(),
            vec![
                PathBuf::from("layout/theme.liquid"),
                PathBuf::from("snippets/card.liquid")
            ]
        );
        assert_eq!(
            storage.directories().unwrap(),
            vec![
                PathBuf::from("assets"),
                PathBuf::from("layout"),
                PathBuf::from("snippets")
            ]
        );
        assert_eq!(
            storage
                .read(Path::new("snippets/card.liquid"))
                .unwrap()
                .as_deref(),
            Some("card")
        );

        storage
            .remove(Path::new("snippets/card.liquid"))
            .unwrap();
        storage
            .remove(Path::new("snippets/missing.liquid"))
            .unwrap();
        assert!(storage
            .read(Path::new("snippets/card.liquid"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn in_memory_storage() {
        exercise(&mut InMemoryStorage::new());
    }

    #[test]
    fn file_system_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileSystemStorage::new(dir.path());
        exercise(&mut storage);
        assert_eq!(storage.root(), Some(dir.path()));
    }

    #[test]
    fn from_files_registers_parent_directories() {
        let storage = InMemoryStorage::from_files([("templates/customers/account.liquid", "")]);
        assert_eq!(
            storage.directories().unwrap(),
            vec![PathBuf::from("templates"), PathBuf::from("templates/customers")]
        );
    }
}

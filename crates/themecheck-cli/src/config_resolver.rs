//! Locating and layering configuration files.
//!
//! A theme is configured by up to two files, lowest priority first:
//!
//! - `~/.themecheck/config.toml`, or `config.toml` in `$THEMECHECK_CONFIG_DIR`
//! - `theme-check.toml` (or `.theme-check.toml`) in the theme directory
//!
//! Tables are merged key by key, so a theme file only needs the settings it
//! changes. `--config` replaces both. A relative `root` is taken relative to
//! the file that sets it, except in the global file and in the defaults
//! where it is relative to the checked theme.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use themecheck_core::Config;
use toml::{Table, Value};

/// Theme-level config file names, checked in order.
const THEME_CONFIG_NAMES: &[&str] = &["theme-check.toml", ".theme-check.toml"];

/// Config file name within the global config directory.
const GLOBAL_CONFIG_NAME: &str = "config.toml";

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Given with `--config`.
    Explicit,
    /// Found in the theme directory.
    Theme,
    /// Found in the global config directory.
    Global,
}

/// One configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    /// Where the file was found.
    pub origin: Origin,
    /// Path of the file.
    pub path: PathBuf,
}

/// Configuration files that apply to a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    theme_dir: PathBuf,
    layers: Vec<ConfigLayer>,
}

impl ResolvedConfig {
    /// No configuration file: defaults for the theme in `theme_dir`.
    #[must_use]
    pub fn defaults(theme_dir: impl Into<PathBuf>) -> Self {
        Self {
            theme_dir: theme_dir.into(),
            layers: Vec::new(),
        }
    }

    /// Files, lowest priority first. Empty when defaults apply.
    #[must_use]
    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Reads and merges every layer. The returned `root` is the theme root
    /// to analyze.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, is not valid TOML, or the
    /// merged configuration is invalid.
    pub fn load(&self) -> Result<Config> {
        let mut merged = Table::new();
        let mut root: Option<PathBuf> = None;

        for layer in &self.layers {
            let content = std::fs::read_to_string(&layer.path)
                .with_context(|| format!("Failed to read config: {}", layer.path.display()))?;
            let mut table: Table = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", layer.path.display()))?;

            if let Some(value) = table.remove("root") {
                let path = value.as_str().map(PathBuf::from).with_context(|| {
                    format!("`root` must be a string in {}", layer.path.display())
                })?;
                root = Some(layer.root(&self.theme_dir, path));
            }
            if layer.origin == Origin::Global {
                tracing::info!("Using global config: {}", layer.path.display());
            }
            merge(&mut merged, table);
        }

        let serialized = toml::to_string(&merged).context("Failed to merge config files")?;
        let mut config = Config::parse(&serialized).context("Invalid configuration")?;
        config.root = root.unwrap_or_else(|| self.theme_dir.join(&config.root));
        Ok(config)
    }
}

impl ConfigLayer {
    fn root(&self, theme_dir: &Path, root: PathBuf) -> PathBuf {
        match (self.origin, self.path.parent()) {
            (Origin::Global, _) | (_, None) => theme_dir.join(root),
            (_, Some(dir)) => dir.join(root),
        }
    }
}

/// Deep merge: tables are merged recursively, anything else in `over`
/// replaces the value in `base`.
fn merge(base: &mut Table, over: Table) {
    for (key, value) in over {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(table)) => merge(existing, table),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Finds the configuration files of the theme in `theme_dir`.
#[must_use]
pub fn resolve(theme_dir: &Path, explicit: Option<&Path>) -> ResolvedConfig {
    resolve_in(theme_dir, explicit, global_config_dir().as_deref())
}

fn resolve_in(theme_dir: &Path, explicit: Option<&Path>, global_dir: Option<&Path>) -> ResolvedConfig {
    let mut resolved = ResolvedConfig::defaults(theme_dir);
    if let Some(path) = explicit {
        resolved.layers.push(ConfigLayer {
            origin: Origin::Explicit,
            path: path.to_path_buf(),
        });
        return resolved;
    }

    if let Some(path) = global_dir
        .map(|dir| dir.join(GLOBAL_CONFIG_NAME))
        .filter(|p| p.exists())
    {
        tracing::debug!("Found global config: {}", path.display());
        resolved.layers.push(ConfigLayer {
            origin: Origin::Global,
            path,
        });
    }
    if let Some(path) = THEME_CONFIG_NAMES
        .iter()
        .map(|name| theme_dir.join(name))
        .find(|p| p.exists())
    {
        tracing::debug!("Found theme config: {}", path.display());
        resolved.layers.push(ConfigLayer {
            origin: Origin::Theme,
            path,
        });
    }
    resolved
}

/// `$THEMECHECK_CONFIG_DIR` when set, `~/.themecheck/` otherwise.
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("THEMECHECK_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    home::home_dir().map(|h| h.join(".themecheck"))
}

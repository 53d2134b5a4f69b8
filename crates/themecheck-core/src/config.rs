//! Configuration types for themecheck.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::html::Limits;
use crate::liquid::ErrorMode;
use crate::types::Severity;

/// Top-level configuration, read from `theme-check.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Theme root, relative to the configuration file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Preset to use (e.g., "recommended", "all", "minimal").
    #[serde(default)]
    pub preset: Option<String>,

    /// Lowest severity that fails a run.
    #[serde(default = "default_fail_level")]
    pub fail_level: Severity,

    /// Glob patterns of files excluded from analysis.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Analyzer configuration.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Per-check configurations.
    #[serde(default)]
    pub checks: BTreeMap<String, CheckConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            preset: None,
            fail_level: default_fail_level(),
            ignore: Vec::new(),
            analyzer: AnalyzerConfig::default(),
            checks: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a glob does not compile.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.ignore_patterns()?;
        for check in config.checks.values() {
            check.ignore_patterns()?;
        }
        Ok(config)
    }

    /// Checks if a check is enabled.
    #[must_use]
    pub fn is_check_enabled(&self, name: &str) -> bool {
        self.checks
            .get(name)
            .map_or(true, |c| c.enabled.unwrap_or(true))
    }

    /// Gets the severity override for a check.
    #[must_use]
    pub fn check_severity(&self, name: &str) -> Option<Severity> {
        self.checks.get(name).and_then(|c| c.severity)
    }

    /// Configuration of a check, if any.
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckConfig> {
        self.checks.get(name)
    }

    /// Compiled global ignore patterns.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid pattern.
    pub fn ignore_patterns(&self) -> Result<Vec<glob::Pattern>, ConfigError> {
        compile(&self.ignore)
    }
}

/// Analyzer-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Ceiling for a single check invocation, in milliseconds. 0 disables
    /// the watchdog.
    #[serde(default = "default_timeout_ms")]
    pub check_timeout_ms: u64,

    /// How the Liquid parser treats recoverable syntax errors.
    #[serde(default)]
    pub liquid_error_mode: ErrorMode,

    /// Attribute ceiling of the HTML parser.
    #[serde(default = "default_html_limit")]
    pub max_html_attributes: usize,

    /// Nesting ceiling of the HTML parser.
    #[serde(default = "default_html_limit")]
    pub max_html_depth: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: default_timeout_ms(),
            liquid_error_mode: ErrorMode::default(),
            max_html_attributes: default_html_limit(),
            max_html_depth: default_html_limit(),
        }
    }
}

impl AnalyzerConfig {
    /// Ceiling for a single check invocation.
    #[must_use]
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    /// HTML parser limits.
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            max_attributes: self.max_html_attributes,
            max_tree_depth: self.max_html_depth,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_fail_level() -> Severity {
    Severity::Error
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_html_limit() -> usize {
    400
}

/// Per-check configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Whether this check is enabled.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Severity override for this check.
    #[serde(default)]
    pub severity: Option<Severity>,

    /// Glob patterns of files this check skips.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Check-specific options as key-value pairs.
    #[serde(flatten)]
    pub options: HashMap<String, toml::Value>,
}

impl CheckConfig {
    /// Compiled ignore patterns.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid pattern.
    pub fn ignore_patterns(&self) -> Result<Vec<glob::Pattern>, ConfigError> {
        compile(&self.ignore)
    }

    /// Gets an option value as a specific type.
    #[must_use]
    pub fn get_option<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.options
            .get(key)
            .and_then(|v| v.clone().try_into().ok())
    }

    /// Gets a boolean option with a default value.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.options
            .get(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(default)
    }

    /// Gets an integer option with a default value.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.options
            .get(key)
            .and_then(toml::Value::as_integer)
            .unwrap_or(default)
    }

    /// Gets a string option with a default value.
    #[must_use]
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.options
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
    }

    /// Gets a string array option.
    #[must_use]
    pub fn get_str_array(&self, key: &str) -> Vec<String> {
        self.options
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| ConfigError::InvalidGlob {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },

    /// An ignore pattern is not a valid glob.
    #[error("Invalid glob pattern `{pattern}`: {message}")]
    InvalidGlob {
        /// The pattern as written.
        pattern: String,
        /// Glob error message.
        message: String,
    },
}

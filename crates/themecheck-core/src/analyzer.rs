//! Analysis orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::check::{Check, CheckBox, Event, EventArgs};
use crate::config::{CheckConfig, Config};
use crate::corrector::{self, CorrectionSummary, Corrector};
use crate::disabled::DisabledRanges;
use crate::error::EngineError;
use crate::html::HtmlTree;
use crate::node::LiquidTree;
use crate::registry::{CheckRegistry, Scope};
use crate::storage::{FileSystemStorage, Storage};
use crate::theme::{JsonFile, Theme, ThemeFile};
use crate::types::{LintResult, Offense};
use crate::visitor::{HtmlVisitor, LiquidVisitor};
use crate::watchdog::{AnalysisCancel, HangPolicy};

/// Progress callback: file being visited, its 0-based position and the
/// number of files in the run.
pub type ProgressFn = Box<dyn FnMut(&Path, usize, usize) + Send>;

/// Builder for configuring an [`Analyzer`].
#[derive(Default)]
pub struct AnalyzerBuilder {
    root: Option<PathBuf>,
    storage: Option<Box<dyn Storage>>,
    config: Option<Config>,
    checks: Vec<CheckBox>,
    cancel: Option<AnalysisCancel>,
    progress: Option<ProgressFn>,
    timeout: Option<Duration>,
    hang_policy: Option<HangPolicy>,
}

impl AnalyzerBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the theme directory. Ignored when a storage is given.
    #[must_use]
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Analyzes `storage` instead of a directory.
    #[must_use]
    pub fn storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a check.
    #[must_use]
    pub fn check<C: Check + 'static>(mut self, check: C) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Adds a boxed check.
    #[must_use]
    pub fn check_box(mut self, check: CheckBox) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds several boxed checks.
    #[must_use]
    pub fn checks(mut self, checks: impl IntoIterator<Item = CheckBox>) -> Self {
        self.checks.extend(checks);
        self
    }

    /// Token polled between files.
    #[must_use]
    pub fn cancel(mut self, token: AnalysisCancel) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Called before each file is visited.
    #[must_use]
    pub fn progress(mut self, f: impl FnMut(&Path, usize, usize) + Send + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Overrides `analyzer.check_timeout_ms`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// What to do with a check that never returns.
    #[must_use]
    pub fn hang_policy(mut self, policy: HangPolicy) -> Self {
        self.hang_policy = Some(policy);
        self
    }

    /// Builds the analyzer.
    ///
    /// Checks disabled in the configuration are dropped; the others receive
    /// their `[checks.<Name>]` table.
    ///
    /// # Errors
    ///
    /// Returns an error if the theme cannot be listed, a glob is invalid or
    /// a check rejects its options.
    pub fn build(self) -> Result<Analyzer, EngineError> {
        let config = self.config.unwrap_or_default();
        let storage = match self.storage {
            Some(storage) => storage,
            None => {
                let root = self.root.unwrap_or_else(|| config.root.clone());
                Box::new(FileSystemStorage::new(root)) as Box<dyn Storage>
            }
        };
        let theme = Theme::from_box(storage)?;

        let timeout = self.timeout.unwrap_or_else(|| config.analyzer.check_timeout());
        let mut registry = CheckRegistry::new().with_timeout(timeout);
        if let Some(policy) = self.hang_policy {
            registry = registry.with_hang_policy(policy);
        }
        let defaults = CheckConfig::default();
        for check in self.checks {
            let name = check.meta().name;
            if !config.is_check_enabled(name) {
                debug!(check = name, "disabled by configuration");
                continue;
            }
            registry.register_configured(check, config.check(name).unwrap_or(&defaults))?;
        }
        let ignore = config.ignore_patterns()?;

        Ok(Analyzer {
            theme,
            registry,
            ignore,
            cancel: self.cancel.unwrap_or_default(),
            progress: self.progress,
            disabled: DisabledRanges::new(),
            config,
        })
    }
}

/// Runs checks over a theme.
///
/// Use [`Analyzer::builder()`] to construct an instance. One analyzer can run
/// several analyses; check state is reset at the start of each.
pub struct Analyzer {
    theme: Theme,
    config: Config,
    registry: CheckRegistry,
    ignore: Vec<glob::Pattern>,
    cancel: AnalysisCancel,
    progress: Option<ProgressFn>,
    disabled: DisabledRanges,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("theme", &self.theme)
            .field("checks", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// Creates a new builder for configuring an analyzer.
    #[must_use]
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    /// The theme being analyzed.
    #[must_use]
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The registered checks.
    #[must_use]
    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Number of registered checks.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.registry.len()
    }

    /// Token that cancels the run between files.
    #[must_use]
    pub fn cancel_token(&self) -> AnalysisCancel {
        self.cancel.clone()
    }

    /// Visits every file of the theme, fires `on_end` once and returns the
    /// offenses that are not suppressed by directives.
    ///
    /// # Errors
    ///
    /// Returns the first [`EngineError`] raised by a check, a storage
    /// failure, or [`EngineError::Cancelled`].
    pub fn analyze_theme(&mut self) -> Result<LintResult, EngineError> {
        info!(files = self.theme.files().len(), checks = self.registry.len(), "analyzing theme");
        self.registry.reset();
        self.registry.set_scope(Scope::All);
        self.disabled = DisabledRanges::new();

        let paths = self.analyzable(self.theme.files().iter().map(|f| f.path().to_path_buf()));
        let mut offenses = self.visit_all(&paths)?;

        if self.registry.subscribed(&Event::End) {
            debug!("firing on_end");
            self.registry
                .call(&Event::End, EventArgs::End, &self.theme, &mut offenses)?;
        }

        let result = self.finish(offenses, paths.len());
        info!("{}", result.summary());
        Ok(result)
    }

    /// Visits only `paths` with the single-file checks. `on_end` is not
    /// fired.
    ///
    /// # Errors
    ///
    /// Same as [`Analyzer::analyze_theme`].
    pub fn analyze_files(&mut self, paths: &[PathBuf]) -> Result<LintResult, EngineError> {
        info!(files = paths.len(), "analyzing files");
        self.registry.reset();
        self.registry.set_scope(Scope::SingleFile);
        for path in paths {
            self.disabled.clear(path);
        }

        let paths = self.analyzable(paths.iter().cloned());
        let outcome = self.visit_all(&paths);
        self.registry.set_scope(Scope::All);

        Ok(self.finish(outcome?, paths.len()))
    }

    /// Applies the corrections attached to `offenses` and writes the result
    /// to storage. The theme is re-listed afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn correct_offenses(&mut self, offenses: &[Offense]) -> Result<CorrectionSummary, EngineError> {
        let mut corrector = Corrector::new();
        for offense in offenses {
            if let Some(correction) = offense.correction() {
                corrector.focus(&offense.file);
                correction.run(&mut corrector);
            }
        }
        if corrector.is_empty() {
            return Ok(CorrectionSummary::default());
        }
        let summary = corrector::apply(corrector, self.theme.storage_mut())?;
        self.theme.refresh()?;
        info!(
            applied = summary.applied,
            files = summary.files_changed.len(),
            "applied corrections"
        );
        Ok(summary)
    }

    /// Paths that exist in the theme, have an analyzable format and are not
    /// globally ignored.
    fn analyzable(&self, paths: impl Iterator<Item = PathBuf>) -> Vec<PathBuf> {
        paths
            .filter(|path| {
                let Some(file) = self.theme.get(path) else {
                    warn!(file = %path.display(), "not part of the theme");
                    return false;
                };
                if self.ignore.iter().any(|p| p.matches_path(path)) {
                    debug!(file = %path.display(), "ignored by configuration");
                    return false;
                }
                file.is_liquid() || file.is_json()
            })
            .collect()
    }

    fn visit_all(&mut self, paths: &[PathBuf]) -> Result<Vec<Offense>, EngineError> {
        let mut offenses = Vec::new();
        let total = paths.len();
        for (index, path) in paths.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("analysis cancelled");
                return Err(EngineError::Cancelled);
            }
            if let Some(progress) = self.progress.as_mut() {
                progress(path, index, total);
            }
            let Some(file) = self.theme.get(path) else {
                continue;
            };
            self.registry.update_ignored(path);
            visit_file(
                &mut self.registry,
                &self.theme,
                &self.config,
                &mut self.disabled,
                file,
                &mut offenses,
            )?;
        }
        Ok(offenses)
    }

    fn finish(&self, mut offenses: Vec<Offense>, files_checked: usize) -> LintResult {
        let before = offenses.len();
        offenses.retain(|offense| {
            let disableable = self
                .registry
                .meta(&offense.check)
                .map_or(true, |meta| meta.can_disable);
            !(disableable
                && self
                    .disabled
                    .is_disabled(&offense.check, &offense.file, offense.start_index()))
        });
        if offenses.len() < before {
            debug!(suppressed = before - offenses.len(), "suppressed by directives");
        }
        offenses.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then(a.line().cmp(&b.line()))
                .then(a.column().cmp(&b.column()))
                .then(a.check.cmp(&b.check))
        });
        LintResult {
            offenses,
            files_checked,
        }
    }
}

fn visit_file(
    registry: &mut CheckRegistry,
    theme: &Theme,
    config: &Config,
    disabled: &mut DisabledRanges,
    file: &ThemeFile,
    offenses: &mut Vec<Offense>,
) -> Result<(), EngineError> {
    let path = file.path();
    let Some(source) = theme.read(path)? else {
        warn!(file = %path.display(), "vanished from storage");
        return Ok(());
    };
    debug!(file = %path.display(), "visiting");

    if file.is_json() {
        let json = JsonFile::parse(path, source);
        return registry.call(&Event::JsonFile, EventArgs::JsonFile(&json), theme, offenses);
    }

    let tree = match LiquidTree::parse(path, Arc::clone(&source), config.analyzer.liquid_error_mode) {
        Ok(tree) => tree,
        Err(error) => {
            debug!(file = %path.display(), %error, "liquid syntax error");
            return registry.call(
                &Event::Error,
                EventArgs::Error {
                    file: path,
                    source: &source,
                    error: &error,
                },
                theme,
                offenses,
            );
        }
    };
    for warning in tree.warnings() {
        debug!(file = %path.display(), line = warning.line_number, "{}", warning.message);
    }
    LiquidVisitor::new(registry, theme, offenses, disabled).visit_tree(&tree)?;

    if registry.wants_html() {
        let html = HtmlTree::build(path, source, config.analyzer.limits());
        HtmlVisitor::new(registry, theme, offenses).visit_result(path, tree.source(), html.as_ref())?;
    }
    Ok(())
}

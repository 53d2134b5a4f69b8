//! Check command implementation.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use themecheck_checks::{check_by_name, Preset};
use themecheck_core::{Analyzer, CheckBox, Config, Severity};

use crate::config_resolver::ResolvedConfig;
use crate::OutputFormat;

/// Options of `themecheck check`.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Theme directory, where the theme config file is looked up.
    pub path: PathBuf,
    /// Output format.
    pub format: OutputFormat,
    /// Comma-separated check names or codes; the preset when `None`.
    pub checks: Option<String>,
    /// Apply corrections before reporting.
    pub auto_correct: bool,
    /// Overrides the configured fail level.
    pub fail_level: Option<Severity>,
    /// Extra ignore globs.
    pub exclude: Vec<String>,
}

/// Runs the check command.
pub fn run(options: &CheckOptions, config: &ResolvedConfig) -> Result<ExitCode> {
    let mut config = config.load()?;
    config.ignore.extend(options.exclude.iter().cloned());

    let checks = match &options.checks {
        Some(filter) => filter_checks(filter),
        None => preset(&config)?.checks(),
    };
    if checks.is_empty() {
        bail!("No checks selected. Run `themecheck list-checks` to see the available checks.");
    }

    let fail_level = options.fail_level.unwrap_or(config.fail_level);
    let root = config.root.clone();

    let mut analyzer = Analyzer::builder()
        .root(&root)
        .config(config)
        .checks(checks)
        .progress(|path, index, total| {
            tracing::debug!("[{}/{}] {}", index + 1, total, path.display());
        })
        .build()
        .context("Failed to build analyzer")?;

    tracing::info!(
        "Checking {} with {} checks",
        root.display(),
        analyzer.check_count()
    );

    let mut result = analyzer.analyze_theme().context("Analysis failed")?;

    if options.auto_correct && result.correctable_count() > 0 {
        let summary = analyzer
            .correct_offenses(&result.offenses)
            .context("Failed to apply corrections")?;
        tracing::info!(
            "Applied {} correction(s) to {} file(s)",
            summary.applied,
            summary.files_changed.len()
        );
        if summary.conflicts > 0 {
            tracing::warn!(
                "{} overlapping correction(s) skipped, run again to apply them",
                summary.conflicts
            );
        }
        result = analyzer
            .analyze_theme()
            .context("Analysis after corrections failed")?;
    }

    super::output::print(&result, options.format, analyzer.theme())?;

    if result.has_offenses_at(fail_level) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn preset(config: &Config) -> Result<Preset> {
    match config.preset.as_deref() {
        None => Ok(Preset::Recommended),
        Some(name) => Preset::from_name(name).with_context(|| {
            format!("Unknown preset '{name}', expected recommended, all or minimal")
        }),
    }
}

fn filter_checks(filter: &str) -> Vec<CheckBox> {
    let mut checks = Vec::new();
    for name in filter.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match check_by_name(name) {
            Some(check) => checks.push(check),
            None => tracing::warn!("Unknown check: {}", name),
        }
    }
    checks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_names_and_codes() {
        let checks = filter_checks("UnusedAssign, TC009,NoSuchCheck,");
        let names: Vec<_> = checks.iter().map(|c| c.meta().name).collect();
        assert_eq!(names, vec!["UnusedAssign", "ValidJson"]);
    }

    #[test]
    fn preset_defaults_to_recommended() {
        let config = Config::default();
        assert_eq!(preset(&config).unwrap(), Preset::Recommended);

        let config = Config::parse("preset = \"minimal\"\n").unwrap();
        assert_eq!(preset(&config).unwrap(), Preset::Minimal);

        let config = Config::parse("preset = \"strict\"\n").unwrap();
        assert!(preset(&config).is_err());
    }

    #[test]
    fn runs_against_a_theme_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        std::fs::create_dir(&templates).unwrap();
        std::fs::write(templates.join("index.liquid"), "{% assign x = 1 %}").unwrap();

        let options = CheckOptions {
            path: tmp.path().to_path_buf(),
            format: OutputFormat::Compact,
            checks: Some("UnusedAssign".to_string()),
            auto_correct: false,
            fail_level: Some(Severity::Suggestion),
            exclude: Vec::new(),
        };
        let code = run(&options, &ResolvedConfig::defaults(tmp.path())).unwrap();
        assert_eq!(code, ExitCode::FAILURE);

        let options = CheckOptions {
            fail_level: Some(Severity::Error),
            ..options
        };
        let code = run(&options, &ResolvedConfig::defaults(tmp.path())).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn theme_config_disables_checks() {
        let tmp = tempfile::TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        std::fs::create_dir(&templates).unwrap();
        std::fs::write(templates.join("index.liquid"), "{% assign x = 1 %}").unwrap();
        std::fs::write(
            tmp.path().join("theme-check.toml"),
            "[checks.UnusedAssign]\nenabled = false\n",
        )
        .unwrap();

        let options = CheckOptions {
            path: tmp.path().to_path_buf(),
            format: OutputFormat::Compact,
            checks: None,
            auto_correct: false,
            fail_level: Some(Severity::Suggestion),
            exclude: Vec::new(),
        };
        let config = crate::config_resolver::resolve(tmp.path(), None);
        assert_eq!(run(&options, &config).unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn auto_correct_rewrites_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let snippets = tmp.path().join("snippets");
        std::fs::create_dir(&snippets).unwrap();
        let file = snippets.join("a.liquid");
        std::fs::write(&file, "{{x}}").unwrap();

        let options = CheckOptions {
            path: tmp.path().to_path_buf(),
            format: OutputFormat::Compact,
            checks: Some("SpaceInsideBraces".to_string()),
            auto_correct: true,
            fail_level: Some(Severity::Style),
            exclude: Vec::new(),
        };
        let code = run(&options, &ResolvedConfig::defaults(tmp.path())).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "{{ x }}");
    }
}

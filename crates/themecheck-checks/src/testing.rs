//! Helpers shared by the check tests.

use themecheck_core::{Analyzer, CheckBox, Config, HangPolicy, InMemoryStorage, LintResult};

/// Runs `check` over an in-memory theme.
pub fn analyze(files: &[(&str, &str)], check: CheckBox) -> LintResult {
    analyze_with(files, check, Config::default())
}

/// Runs `check` over an in-memory theme with a configuration.
pub fn analyze_with(files: &[(&str, &str)], check: CheckBox, config: Config) -> LintResult {
    let mut analyzer = Analyzer::builder()
        .storage(InMemoryStorage::from_files(files.iter().copied()))
        .config(config)
        .check_box(check)
        .hang_policy(HangPolicy::new(|_| {}))
        .build()
        .unwrap();
    analyzer.analyze_theme().unwrap()
}

/// Runs `check`, applies its corrections and returns the corrected file.
pub fn correct(files: &[(&str, &str)], check: CheckBox, path: &str) -> Option<String> {
    let mut analyzer = Analyzer::builder()
        .storage(InMemoryStorage::from_files(files.iter().copied()))
        .check_box(check)
        .hang_policy(HangPolicy::new(|_| {}))
        .build()
        .unwrap();
    let result = analyzer.analyze_theme().unwrap();
    analyzer
        .correct_offenses(&result.offenses)
        .unwrap();
    analyzer
        .theme()
        .read(std::path::Path::new(path))
        .unwrap()
        .map(|content| content.to_string())
}

/// Messages of every offense, in report order.
pub fn messages(result: &LintResult) -> Vec<&str> {
    result.offenses.iter().map(|o| o.message.as_str()).collect()
}

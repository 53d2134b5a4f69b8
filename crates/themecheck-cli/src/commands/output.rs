//! Shared output formatting for lint results.

use std::fmt::Write;

use anyhow::Result;
use themecheck_core::{LintResult, Offense, OffenseDiagnostic, Theme};

use crate::OutputFormat;

/// Print lint results in the specified format.
pub fn print(result: &LintResult, format: OutputFormat, theme: &Theme) -> Result<()> {
    print!("{}", render(result, format, theme)?);
    Ok(())
}

/// Renders lint results in the specified format.
pub fn render(result: &LintResult, format: OutputFormat, theme: &Theme) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => render_text(result, theme),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(result)?;
            json.push('\n');
            json
        }
        OutputFormat::Compact => render_compact(result),
    })
}

fn render_text(result: &LintResult, theme: &Theme) -> String {
    let mut out = String::new();

    for offense in &result.offenses {
        match excerpt(offense, theme) {
            Some(report) => {
                let _ = writeln!(out, "{} {}", offense.code, offense.check);
                let _ = writeln!(out, "{report:?}");
            }
            None => {
                let _ = writeln!(out, "{}", offense.format());
            }
        }
    }

    let (errors, suggestions, _) = result.count_by_severity();
    let summary_color = if errors > 0 {
        "\x1b[31m"
    } else if suggestions > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };
    let _ = writeln!(out, "{summary_color}{}\x1b[0m", result.summary());
    out
}

/// A miette report with the offending source excerpt, when the offense has a
/// location and the file can still be read.
fn excerpt(offense: &Offense, theme: &Theme) -> Option<miette::Report> {
    offense.location?;
    let content = match theme.read(&offense.file) {
        Ok(Some(content)) => content,
        Ok(None) => return None,
        Err(error) => {
            tracing::debug!("cannot read {}: {}", offense.file.display(), error);
            return None;
        }
    };
    let diagnostic = OffenseDiagnostic::from(offense).with_source(&*content);
    Some(miette::Report::new(diagnostic))
}

fn render_compact(result: &LintResult) -> String {
    let mut out = String::new();
    for offense in &result.offenses {
        let _ = writeln!(out, "{offense}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use themecheck_checks::{MissingTemplate, UnusedAssign};
    use themecheck_core::{Analyzer, InMemoryStorage};

    fn analyze(files: &[(&str, &str)]) -> (LintResult, Analyzer) {
        let mut analyzer = Analyzer::builder()
            .storage(InMemoryStorage::from_files(files.iter().copied()))
            .check(UnusedAssign::default())
            .check(MissingTemplate::default())
            .build()
            .unwrap();
        let result = analyzer.analyze_theme().unwrap();
        (result, analyzer)
    }

    #[test]
    fn compact_is_one_line_per_offense() {
        let (result, analyzer) = analyze(&[(
            "templates/index.liquid",
            "{% assign x = 1 %}\n{% render 'missing' %}",
        )]);
        let out = render(&result, OutputFormat::Compact, analyzer.theme()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "templates/index.liquid:1:1: suggestion [UnusedAssign] `x` is never used",
                "templates/index.liquid:2:1: error [MissingTemplate] 'snippets/missing.liquid' is not found",
            ]
        );
    }

    #[test]
    fn json_carries_offenses_and_file_count() {
        let (result, analyzer) = analyze(&[("templates/index.liquid", "{% assign x = 1 %}")]);
        let out = render(&result, OutputFormat::Json, analyzer.theme()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["files_checked"], 1);
        assert_eq!(value["offenses"][0]["check"], "UnusedAssign");
        assert_eq!(value["offenses"][0]["severity"], "suggestion");
    }

    #[test]
    fn text_ends_with_summary() {
        let (result, analyzer) = analyze(&[("templates/index.liquid", "{{ 'ok' }}")]);
        let out = render(&result, OutputFormat::Text, analyzer.theme()).unwrap();
        assert!(out.contains("1 file(s) inspected, 0 offense(s) detected"));
    }

    #[test]
    fn text_includes_message_of_each_offense() {
        let (result, analyzer) = analyze(&[("templates/index.liquid", "{% assign x = 1 %}")]);
        let out = render(&result, OutputFormat::Text, analyzer.theme()).unwrap();
        assert!(out.contains("TC003 UnusedAssign"));
        assert!(out.contains("`x` is never used"));
    }
}

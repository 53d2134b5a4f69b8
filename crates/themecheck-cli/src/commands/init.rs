//! Init command implementation.

use std::path::Path;

use anyhow::{bail, Context, Result};

/// File written by `themecheck init`.
pub const CONFIG_FILE: &str = "theme-check.toml";

const DEFAULT_CONFIG: &str = r#"# themecheck configuration

# Theme root, relative to the checked path
root = "."

# recommended | all | minimal
preset = "recommended"

# Lowest severity that fails the run: error | suggestion | style
fail_level = "error"

# Glob patterns excluded from analysis
ignore = [
    "node_modules/**",
]

[analyzer]
check_timeout_ms = 5000
# warn | lax | strict
liquid_error_mode = "warn"
max_html_attributes = 400
max_html_depth = 400

# Each check can be enabled/disabled, have its severity overridden,
# ignore files and take options.

[checks.TemplateLength]
enabled = true
max_length = 600
# severity = "style"
# ignore = ["sections/legacy-*.liquid"]

[checks.LiquidTag]
min_consecutive_statements = 5

# [checks.MissingTemplate]
# ignore_missing = ["icon-*"]
"#;

/// Runs the init command in `dir`.
pub fn run(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE);

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Created {CONFIG_FILE}");
    println!("\nNext steps:");
    println!("  1. Edit {CONFIG_FILE} to configure checks");
    println!("  2. Run: themecheck check");

    Ok(())
}

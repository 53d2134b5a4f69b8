//! List checks command implementation.

use themecheck_checks::{all_checks, Preset};
use themecheck_core::Category;

/// Runs the list-checks command.
pub fn run() {
    println!("Available checks:\n");
    println!(
        "{:<7} {:<26} {:<11} {:<20} Description",
        "Code", "Name", "Severity", "Categories"
    );
    println!("{}", "-".repeat(100));

    for check in all_checks() {
        let meta = check.meta();
        println!(
            "{:<7} {:<26} {:<11} {:<20} {}",
            meta.code,
            meta.name,
            meta.severity.to_string(),
            categories(meta.categories),
            meta.description
        );
    }

    println!("\nPresets:");
    for preset in [Preset::Recommended, Preset::All, Preset::Minimal] {
        let codes: Vec<_> = preset.checks().iter().map(|c| c.meta().code).collect();
        println!("  {:<12} - {}", preset.name(), codes.join(", "));
    }

    println!("\nUse --checks to run specific checks, e.g.:");
    println!("  themecheck check --checks UnusedAssign,SpaceInsideBraces");
    println!("  themecheck check --checks TC003,TC004");
}

fn categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

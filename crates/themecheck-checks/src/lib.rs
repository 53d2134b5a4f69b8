//! # themecheck-checks
//!
//! Built-in checks for themecheck.
//!
//! This crate provides the checks bundled with the `themecheck` binary and
//! the presets that group them.
//!
//! ## Available Checks
//!
//! | Code | Name | Description |
//! |------|------|-------------|
//! | TC001 | `SyntaxError` | Liquid syntax errors |
//! | TC002 | `MissingEnableComment` | `theme-check-disable` without a matching enable |
//! | TC003 | `UnusedAssign` | Variables assigned but never used |
//! | TC004 | `SpaceInsideBraces` | Spacing inside `{{ }}` and `{% %}` |
//! | TC005 | `LiquidTag` | Runs of tags that belong in `{% liquid %}` |
//! | TC006 | `TemplateLength` | Templates with too many lines |
//! | TC007 | `MissingTemplate` | `render`, `include` and `section` of missing files |
//! | TC008 | `UnusedSnippet` | Snippets never rendered |
//! | TC009 | `ValidJson` | JSON files that do not parse |
//! | TC010 | `ValidSchema` | Invalid `{% schema %}` blocks |
//! | TC011 | `ImgWidthAndHeight` | `<img>` without `width` and `height` |
//! | TC012 | `ParserBlockingJavaScript` | Scripts without `defer` or `async` |
//! | TC013 | `HtmlParsingError` | Templates whose HTML cannot be parsed |
//!
//! ## Usage
//!
//! ```ignore
//! use themecheck_core::Analyzer;
//! use themecheck_checks::{Preset, UnusedAssign};
//!
//! let mut analyzer = Analyzer::builder()
//!     .root("./theme")
//!     .checks(Preset::Recommended.checks())
//!     .build()?;
//! let result = analyzer.analyze_theme()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod html_parsing_error;
pub mod img_width_and_height;
pub mod liquid_tag;
pub mod missing_enable_comment;
pub mod missing_template;
pub mod parser_blocking_javascript;
mod presets;
pub mod space_inside_braces;
pub mod syntax_error;
pub mod template_length;
#[cfg(test)]
mod testing;
pub mod unused_assign;
pub mod unused_snippet;
pub mod valid_json;
pub mod valid_schema;

pub use html_parsing_error::HtmlParsingError;
pub use img_width_and_height::ImgWidthAndHeight;
pub use liquid_tag::LiquidTag;
pub use missing_enable_comment::MissingEnableComment;
pub use missing_template::MissingTemplate;
pub use parser_blocking_javascript::ParserBlockingJavaScript;
pub use presets::{
    all_checks, check_by_name, check_names, minimal_checks, recommended_checks, Preset,
};
pub use space_inside_braces::SpaceInsideBraces;
pub use syntax_error::SyntaxError;
pub use template_length::TemplateLength;
pub use unused_assign::UnusedAssign;
pub use unused_snippet::UnusedSnippet;
pub use valid_json::ValidJson;
pub use valid_schema::ValidSchema;

/// Re-export core types for convenience.
pub use themecheck_core::{Check, Offense, Severity};

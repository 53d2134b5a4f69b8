//! Check presets for common configurations.

use themecheck_core::CheckBox;

use crate::{
    HtmlParsingError, ImgWidthAndHeight, LiquidTag, MissingEnableComment, MissingTemplate,
    ParserBlockingJavaScript, SpaceInsideBraces, SyntaxError, TemplateLength, UnusedAssign,
    UnusedSnippet, ValidJson, ValidSchema,
};

/// Preset configurations for themecheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Recommended checks with sensible defaults.
    Recommended,
    /// Every bundled check.
    All,
    /// Checks for broken themes only, for gradual adoption.
    Minimal,
}

impl Preset {
    /// Looks a preset up by its configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "recommended" => Some(Self::Recommended),
            "all" => Some(Self::All),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }

    /// Configuration name of the preset.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::All => "all",
            Self::Minimal => "minimal",
        }
    }

    /// Returns the checks for this preset.
    #[must_use]
    pub fn checks(self) -> Vec<CheckBox> {
        match self {
            Self::Recommended => recommended_checks(),
            Self::All => all_checks(),
            Self::Minimal => minimal_checks(),
        }
    }
}

/// Returns every bundled check, in code order.
#[must_use]
pub fn all_checks() -> Vec<CheckBox> {
    vec![
        Box::new(SyntaxError::new()),
        Box::new(MissingEnableComment::new()),
        Box::new(UnusedAssign::new()),
        Box::new(SpaceInsideBraces::new()),
        Box::new(LiquidTag::new()),
        Box::new(TemplateLength::new()),
        Box::new(MissingTemplate::new()),
        Box::new(UnusedSnippet::new()),
        Box::new(ValidJson::new()),
        Box::new(ValidSchema::new()),
        Box::new(ImgWidthAndHeight::new()),
        Box::new(ParserBlockingJavaScript::new()),
        Box::new(HtmlParsingError::new()),
    ]
}

/// Returns the recommended set of checks.
///
/// Every bundled check except `LiquidTag` (TC005), which is a matter of
/// taste.
#[must_use]
pub fn recommended_checks() -> Vec<CheckBox> {
    all_checks()
        .into_iter()
        .filter(|check| check.meta().name != crate::liquid_tag::NAME)
        .collect()
}

/// Returns the minimal set of checks.
///
/// Only includes checks for themes that fail to render or upload:
/// - `SyntaxError` (TC001)
/// - `MissingEnableComment` (TC002)
/// - `ValidJson` (TC009)
/// - `ValidSchema` (TC010)
/// - `HtmlParsingError` (TC013)
#[must_use]
pub fn minimal_checks() -> Vec<CheckBox> {
    vec![
        Box::new(SyntaxError::new()),
        Box::new(MissingEnableComment::new()),
        Box::new(ValidJson::new()),
        Box::new(ValidSchema::new()),
        Box::new(HtmlParsingError::new()),
    ]
}

/// Creates a bundled check by name or code.
#[must_use]
pub fn check_by_name(name: &str) -> Option<CheckBox> {
    all_checks().into_iter().find(|check| {
        let meta = check.meta();
        meta.name == name || meta.code.eq_ignore_ascii_case(name)
    })
}

/// Names of every bundled check, in code order.
#[must_use]
pub fn check_names() -> Vec<&'static str> {
    all_checks().iter().map(|check| check.meta().name).collect()
}

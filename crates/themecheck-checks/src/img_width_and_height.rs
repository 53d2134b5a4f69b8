//! Check requiring `width` and `height` on `<img>` tags.
//!
//! # Rationale
//!
//! Without intrinsic dimensions the browser cannot reserve space for an
//! image, and the page shifts as images load. The attributes take unitless
//! pixel values; sizing belongs in CSS. Values computed by Liquid are
//! accepted as written.

use themecheck_core::{
    Category, Check, CheckContext, CheckError, CheckMeta, Event, EventArgs, Severity,
};

/// Check code for ImgWidthAndHeight.
pub const CODE: &str = "TC011";

/// Check name for ImgWidthAndHeight.
pub const NAME: &str = "ImgWidthAndHeight";

const META: CheckMeta = CheckMeta::new(NAME, CODE)
    .description("Reports images without width and height attributes")
    .severity(Severity::Error)
    .categories(&[Category::Html, Category::Performance]);

/// Checks image dimensions.
#[derive(Debug, Clone, Default)]
pub struct ImgWidthAndHeight;

impl ImgWidthAndHeight {
    /// Creates the check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn has_units(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.contains("{{") && !value.bytes().all(|b| b.is_ascii_digit())
}

impl Check for ImgWidthAndHeight {
    fn meta(&self) -> CheckMeta {
        META
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on_html("img")]
    }

    fn handle(
        &mut self,
        _event: &Event,
        args: EventArgs<'_>,
        cx: &mut CheckContext<'_>,
    ) -> Result<(), CheckError> {
        let Some(img) = args.html() else {
            return Ok(());
        };
        if !img.has_attribute("src") {
            return Ok(());
        }
        let width = img.attribute("width");
        let height = img.attribute("height");
        let missing: Vec<&'static str> = [("width", &width), ("height", &height)]
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        match missing.as_slice() {
            [] => {}
            [one] => cx.add_html_offense(img, format!("Missing {one} attribute")),
            _ => cx.add_html_offense(img, "Missing width and height attributes"),
        }
        for (name, value) in [("width", width), ("height", height)] {
            if let Some(value) = value.filter(|v| has_units(v)) {
                let number = value.trim().trim_end_matches(|c: char| !c.is_ascii_digit());
                cx.add_html_offense(
                    img,
                    format!("The {name} attribute does not take units. Replace with \"{number}\""),
                );
            }
        }
        Ok(())
    }
}

//! Engine configuration

use crate::token::LigaturePolicy;
use crate::{FillError, Result};
use pdf_core::{SaveOptions, StandardFont};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How replacement text is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Wrapped inside the insertion box, first baseline on the original one
    #[default]
    Box,
    /// Single line on the original baseline
    Point,
}

/// Font used when the original font cannot be mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultFont {
    #[default]
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesBold,
}

impl From<DefaultFont> for StandardFont {
    fn from(font: DefaultFont) -> Self {
        match font {
            DefaultFont::Helvetica => StandardFont::Helvetica,
            DefaultFont::HelveticaBold => StandardFont::HelveticaBold,
            DefaultFont::TimesRoman => StandardFont::TimesRoman,
            DefaultFont::TimesBold => StandardFont::TimesBold,
        }
    }
}

/// Save-time cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSettings {
    pub prune: bool,
    pub compress: bool,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            prune: true,
            compress: true,
        }
    }
}

impl From<SaveSettings> for SaveOptions {
    fn from(settings: SaveSettings) -> Self {
        SaveOptions {
            prune: settings.prune,
            compress: settings.compress,
        }
    }
}

/// Engine options
///
/// Every field has a default, so a JSON file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Padding above and below a found token for the insertion region, in points
    pub erase_margin: f64,
    /// Width of the insertion box measured from the token's left edge, in
    /// points; clipped to the page's right edge
    pub region_extension: f64,
    /// Font sizes tried in order until the value fits
    pub font_sizes: Vec<f64>,
    /// Start the size search at the original text size
    pub use_source_font_size: bool,
    /// Match the original typeface (serif/sans, bold/regular)
    pub use_source_typeface: bool,
    pub default_font: DefaultFont,
    pub insert_mode: InsertMode,
    pub ligatures: LigaturePolicy,
    /// Move text that follows a token on the same line by the difference
    /// between the value's width and the token's width
    pub shift_trailing_text: bool,
    /// Baseline distance for wrapped lines, as a multiple of the font size
    pub line_height: f64,
    pub save: SaveSettings,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            erase_margin: 2.0,
            region_extension: 500.0,
            font_sizes: vec![11.0, 10.0, 9.0, 8.0, 7.0, 6.0],
            use_source_font_size: true,
            use_source_typeface: true,
            default_font: DefaultFont::default(),
            insert_mode: InsertMode::default(),
            ligatures: LigaturePolicy::default(),
            shift_trailing_text: true,
            line_height: 1.15,
            save: SaveSettings::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.font_sizes.is_empty() {
            return Err(FillError::Options("font_sizes must not be empty".to_string()));
        }
        if let Some(size) = self.font_sizes.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(FillError::Options(format!("invalid font size {size}")));
        }
        if self.erase_margin.is_nan() || self.erase_margin < 0.0 {
            return Err(FillError::Options("erase_margin must be >= 0".to_string()));
        }
        if self.region_extension.is_nan() || self.region_extension <= 0.0 {
            return Err(FillError::Options("region_extension must be > 0".to_string()));
        }
        if self.line_height.is_nan() || self.line_height <= 0.0 {
            return Err(FillError::Options("line_height must be > 0".to_string()));
        }
        Ok(())
    }
}

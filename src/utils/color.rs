//! Canvas background colors, named presets and hex parsing

use crate::error::{CanvasError, Result};
use serde::{Deserialize, Serialize};

/// Solid canvas background color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for BackgroundColor {
    fn default() -> Self {
        // Marketplaces require pure white for main images
        Self::white()
    }
}

/// Named presets accepted in the `bg_color` form field
const PRESETS: &[(&str, BackgroundColor)] = &[
    ("white", BackgroundColor::new(255, 255, 255)),
    ("off_white", BackgroundColor::new(250, 250, 250)),
    ("light_gray", BackgroundColor::new(242, 242, 242)),
    ("light_grey", BackgroundColor::new(242, 242, 242)),
    ("gray", BackgroundColor::new(229, 229, 229)),
    ("grey", BackgroundColor::new(229, 229, 229)),
    ("cream", BackgroundColor::new(255, 253, 245)),
    ("black", BackgroundColor::new(0, 0, 0)),
];

impl BackgroundColor {
    /// Create a new background color with RGB values
    ///
    /// # Examples
    /// ```rust
    /// use listing_canvas::BackgroundColor;
    /// let orange = BackgroundColor::new(255, 165, 0);
    /// assert_eq!(orange.g, 165);
    /// ```
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pure white (255, 255, 255)
    #[must_use]
    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Light gray used for secondary listing shots
    #[must_use]
    pub const fn light_gray() -> Self {
        Self::new(242, 242, 242)
    }

    /// Resolve a preset name or hex string
    ///
    /// Preset names are case-insensitive; `-` and spaces are treated as `_`.
    /// Anything that is neither a preset nor a valid hex color is rejected.
    ///
    /// # Examples
    /// ```rust
    /// use listing_canvas::BackgroundColor;
    ///
    /// assert_eq!(BackgroundColor::parse("White").unwrap(), BackgroundColor::white());
    /// assert_eq!(BackgroundColor::parse("#f00").unwrap(), BackgroundColor::new(255, 0, 0));
    /// assert!(BackgroundColor::parse("sparkly").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['-', ' '], "_");

        if let Some((_, color)) = PRESETS.iter().find(|(name, _)| *name == normalized) {
            return Ok(*color);
        }

        if ColorParser::is_valid_hex(trimmed) {
            return ColorParser::parse_hex(trimmed);
        }

        Err(CanvasError::invalid_input(format!(
            "Unknown bg_color '{trimmed}'. Use a hex color (#RRGGBB) or one of: {}",
            Self::preset_names().join(", ")
        )))
    }

    /// Names of the built-in presets
    #[must_use]
    pub fn preset_names() -> Vec<&'static str> {
        PRESETS.iter().map(|(name, _)| *name).collect()
    }

    /// Convert to an `image` RGB pixel
    #[must_use]
    pub fn to_rgb(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }
}

/// Utility for parsing and converting hex colors
pub struct ColorParser;

impl ColorParser {
    /// Parse a hex color string to `BackgroundColor`
    ///
    /// Supports both #RRGGBB and #RGB formats, with or without the `#` prefix.
    pub fn parse_hex(hex: &str) -> Result<BackgroundColor> {
        let hex = hex.trim().trim_start_matches('#');

        if !hex.is_ascii() {
            return Err(CanvasError::invalid_input("Hex color must be ASCII"));
        }

        let component = |range: std::ops::Range<usize>, name: &str| -> Result<u8> {
            let digits = hex.get(range).unwrap_or_default();
            u8::from_str_radix(digits, 16)
                .map_err(|_| CanvasError::invalid_input(format!("Invalid {name} component in hex color")))
        };

        match hex.len() {
            6 => Ok(BackgroundColor::new(
                component(0..2, "red")?,
                component(2..4, "green")?,
                component(4..6, "blue")?,
            )),
            // #RGB expands each digit, e.g. f -> ff
            3 => Ok(BackgroundColor::new(
                component(0..1, "red")? * 17,
                component(1..2, "green")? * 17,
                component(2..3, "blue")? * 17,
            )),
            _ => Err(CanvasError::invalid_input(
                "Color must be in #RRGGBB or #RGB format",
            )),
        }
    }

    /// Convert `BackgroundColor` to a hex string
    #[must_use]
    pub fn to_hex(color: &BackgroundColor, include_hash: bool) -> String {
        let hex = format!("{:02x}{:02x}{:02x}", color.r, color.g, color.b);
        if include_hash {
            format!("#{hex}")
        } else {
            hex
        }
    }

    /// Validate hex color format without parsing
    #[must_use]
    pub fn is_valid_hex(hex: &str) -> bool {
        let hex = hex.trim().trim_start_matches('#');

        if hex.len() != 3 && hex.len() != 6 {
            return false;
        }

        hex.chars().all(|c| c.is_ascii_hexdigit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6_digit() {
        let white = ColorParser::parse_hex("#ffffff").unwrap();
        assert_eq!(white, BackgroundColor::white());

        let teal = ColorParser::parse_hex("008080").unwrap();
        assert_eq!(teal, BackgroundColor::new(0, 128, 128));
    }

    #[test]
    fn test_parse_hex_3_digit() {
        let red = ColorParser::parse_hex("#f00").unwrap();
        assert_eq!(red, BackgroundColor::new(255, 0, 0));

        let gray = ColorParser::parse_hex("888").unwrap();
        assert_eq!(gray, BackgroundColor::new(136, 136, 136));
    }

    #[test]
    fn test_parse_hex_invalid() {
        assert!(ColorParser::parse_hex("#ff").is_err());
        assert!(ColorParser::parse_hex("#gggggg").is_err());
        assert!(ColorParser::parse_hex("#ffffffff").is_err());
        assert!(ColorParser::parse_hex("#ééé").is_err());
    }

    #[test]
    fn test_to_hex() {
        let color = BackgroundColor::new(255, 0, 128);
        assert_eq!(ColorParser::to_hex(&color, true), "#ff0080");
        assert_eq!(ColorParser::to_hex(&color, false), "ff0080");
    }

    #[test]
    fn test_presets() {
        assert_eq!(BackgroundColor::parse("white").unwrap(), BackgroundColor::white());
        assert_eq!(
            BackgroundColor::parse("Light-Gray").unwrap(),
            BackgroundColor::light_gray()
        );
        assert_eq!(
            BackgroundColor::parse(" light grey ").unwrap(),
            BackgroundColor::light_gray()
        );
        assert_eq!(
            BackgroundColor::parse("BLACK").unwrap(),
            BackgroundColor::new(0, 0, 0)
        );
    }

    #[test]
    fn test_unknown_color_lists_presets() {
        let err = BackgroundColor::parse("sparkly").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sparkly"));
        assert!(message.contains("off_white"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_default_is_white() {
        assert_eq!(BackgroundColor::default(), BackgroundColor::white());
        assert_eq!(BackgroundColor::default().to_rgb(), image::Rgb([255, 255, 255]));
    }
}

//! Subtitle style configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("Invalid hex color: {0}")]
    InvalidHexColor(String),
}

/// An `#RRGGBB` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const WHITE: HexColor = HexColor {
        r: 0xFF,
        g: 0xFF,
        b: 0xFF,
    };

    pub const BLACK: HexColor = HexColor { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for HexColor {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StyleError::InvalidHexColor(s.to_string()));
        }
        let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| StyleError::InvalidHexColor(s.to_string()))?;
        let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| StyleError::InvalidHexColor(s.to_string()))?;
        let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| StyleError::InvalidHexColor(s.to_string()))?;
        Ok(Self { r, g, b })
    }
}

impl TryFrom<String> for HexColor {
    type Error = StyleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self {
        c.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Vertical placement of the burned subtitles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Cue granularity for the generated SRT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubtitlePreset {
    /// One cue per word
    #[default]
    WordByWord,
    /// Cues grouped into sentences
    Sentence,
    /// One cue spanning the whole transcript
    Full,
}

/// Style applied when burning subtitles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleStyle {
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: HexColor,
    #[serde(default = "default_background_color")]
    pub background_color: HexColor,
    /// 0.0 = transparent, 1.0 = opaque
    #[serde(default = "default_background_opacity")]
    pub background_opacity: f32,
    #[serde(default)]
    pub position: SubtitlePosition,
    #[serde(default)]
    pub preset: SubtitlePreset,
}

fn default_font_size() -> u32 {
    24
}

fn default_font_color() -> HexColor {
    HexColor::WHITE
}

fn default_background_color() -> HexColor {
    HexColor::BLACK
}

fn default_background_opacity() -> f32 {
    0.7
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            font_color: default_font_color(),
            background_color: default_background_color(),
            background_opacity: default_background_opacity(),
            position: SubtitlePosition::default(),
            preset: SubtitlePreset::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_parse() {
        let c: HexColor = "#FFAA00".parse().unwrap();
        assert_eq!(c, HexColor::new(0xFF, 0xAA, 0x00));
        assert_eq!(c.to_string(), "#FFAA00");
    }

    #[test]
    fn test_hex_color_without_hash() {
        let c: HexColor = "00ff00".parse().unwrap();
        assert_eq!(c, HexColor::new(0, 0xFF, 0));
    }

    #[test]
    fn test_hex_color_invalid() {
        assert!("#GGGGGG".parse::<HexColor>().is_err());
        assert!("#FFF".parse::<HexColor>().is_err());
        assert!("".parse::<HexColor>().is_err());
    }

    #[test]
    fn test_style_serde_defaults() {
        let style: SubtitleStyle = serde_json::from_str("{}").unwrap();
        assert_eq!(style.font_size, 24);
        assert_eq!(style.position, SubtitlePosition::Bottom);
        assert_eq!(style.preset, SubtitlePreset::WordByWord);
    }

    #[test]
    fn test_preset_serde_names() {
        let style: SubtitleStyle =
            serde_json::from_str(r#"{"preset":"word-by-word","position":"top"}"#).unwrap();
        assert_eq!(style.preset, SubtitlePreset::WordByWord);
        assert_eq!(style.position, SubtitlePosition::Top);
    }
}

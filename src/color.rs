// =============================================================================
// COLOR.RS — Linear RGBA colors and defensive parsing of host-supplied values
//
// Hosts hand us colors as CSS-ish strings ("#ff8800", "0xff8800", "red") or
// as packed 24-bit integers. Parsing is fallible; callers decide what the
// fallback is.
// =============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const WHITE: Self = Self([1.0, 1.0, 1.0, 1.0]);
    pub const BLACK: Self = Self([0.0, 0.0, 0.0, 1.0]);
    pub const SLATE: Self = Self([0.17, 0.19, 0.23, 1.0]);
    pub const STEEL: Self = Self([0.35, 0.39, 0.46, 1.0]);
    pub const SELECTION: Self = Self([0.25, 0.62, 1.0, 1.0]);
    pub const LIGHT_WARM: Self = Self([1.0, 0.85, 0.55, 1.0]);
    pub const TRANSPARENT: Self = Self([0.0, 0.0, 0.0, 0.0]);

    /// Build an opaque color from a packed `0xRRGGBB` value.
    pub fn from_rgb_u32(rgb: u32) -> Self {
        let r = ((rgb >> 16) & 0xff) as f32 / 255.0;
        let g = ((rgb >> 8) & 0xff) as f32 / 255.0;
        let b = (rgb & 0xff) as f32 / 255.0;
        Self([r, g, b, 1.0])
    }

    /// Pack back to `0xRRGGBB` (alpha dropped).
    pub fn to_rgb_u32(self) -> u32 {
        let [r, g, b, _] = self.0;
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (q(r) << 16) | (q(g) << 8) | q(b)
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha.clamp(0.0, 1.0)])
    }

    pub fn alpha(self) -> f32 {
        self.0[3]
    }

    /// `#rrggbb` form, used in snapshots sent back to the host.
    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.to_rgb_u32())
    }
}

/// A color as it arrives from the host: either a packed integer or a string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Packed(i64),
    Text(String),
}

impl From<&str> for ColorValue {
    fn from(s: &str) -> Self {
        ColorValue::Text(s.to_string())
    }
}

impl From<u32> for ColorValue {
    fn from(v: u32) -> Self {
        ColorValue::Packed(v as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("empty color value")]
    Empty,
    #[error("malformed color value: {0:?}")]
    Malformed(String),
    #[error("color value out of range: {0}")]
    OutOfRange(i64),
}

const NAMED: &[(&str, u32)] = &[
    ("black", 0x000000),
    ("white", 0xffffff),
    ("red", 0xff0000),
    ("green", 0x008000),
    ("blue", 0x0000ff),
    ("yellow", 0xffff00),
    ("orange", 0xffa500),
    ("purple", 0x800080),
    ("gray", 0x808080),
    ("grey", 0x808080),
];

/// Parse a host color value.
///
/// Accepted forms: `#rgb`, `#rrggbb`, `#rrggbbaa`, `0xrrggbb`, bare `rrggbb`,
/// a handful of CSS names, or an integer in `0..=0xFFFFFF`.
pub fn parse_color(value: &ColorValue) -> Result<Color, ColorError> {
    match value {
        ColorValue::Packed(n) => {
            if (0..=0xff_ffff).contains(n) {
                Ok(Color::from_rgb_u32(*n as u32))
            } else {
                Err(ColorError::OutOfRange(*n))
            }
        }
        ColorValue::Text(s) => parse_color_str(s),
    }
}

pub fn parse_color_str(s: &str) -> Result<Color, ColorError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ColorError::Empty);
    }
    let lower = trimmed.to_ascii_lowercase();
    if let Some(&(_, rgb)) = NAMED.iter().find(|(name, _)| *name == lower) {
        return Ok(Color::from_rgb_u32(rgb));
    }

    let hex = lower
        .strip_prefix('#')
        .or_else(|| lower.strip_prefix("0x"))
        .unwrap_or(&lower);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorError::Malformed(s.to_string()));
    }

    let digits = |range: std::ops::Range<usize>| {
        u32::from_str_radix(&hex[range], 16).map_err(|_| ColorError::Malformed(s.to_string()))
    };
    match hex.len() {
        3 => {
            // #rgb expands each nibble: f -> ff
            let r = digits(0..1)? * 0x11;
            let g = digits(1..2)? * 0x11;
            let b = digits(2..3)? * 0x11;
            Ok(Color::from_rgb_u32((r << 16) | (g << 8) | b))
        }
        6 => Ok(Color::from_rgb_u32(digits(0..6)?)),
        8 => {
            let rgb = digits(0..6)?;
            let a = digits(6..8)? as f32 / 255.0;
            Ok(Color::from_rgb_u32(rgb).with_alpha(a))
        }
        _ => Err(ColorError::Malformed(s.to_string())),
    }
}

/// Parse `value`, logging and returning `fallback` on failure.
pub fn color_or(value: Option<&ColorValue>, fallback: Color, what: &str) -> Color {
    match value {
        None => fallback,
        Some(v) => parse_color(v).unwrap_or_else(|e| {
            tracing::warn!("invalid {what} color ({e}); using fallback");
            fallback
        }),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_hex() {
        let c = parse_color_str("#ff8000").unwrap();
        assert_eq!(c.to_rgb_u32(), 0xff8000);
        assert_eq!(c.alpha(), 1.0);
    }

    #[test]
    fn parses_short_hex_and_prefixes() {
        assert_eq!(parse_color_str("#f80").unwrap().to_rgb_u32(), 0xff8800);
        assert_eq!(parse_color_str("0x00ff00").unwrap().to_rgb_u32(), 0x00ff00);
        assert_eq!(parse_color_str("  0000FF ").unwrap().to_rgb_u32(), 0x0000ff);
    }

    #[test]
    fn parses_alpha_suffix() {
        let c = parse_color_str("#00000080").unwrap();
        assert!((c.alpha() - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(parse_color_str("Red").unwrap().to_rgb_u32(), 0xff0000);
    }

    #[test]
    fn packed_integers_must_fit_24_bits() {
        assert_eq!(parse_color(&ColorValue::Packed(0x123456)).unwrap().to_rgb_u32(), 0x123456);
        assert_eq!(parse_color(&ColorValue::Packed(-1)), Err(ColorError::OutOfRange(-1)));
        assert!(parse_color(&ColorValue::Packed(0x1_000_000)).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_color_str(""), Err(ColorError::Empty));
        assert!(matches!(parse_color_str("#zzzzzz"), Err(ColorError::Malformed(_))));
        assert!(matches!(parse_color_str("#12345"), Err(ColorError::Malformed(_))));
    }

    #[test]
    fn color_or_falls_back() {
        let bad = ColorValue::from("not-a-color");
        assert_eq!(color_or(Some(&bad), Color::BLACK, "test"), Color::BLACK);
        assert_eq!(color_or(None, Color::WHITE, "test"), Color::WHITE);
    }

    #[test]
    fn deserializes_from_string_or_number() {
        let v: ColorValue = serde_json::from_str("\"#fff\"").unwrap();
        assert_eq!(v, ColorValue::Text("#fff".into()));
        let v: ColorValue = serde_json::from_str("16711680").unwrap();
        assert_eq!(parse_color(&v).unwrap().to_rgb_u32(), 0xff0000);
    }
}

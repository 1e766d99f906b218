// ── AdapterOptions ────────────────────────────────────────────────────────────

use serde::Deserialize;

use crate::color::{Color, parse_color_str};
use crate::error::ConfigError;

/// Tunables for one map view.
///
/// Every field has a default, so hosts may deserialize a partial JSON object
/// (`{"cell_size": 70}`) and get the rest filled in.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Grid cell edge in world units. Also the default token size.
    pub cell_size: f32,
    /// Lower bound for each world axis; also the world size used when the
    /// container reports zero size during initialization.
    pub min_world_size: f32,
    /// Most zoomed-out camera scale.
    pub min_zoom: f32,
    /// Most zoomed-in camera scale.
    pub max_zoom: f32,
    /// Layer that tokens land on when none (or an unknown one) is named.
    pub default_layer: String,
    /// Z offset added to a selected token's base z-index.
    pub selection_z_offset: i32,
    /// Gap in world units between a token's edge and its selection ring.
    pub ring_padding: f32,
    /// Fraction of pan velocity retained after one second of inertia.
    pub deceleration: f32,
    /// Screen-pixel movement below which a press-release counts as a click.
    pub click_slop: f32,
    pub grid_color: String,
    pub grid_opacity: f32,
    pub fog_color: String,
    pub fog_opacity: f32,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            cell_size:          50.0,
            min_world_size:     512.0,
            min_zoom:           0.2,
            max_zoom:           5.0,
            default_layer:      "tokens".to_string(),
            selection_z_offset: 100_000,
            ring_padding:       4.0,
            deceleration:       0.05,
            click_slop:         4.0,
            grid_color:         "#ffffff".to_string(),
            grid_opacity:       0.25,
            fog_color:          "#000000".to_string(),
            fog_opacity:        0.65,
        }
    }
}

impl AdapterOptions {
    /// Default options with a specific cell size.
    pub fn with_cell_size(cell_size: f32) -> Self {
        Self { cell_size, ..Self::default() }
    }

    /// Parse a (possibly partial) JSON object and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let opts: Self = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reject options the adapter cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid { field, reason: reason.to_string() };

        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(invalid("cell_size", "must be a positive number"));
        }
        if !self.min_world_size.is_finite() || self.min_world_size < 1.0 {
            return Err(invalid("min_world_size", "must be at least 1"));
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom && self.max_zoom.is_finite()) {
            return Err(invalid("min_zoom", "zoom range must satisfy 0 < min <= max"));
        }
        if self.default_layer.trim().is_empty() {
            return Err(invalid("default_layer", "must not be empty"));
        }
        if self.selection_z_offset <= 0 {
            return Err(invalid("selection_z_offset", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.deceleration) {
            return Err(invalid("deceleration", "must be within [0, 1]"));
        }
        Ok(())
    }

    pub(crate) fn grid_color(&self) -> Color {
        parse_color_str(&self.grid_color).unwrap_or(Color::WHITE)
    }

    pub(crate) fn fog_color(&self) -> Color {
        parse_color_str(&self.fog_color).unwrap_or(Color::BLACK)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let o = AdapterOptions::default();
        assert!(o.validate().is_ok());
        assert_eq!(o.cell_size, 50.0);
        assert_eq!(o.default_layer, "tokens");
        assert_eq!((o.min_zoom, o.max_zoom), (0.2, 5.0));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let o = AdapterOptions::from_json(r#"{"cell_size": 70, "max_zoom": 3}"#).unwrap();
        assert_eq!(o.cell_size, 70.0);
        assert_eq!(o.max_zoom, 3.0);
        assert_eq!(o.min_zoom, 0.2);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AdapterOptions::from_json(r#"{"cell_size": -1}"#),
            Err(ConfigError::Invalid { field: "cell_size", .. })
        ));
        assert!(matches!(
            AdapterOptions::from_json(r#"{"min_zoom": 4, "max_zoom": 2}"#),
            Err(ConfigError::Invalid { field: "min_zoom", .. })
        ));
        assert!(matches!(AdapterOptions::from_json("{not json"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn bad_color_strings_fall_back() {
        let o = AdapterOptions { grid_color: "nope".into(), ..AdapterOptions::default() };
        assert_eq!(o.grid_color(), Color::WHITE);
    }
}

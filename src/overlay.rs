// =============================================================================
// OVERLAY.RS — Ambient lights and fog of war
//
// A light is two concentric filled circles: the dim radius at half opacity
// underneath the bright radius at full opacity. Fog is one translucent
// rectangle over the whole world.
// =============================================================================

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::color::{Color, ColorValue, color_or};
use crate::geometry::Rect;
use crate::render::Shape;
use crate::token::de_id;

/// Default light opacity.
pub const LIGHT_OPACITY: f32 = 0.5;

// ── Lights ────────────────────────────────────────────────────────────────────

/// A light as sent by the host. Unset radii default to two cells bright and
/// twice that dim.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightSpec {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub bright: Option<f32>,
    pub dim: Option<f32>,
    pub color: Option<ColorValue>,
    pub opacity: Option<f32>,
    pub layer: Option<String>,
}

impl LightSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn radii(mut self, bright: f32, dim: f32) -> Self {
        self.bright = Some(bright);
        self.dim = Some(dim);
        self
    }

    pub fn color(mut self, color: impl Into<ColorValue>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }
}

/// Snapshot of a light, as reported in `light:update`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightRecord {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub bright: f32,
    pub dim: f32,
    /// `#rrggbb`.
    pub color: String,
    pub opacity: f32,
    pub layer: String,
}

#[derive(Clone, Debug)]
pub(crate) struct Light {
    pub id: String,
    pub layer: String,
    pub position: Vec2,
    pub bright: f32,
    pub dim: f32,
    pub color: Color,
    pub opacity: f32,
    pub shapes: Vec<Shape>,
}

impl Light {
    /// Normalize `spec` into a light on `layer`, with fresh shapes.
    pub fn from_spec(spec: &LightSpec, layer: String, cell_size: f32) -> Self {
        let coord = |v: Option<f32>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
        let radius = |v: Option<f32>, fallback: f32| match v {
            Some(r) if r.is_finite() => r.max(0.0),
            Some(_) => {
                tracing::warn!("non-finite light radius; using {fallback}");
                fallback
            }
            None => fallback,
        };

        let bright = radius(spec.bright, cell_size * 2.0);
        let dim = radius(spec.dim, bright * 2.0).max(bright);
        let opacity = spec
            .opacity
            .filter(|o| o.is_finite())
            .unwrap_or(LIGHT_OPACITY)
            .clamp(0.0, 1.0);

        let mut light = Self {
            id: spec.id.clone(),
            layer,
            position: Vec2::new(coord(spec.x), coord(spec.y)),
            bright,
            dim,
            color: color_or(spec.color.as_ref(), Color::LIGHT_WARM, "light"),
            opacity,
            shapes: Vec::new(),
        };
        light.shapes = light_shapes(light.position, bright, dim, light.color, opacity);
        light
    }

    pub fn record(&self) -> LightRecord {
        LightRecord {
            id: self.id.clone(),
            x: self.position.x,
            y: self.position.y,
            bright: self.bright,
            dim: self.dim,
            color: self.color.to_hex(),
            opacity: self.opacity,
            layer: self.layer.clone(),
        }
    }
}

/// Dim circle first so the bright one draws on top. Zero radii draw nothing.
pub fn light_shapes(center: Vec2, bright: f32, dim: f32, color: Color, opacity: f32) -> Vec<Shape> {
    let mut shapes = Vec::with_capacity(2);
    if dim > 0.0 {
        shapes.push(Shape::Circle { center, radius: dim, fill: color.with_alpha(opacity * 0.5) });
    }
    if bright > 0.0 {
        shapes.push(Shape::Circle { center, radius: bright, fill: color.with_alpha(opacity) });
    }
    shapes
}

// ── Fog ───────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FogSettings {
    pub color: Color,
    pub opacity: f32,
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FogOptions {
    pub color: Option<ColorValue>,
    pub opacity: Option<f32>,
}

impl FogOptions {
    pub fn opacity(opacity: f32) -> Self {
        Self { opacity: Some(opacity), ..Self::default() }
    }
}

impl FogSettings {
    pub fn apply(&mut self, enabled: bool, opts: &FogOptions) {
        self.enabled = enabled;
        self.color = color_or(opts.color.as_ref(), self.color, "fog");
        if let Some(o) = opts.opacity.filter(|o| o.is_finite()) {
            self.opacity = o.clamp(0.0, 1.0);
        }
    }
}

/// One rectangle covering the world, or nothing when fog is off.
pub fn fog_shapes(world: Vec2, fog: &FogSettings) -> Vec<Shape> {
    if !fog.enabled {
        return Vec::new();
    }
    vec![Shape::Rect {
        rect: Rect::from_origin_size(Vec2::ZERO, world),
        fill: fog.color.with_alpha(fog.opacity),
    }]
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_is_floored_at_bright() {
        let l = Light::from_spec(&LightSpec::new("l").radii(100.0, 20.0), "lights".into(), 50.0);
        assert_eq!((l.bright, l.dim), (100.0, 100.0));
    }

    #[test]
    fn defaults_follow_cell_size() {
        let l = Light::from_spec(&LightSpec::new("l"), "lights".into(), 50.0);
        assert_eq!((l.bright, l.dim), (100.0, 200.0));
        assert_eq!(l.opacity, LIGHT_OPACITY);
        assert_eq!(l.color, Color::LIGHT_WARM);
    }

    #[test]
    fn negative_radii_and_bad_color_are_repaired() {
        let spec = LightSpec::new("l").radii(-5.0, -1.0).color("not-a-color").opacity(3.0);
        let l = Light::from_spec(&spec, "lights".into(), 50.0);
        assert_eq!((l.bright, l.dim), (0.0, 0.0));
        assert_eq!(l.color, Color::LIGHT_WARM);
        assert_eq!(l.opacity, 1.0);
        assert!(l.shapes.is_empty());
    }

    #[test]
    fn two_circles_dim_under_bright() {
        let shapes = light_shapes(Vec2::new(5.0, 5.0), 10.0, 20.0, Color::WHITE, 0.8);
        match shapes.as_slice() {
            [Shape::Circle { radius: outer, fill: dim_fill, .. }, Shape::Circle { radius: inner, fill, .. }] => {
                assert_eq!((*outer, *inner), (20.0, 10.0));
                assert!((dim_fill.alpha() - 0.4).abs() < 1e-6);
                assert!((fill.alpha() - 0.8).abs() < 1e-6);
            }
            other => panic!("unexpected shapes {other:?}"),
        }
    }

    #[test]
    fn fog_covers_world_only_when_enabled() {
        let mut fog = FogSettings { color: Color::BLACK, opacity: 0.5, enabled: false };
        assert!(fog_shapes(Vec2::new(100.0, 80.0), &fog).is_empty());
        fog.apply(true, &FogOptions::opacity(0.65));
        let shapes = fog_shapes(Vec2::new(1000.0, 800.0), &fog);
        assert_eq!(
            shapes,
            vec![Shape::Rect {
                rect: Rect::from_origin_size(Vec2::ZERO, Vec2::new(1000.0, 800.0)),
                fill: Color::BLACK.with_alpha(0.65),
            }]
        );
    }
}

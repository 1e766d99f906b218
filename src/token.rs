// =============================================================================
// TOKEN.RS — Token inputs, normalized attributes and snapshots
//
// Hosts send `TokenSpec` (add) and `TokenPatch` (update), usually straight
// from JSON. Every field is optional; `Attrs::apply` turns whatever arrived
// into a valid attribute set. Snapshots go back out as `TokenRecord`.
// =============================================================================

use std::rc::Rc;

use glam::Vec2;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::color::{Color, ColorError, ColorValue, parse_color};
use crate::texture::Texture;

/// Partial token attributes. `None` leaves the attribute as it is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    /// Degrees, clockwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tint: Option<ColorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TokenPatch {
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn size(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation = Some(degrees);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn tint(mut self, tint: impl Into<ColorValue>) -> Self {
        self.tint = Some(tint.into());
        self
    }

    pub fn texture(mut self, url: impl Into<String>) -> Self {
        self.texture_url = Some(url.into());
        self
    }

    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn z_index(mut self, z: i32) -> Self {
        self.z_index = Some(z);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A token as sent to `add_token`: an id plus any attributes.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TokenSpec {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(flatten)]
    pub attrs: TokenPatch,
}

impl TokenSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), attrs: TokenPatch::default() }
    }

    pub fn with(mut self, attrs: TokenPatch) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn at(self, x: f32, y: f32) -> Self {
        let attrs = self.attrs.at(x, y);
        Self { attrs, ..self }
    }

    pub fn size(self, size: f32) -> Self {
        let attrs = self.attrs.size(size);
        Self { attrs, ..self }
    }

    pub fn texture(self, url: impl Into<String>) -> Self {
        let attrs = self.attrs.texture(url);
        Self { attrs, ..self }
    }

    pub fn layer(self, layer: impl Into<String>) -> Self {
        let attrs = self.attrs.layer(layer);
        Self { attrs, ..self }
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        let attrs = self.attrs.name(name);
        Self { attrs, ..self }
    }
}

/// Ids arrive as strings or numbers; both become strings.
pub(crate) fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

/// Snapshot of a token, as reported in events and accessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    /// Degrees.
    pub rotation: f32,
    pub opacity: f32,
    /// `#rrggbb`.
    pub tint: Option<String>,
    pub texture_url: Option<String>,
    pub layer: String,
    /// Base z-index; the selection offset is never included.
    pub z_index: i32,
    pub name: Option<String>,
    pub vision: Value,
    pub metadata: Map<String, Value>,
}

impl TokenRecord {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Re-create this token under a new id at `position`.
    pub fn to_spec(&self, id: impl Into<String>, position: Vec2) -> TokenSpec {
        TokenSpec {
            id: id.into(),
            attrs: TokenPatch {
                texture_url: self.texture_url.clone(),
                x: Some(position.x),
                y: Some(position.y),
                size: Some(self.size),
                rotation: Some(self.rotation),
                opacity: Some(self.opacity),
                tint: self.tint.as_deref().map(ColorValue::from),
                layer: Some(self.layer.clone()),
                z_index: Some(self.z_index),
                name: self.name.clone(),
                vision: Some(self.vision.clone()),
                metadata: Some(self.metadata.clone()),
            },
        }
    }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Scene-dependent fallbacks used while normalizing.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Defaults {
    pub cell_size: f32,
    /// z-index for a token that did not ask for one (member count + 1).
    pub next_z: i32,
}

/// Normalized token attributes. Rotation is in radians.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Attrs {
    pub position: Vec2,
    pub size: f32,
    pub rotation: f32,
    pub opacity: f32,
    pub tint: Option<Color>,
    pub texture_url: Option<String>,
    pub z_index: i32,
    pub name: Option<String>,
    pub vision: Value,
    pub metadata: Map<String, Value>,
}

fn finite_or(v: f32, fallback: f32, what: &str) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("non-finite token {what}; using {fallback}");
        fallback
    }
}

impl Attrs {
    pub fn fresh(d: Defaults) -> Self {
        Self {
            position: Vec2::ZERO,
            size: d.cell_size.max(1.0),
            rotation: 0.0,
            opacity: 1.0,
            tint: None,
            texture_url: None,
            z_index: d.next_z,
            name: None,
            vision: Value::Null,
            metadata: Map::new(),
        }
    }

    /// Apply the set fields of `patch`. Invalid values take their defaults.
    pub fn apply(&mut self, patch: &TokenPatch, d: Defaults) {
        if let Some(x) = patch.x {
            self.position.x = finite_or(x, 0.0, "x");
        }
        if let Some(y) = patch.y {
            self.position.y = finite_or(y, 0.0, "y");
        }
        if let Some(size) = patch.size {
            self.size = if size.is_finite() && size > 0.0 { size } else { d.cell_size };
            self.size = self.size.max(1.0);
        }
        if let Some(deg) = patch.rotation {
            self.rotation = finite_or(deg, 0.0, "rotation").to_radians();
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = finite_or(opacity, 1.0, "opacity").clamp(0.0, 1.0);
        }
        if let Some(tint) = &patch.tint {
            self.tint = match parse_color(tint) {
                Ok(c) => Some(c),
                Err(ColorError::Empty) => None,
                Err(e) => {
                    tracing::warn!("invalid token tint ({e}); dropping tint");
                    None
                }
            };
        }
        if let Some(url) = &patch.texture_url {
            let url = url.trim();
            self.texture_url = (!url.is_empty()).then(|| url.to_string());
        }
        if let Some(z) = patch.z_index {
            self.z_index = z;
        }
        if let Some(name) = &patch.name {
            self.name = (!name.is_empty()).then(|| name.clone());
        }
        if let Some(vision) = &patch.vision {
            self.vision = vision.clone();
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata = metadata.clone();
        }
    }
}

/// Shallow-merge a vision patch: object keys overwrite, anything else replaces.
pub(crate) fn merge_vision(current: &mut Value, patch: Value) {
    match (current, patch) {
        (Value::Object(current), Value::Object(patch)) => {
            for (k, v) in patch {
                current.insert(k, v);
            }
        }
        (current, patch) => *current = patch,
    }
}

// ── Live token ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub(crate) enum TextureState {
    Placeholder,
    Pending(String),
    Loaded(Rc<Texture>),
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub id: String,
    /// Unique per created token; async continuations compare it.
    pub instance: u64,
    pub layer: String,
    pub attrs: Attrs,
    pub texture: TextureState,
}

impl Token {
    pub fn record(&self) -> TokenRecord {
        let a = &self.attrs;
        TokenRecord {
            id: self.id.clone(),
            x: a.position.x,
            y: a.position.y,
            size: a.size,
            rotation: a.rotation.to_degrees(),
            opacity: a.opacity,
            tint: a.tint.map(Color::to_hex),
            texture_url: a.texture_url.clone(),
            layer: self.layer.clone(),
            z_index: a.z_index,
            name: a.name.clone(),
            vision: a.vision.clone(),
            metadata: a.metadata.clone(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const D: Defaults = Defaults { cell_size: 50.0, next_z: 3 };

    fn normalized(patch: TokenPatch) -> Attrs {
        let mut a = Attrs::fresh(D);
        a.apply(&patch, D);
        a
    }

    #[test]
    fn unset_fields_take_defaults() {
        let a = normalized(TokenPatch::default());
        assert_eq!(a.position, Vec2::ZERO);
        assert_eq!(a.size, 50.0);
        assert_eq!(a.opacity, 1.0);
        assert_eq!(a.rotation, 0.0);
        assert_eq!(a.z_index, 3);
        assert_eq!(a.tint, None);
    }

    #[test]
    fn invalid_numbers_are_repaired() {
        let a = normalized(TokenPatch {
            x: Some(f32::NAN),
            y: Some(f32::INFINITY),
            size: Some(-4.0),
            opacity: Some(7.0),
            ..TokenPatch::default()
        });
        assert_eq!(a.position, Vec2::ZERO);
        assert_eq!(a.size, 50.0);
        assert_eq!(a.opacity, 1.0);

        assert_eq!(normalized(TokenPatch::default().size(0.25)).size, 1.0);
    }

    #[test]
    fn rotation_is_stored_in_radians() {
        let a = normalized(TokenPatch::default().rotation(180.0));
        assert!((a.rotation - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn bad_tint_drops_tint() {
        assert_eq!(normalized(TokenPatch::default().tint("#zzz")).tint, None);
        let red = normalized(TokenPatch::default().tint("#ff0000")).tint.unwrap();
        assert_eq!(red.to_rgb_u32(), 0xff0000);
    }

    #[test]
    fn patch_keeps_unset_attributes() {
        let mut a = normalized(TokenPatch::default().at(10.0, 20.0).name("orc"));
        a.apply(&TokenPatch::default().opacity(0.5), D);
        assert_eq!(a.position, Vec2::new(10.0, 20.0));
        assert_eq!(a.name.as_deref(), Some("orc"));
        assert_eq!(a.opacity, 0.5);
    }

    #[test]
    fn vision_merge_is_shallow() {
        let mut v = json!({"range": 30, "dark": true});
        merge_vision(&mut v, json!({"range": 60}));
        assert_eq!(v, json!({"range": 60, "dark": true}));
        merge_vision(&mut v, json!(false));
        assert_eq!(v, json!(false));
    }

    #[test]
    fn spec_from_json_accepts_numeric_ids() {
        let spec: TokenSpec =
            serde_json::from_str(r#"{"id": 7, "x": 12, "y": 12, "textureUrl": "orc.png"}"#).unwrap();
        assert_eq!(spec.id, "7");
        assert_eq!(spec.attrs.x, Some(12.0));
        assert_eq!(spec.attrs.texture_url.as_deref(), Some("orc.png"));
    }

    #[test]
    fn record_reports_degrees_and_hex_tint() {
        let token = Token {
            id: "t".into(),
            instance: 1,
            layer: "tokens".into(),
            attrs: normalized(TokenPatch::default().rotation(90.0).tint("#00ff00")),
            texture: TextureState::Placeholder,
        };
        let rec = token.record();
        assert!((rec.rotation - 90.0).abs() < 1e-4);
        assert_eq!(rec.tint.as_deref(), Some("#00ff00"));
        let again = rec.to_spec("t2", Vec2::new(1.0, 2.0));
        assert_eq!(again.attrs.tint, Some(ColorValue::Text("#00ff00".into())));
        assert_eq!(again.attrs.x, Some(1.0));
    }
}

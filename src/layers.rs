// =============================================================================
// LAYERS.RS — Named render layers and entity membership
//
// Layers are ordered buckets of entities. Membership is a relation kept here
// (layer id -> ordered members, entity -> layer id); entities never point
// back at their layer. The default layer id is configuration, resolved only
// at this boundary.
// =============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    Grid,
    Tokens,
    Lights,
    Overlay,
    Fog,
    Custom,
}

/// Whether tokens on a layer take part in pointer hit-testing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interaction {
    #[default]
    Blocking,
    PassThrough,
}

/// Host request to create or reconfigure a layer. Unset fields keep their
/// current value (or the kind's default on creation).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerOptions {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<LayerKind>,
    pub z_index: Option<i32>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub interaction: Option<Interaction>,
}

impl LayerOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn kind(mut self, kind: LayerKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn z_index(mut self, z: i32) -> Self {
        self.z_index = Some(z);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    pub fn interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = Some(interaction);
        self
    }
}

/// Public view of a layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub z_index: i32,
    pub visible: bool,
    pub locked: bool,
    pub interaction: Interaction,
}

/// Anything that can live on a layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Token(String),
    Light(String),
}

impl EntityKey {
    pub fn id(&self) -> &str {
        match self {
            EntityKey::Token(id) | EntityKey::Light(id) => id,
        }
    }
}

pub const BACKGROUND_LAYER: &str = "background";
pub const GRID_LAYER: &str = "grid";
pub const LIGHTS_LAYER: &str = "lights";
pub const FOG_LAYER: &str = "fog";

/// `(id, kind, z_index, interaction)` of the layers every scene starts with.
pub const SYSTEM_LAYERS: [(&str, LayerKind, i32, Interaction); 7] = [
    ("background", LayerKind::Background, 0, Interaction::PassThrough),
    ("grid", LayerKind::Grid, 5, Interaction::PassThrough),
    ("tokens", LayerKind::Tokens, 20, Interaction::Blocking),
    ("lights", LayerKind::Lights, 40, Interaction::PassThrough),
    ("overlay", LayerKind::Overlay, 60, Interaction::Blocking),
    ("fog", LayerKind::Fog, 80, Interaction::PassThrough),
    ("ui", LayerKind::Overlay, 90, Interaction::PassThrough),
];

/// z-index handed to the first custom layer created without one.
pub const FIRST_CUSTOM_Z: i32 = 100;

fn system_layer(id: &str) -> Option<(LayerKind, i32, Interaction)> {
    SYSTEM_LAYERS
        .iter()
        .find(|(name, ..)| *name == id)
        .map(|&(_, kind, z, interaction)| (kind, z, interaction))
}

struct Layer {
    info: LayerInfo,
    /// Creation order; breaks z-index ties.
    seq: u64,
    members: Vec<EntityKey>,
}

pub struct LayerRegistry {
    default_layer: String,
    layers: HashMap<String, Layer>,
    membership: HashMap<EntityKey, String>,
    /// Layer ids in render order (bottom first).
    order: Vec<String>,
    next_seq: u64,
    next_auto_z: i32,
}

impl LayerRegistry {
    pub fn new(default_layer: impl Into<String>) -> Self {
        Self {
            default_layer: default_layer.into(),
            layers: HashMap::new(),
            membership: HashMap::new(),
            order: Vec::new(),
            next_seq: 0,
            next_auto_z: FIRST_CUSTOM_Z,
        }
    }

    pub fn default_layer(&self) -> &str {
        &self.default_layer
    }

    /// Create the seven system layers and the configured default layer.
    pub fn ensure_system_layers(&mut self) {
        for (id, ..) in SYSTEM_LAYERS {
            self.ensure_layer(&LayerOptions::new(id));
        }
        let default = self.default_layer.clone();
        self.ensure_layer(&LayerOptions::new(default));
    }

    /// Create `opts.id` or apply the set fields of `opts` to the existing
    /// layer. Returns `None` for a blank id.
    pub fn ensure_layer(&mut self, opts: &LayerOptions) -> Option<LayerInfo> {
        let id = opts.id.trim();
        if id.is_empty() {
            tracing::warn!("ignoring layer request with an empty id");
            return None;
        }

        if let Some(z) = opts.z_index {
            if z >= self.next_auto_z {
                self.next_auto_z = z.saturating_add(1);
            }
        }

        if let Some(layer) = self.layers.get_mut(id) {
            let info = &mut layer.info;
            if let Some(visible) = opts.visible {
                info.visible = visible;
            }
            if let Some(locked) = opts.locked {
                info.locked = locked;
            }
            if let Some(interaction) = opts.interaction {
                info.interaction = interaction;
            }
            let resort = opts.z_index.is_some_and(|z| z != info.z_index);
            if let Some(z) = opts.z_index {
                info.z_index = z;
            }
            let info = info.clone();
            if resort {
                self.sort();
            }
            return Some(info);
        }

        let system = system_layer(id);
        let kind = opts.kind.or(system.map(|s| s.0)).unwrap_or(LayerKind::Custom);
        let z_index = match opts.z_index.or(system.map(|s| s.1)) {
            Some(z) => z,
            None => {
                let z = self.next_auto_z;
                self.next_auto_z = z.saturating_add(1);
                z
            }
        };
        let interaction = opts
            .interaction
            .or(system.map(|s| s.2))
            .unwrap_or_default();

        let info = LayerInfo {
            id: id.to_string(),
            kind,
            z_index,
            visible: opts.visible.unwrap_or(true),
            locked: opts.locked.unwrap_or(false),
            interaction,
        };
        tracing::debug!(layer = id, ?kind, z_index, "layer created");

        let seq = self.next_seq;
        self.next_seq += 1;
        self.layers.insert(id.to_string(), Layer { info: info.clone(), seq, members: Vec::new() });
        self.order.push(id.to_string());
        self.sort();
        Some(info)
    }

    fn sort(&mut self) {
        let layers = &self.layers;
        self.order.sort_by_key(|id| {
            layers.get(id).map_or((i32::MAX, u64::MAX), |l| (l.info.z_index, l.seq))
        });
    }

    pub fn get(&self, id: &str) -> Option<&LayerInfo> {
        self.layers.get(id).map(|l| &l.info)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// All layers, bottom first, ordered by `(z_index, creation order)`.
    pub fn ordered(&self) -> impl Iterator<Item = &LayerInfo> {
        self.order.iter().filter_map(|id| self.get(id))
    }

    // ── Setters ───────────────────────────────────────────────────────────────

    pub fn set_visibility(&mut self, id: &str, visible: bool) -> bool {
        match self.layers.get_mut(id) {
            Some(layer) => {
                layer.info.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_locked(&mut self, id: &str, locked: bool) -> bool {
        match self.layers.get_mut(id) {
            Some(layer) => {
                layer.info.locked = locked;
                true
            }
            None => false,
        }
    }

    /// Change a layer's z-index and re-sort the render order.
    pub fn set_z_index(&mut self, id: &str, z_index: i32) -> bool {
        match self.layers.get_mut(id) {
            Some(layer) => {
                layer.info.z_index = z_index;
                self.sort();
                true
            }
            None => false,
        }
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.get(id).is_some_and(|l| l.locked)
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    /// The layer an entity asking for `id` lands on. A non-blank unknown id
    /// creates the layer. Blank ids resolve to `fallback`, or to the default
    /// layer when `fallback` is `None`.
    pub fn resolve_or_create(&mut self, id: Option<&str>, fallback: Option<&str>) -> String {
        let requested = id.map(str::trim).filter(|s| !s.is_empty());
        let target = requested
            .or(fallback)
            .unwrap_or(&self.default_layer)
            .to_string();
        if !self.layers.contains_key(&target) {
            self.ensure_layer(&LayerOptions::new(target.clone()));
        }
        target
    }

    // ── Membership ────────────────────────────────────────────────────────────

    /// Put `entity` on `layer`, removing it from any previous layer.
    /// Returns false when the layer does not exist.
    pub fn insert_member(&mut self, layer: &str, entity: EntityKey) -> bool {
        if !self.layers.contains_key(layer) {
            return false;
        }
        if self.membership.get(&entity).is_some_and(|current| current == layer) {
            return true;
        }
        self.remove_member(&entity);
        if let Some(l) = self.layers.get_mut(layer) {
            l.members.push(entity.clone());
        }
        self.membership.insert(entity, layer.to_string());
        true
    }

    /// Drop `entity` from its layer. Returns the layer it was on.
    pub fn remove_member(&mut self, entity: &EntityKey) -> Option<String> {
        let layer_id = self.membership.remove(entity)?;
        if let Some(layer) = self.layers.get_mut(&layer_id) {
            layer.members.retain(|m| m != entity);
        }
        Some(layer_id)
    }

    pub fn member_count(&self, layer: &str) -> usize {
        self.layers.get(layer).map_or(0, |l| l.members.len())
    }

    /// Members of `layer` in insertion order.
    pub fn members(&self, layer: &str) -> &[EntityKey] {
        self.layers.get(layer).map(|l| l.members.as_slice()).unwrap_or_default()
    }

    /// Remove every layer and membership.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.membership.clear();
        self.order.clear();
        self.next_auto_z = FIRST_CUSTOM_Z;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LayerRegistry {
        let mut r = LayerRegistry::new("tokens");
        r.ensure_system_layers();
        r
    }

    fn ids(r: &LayerRegistry) -> Vec<&str> {
        r.ordered().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn system_layers_in_render_order() {
        let r = registry();
        assert_eq!(ids(&r), ["background", "grid", "tokens", "lights", "overlay", "fog", "ui"]);
        assert_eq!(r.get("fog").unwrap().z_index, 80);
        assert_eq!(r.get("ui").unwrap().kind, LayerKind::Overlay);
    }

    #[test]
    fn custom_layers_auto_number_from_100() {
        let mut r = registry();
        let a = r.ensure_layer(&LayerOptions::new("minis")).unwrap();
        let b = r.ensure_layer(&LayerOptions::new("gm")).unwrap();
        assert_eq!((a.z_index, b.z_index), (100, 101));
        assert_eq!(a.kind, LayerKind::Custom);

        r.ensure_layer(&LayerOptions::new("top").z_index(500));
        assert_eq!(r.ensure_layer(&LayerOptions::new("next")).unwrap().z_index, 501);
    }

    #[test]
    fn ensure_existing_only_applies_set_fields() {
        let mut r = registry();
        r.ensure_layer(&LayerOptions::new("tokens").locked(true));
        let info = r.get("tokens").unwrap();
        assert!(info.locked);
        assert!(info.visible);
        assert_eq!(info.z_index, 20);
        assert!(r.ensure_layer(&LayerOptions::new("  ")).is_none());
    }

    #[test]
    fn z_change_resorts() {
        let mut r = registry();
        r.set_z_index("background", 95);
        assert_eq!(ids(&r).last(), Some(&"background"));
        // ties keep creation order: grid was created before tokens
        r.set_z_index("tokens", 5);
        let order = ids(&r);
        let grid = order.iter().position(|id| *id == "grid").unwrap();
        let tokens = order.iter().position(|id| *id == "tokens").unwrap();
        assert!(grid < tokens);
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let mut r = registry();
        assert_eq!(r.resolve_or_create(Some(" lights "), None), "lights");
        assert_eq!(r.resolve_or_create(Some(""), None), "tokens");
        assert_eq!(r.resolve_or_create(None, None), "tokens");
        let before = r.len();

        assert_eq!(r.resolve_or_create(Some("nowhere"), None), "nowhere");
        assert_eq!(r.len(), before + 1);
        assert_eq!(r.get("nowhere").unwrap().kind, LayerKind::Custom);
        assert_eq!(r.resolve_or_create(None, Some("lights")), "lights");
    }

    #[test]
    fn membership_moves_between_layers() {
        let mut r = registry();
        let t = EntityKey::Token("t1".into());
        assert!(r.insert_member("tokens", t.clone()));
        assert!(r.insert_member("tokens", t.clone()));
        assert_eq!(r.member_count("tokens"), 1);

        assert!(r.insert_member("overlay", t.clone()));
        assert_eq!(r.member_count("tokens"), 0);
        assert_eq!(r.members("overlay"), [t.clone()]);

        assert!(!r.insert_member("missing", t.clone()));
        assert_eq!(r.remove_member(&t).as_deref(), Some("overlay"));
        assert_eq!(r.remove_member(&t), None);
    }

    #[test]
    fn options_deserialize_from_host_json() {
        let o: LayerOptions =
            serde_json::from_str(r#"{"id":"gm","type":"custom","zIndex":7,"locked":true}"#).unwrap();
        assert_eq!(o.kind, Some(LayerKind::Custom));
        assert_eq!(o.z_index, Some(7));
        assert_eq!(o.locked, Some(true));
        assert_eq!(o.visible, None);
    }
}

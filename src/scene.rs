// =============================================================================
// SCENE.RS — The battle-map scene model
//
// Owns every mutable piece of one map view: world bounds, grid, fog, layers,
// camera, the token and light arenas, selection, clipboard and pointer
// gestures. All methods are synchronous. Side effects that must happen
// outside a `RefCell` borrow are queued:
//
//   - `events`: delivered on the bus once the borrow is released
//   - `texture_requests`: token texture loads to spawn on the executor
//   - `dirty`: a new frame should be presented on the next tick
// =============================================================================

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use serde_json::Value;

use crate::camera::Camera;
use crate::clipboard::{Clipboard, copy_id, paste_layout};
use crate::color::Color;
use crate::config::AdapterOptions;
use crate::error::TextureError;
use crate::events::Event;
use crate::geometry::Rect;
use crate::grid::{self, GridLine, GridOptions, GridSettings};
use crate::input::{Gestures, Tool};
use crate::layers::{
    BACKGROUND_LAYER, EntityKey, FOG_LAYER, GRID_LAYER, Interaction, LIGHTS_LAYER, LayerInfo,
    LayerOptions, LayerRegistry,
};
use crate::overlay::{FogOptions, FogSettings, Light, LightRecord, LightSpec, fog_shapes};
use crate::placeholder::placeholder_shapes;
use crate::render::{DrawCommand, DrawItem, Frame, LayerFrame, Node, Shape, Sprite};
use crate::selection::{Selection, effective_z};
use crate::texture::Texture;
use crate::token::{Attrs, Defaults, TextureState, Token, TokenPatch, TokenRecord, TokenSpec, merge_vision};

/// Width of a selection ring in world units.
const RING_WIDTH: f32 = 3.0;
/// Width of a grid line in world units.
const GRID_LINE_WIDTH: f32 = 1.0;

/// A token texture load the adapter must spawn.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TextureRequest {
    pub token_id: String,
    pub instance: u64,
    pub url: String,
}

#[derive(Default)]
struct Background {
    texture: Option<Rc<Texture>>,
    /// Bumped by every `load_map`; older loads are stale.
    generation: u64,
}

pub(crate) struct Scene {
    pub options: AdapterOptions,
    pub world: Vec2,
    pub grid: GridSettings,
    grid_lines: Vec<GridLine>,
    pub fog: FogSettings,
    pub layers: LayerRegistry,
    pub camera: Camera,
    pub(crate) tokens: HashMap<String, Token>,
    lights: HashMap<String, Light>,
    pub selection: Selection,
    pub clipboard: Clipboard,
    pub tool: Tool,
    pub(crate) gestures: Gestures,
    background: Background,
    placeholder: Rc<Texture>,
    next_instance: u64,
    /// Stamp of the last paste; each paste gets a strictly larger one.
    last_paste_stamp: u128,
    dirty: bool,
    events: Vec<Event>,
    texture_requests: Vec<TextureRequest>,
}

impl Scene {
    /// Build the initial scene for a container of `screen` pixels.
    ///
    /// Each world axis is at least `options.min_world_size`, so a container
    /// that has not been laid out yet still gets a usable world.
    pub fn new(options: AdapterOptions, screen: Vec2, placeholder: Rc<Texture>) -> Self {
        let world = screen.max(Vec2::splat(options.min_world_size));
        let grid = GridSettings {
            cell_size: grid::sanitize_cell_size(options.cell_size).unwrap_or(50.0),
            color: options.grid_color(),
            opacity: options.grid_opacity.clamp(0.0, 1.0),
            visible: true,
        };
        let fog = FogSettings {
            color: options.fog_color(),
            opacity: options.fog_opacity.clamp(0.0, 1.0),
            enabled: false,
        };
        let mut layers = LayerRegistry::new(options.default_layer.trim());
        layers.ensure_system_layers();
        layers.set_visibility(FOG_LAYER, false);

        let camera = Camera::new(screen, world, options.min_zoom, options.max_zoom, options.deceleration);

        Self {
            grid_lines: grid::grid_lines(world, grid.cell_size),
            world,
            grid,
            fog,
            layers,
            camera,
            tokens: HashMap::new(),
            lights: HashMap::new(),
            selection: Selection::new(),
            clipboard: Clipboard::new(),
            tool: Tool::Select,
            gestures: Gestures::default(),
            background: Background::default(),
            placeholder,
            next_instance: 1,
            last_paste_stamp: 0,
            dirty: true,
            events: Vec::new(),
            texture_requests: Vec::new(),
            options,
        }
    }

    // ── Outbox ────────────────────────────────────────────────────────────────

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn take_texture_requests(&mut self) -> Vec<TextureRequest> {
        std::mem::take(&mut self.texture_requests)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True once per batch of changes.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn cell_size(&self) -> f32 {
        self.grid.cell_size
    }

    // ── Tokens ────────────────────────────────────────────────────────────────

    pub fn token(&self, id: &str) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn token_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tokens.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn defaults_for(&self, layer: &str, id: &str) -> Defaults {
        let others = self
            .layers
            .members(layer)
            .iter()
            .filter(|m| !matches!(m, EntityKey::Token(t) if t == id))
            .count();
        Defaults { cell_size: self.grid.cell_size, next_z: others as i32 + 1 }
    }

    /// Insert or fully re-apply a token. Emits `token:create` or `token:update`.
    pub fn upsert_token(&mut self, spec: &TokenSpec) -> Option<TokenRecord> {
        let id = spec.id.trim();
        if id.is_empty() {
            tracing::warn!("ignoring token without an id");
            return None;
        }
        let id = id.to_string();
        let layer = self.layers.resolve_or_create(spec.attrs.layer.as_deref(), None);
        let defaults = self.defaults_for(&layer, &id);
        let mut attrs = Attrs::fresh(defaults);
        attrs.apply(&spec.attrs, defaults);

        let existed = match self.tokens.get_mut(&id) {
            Some(token) => {
                token.attrs = attrs;
                token.layer = layer.clone();
                true
            }
            None => {
                let instance = self.next_instance;
                self.next_instance += 1;
                let token = Token { id: id.clone(), instance, layer: layer.clone(), attrs, texture: TextureState::Placeholder };
                self.tokens.insert(id.clone(), token);
                false
            }
        };
        self.layers.insert_member(&layer, EntityKey::Token(id.clone()));
        self.sync_texture(&id);
        self.dirty = true;

        let record = self.tokens.get(&id)?.record();
        tracing::debug!(token = %id, existed, "token upserted");
        self.emit(if existed { Event::TokenUpdate(record.clone()) } else { Event::TokenCreate(record.clone()) });
        Some(record)
    }

    /// Merge `patch` into an existing token. `None` for unknown ids.
    pub fn update_token(&mut self, id: &str, patch: &TokenPatch) -> Option<TokenRecord> {
        let current_layer = self.tokens.get(id)?.layer.clone();
        let layer = match patch.layer.as_deref() {
            Some(requested) => self.layers.resolve_or_create(Some(requested), None),
            None => current_layer,
        };
        let defaults = self.defaults_for(&layer, id);
        let token = self.tokens.get_mut(id)?;
        token.attrs.apply(patch, defaults);
        token.layer = layer.clone();

        self.layers.insert_member(&layer, EntityKey::Token(id.to_string()));
        self.sync_texture(id);
        self.dirty = true;

        let record = self.tokens.get(id)?.record();
        self.emit(Event::TokenUpdate(record.clone()));
        Some(record)
    }

    /// Bring the texture state in line with the token's url, queueing a
    /// load when the url changed.
    fn sync_texture(&mut self, id: &str) {
        let Some(token) = self.tokens.get_mut(id) else {
            return;
        };
        let wanted = token.attrs.texture_url.clone();
        let up_to_date = match (&token.texture, wanted.as_deref()) {
            (TextureState::Placeholder, None) => true,
            (TextureState::Pending(url), Some(w)) => url == w,
            (TextureState::Loaded(tex), Some(w)) => tex.url() == Some(w),
            _ => false,
        };
        if up_to_date {
            return;
        }
        match wanted {
            None => token.texture = TextureState::Placeholder,
            Some(url) => {
                token.texture = TextureState::Pending(url.clone());
                self.texture_requests.push(TextureRequest { token_id: id.to_string(), instance: token.instance, url });
            }
        }
    }

    /// Apply a finished texture load if the token is still the one that
    /// asked for it. Returns false for stale results.
    pub fn apply_token_texture(
        &mut self,
        req: &TextureRequest,
        result: Result<Rc<Texture>, TextureError>,
    ) -> bool {
        let Some(token) = self.tokens.get_mut(&req.token_id) else {
            return false;
        };
        if token.instance != req.instance {
            return false;
        }
        if !matches!(&token.texture, TextureState::Pending(url) if *url == req.url) {
            return false;
        }
        token.texture = match result {
            Ok(tex) => TextureState::Loaded(tex),
            Err(e) => {
                tracing::warn!(token = %req.token_id, "keeping placeholder: {e}");
                TextureState::Placeholder
            }
        };
        self.dirty = true;
        true
    }

    /// Deselect, unlink and drop a token. Emits `selection:change` (if it
    /// was selected) then `token:remove`.
    pub fn remove_token(&mut self, id: &str) -> Option<TokenRecord> {
        if !self.tokens.contains_key(id) {
            return None;
        }
        if self.selection.remove(id) {
            self.emit(Event::SelectionChange(self.selection.to_vec()));
        }
        self.gestures.drags.retain(|_, d| d.id != id);
        self.layers.remove_member(&EntityKey::Token(id.to_string()));
        let token = self.tokens.remove(id)?;
        self.dirty = true;

        let record = token.record();
        self.emit(Event::TokenRemove(record.clone()));
        Some(record)
    }

    pub fn set_token_vision(&mut self, id: &str, patch: Value) -> Option<Value> {
        let token = self.tokens.get_mut(id)?;
        merge_vision(&mut token.attrs.vision, patch);
        let vision = token.attrs.vision.clone();
        self.emit(Event::TokenVision { id: id.to_string(), vision: vision.clone() });
        Some(vision)
    }

    // ── Selection & clipboard ─────────────────────────────────────────────────

    /// Replace the selection with the known ids among `ids`.
    pub fn set_selection<S: AsRef<str>>(&mut self, ids: &[S]) -> Vec<String> {
        let known: Vec<&str> = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| self.tokens.contains_key(*id))
            .collect();
        if self.selection.set(known) {
            self.dirty = true;
            self.emit(Event::SelectionChange(self.selection.to_vec()));
        }
        self.selection.to_vec()
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.dirty = true;
            self.emit(Event::SelectionChange(Vec::new()));
        }
    }

    pub fn copy_selection(&mut self) -> Vec<TokenRecord> {
        let records: Vec<TokenRecord> = self
            .selection
            .ids()
            .iter()
            .filter_map(|id| self.tokens.get(id))
            .map(Token::record)
            .collect();
        self.clipboard.store(records.clone());
        records
    }

    /// Paste the clipboard centered on `target`. `stamp_ms` is the wall
    /// clock; it is bumped past the previous paste and past any existing id
    /// so every paste creates new tokens.
    pub fn paste_at(&mut self, target: Vec2, stamp_ms: u128) -> Vec<TokenRecord> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }
        let mut stamp = stamp_ms.max(self.last_paste_stamp + 1);
        while self
            .clipboard
            .entries()
            .iter()
            .enumerate()
            .any(|(i, rec)| self.tokens.contains_key(&copy_id(&rec.id, stamp, i)))
        {
            stamp += 1;
        }
        self.last_paste_stamp = stamp;
        let specs = paste_layout(self.clipboard.entries(), target, self.grid.cell_size, stamp);
        let created: Vec<TokenRecord> = specs.iter().filter_map(|spec| self.upsert_token(spec)).collect();

        let ids: Vec<&str> = created.iter().map(|r| r.id.as_str()).collect();
        if self.selection.set(ids) {
            self.emit(Event::SelectionChange(self.selection.to_vec()));
        }
        self.emit(Event::TokenPaste(created.clone()));
        created
    }

    /// Remove every selected token not on a locked layer.
    pub fn delete_selection(&mut self) -> Vec<String> {
        let doomed: Vec<String> = self
            .selection
            .ids()
            .iter()
            .filter(|id| self.tokens.get(*id).is_some_and(|t| !self.layers.is_locked(&t.layer)))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return doomed;
        }

        let mut changed = false;
        for id in &doomed {
            changed |= self.selection.remove(id);
        }
        if changed {
            self.emit(Event::SelectionChange(self.selection.to_vec()));
        }
        doomed.into_iter().filter(|id| self.remove_token(id).is_some()).collect()
    }

    // ── Lights & fog ──────────────────────────────────────────────────────────

    pub fn upsert_light(&mut self, spec: &LightSpec) -> Option<LightRecord> {
        let id = spec.id.trim();
        if id.is_empty() {
            tracing::warn!("ignoring light without an id");
            return None;
        }
        let layer = self.layers.resolve_or_create(spec.layer.as_deref(), Some(LIGHTS_LAYER));
        let mut spec = spec.clone();
        spec.id = id.to_string();
        let light = Light::from_spec(&spec, layer.clone(), self.grid.cell_size);
        let record = light.record();

        self.layers.insert_member(&layer, EntityKey::Light(spec.id.clone()));
        self.lights.insert(spec.id, light);
        self.dirty = true;
        self.emit(Event::LightUpdate(record.clone()));
        Some(record)
    }

    pub fn remove_light(&mut self, id: &str) -> bool {
        if self.lights.remove(id).is_none() {
            return false;
        }
        self.layers.remove_member(&EntityKey::Light(id.to_string()));
        self.dirty = true;
        self.emit(Event::LightRemove { id: id.to_string() });
        true
    }

    pub fn light(&self, id: &str) -> Option<LightRecord> {
        self.lights.get(id).map(Light::record)
    }

    pub fn toggle_fog(&mut self, enabled: bool, opts: &FogOptions) -> FogSettings {
        self.fog.apply(enabled, opts);
        self.layers.set_visibility(FOG_LAYER, enabled);
        self.dirty = true;
        self.fog
    }

    // ── Grid, world & layers ──────────────────────────────────────────────────

    pub fn set_grid(&mut self, opts: &GridOptions) -> GridSettings {
        self.grid.apply(opts);
        self.grid_lines = if self.grid.visible { grid::grid_lines(self.world, self.grid.cell_size) } else { Vec::new() };
        self.dirty = true;
        self.grid
    }

    /// Resize the world. Grid and fog follow; the camera re-fits.
    /// Token positions are left alone.
    pub fn set_world(&mut self, world: Vec2) {
        self.world = world.max(Vec2::splat(self.options.min_world_size));
        if self.grid.visible {
            self.grid_lines = grid::grid_lines(self.world, self.grid.cell_size);
        }
        self.camera.set_world(self.world);
        self.dirty = true;
    }

    /// Start a background change. Returns the generation the matching
    /// `finish_map_load` must present.
    pub fn begin_map_load(&mut self, url: Option<&str>) -> u64 {
        self.background.generation += 1;
        tracing::debug!(url = url.unwrap_or("<none>"), generation = self.background.generation, "map load started");
        self.background.texture = None;
        self.dirty = true;
        self.background.generation
    }

    /// Finish a background change. `None` if a newer load superseded it.
    ///
    /// Invalid `width`/`height` fall back to the texture's size, or to the
    /// current world when there is no texture.
    pub fn finish_map_load(
        &mut self,
        generation: u64,
        texture: Option<Result<Rc<Texture>, TextureError>>,
        width: f32,
        height: f32,
    ) -> Option<Vec2> {
        if generation != self.background.generation {
            tracing::debug!(generation, "discarding stale map load");
            return None;
        }
        let texture = match texture {
            Some(Ok(tex)) => Some(tex),
            Some(Err(e)) => {
                tracing::warn!("map background unavailable, showing placeholder: {e}");
                None
            }
            None => None,
        };
        let fallback = match &texture {
            Some(tex) => Vec2::new(tex.width() as f32, tex.height() as f32),
            None => self.world,
        };
        let axis = |v: f32, fb: f32| if v.is_finite() && v > 0.0 { v } else { fb };
        let world = Vec2::new(axis(width, fallback.x), axis(height, fallback.y));

        self.background.texture = texture;
        self.set_world(world);
        Some(self.world)
    }

    pub fn create_layer(&mut self, opts: &LayerOptions) -> Option<LayerInfo> {
        let info = self.layers.ensure_layer(opts)?;
        self.dirty = true;
        Some(info)
    }

    pub fn resize(&mut self, screen: Vec2) {
        self.camera.resize_screen(screen);
        self.dirty = true;
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Tokens on `layer` bottom first: by effective z, then insertion order.
    fn stacked_tokens(&self, layer: &str) -> Vec<&Token> {
        let offset = self.options.selection_z_offset;
        let mut tokens: Vec<(usize, &Token)> = self
            .layers
            .members(layer)
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match m {
                EntityKey::Token(id) => self.tokens.get(id).map(|t| (i, t)),
                EntityKey::Light(_) => None,
            })
            .collect();
        tokens.sort_by_key(|(i, t)| (effective_z(t.attrs.z_index, self.selection.contains(&t.id), offset), *i));
        tokens.into_iter().map(|(_, t)| t).collect()
    }

    /// z-index a token is drawn with, selection offset included.
    pub fn effective_z(&self, id: &str) -> Option<i32> {
        let token = self.tokens.get(id)?;
        Some(effective_z(token.attrs.z_index, self.selection.contains(id), self.options.selection_z_offset))
    }

    /// Topmost token under a screen point on a visible, blocking layer.
    pub fn hit_test(&self, screen: Vec2) -> Option<String> {
        let world = self.camera.screen_to_world(screen);
        let layers: Vec<&LayerInfo> = self.layers.ordered().collect();
        layers
            .into_iter()
            .rev()
            .filter(|l| l.visible && l.interaction == Interaction::Blocking)
            .find_map(|l| {
                self.stacked_tokens(&l.id)
                    .into_iter()
                    .rev()
                    .find(|t| Rect::centered_square(t.attrs.position, t.attrs.size).contains(world))
                    .map(|t| t.id.clone())
            })
    }

    // ── Frame ─────────────────────────────────────────────────────────────────

    pub fn build_frame(&self) -> Frame {
        let layers = self
            .layers
            .ordered()
            .filter(|l| l.visible)
            .map(|l| LayerFrame { id: l.id.clone(), kind: l.kind, z_index: l.z_index, commands: self.layer_commands(&l.id) })
            .collect();
        Frame { view: self.camera.build_view_proj(), camera: self.camera.state(), layers }
    }

    fn layer_commands(&self, layer: &str) -> Vec<DrawCommand> {
        let shape = |node: Node, s: Shape| DrawCommand { node, item: DrawItem::Shape(s) };
        let mut out = Vec::new();

        match layer {
            BACKGROUND_LAYER => match &self.background.texture {
                Some(tex) => out.push(DrawCommand {
                    node: Node::Background,
                    item: DrawItem::Sprite(Sprite {
                        texture: Rc::clone(tex),
                        center: self.world * 0.5,
                        size: self.world,
                        rotation: 0.0,
                        tint: Color::WHITE,
                        alpha: 1.0,
                    }),
                }),
                None => out.extend(placeholder_shapes(self.world).into_iter().map(|s| shape(Node::Placeholder, s))),
            },
            GRID_LAYER => {
                let color = self.grid.color.with_alpha(self.grid.opacity);
                out.extend(self.grid_lines.iter().map(|l| {
                    shape(Node::Grid, Shape::Line { from: l.from, to: l.to, width: GRID_LINE_WIDTH, color })
                }));
            }
            FOG_LAYER => out.extend(fog_shapes(self.world, &self.fog).into_iter().map(|s| shape(Node::Fog, s))),
            _ => {}
        }

        for member in self.layers.members(layer) {
            if let EntityKey::Light(id) = member {
                if let Some(light) = self.lights.get(id) {
                    out.extend(light.shapes.iter().map(|s| shape(Node::Light(id.clone()), *s)));
                }
            }
        }

        for token in self.stacked_tokens(layer) {
            let a = &token.attrs;
            let (texture, fallback_tint) = match &token.texture {
                TextureState::Loaded(tex) => (Rc::clone(tex), Color::WHITE),
                TextureState::Placeholder | TextureState::Pending(_) => (Rc::clone(&self.placeholder), Color::STEEL),
            };
            out.push(DrawCommand {
                node: Node::Token(token.id.clone()),
                item: DrawItem::Sprite(Sprite {
                    texture,
                    center: a.position,
                    size: Vec2::splat(a.size),
                    rotation: a.rotation,
                    tint: a.tint.unwrap_or(fallback_tint),
                    alpha: a.opacity,
                }),
            });
            if self.selection.contains(&token.id) {
                let radius = a.size * 0.5 + self.options.ring_padding;
                out.push(shape(
                    Node::SelectionRing(token.id.clone()),
                    Shape::Ring { center: a.position, radius, width: RING_WIDTH, color: Color::SELECTION },
                ));
            }
        }
        out
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    /// Drop every token, light and layer, then park the camera.
    pub fn dispose(&mut self) {
        let (tokens, lights) = (self.tokens.len(), self.lights.len());
        self.gestures = Gestures::default();
        self.selection.clear();
        self.clipboard.clear();
        self.tokens.clear();
        self.lights.clear();
        self.layers.clear();
        self.grid_lines.clear();
        self.background = Background::default();
        self.camera.stop();
        self.events.clear();
        self.texture_requests.clear();
        tracing::debug!(tokens, lights, "scene disposed");
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

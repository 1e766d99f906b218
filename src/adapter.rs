// =============================================================================
// ADAPTER.RS — Public map view: lifecycle, async API and event dispatch
//
// One `Adapter` per map view. Construction is synchronous; initialization
// (surface creation) runs on the host's single-threaded executor and is
// exposed as a shared `ready` future. Every async mutator awaits it first and
// silently does nothing unless the adapter ended up `Ready`.
//
//   Uninitialized -> Initializing -> Ready -> Destroying -> Destroyed
//                          \-> Failed
//
// The scene lives behind a `RefCell`. Borrows never span an `.await`, and
// events are dispatched only after the borrow is released, so handlers may
// call straight back into the adapter.
// =============================================================================

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use futures::task::{LocalSpawn, LocalSpawnExt};
use glam::Vec2;
use serde_json::Value;

use crate::camera::CameraState;
use crate::config::AdapterOptions;
use crate::error::AdapterError;
use crate::events::{Event, EventBus, EventKind, Subscription};
use crate::grid::{GridOptions, GridSettings};
use crate::input::{Cursor, PointerEvent, Tool};
use crate::layers::{LayerInfo, LayerOptions};
use crate::overlay::{FogOptions, FogSettings, LightRecord, LightSpec};
use crate::render::{Frame, Host, ResizeObserver, Surface};
use crate::scene::{Scene, TextureRequest};
use crate::texture::{TextureCache, TextureSource};
use crate::token::{TokenPatch, TokenRecord, TokenSpec};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Destroying,
    Destroyed,
    Failed,
}

type ReadyFuture = Shared<LocalBoxFuture<'static, Result<(), AdapterError>>>;
type TeardownFuture = Shared<LocalBoxFuture<'static, ()>>;

struct State {
    lifecycle: Lifecycle,
    destroy_requested: bool,
    scene: Option<Scene>,
    surface: Option<Box<dyn Surface>>,
    observer: Option<Box<dyn ResizeObserver>>,
}

struct Inner {
    host: Rc<dyn Host>,
    spawner: Rc<dyn LocalSpawn>,
    bus: Rc<EventBus>,
    textures: TextureCache,
    options: AdapterOptions,
    state: RefCell<State>,
    ready: ReadyFuture,
    teardown: RefCell<Option<TeardownFuture>>,
}

/// Handle to one map view. Cheap to clone; clones share the view.
#[derive(Clone)]
pub struct Adapter {
    inner: Rc<Inner>,
}

impl Adapter {
    /// Create a map view inside `host`.
    ///
    /// Fails synchronously when the container is not connected or the
    /// options are unusable. Initialization starts on `spawner` right away;
    /// await [`ready`](Self::ready) to observe its outcome.
    pub fn new(
        host: Rc<dyn Host>,
        textures: Rc<dyn TextureSource>,
        spawner: Rc<dyn LocalSpawn>,
        options: AdapterOptions,
    ) -> Result<Self, AdapterError> {
        if !host.is_connected() {
            return Err(AdapterError::InvalidContainer("container is not connected".to_string()));
        }
        options.validate()?;

        let inner = Rc::new_cyclic(|weak: &Weak<Inner>| Inner {
            host,
            spawner,
            bus: EventBus::new(),
            textures: TextureCache::new(textures),
            options,
            state: RefCell::new(State {
                lifecycle: Lifecycle::Uninitialized,
                destroy_requested: false,
                scene: None,
                surface: None,
                observer: None,
            }),
            ready: initialize(weak.clone()).boxed_local().shared(),
            teardown: RefCell::new(None),
        });

        let ready = inner.ready.clone();
        if let Err(e) = inner.spawner.spawn_local(async move {
            let _ = ready.await;
        }) {
            tracing::warn!("could not start map initialization eagerly: {e}");
        }
        Ok(Self { inner })
    }

    /// Resolves once initialization finished. Every call observes the same
    /// outcome.
    pub fn ready(&self) -> impl Future<Output = Result<(), AdapterError>> + 'static {
        self.inner.ready.clone()
    }

    /// Tear the view down. Idempotent: every call, before or after `ready`
    /// resolves, returns the same teardown.
    pub fn destroy(&self) -> impl Future<Output = ()> + 'static {
        let mut slot = self.inner.teardown.borrow_mut();
        if let Some(teardown) = slot.as_ref() {
            return teardown.clone();
        }

        {
            let mut st = self.inner.state.borrow_mut();
            st.destroy_requested = true;
            if matches!(st.lifecycle, Lifecycle::Uninitialized | Lifecycle::Initializing | Lifecycle::Ready) {
                st.lifecycle = Lifecycle::Destroying;
            }
        }
        tracing::debug!("map teardown requested");

        let teardown = teardown(Rc::downgrade(&self.inner)).boxed_local().shared();
        *slot = Some(teardown.clone());
        let driver = teardown.clone();
        if let Err(e) = self.inner.spawner.spawn_local(driver) {
            tracing::warn!("could not start map teardown eagerly: {e}");
        }
        teardown
    }

    pub fn lifecycle(&self) -> Lifecycle { self.inner.state.borrow().lifecycle }
    pub fn options(&self) -> &AdapterOptions { &self.inner.options }

    // ── Plumbing ──────────────────────────────────────────────────────────────

    /// Await initialization; true if the adapter is usable afterwards.
    async fn when_ready(&self) -> bool {
        let _ = self.inner.ready.clone().await;
        self.lifecycle() == Lifecycle::Ready
    }

    /// Run `f` on the scene if the adapter is `Ready`, then flush queued
    /// events and texture loads.
    fn with_scene<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> Option<R> {
        let result = {
            let mut st = self.inner.state.borrow_mut();
            if st.lifecycle != Lifecycle::Ready {
                return None;
            }
            let scene = st.scene.as_mut()?;
            f(scene)
        };
        self.flush();
        Some(result)
    }

    fn read_scene<R>(&self, f: impl FnOnce(&Scene) -> R) -> Option<R> {
        let st = self.inner.state.borrow();
        if st.lifecycle != Lifecycle::Ready {
            return None;
        }
        st.scene.as_ref().map(f)
    }

    fn flush(&self) {
        let (events, requests) = {
            let mut st = self.inner.state.borrow_mut();
            let Some(scene) = st.scene.as_mut() else {
                return;
            };
            (scene.take_events(), scene.take_texture_requests())
        };
        for req in requests {
            self.spawn_texture_load(req);
        }
        for event in &events {
            self.inner.bus.emit(event);
        }
    }

    fn spawn_texture_load(&self, req: TextureRequest) {
        let load = self.inner.textures.load(&req.url);
        let weak = Rc::downgrade(&self.inner);
        let task = async move {
            let result = load.await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let applied = Adapter { inner }.with_scene(|scene| scene.apply_token_texture(&req, result));
            if applied != Some(true) {
                tracing::debug!(token = %req.token_id, url = %req.url, "discarding stale texture result");
            }
        };
        if let Err(e) = self.inner.spawner.spawn_local(task) {
            tracing::warn!("could not spawn texture load: {e}");
        }
    }

    fn on_resize(&self, width: u32, height: u32) {
        let mut st = self.inner.state.borrow_mut();
        if st.lifecycle != Lifecycle::Ready {
            return;
        }
        if let Some(surface) = st.surface.as_mut() {
            surface.resize(width, height);
        }
        if let Some(scene) = st.scene.as_mut() {
            scene.resize(Vec2::new(width as f32, height as f32));
        }
        tracing::debug!(width, height, "container resized");
    }

    // ── Map content ───────────────────────────────────────────────────────────

    /// Load (or with `None`, clear) the background and resize the world.
    /// Returns the new world size, or `None` when a newer load superseded
    /// this one or the adapter is not ready.
    pub async fn load_map(&self, url: Option<&str>, width: f32, height: f32) -> Option<Vec2> {
        if !self.when_ready().await {
            return None;
        }
        let url = url.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string);
        let generation = self.with_scene(|scene| scene.begin_map_load(url.as_deref()))?;
        let texture = match &url {
            Some(url) => Some(self.inner.textures.load(url).await),
            None => None,
        };
        self.with_scene(|scene| scene.finish_map_load(generation, texture, width, height)).flatten()
    }

    pub async fn set_grid(&self, opts: GridOptions) -> Option<GridSettings> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.set_grid(&opts))
    }

    // ── Tokens ────────────────────────────────────────────────────────────────

    /// Create a token, or fully re-apply one with the same id.
    pub async fn add_token(&self, spec: TokenSpec) -> Option<TokenRecord> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.upsert_token(&spec)).flatten()
    }

    /// Merge `patch` into an existing token.
    pub async fn update_token(&self, id: &str, patch: TokenPatch) -> Option<TokenRecord> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.update_token(id, &patch)).flatten()
    }

    pub async fn remove_token(&self, id: &str) -> Option<TokenRecord> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.remove_token(id)).flatten()
    }

    /// Shallow-merge `patch` into the token's opaque vision data.
    pub async fn set_token_vision(&self, id: &str, patch: Value) -> Option<Value> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.set_token_vision(id, patch)).flatten()
    }

    pub fn get_token(&self, id: &str) -> Option<TokenRecord> {
        self.read_scene(|scene| scene.token(id).map(|t| t.record())).flatten()
    }

    pub fn token_count(&self) -> usize {
        self.read_scene(Scene::token_count).unwrap_or(0)
    }

    /// Sorted ids of every token.
    pub fn token_ids(&self) -> Vec<String> {
        self.read_scene(Scene::token_ids).unwrap_or_default()
    }

    /// Draw z-index of a token, selection offset included.
    pub fn effective_z(&self, id: &str) -> Option<i32> {
        self.read_scene(|scene| scene.effective_z(id)).flatten()
    }

    // ── Selection & clipboard ─────────────────────────────────────────────────

    pub fn get_selection(&self) -> Vec<String> {
        self.read_scene(|scene| scene.selection.to_vec()).unwrap_or_default()
    }

    pub async fn set_selection<S: AsRef<str>>(&self, ids: &[S]) -> Vec<String> {
        if !self.when_ready().await {
            return Vec::new();
        }
        self.with_scene(|scene| scene.set_selection(ids)).unwrap_or_default()
    }

    pub async fn copy_selection(&self) -> Vec<TokenRecord> {
        if !self.when_ready().await {
            return Vec::new();
        }
        self.with_scene(Scene::copy_selection).unwrap_or_default()
    }

    /// Paste the clipboard so its centroid lands on `(x, y)`.
    pub async fn paste_at(&self, x: f32, y: f32) -> Vec<TokenRecord> {
        if !self.when_ready().await {
            return Vec::new();
        }
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        self.with_scene(|scene| scene.paste_at(Vec2::new(x, y), stamp)).unwrap_or_default()
    }

    /// Remove the selected tokens not on locked layers; returns their ids.
    pub async fn delete_selection(&self) -> Vec<String> {
        if !self.when_ready().await {
            return Vec::new();
        }
        self.with_scene(Scene::delete_selection).unwrap_or_default()
    }

    // ── Lights & fog ──────────────────────────────────────────────────────────

    pub async fn add_light(&self, spec: LightSpec) -> Option<LightRecord> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.upsert_light(&spec)).flatten()
    }

    pub async fn remove_light(&self, id: &str) -> bool {
        if !self.when_ready().await {
            return false;
        }
        self.with_scene(|scene| scene.remove_light(id)).unwrap_or(false)
    }

    pub fn get_light(&self, id: &str) -> Option<LightRecord> {
        self.read_scene(|scene| scene.light(id)).flatten()
    }

    pub async fn toggle_fog(&self, enabled: bool, opts: FogOptions) -> Option<FogSettings> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.toggle_fog(enabled, &opts))
    }

    // ── Layers ────────────────────────────────────────────────────────────────

    pub async fn create_layer(&self, opts: LayerOptions) -> Option<LayerInfo> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| scene.create_layer(&opts)).flatten()
    }

    pub async fn set_layer_visibility(&self, id: &str, visible: bool) -> bool {
        if !self.when_ready().await {
            return false;
        }
        self.with_scene(|scene| {
            scene.mark_dirty();
            scene.layers.set_visibility(id, visible)
        })
        .unwrap_or(false)
    }

    pub async fn lock_layer(&self, id: &str, locked: bool) -> bool {
        if !self.when_ready().await {
            return false;
        }
        self.with_scene(|scene| scene.layers.set_locked(id, locked)).unwrap_or(false)
    }

    pub async fn set_layer_z_index(&self, id: &str, z_index: i32) -> bool {
        if !self.when_ready().await {
            return false;
        }
        self.with_scene(|scene| {
            scene.mark_dirty();
            scene.layers.set_z_index(id, z_index)
        })
        .unwrap_or(false)
    }

    /// Every layer, bottom first.
    pub fn layers(&self) -> Vec<LayerInfo> {
        self.read_scene(|scene| scene.layers.ordered().cloned().collect()).unwrap_or_default()
    }

    // ── Camera ────────────────────────────────────────────────────────────────

    pub async fn center_on(&self, x: f32, y: f32, scale: Option<f32>) -> Option<CameraState> {
        if !self.when_ready().await {
            return None;
        }
        self.with_scene(|scene| {
            scene.camera.center_on(Vec2::new(x, y), scale);
            scene.mark_dirty();
            scene.camera.state()
        })
    }

    pub fn camera_state(&self) -> Option<CameraState> {
        self.read_scene(|scene| scene.camera.state())
    }

    pub fn world_to_screen(&self, p: Vec2) -> Option<Vec2> {
        self.read_scene(|scene| scene.camera.world_to_screen(p))
    }

    pub fn screen_to_world(&self, p: Vec2) -> Option<Vec2> {
        self.read_scene(|scene| scene.camera.screen_to_world(p))
    }

    pub fn world_size(&self) -> Option<Vec2> {
        self.read_scene(|scene| scene.world)
    }

    pub fn grid(&self) -> Option<GridSettings> {
        self.read_scene(|scene| scene.grid)
    }

    pub fn fog(&self) -> Option<FogSettings> {
        self.read_scene(|scene| scene.fog)
    }

    // ── Tools & pointer input ─────────────────────────────────────────────────

    /// `"select"` enables dragging; any other tool disables it.
    pub async fn set_tool(&self, tool: impl Into<Tool>) -> bool {
        let tool = tool.into();
        if !self.when_ready().await {
            return false;
        }
        self.with_scene(|scene| scene.set_tool(tool)).is_some()
    }

    pub fn cursor(&self) -> Cursor {
        self.read_scene(Scene::cursor).unwrap_or(Cursor::Default)
    }

    pub fn pointer_down(&self, ev: PointerEvent) {
        self.with_scene(|scene| scene.pointer_down(ev));
    }

    pub fn pointer_move(&self, ev: PointerEvent) {
        self.with_scene(|scene| scene.pointer_move(ev));
    }

    pub fn pointer_up(&self, ev: PointerEvent) {
        self.with_scene(|scene| scene.pointer_up(ev));
    }

    /// Release outside the container; ends drags exactly like `pointer_up`.
    pub fn pointer_up_outside(&self, ev: PointerEvent) {
        self.pointer_up(ev);
    }

    pub fn pointer_cancel(&self, ev: PointerEvent) {
        self.with_scene(|scene| scene.pointer_cancel(ev));
    }

    pub fn wheel(&self, screen_point: Vec2, delta: f32) {
        self.with_scene(|scene| scene.wheel(screen_point, delta));
    }

    // ── Events ────────────────────────────────────────────────────────────────

    pub fn on(&self, kind: EventKind, handler: impl Fn(&Event) + 'static) -> Subscription {
        self.inner.bus.on(kind, handler)
    }

    pub fn off(&self, sub: &Subscription) -> bool {
        self.inner.bus.off(sub)
    }

    // ── Frames ────────────────────────────────────────────────────────────────

    /// Advance camera inertia by `dt` seconds and present a frame if
    /// anything changed. Returns true if a frame was presented.
    pub fn tick(&self, dt: f32) -> bool {
        let mut st = self.inner.state.borrow_mut();
        if st.lifecycle != Lifecycle::Ready {
            return false;
        }
        let State { scene, surface, .. } = &mut *st;
        let (Some(scene), Some(surface)) = (scene.as_mut(), surface.as_mut()) else {
            return false;
        };
        if scene.camera.tick(dt) {
            scene.mark_dirty();
        }
        if !scene.take_dirty() {
            return false;
        }
        match surface.present(&scene.build_frame()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("frame not presented: {e}");
                false
            }
        }
    }

    /// The current display list, without presenting it.
    pub fn frame(&self) -> Option<Frame> {
        self.read_scene(Scene::build_frame)
    }
}

// ── Initialization & teardown ─────────────────────────────────────────────────

fn discard_surface(mut surface: Box<dyn Surface>) {
    if let Err(e) = surface.destroy() {
        tracing::warn!("failed to destroy unused surface: {e}");
    }
}

async fn initialize(weak: Weak<Inner>) -> Result<(), AdapterError> {
    let (host, screen) = {
        let inner = weak.upgrade().ok_or(AdapterError::Destroyed)?;
        let mut st = inner.state.borrow_mut();
        if st.destroy_requested {
            return Err(AdapterError::Destroyed);
        }
        st.lifecycle = Lifecycle::Initializing;
        tracing::debug!("map initializing");

        let (w, h) = inner.host.size();
        let fallback = inner.options.min_world_size;
        let axis = |v: u32| if v == 0 { fallback } else { v as f32 };
        (Rc::clone(&inner.host), Vec2::new(axis(w), axis(h)))
    };

    let created = host.create_surface(screen.x as u32, screen.y as u32).await;

    let Some(inner) = weak.upgrade() else {
        if let Ok(surface) = created {
            discard_surface(surface);
        }
        return Err(AdapterError::Destroyed);
    };

    let surface = match created {
        Ok(surface) => surface,
        Err(e) => {
            inner.state.borrow_mut().lifecycle = Lifecycle::Failed;
            tracing::error!("map initialization failed: {e}");
            return Err(AdapterError::Surface(e));
        }
    };

    if inner.state.borrow().destroy_requested {
        tracing::debug!("destroyed during initialization; discarding surface");
        discard_surface(surface);
        return Err(AdapterError::Destroyed);
    }

    if let Err(e) = host.attach(&*surface) {
        discard_surface(surface);
        inner.state.borrow_mut().lifecycle = Lifecycle::Failed;
        tracing::error!("map initialization failed: {e}");
        return Err(AdapterError::Surface(e));
    }

    let resize_target = weak.clone();
    let observer = host.observe_resize(Rc::new(move |w: u32, h: u32| {
        if let Some(inner) = resize_target.upgrade() {
            Adapter { inner }.on_resize(w, h);
        }
    }));

    let mut scene = Scene::new(inner.options.clone(), screen, inner.textures.placeholder());
    let mut surface = surface;
    if let Err(e) = surface.present(&scene.build_frame()) {
        tracing::warn!("initial frame not presented: {e}");
    }
    scene.take_dirty();

    let mut st = inner.state.borrow_mut();
    st.scene = Some(scene);
    st.surface = Some(surface);
    st.observer = Some(observer);
    st.lifecycle = Lifecycle::Ready;
    tracing::info!(width = screen.x, height = screen.y, "map surface ready");
    Ok(())
}

async fn teardown(weak: Weak<Inner>) {
    let Some(ready) = weak.upgrade().map(|inner| inner.ready.clone()) else {
        return;
    };
    if let Err(e) = ready.await {
        tracing::debug!("tearing down after failed initialization: {e}");
    }
    if let Some(inner) = weak.upgrade() {
        inner.cleanup();
    }
}

impl Inner {
    /// Release everything in order; a failing step does not stop the rest.
    fn cleanup(&self) {
        let (observer, scene, surface) = {
            let mut st = self.state.borrow_mut();
            st.lifecycle = Lifecycle::Destroying;
            (st.observer.take(), st.scene.take(), st.surface.take())
        };

        if let Some(mut observer) = observer {
            if let Err(e) = observer.disconnect() {
                tracing::warn!("resize observer disconnect failed: {e}");
            }
        }
        if let Some(mut scene) = scene {
            scene.dispose();
        }
        if let Some(mut surface) = surface {
            if let Err(e) = self.host.detach(&*surface) {
                tracing::warn!("surface detach failed: {e}");
            }
            if let Err(e) = surface.destroy() {
                tracing::warn!("surface destroy failed: {e}");
            }
        }
        self.textures.clear();
        self.bus.clear();

        self.state.borrow_mut().lifecycle = Lifecycle::Destroyed;
        tracing::info!("map surface destroyed");
    }
}

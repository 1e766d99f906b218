// =============================================================================
// HEADLESS.RS — In-memory host, surface and texture source
//
// Used by the demo binary and the test suites. The host records what was
// attached and presented; the texture source serves bytes from a map. Both
// can be held open with a gate to exercise interleavings around `.await`.
// =============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, Shared};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::SurfaceError;
use crate::render::{Frame, Host, ResizeCallback, ResizeObserver, Surface, SurfaceFuture};
use crate::texture::{FetchFuture, TextureSource};

// ── Host ──────────────────────────────────────────────────────────────────────

struct HostState {
    size: (u32, u32),
    connected: bool,
    next_id: u64,
    attached: Vec<u64>,
    created: usize,
    destroyed: usize,
    presented: usize,
    last_frame: Option<Frame>,
    fail_next: Option<SurfaceError>,
    gate: Option<oneshot::Receiver<()>>,
    observers: Vec<(u64, ResizeCallback)>,
}

/// A container that lives entirely in memory. Clones share state.
#[derive(Clone)]
pub struct HeadlessHost {
    state: Rc<RefCell<HostState>>,
}

impl HeadlessHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(HostState {
                size: (width, height),
                connected: true,
                next_id: 1,
                attached: Vec::new(),
                created: 0,
                destroyed: 0,
                presented: 0,
                last_frame: None,
                fail_next: None,
                gate: None,
                observers: Vec::new(),
            })),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    /// Make the next `create_surface` fail with `err`.
    pub fn fail_next_surface(&self, err: SurfaceError) {
        self.state.borrow_mut().fail_next = Some(err);
    }

    /// Hold the next `create_surface` open until the returned sender fires
    /// (or is dropped).
    pub fn hold_next_surface(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().gate = Some(rx);
        tx
    }

    /// Change the container size and notify every resize observer.
    pub fn resize(&self, width: u32, height: u32) {
        let callbacks: Vec<ResizeCallback> = {
            let mut st = self.state.borrow_mut();
            st.size = (width, height);
            st.observers.iter().map(|(_, cb)| Rc::clone(cb)).collect()
        };
        for cb in callbacks {
            cb(width, height);
        }
    }

    pub fn attached_count(&self) -> usize { self.state.borrow().attached.len() }
    pub fn surfaces_created(&self) -> usize { self.state.borrow().created }
    pub fn surfaces_destroyed(&self) -> usize { self.state.borrow().destroyed }
    pub fn frames_presented(&self) -> usize { self.state.borrow().presented }
    pub fn observer_count(&self) -> usize { self.state.borrow().observers.len() }

    pub fn last_frame(&self) -> Option<Frame> {
        self.state.borrow().last_frame.clone()
    }
}

impl Host for HeadlessHost {
    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn size(&self) -> (u32, u32) {
        self.state.borrow().size
    }

    fn create_surface(&self, width: u32, height: u32) -> SurfaceFuture {
        let mut st = self.state.borrow_mut();
        if let Some(err) = st.fail_next.take() {
            return future::ready(Err(err)).boxed_local();
        }
        let id = st.next_id;
        st.next_id += 1;
        st.created += 1;
        let gate = st.gate.take();
        let surface = HeadlessSurface { id, size: (width, height), host: Rc::downgrade(&self.state), destroyed: false };
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(Box::new(surface) as Box<dyn Surface>)
        }
        .boxed_local()
    }

    fn attach(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let mut st = self.state.borrow_mut();
        if !st.connected {
            return Err(SurfaceError::Attach("container is not connected".to_string()));
        }
        if !st.attached.contains(&surface.id()) {
            st.attached.push(surface.id());
        }
        Ok(())
    }

    fn detach(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let mut st = self.state.borrow_mut();
        let before = st.attached.len();
        st.attached.retain(|id| *id != surface.id());
        if st.attached.len() == before {
            return Err(SurfaceError::Detach(format!("surface {} is not attached", surface.id())));
        }
        Ok(())
    }

    fn observe_resize(&self, callback: ResizeCallback) -> Box<dyn ResizeObserver> {
        let mut st = self.state.borrow_mut();
        let id = st.next_id;
        st.next_id += 1;
        st.observers.push((id, callback));
        Box::new(HeadlessObserver { id, host: Rc::downgrade(&self.state) })
    }
}

struct HeadlessObserver {
    id: u64,
    host: Weak<RefCell<HostState>>,
}

impl ResizeObserver for HeadlessObserver {
    fn disconnect(&mut self) -> Result<(), SurfaceError> {
        if let Some(host) = self.host.upgrade() {
            host.borrow_mut().observers.retain(|(id, _)| *id != self.id);
        }
        Ok(())
    }
}

// ── Surface ───────────────────────────────────────────────────────────────────

/// Records frames into its host instead of drawing them.
pub struct HeadlessSurface {
    id: u64,
    size: (u32, u32),
    host: Weak<RefCell<HostState>>,
    destroyed: bool,
}

impl Surface for HeadlessSurface {
    fn id(&self) -> u64 { self.id }
    fn size(&self) -> (u32, u32) { self.size }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn present(&mut self, frame: &Frame) -> Result<(), SurfaceError> {
        if self.destroyed {
            return Err(SurfaceError::Lost(format!("surface {} was destroyed", self.id)));
        }
        if let Some(host) = self.host.upgrade() {
            let mut st = host.borrow_mut();
            st.presented += 1;
            st.last_frame = Some(frame.clone());
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), SurfaceError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        if let Some(host) = self.host.upgrade() {
            host.borrow_mut().destroyed += 1;
        }
        Ok(())
    }
}

// ── Texture source ────────────────────────────────────────────────────────────

type Gate = Shared<oneshot::Receiver<()>>;

#[derive(Default)]
struct SourceState {
    assets: HashMap<String, Vec<u8>>,
    failures: HashMap<String, String>,
    fetches: HashMap<String, usize>,
    gate: Option<Gate>,
}

/// Serves texture bytes from memory. Unknown urls fail like a 404.
#[derive(Clone, Default)]
pub struct MemoryTextureSource {
    state: Rc<RefCell<SourceState>>,
}

impl MemoryTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        let url = url.into();
        let mut st = self.state.borrow_mut();
        st.failures.remove(&url);
        st.assets.insert(url, bytes);
    }

    /// Make fetches of `url` fail with `reason`.
    pub fn fail(&self, url: impl Into<String>, reason: impl Into<String>) {
        let url = url.into();
        let mut st = self.state.borrow_mut();
        st.assets.remove(&url);
        st.failures.insert(url, reason.into());
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.state.borrow().fetches.get(url).copied().unwrap_or(0)
    }

    /// Hold every fetch started from now on until the sender fires. Results
    /// are looked up when the gate opens.
    pub fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().gate = Some(rx.shared());
        tx
    }
}

impl TextureSource for MemoryTextureSource {
    fn fetch(&self, url: &str) -> FetchFuture {
        let gate = {
            let mut st = self.state.borrow_mut();
            *st.fetches.entry(url.to_string()).or_default() += 1;
            st.gate.clone()
        };
        let state = Rc::clone(&self.state);
        let url = url.to_string();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let st = state.borrow();
            if let Some(reason) = st.failures.get(&url) {
                return Err(reason.clone());
            }
            st.assets.get(&url).cloned().ok_or_else(|| format!("404 not found: {url}"))
        }
        .boxed_local()
    }
}

/// PNG bytes of a `width`×`height` image filled with `rgba`.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Result<Vec<u8>, image::ImageError> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

// =============================================================================
// TEXTURE.RS — Deduplicated asynchronous texture loading
//
// One shared future per url: concurrent and repeated requests observe the
// same load and the same `Rc<Texture>`. Failed loads are evicted so a later
// request retries. Blank urls resolve to a reusable 1×1 white placeholder.
// =============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture, Shared};
use image::RgbaImage;

use crate::error::TextureError;

/// Decoded RGBA8 image.
pub struct Texture {
    url: Option<String>,
    pixels: RgbaImage,
}

impl Texture {
    /// 1×1 opaque white; tinting it yields a flat-color quad.
    pub fn placeholder() -> Self {
        Self { url: None, pixels: RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])) }
    }

    /// Decode PNG/JPEG bytes fetched from `url`.
    pub fn decode(url: &str, bytes: &[u8]) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes).map_err(|e| TextureError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { url: Some(url.to_string()), pixels: img.to_rgba8() })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.url.is_none()
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("url", &self.url)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

pub type FetchFuture = LocalBoxFuture<'static, Result<Vec<u8>, String>>;

/// Where texture bytes come from (HTTP client, asset bundle, test fixture).
pub trait TextureSource {
    fn fetch(&self, url: &str) -> FetchFuture;
}

type LoadResult = Result<Rc<Texture>, TextureError>;
type SharedLoad = Shared<LocalBoxFuture<'static, LoadResult>>;
type Entries = Rc<RefCell<HashMap<String, (u64, SharedLoad)>>>;

/// Per-adapter texture cache. Lives until teardown; no other eviction.
pub struct TextureCache {
    source: Rc<dyn TextureSource>,
    entries: Entries,
    next_ticket: Cell<u64>,
    placeholder: Rc<Texture>,
}

impl TextureCache {
    pub fn new(source: Rc<dyn TextureSource>) -> Self {
        Self {
            source,
            entries: Rc::new(RefCell::new(HashMap::new())),
            next_ticket: Cell::new(0),
            placeholder: Rc::new(Texture::placeholder()),
        }
    }

    pub fn placeholder(&self) -> Rc<Texture> {
        Rc::clone(&self.placeholder)
    }

    /// Load `url`, joining any load already in flight or finished.
    pub fn load(&self, url: &str) -> impl Future<Output = LoadResult> + 'static {
        let url = url.trim();
        if url.is_empty() {
            return future::ready(Ok(self.placeholder())).boxed_local();
        }

        if let Some((_, existing)) = self.entries.borrow().get(url) {
            return existing.clone().boxed_local();
        }

        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);
        let entries = Rc::downgrade(&self.entries);
        let load = fetch_and_decode(Rc::clone(&self.source), entries, url.to_string(), ticket)
            .boxed_local()
            .shared();
        self.entries.borrow_mut().insert(url.to_string(), (ticket, load.clone()));
        load.boxed_local()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.borrow().contains_key(url.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

async fn fetch_and_decode(
    source: Rc<dyn TextureSource>,
    entries: Weak<RefCell<HashMap<String, (u64, SharedLoad)>>>,
    url: String,
    ticket: u64,
) -> LoadResult {
    let fetched = source.fetch(&url).await;
    let result = match fetched {
        Ok(bytes) => Texture::decode(&url, &bytes).map(Rc::new),
        Err(reason) => Err(TextureError::Fetch { url: url.clone(), reason }),
    };

    if let Err(e) = &result {
        tracing::warn!("texture load failed: {e}");
        // Evict only our own entry; a clear() may have let a newer load in.
        if let Some(entries) = entries.upgrade() {
            let mut entries = entries.borrow_mut();
            if entries.get(&url).is_some_and(|(t, _)| *t == ticket) {
                entries.remove(&url);
            }
        }
    } else {
        tracing::debug!(%url, "texture loaded");
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

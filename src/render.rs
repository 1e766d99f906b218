// =============================================================================
// RENDER.RS — Retained display list and the host/surface boundary
//
// The scene is flattened into a `Frame` each time something changes: one
// `LayerFrame` per visible layer, bottom first, each holding its draw
// commands in stacking order. A `Surface` turns frames into pixels; a `Host`
// owns the container surfaces are attached to.
// =============================================================================

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use glam::Vec2;

use crate::camera::{CameraState, CameraUniform};
use crate::color::Color;
use crate::error::SurfaceError;
use crate::geometry::Rect;
use crate::layers::LayerKind;
use crate::texture::Texture;

// ── Draw items ────────────────────────────────────────────────────────────────

/// Untextured vector primitive in world units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    Rect { rect: Rect, fill: Color },
    Circle { center: Vec2, radius: f32, fill: Color },
    Ring { center: Vec2, radius: f32, width: f32, color: Color },
    Line { from: Vec2, to: Vec2, width: f32, color: Color },
}

/// Textured quad centered on `center`. `rotation` is in radians.
#[derive(Clone)]
pub struct Sprite {
    pub texture: Rc<Texture>,
    pub center: Vec2,
    pub size: Vec2,
    pub rotation: f32,
    pub tint: Color,
    pub alpha: f32,
}

impl fmt::Debug for Sprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("texture", &self.texture.url())
            .field("center", &self.center)
            .field("size", &self.size)
            .field("rotation", &self.rotation)
            .field("alpha", &self.alpha)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum DrawItem {
    Shape(Shape),
    Sprite(Sprite),
}

/// What scene object a draw command came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Background,
    Placeholder,
    Grid,
    Fog,
    Token(String),
    SelectionRing(String),
    Light(String),
}

#[derive(Clone, Debug)]
pub struct DrawCommand {
    pub node: Node,
    pub item: DrawItem,
}

#[derive(Clone, Debug)]
pub struct LayerFrame {
    pub id: String,
    pub kind: LayerKind,
    pub z_index: i32,
    pub commands: Vec<DrawCommand>,
}

impl LayerFrame {
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.commands.iter().map(|c| &c.node)
    }
}

/// Everything a surface needs to draw one frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub view: CameraUniform,
    pub camera: CameraState,
    /// Visible layers, bottom first.
    pub layers: Vec<LayerFrame>,
}

impl Frame {
    pub fn layer(&self, id: &str) -> Option<&LayerFrame> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.layers.iter().flat_map(LayerFrame::nodes)
    }

    /// Token ids in draw order (bottom first).
    pub fn token_ids(&self) -> Vec<&str> {
        self.nodes()
            .filter_map(|n| match n {
                Node::Token(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn contains_token(&self, id: &str) -> bool {
        self.nodes().any(|n| matches!(n, Node::Token(t) if t == id))
    }

    /// Ids of tokens that currently show a selection ring.
    pub fn ringed_tokens(&self) -> Vec<&str> {
        self.nodes()
            .filter_map(|n| match n {
                Node::SelectionRing(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_placeholder(&self) -> bool {
        self.nodes().any(|n| *n == Node::Placeholder)
    }

    /// Rectangle covered by the fog overlay, if fog is drawn.
    pub fn fog_rect(&self) -> Option<(Rect, Color)> {
        self.layers.iter().flat_map(|l| &l.commands).find_map(|c| match (&c.node, &c.item) {
            (Node::Fog, DrawItem::Shape(Shape::Rect { rect, fill })) => Some((*rect, *fill)),
            _ => None,
        })
    }

    pub fn grid_line_count(&self) -> usize {
        self.nodes().filter(|n| **n == Node::Grid).count()
    }

    pub fn command_count(&self) -> usize {
        self.layers.iter().map(|l| l.commands.len()).sum()
    }
}

// ── Host boundary ─────────────────────────────────────────────────────────────

/// A render target inside the host container.
pub trait Surface {
    fn id(&self) -> u64;
    fn size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);
    fn present(&mut self, frame: &Frame) -> Result<(), SurfaceError>;
    fn destroy(&mut self) -> Result<(), SurfaceError>;
}

/// Handle for a resize subscription installed with [`Host::observe_resize`].
pub trait ResizeObserver {
    fn disconnect(&mut self) -> Result<(), SurfaceError>;
}

pub type SurfaceFuture = LocalBoxFuture<'static, Result<Box<dyn Surface>, SurfaceError>>;

/// Called with the new container size in pixels.
pub type ResizeCallback = Rc<dyn Fn(u32, u32)>;

/// The host container a map view lives in.
pub trait Host {
    /// False once the container has been removed from the host UI.
    fn is_connected(&self) -> bool;
    /// Container size in pixels; either axis may be zero before layout.
    fn size(&self) -> (u32, u32);
    fn create_surface(&self, width: u32, height: u32) -> SurfaceFuture;
    fn attach(&self, surface: &dyn Surface) -> Result<(), SurfaceError>;
    fn detach(&self, surface: &dyn Surface) -> Result<(), SurfaceError>;
    fn observe_resize(&self, callback: ResizeCallback) -> Box<dyn ResizeObserver>;
}

pub mod adapter;
pub mod camera;
pub mod clipboard;
pub mod color;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod grid;
pub mod headless;
pub mod input;
pub mod layers;
pub mod overlay;
pub mod placeholder;
pub mod render;
pub(crate) mod scene;
pub mod selection;
pub mod texture;
pub mod token;

pub use glam::Vec2;

pub use adapter::{Adapter, Lifecycle};
pub use camera::CameraState;
pub use color::{Color, ColorValue};
pub use config::AdapterOptions;
pub use error::{AdapterError, SurfaceError, TextureError};
pub use events::{Event, EventKind, Subscription};
pub use grid::{GridOptions, GridSettings};
pub use input::{Cursor, Modifiers, PointerEvent, Tool};
pub use layers::{Interaction, LayerInfo, LayerKind, LayerOptions};
pub use overlay::{FogOptions, FogSettings, LightRecord, LightSpec};
pub use render::{Frame, Host, Surface};
pub use texture::{Texture, TextureSource};
pub use token::{TokenPatch, TokenRecord, TokenSpec};

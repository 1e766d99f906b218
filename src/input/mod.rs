// =============================================================================
// INPUT — Pointer gestures: select, drag, pan, pinch and wheel zoom
//
// Pointers are tracked independently by id, so two fingers can drag two
// tokens at once. A pointer that lands on a token drags it; one that lands on
// the background pans the camera, and a second background pointer turns the
// pan into a pinch. Only the two earliest background pointers pinch. Camera panning is paused while any token drag is live.
// =============================================================================

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use glam::Vec2;

use crate::events::Event;
use crate::geometry::distance;
use crate::grid::snap_within_world;
use crate::scene::Scene;
use crate::selection::SelectMode;

/// Modifier keys held during a pointer press.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false, ctrl: false, meta: false };
    pub const SHIFT: Self = Self { shift: true, ctrl: false, meta: false };
    pub const CTRL: Self = Self { shift: false, ctrl: true, meta: false };

    pub fn select_mode(self) -> SelectMode {
        SelectMode::from_modifiers(self.shift, self.ctrl || self.meta)
    }
}

/// One pointer sample in screen pixels relative to the container.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub position: Vec2,
    pub modifiers: Modifiers,
    /// Seconds, from any monotonic clock. Used for pan velocity.
    pub timestamp: f32,
}

impl PointerEvent {
    pub fn new(pointer_id: u32, position: Vec2) -> Self {
        Self { pointer_id, position, modifiers: Modifiers::NONE, timestamp: 0.0 }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn at_time(mut self, seconds: f32) -> Self {
        self.timestamp = seconds;
        self
    }
}

/// Interaction mode. Only `Select` drags tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Select,
    Other(String),
}

impl FromStr for Tool {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "select" => Tool::Select,
            other => Tool::Other(other.to_string()),
        })
    }
}

impl From<&str> for Tool {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(tool) => tool,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Select => f.write_str("select"),
            Tool::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Crosshair,
    Grabbing,
}

// ── Gesture state ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub(crate) struct TokenDrag {
    pub id: String,
    pub instance: u64,
    /// Token position minus the pointer's world position at press time.
    pub grab_offset: Vec2,
}

#[derive(Clone, Debug)]
pub(crate) struct PanPointer {
    start: Vec2,
    last: Vec2,
    last_time: f32,
    /// Screen pixels per second.
    velocity: Vec2,
    /// Moved past the click slop at some point.
    moved: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Gestures {
    pub drags: HashMap<u32, TokenDrag>,
    pans: HashMap<u32, PanPointer>,
    /// Background pointer ids in press order. The first two pinch.
    pan_order: Vec<u32>,
    /// Screen distance between the two pinching pointers.
    pinch: Option<f32>,
}

impl Gestures {
    fn pinch_ids(&self) -> Option<(u32, u32)> {
        match self.pan_order.as_slice() {
            [a, b, ..] => Some((*a, *b)),
            _ => None,
        }
    }

    fn pinch_pair(&self) -> Option<(Vec2, Vec2)> {
        let (a, b) = self.pinch_ids()?;
        Some((self.pans.get(&a)?.last, self.pans.get(&b)?.last))
    }

    fn is_pinching(&self, pointer_id: u32) -> bool {
        self.pinch_ids().is_some_and(|(a, b)| pointer_id == a || pointer_id == b)
    }

    fn add_pan(&mut self, pointer_id: u32, pan: PanPointer) {
        self.pans.insert(pointer_id, pan);
        self.pan_order.retain(|id| *id != pointer_id);
        self.pan_order.push(pointer_id);
        self.pinch = self.pinch_pair().map(|(a, b)| distance(a, b));
    }

    fn remove_pan(&mut self, pointer_id: u32) -> Option<PanPointer> {
        let pan = self.pans.remove(&pointer_id)?;
        self.pan_order.retain(|id| *id != pointer_id);
        // A third pointer may take over; start its pinch from where it is.
        self.pinch = self.pinch_pair().map(|(a, b)| distance(a, b));
        Some(pan)
    }

    pub fn is_active(&self) -> bool {
        !self.drags.is_empty() || !self.pans.is_empty()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

impl Scene {
    /// Press: select and maybe start a drag on a token, otherwise start a pan.
    pub(crate) fn pointer_down(&mut self, ev: PointerEvent) {
        self.camera.stop();

        if let Some(id) = self.hit_test(ev.position) {
            if self.selection.select(&id, ev.modifiers.select_mode()) {
                self.mark_dirty();
                self.emit(Event::SelectionChange(self.selection.to_vec()));
            }
            let Some(token) = self.token(&id) else {
                return;
            };
            let draggable = self.tool == Tool::Select
                && !self.layers.is_locked(&token.layer)
                && self.selection.contains(&id);
            if draggable {
                let grab_offset = token.attrs.position - self.camera.screen_to_world(ev.position);
                let instance = token.instance;
                self.gestures.drags.insert(ev.pointer_id, TokenDrag { id, instance, grab_offset });
            }
            return;
        }

        self.gestures.add_pan(
            ev.pointer_id,
            PanPointer { start: ev.position, last: ev.position, last_time: ev.timestamp, velocity: Vec2::ZERO, moved: false },
        );
    }

    pub(crate) fn pointer_move(&mut self, ev: PointerEvent) {
        if let Some(drag) = self.gestures.drags.get(&ev.pointer_id).cloned() {
            let target = self.camera.screen_to_world(ev.position) + drag.grab_offset;
            match self.tokens.get_mut(&drag.id) {
                Some(token) if token.instance == drag.instance => {
                    token.attrs.position = target;
                    self.mark_dirty();
                }
                _ => {
                    self.gestures.drags.remove(&ev.pointer_id);
                }
            }
            return;
        }

        let slop = self.options.click_slop;
        let Some(pan) = self.gestures.pans.get_mut(&ev.pointer_id) else {
            return;
        };
        let delta = ev.position - pan.last;
        let dt = ev.timestamp - pan.last_time;
        if dt > 0.0 {
            pan.velocity = delta / dt;
        }
        pan.last = ev.position;
        pan.last_time = ev.timestamp;
        if distance(pan.start, ev.position) > slop {
            pan.moved = true;
        }

        if let Some(before) = self.gestures.pinch {
            if !self.gestures.is_pinching(ev.pointer_id) {
                return;
            }
            let Some((a, b)) = self.gestures.pinch_pair() else {
                return;
            };
            let now = distance(a, b);
            if before > 0.0 && now > 0.0 {
                self.camera.zoom_at(now / before, (a + b) * 0.5);
                self.mark_dirty();
            }
            self.gestures.pinch = Some(now);
        } else if self.gestures.drags.is_empty() {
            self.camera.pan_by(delta);
            self.mark_dirty();
        }
    }

    /// Release, including release outside the container.
    pub(crate) fn pointer_up(&mut self, ev: PointerEvent) {
        self.end_pointer(ev, true);
    }

    pub(crate) fn pointer_cancel(&mut self, ev: PointerEvent) {
        self.end_pointer(ev, false);
    }

    fn end_pointer(&mut self, ev: PointerEvent, allow_click: bool) {
        if self.gestures.drags.contains_key(&ev.pointer_id) {
            self.pointer_move(ev);
            self.finish_drag(ev.pointer_id);
            return;
        }

        let was_pinch = self.gestures.pinch.is_some();
        let Some(pan) = self.gestures.remove_pan(ev.pointer_id) else {
            return;
        };

        if was_pinch {
            return;
        }
        if !pan.moved {
            if allow_click && self.gestures.drags.is_empty() {
                self.clear_selection();
            }
        } else if self.gestures.pans.is_empty() {
            self.camera.release(pan.velocity);
        }
    }

    /// Snap the dragged token to its cell and report the move.
    pub(crate) fn finish_drag(&mut self, pointer_id: u32) {
        let Some(drag) = self.gestures.drags.remove(&pointer_id) else {
            return;
        };
        let (world, cell) = (self.world, self.cell_size());
        let Some(token) = self.tokens.get_mut(&drag.id) else {
            return;
        };
        if token.instance != drag.instance {
            return;
        }
        let snapped = snap_within_world(token.attrs.position, world, cell);
        token.attrs.position = snapped;
        self.mark_dirty();
        self.emit(Event::TokenMove { id: drag.id, x: snapped.x, y: snapped.y });
    }

    /// Wheel zoom around `screen_point`; positive delta zooms out.
    pub(crate) fn wheel(&mut self, screen_point: Vec2, delta: f32) {
        if !delta.is_finite() || delta == 0.0 {
            return;
        }
        self.camera.stop();
        self.camera.zoom_at((-delta * 0.001).exp(), screen_point);
        self.mark_dirty();
    }

    /// Switch tools. Leaving `Select` drops any drags in progress, snapped.
    pub(crate) fn set_tool(&mut self, tool: Tool) {
        if tool != Tool::Select {
            let pointers: Vec<u32> = self.gestures.drags.keys().copied().collect();
            for pointer_id in pointers {
                self.finish_drag(pointer_id);
            }
        }
        self.tool = tool;
    }

    pub(crate) fn cursor(&self) -> Cursor {
        if self.gestures.is_active() {
            Cursor::Grabbing
        } else if self.tool == Tool::Select {
            Cursor::Default
        } else {
            Cursor::Crosshair
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

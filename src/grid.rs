// =============================================================================
// GRID.RS — Square-grid math and grid line generation
//
// Cell (i, j) covers [i*cs, (i+1)*cs) × [j*cs, (j+1)*cs). Snapping moves a
// point to the center of the cell that contains it.
// =============================================================================

use glam::Vec2;
use serde::Deserialize;

use crate::color::{Color, ColorValue, color_or};
use crate::geometry::clamp_lo_wins;

/// Smallest accepted cell edge in world units.
pub const MIN_CELL_SIZE: f32 = 8.0;
/// Largest accepted cell edge in world units.
pub const MAX_CELL_SIZE: f32 = 512.0;

/// Current grid appearance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GridSettings {
    pub cell_size: f32,
    pub color: Color,
    pub opacity: f32,
    pub visible: bool,
}

/// Host request to restyle the grid. Unset fields keep their value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridOptions {
    pub cell_size: Option<f32>,
    pub opacity: Option<f32>,
    pub color: Option<ColorValue>,
    pub visible: Option<bool>,
}

impl GridSettings {
    /// Apply `opts`. Returns true when the cell size changed.
    pub fn apply(&mut self, opts: &GridOptions) -> bool {
        let before = self.cell_size;
        match opts.cell_size.map(sanitize_cell_size) {
            Some(Some(cs)) => self.cell_size = cs,
            Some(None) => tracing::warn!("ignoring invalid grid cell size"),
            None => {}
        }
        if let Some(o) = opts.opacity.filter(|o| o.is_finite()) {
            self.opacity = o.clamp(0.0, 1.0);
        }
        self.color = color_or(opts.color.as_ref(), self.color, "grid");
        if let Some(visible) = opts.visible {
            self.visible = visible;
        }
        before != self.cell_size
    }
}

/// A straight grid line in world units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GridLine {
    pub from: Vec2,
    pub to: Vec2,
}

/// Snap a single coordinate to the center of its cell.
#[inline]
pub fn snap_axis(v: f32, cell_size: f32) -> f32 {
    (v / cell_size).floor() * cell_size + cell_size * 0.5
}

/// Snap a world point to the center of the cell containing it.
pub fn snap_to_cell_center(p: Vec2, cell_size: f32) -> Vec2 {
    Vec2::new(snap_axis(p.x, cell_size), snap_axis(p.y, cell_size))
}

/// Integer cell coordinates of the cell containing `p`.
pub fn cell_of(p: Vec2, cell_size: f32) -> (i32, i32) {
    ((p.x / cell_size).floor() as i32, (p.y / cell_size).floor() as i32)
}

/// World-space center of cell `(col, row)`.
pub fn cell_center(col: i32, row: i32, cell_size: f32) -> Vec2 {
    Vec2::new(
        col as f32 * cell_size + cell_size * 0.5,
        row as f32 * cell_size + cell_size * 0.5,
    )
}

/// Keep a snapped point at least half a cell inside the world on each axis.
///
/// When the world is narrower than one cell the range inverts; the half-cell
/// lower bound wins.
pub fn clamp_to_world(p: Vec2, world: Vec2, cell_size: f32) -> Vec2 {
    let half = cell_size * 0.5;
    Vec2::new(
        clamp_lo_wins(p.x, half, world.x - half),
        clamp_lo_wins(p.y, half, world.y - half),
    )
}

/// Snap and clamp in one step: the drop position of a dragged token.
pub fn snap_within_world(p: Vec2, world: Vec2, cell_size: f32) -> Vec2 {
    clamp_to_world(snap_to_cell_center(p, cell_size), world, cell_size)
}

/// Sanitize a requested cell size: non-finite or non-positive input yields
/// `None`; anything else is clamped into the supported range.
pub fn sanitize_cell_size(requested: f32) -> Option<f32> {
    if !requested.is_finite() || requested <= 0.0 {
        return None;
    }
    Some(requested.clamp(MIN_CELL_SIZE, MAX_CELL_SIZE))
}

/// Vertical then horizontal lines covering `[0, world.x] × [0, world.y]`,
/// including both outer edges.
pub fn grid_lines(world: Vec2, cell_size: f32) -> Vec<GridLine> {
    let mut lines = Vec::new();
    if cell_size <= 0.0 || world.x <= 0.0 || world.y <= 0.0 {
        return lines;
    }
    let cols = (world.x / cell_size).floor() as u32;
    let rows = (world.y / cell_size).floor() as u32;

    for i in 0..=cols {
        let x = i as f32 * cell_size;
        lines.push(GridLine { from: Vec2::new(x, 0.0), to: Vec2::new(x, world.y) });
    }
    if (cols as f32 * cell_size) < world.x {
        lines.push(GridLine { from: Vec2::new(world.x, 0.0), to: Vec2::new(world.x, world.y) });
    }
    for j in 0..=rows {
        let y = j as f32 * cell_size;
        lines.push(GridLine { from: Vec2::new(0.0, y), to: Vec2::new(world.x, y) });
    }
    if (rows as f32 * cell_size) < world.y {
        lines.push(GridLine { from: Vec2::new(0.0, world.y), to: Vec2::new(world.x, world.y) });
    }
    lines
}

// ── Tests ──────────────────────────────────────────────────────────────────────

// =============================================================================
// GEOMETRY.RS — World-space primitives shared by hit-testing and layout
//
// - Axis-aligned rectangles (token bounds, world bounds)
// - Centroids (clipboard paste placement)
// - Distances (click slop, pinch gestures)
// =============================================================================

use glam::Vec2;

/// Axis-aligned rectangle in world units. `min` is the top-left corner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { min: origin, max: origin + size }
    }

    /// Square of edge `size` centered on `center`, the footprint of a token.
    pub fn centered_square(center: Vec2, size: f32) -> Self {
        let half = Vec2::splat(size * 0.5);
        Self { min: center - half, max: center + half }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Half-open containment: the max edges are excluded so adjacent
    /// rectangles never both claim a point.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }
}

/// True when both coordinates are finite.
#[inline]
pub fn is_finite_point(p: Vec2) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

/// Mean of all finite points. Falls back to the mean of every point (with
/// non-finite coordinates read as zero) when none are finite. Returns `None`
/// for an empty input.
pub fn centroid(points: &[Vec2]) -> Option<Vec2> {
    if points.is_empty() {
        return None;
    }
    let finite: Vec<Vec2> = points.iter().copied().filter(|p| is_finite_point(*p)).collect();
    let pool: Vec<Vec2> = if finite.is_empty() {
        points
            .iter()
            .map(|p| {
                Vec2::new(
                    if p.x.is_finite() { p.x } else { 0.0 },
                    if p.y.is_finite() { p.y } else { 0.0 },
                )
            })
            .collect()
    } else {
        finite
    };
    let sum = pool.iter().fold(Vec2::ZERO, |acc, p| acc + *p);
    Some(sum / pool.len() as f32)
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Clamp `v` into `[lo, hi]`, letting `lo` win when the range is inverted.
///
/// `f32::clamp` panics on `lo > hi`; worlds smaller than a grid cell produce
/// exactly that range, and the lower bound is the one that must hold.
#[inline]
pub fn clamp_lo_wins(v: f32, lo: f32, hi: f32) -> f32 {
    v.min(hi).max(lo)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

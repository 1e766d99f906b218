use glam::Vec2;

/// Camera uniform for GPU-backed surfaces: the combined view-projection matrix.
///
/// Layout (column-major, matching WGSL `mat4x4<f32>`):
/// ```text
/// col0: [sx,  0,   0,  0]
/// col1: [0,   sy,  0,  0]
/// col2: [0,   0,   1,  0]
/// col3: [tx,  ty,  0,  1]
/// ```
/// where `sx = 2z/w`, `sy = -2z/h`, `tx = -sx*cx`, `ty = -sy*cy`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    /// Column-major 4×4 view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    /// Raw bytes, ready for a uniform buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Speed (world units / second) under which pan inertia stops.
const INERTIA_STOP_SPEED: f32 = 5.0;

/// Snapshot of the camera for hosts (minimaps, persistence of the view).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CameraState {
    pub center: Vec2,
    pub zoom: f32,
    pub screen: Vec2,
    pub world: Vec2,
}

/// 2D camera over a bounded world: pan, zoom, fit and pan inertia.
///
/// `position` is the world point shown at the center of the screen. It is
/// always kept inside `[0, world.x] × [0, world.y]`.
#[derive(Clone, Debug)]
pub struct Camera {
    /// World-space point the camera is centered on.
    pub position: Vec2,
    /// Current scale (1.0 = one world unit per screen pixel).
    pub zoom: f32,
    pub(crate) min_zoom: f32,
    pub(crate) max_zoom: f32,
    /// Screen (container) size in pixels.
    pub(crate) screen: Vec2,
    /// World size in world units.
    pub(crate) world: Vec2,
    /// Inertial pan velocity in world units per second.
    pub(crate) velocity: Vec2,
    /// Velocity fraction retained after one second.
    pub(crate) deceleration: f32,
}

impl Camera {
    pub fn new(screen: Vec2, world: Vec2, min_zoom: f32, max_zoom: f32, deceleration: f32) -> Self {
        let mut cam = Self {
            position: world * 0.5,
            zoom: 1.0,
            min_zoom,
            max_zoom,
            screen,
            world,
            velocity: Vec2::ZERO,
            deceleration,
        };
        cam.fit_world();
        cam
    }

    pub fn state(&self) -> CameraState {
        CameraState { center: self.position, zoom: self.zoom, screen: self.screen, world: self.world }
    }

    pub fn world_size(&self) -> Vec2 {
        self.world
    }

    pub fn screen_size(&self) -> Vec2 {
        self.screen
    }

    // ── Transforms ────────────────────────────────────────────────────────────

    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        (p - self.position) * self.zoom + self.screen * 0.5
    }

    pub fn screen_to_world(&self, p: Vec2) -> Vec2 {
        (p - self.screen * 0.5) / self.zoom + self.position
    }

    // ── Movement ──────────────────────────────────────────────────────────────

    /// Pan by a screen-space delta (dragging the map right moves the view left).
    pub fn pan_by(&mut self, screen_delta: Vec2) {
        self.position -= screen_delta / self.zoom;
        self.clamp();
    }

    /// Multiply the zoom by `factor`, keeping the world point under
    /// `screen_point` fixed on screen.
    pub fn zoom_at(&mut self, factor: f32, screen_point: Vec2) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.screen_to_world(screen_point);
        self.zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        self.position = anchor - (screen_point - self.screen * 0.5) / self.zoom;
        self.clamp();
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
    }

    pub fn center_on(&mut self, p: Vec2, zoom: Option<f32>) {
        self.velocity = Vec2::ZERO;
        if let Some(z) = zoom {
            self.set_zoom(z);
        }
        if p.x.is_finite() && p.y.is_finite() {
            self.position = p;
        }
        self.clamp();
    }

    /// Keep the camera center inside the world rectangle.
    pub fn clamp(&mut self) {
        self.position.x = self.position.x.clamp(0.0, self.world.x.max(0.0));
        self.position.y = self.position.y.clamp(0.0, self.world.y.max(0.0));
    }

    /// Zoom so the whole world fits on screen and center it.
    pub fn fit_world(&mut self) {
        self.velocity = Vec2::ZERO;
        if self.world.x > 0.0 && self.world.y > 0.0 && self.screen.x > 0.0 && self.screen.y > 0.0 {
            let fit = (self.screen.x / self.world.x).min(self.screen.y / self.world.y);
            self.zoom = fit.clamp(self.min_zoom, self.max_zoom);
        }
        self.position = self.world * 0.5;
    }

    /// Container resize: keep the current center and zoom.
    pub fn resize_screen(&mut self, screen: Vec2) {
        self.screen = screen;
        self.clamp();
    }

    /// New world (map reload): recompute bounds, re-fit and re-center.
    pub fn set_world(&mut self, world: Vec2) {
        self.world = world;
        self.fit_world();
    }

    // ── Inertia ───────────────────────────────────────────────────────────────

    /// Start coasting at `screen_velocity` (pixels / second) after a pan ends.
    pub fn release(&mut self, screen_velocity: Vec2) {
        let v = -screen_velocity / self.zoom;
        self.velocity = if v.length() < INERTIA_STOP_SPEED { Vec2::ZERO } else { v };
    }

    pub fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
    }

    pub fn is_coasting(&self) -> bool {
        self.velocity != Vec2::ZERO
    }

    /// Advance pan inertia by `dt` seconds. Returns true if the camera moved.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.velocity == Vec2::ZERO || dt <= 0.0 {
            return false;
        }
        let before = self.position;
        self.position += self.velocity * dt;
        self.clamp();
        self.velocity *= self.deceleration.powf(dt);
        if self.velocity.length() < INERTIA_STOP_SPEED {
            self.velocity = Vec2::ZERO;
        }
        before != self.position
    }

    /// Build the GPU-ready `CameraUniform` for the current screen size.
    ///
    /// The matrix maps world-space coordinates so that `self.position` lands
    /// at the screen center, scaled by `self.zoom`:
    /// ```text
    /// x_ndc = sx * world_x + tx    (sx = 2z/w,  tx = -sx*cx)
    /// y_ndc = sy * world_y + ty    (sy = -2z/h, ty = -sy*cy)
    /// ```
    pub fn build_view_proj(&self) -> CameraUniform {
        let width = self.screen.x.max(1.0);
        let height = self.screen.y.max(1.0);
        let cx = self.position.x;
        let cy = self.position.y;
        let z = self.zoom.max(0.01);

        let sx = 2.0 * z / width;
        let sy = -2.0 * z / height;
        let tx = -sx * cx;
        let ty = -sy * cy;

        CameraUniform {
            view_proj: [
                [sx,  0.0, 0.0, 0.0], // col0
                [0.0, sy,  0.0, 0.0], // col1
                [0.0, 0.0, 1.0, 0.0], // col2
                [tx,  ty,  0.0, 1.0], // col3
            ],
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cam() -> Camera {
        Camera::new(Vec2::new(800.0, 600.0), Vec2::new(1600.0, 1200.0), 0.2, 5.0, 0.05)
    }

    #[test]
    fn fit_centers_and_scales_world() {
        let c = cam();
        assert_eq!(c.position, Vec2::new(800.0, 600.0));
        assert!((c.zoom - 0.5).abs() < 1e-6);
    }

    #[test]
    fn screen_world_roundtrip() {
        let mut c = cam();
        c.center_on(Vec2::new(300.0, 200.0), Some(2.0));
        let w = Vec2::new(321.0, 123.0);
        let back = c.screen_to_world(c.world_to_screen(w));
        assert!((back - w).length() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut c = cam();
        c.set_zoom(100.0);
        assert_eq!(c.zoom, 5.0);
        c.set_zoom(0.001);
        assert_eq!(c.zoom, 0.2);
    }

    #[test]
    fn zoom_at_keeps_anchor_fixed() {
        let mut c = cam();
        let anchor = Vec2::new(600.0, 200.0);
        let before = c.screen_to_world(anchor);
        c.zoom_at(1.5, anchor);
        let after = c.screen_to_world(anchor);
        assert!((before - after).length() < 1e-3);
    }

    #[test]
    fn pan_clamps_to_world() {
        let mut c = cam();
        c.pan_by(Vec2::new(1e6, 1e6));
        assert_eq!(c.position, Vec2::ZERO);
    }

    #[test]
    fn resize_preserves_center_but_new_world_does_not() {
        let mut c = cam();
        c.center_on(Vec2::new(100.0, 100.0), None);
        c.resize_screen(Vec2::new(1024.0, 768.0));
        assert_eq!(c.position, Vec2::new(100.0, 100.0));
        c.set_world(Vec2::new(1000.0, 800.0));
        assert_eq!(c.position, Vec2::new(500.0, 400.0));
    }

    #[test]
    fn inertia_decays_to_rest() {
        let mut c = cam();
        c.release(Vec2::new(-400.0, 0.0));
        assert!(c.is_coasting());
        let start = c.position;
        for _ in 0..600 {
            c.tick(1.0 / 60.0);
        }
        assert!(!c.is_coasting());
        assert!(c.position.x > start.x);
    }

    #[test]
    fn view_proj_maps_center_to_origin() {
        let c = cam();
        let u = c.build_view_proj();
        let x_ndc = u.view_proj[0][0] * c.position.x + u.view_proj[3][0];
        let y_ndc = u.view_proj[1][1] * c.position.y + u.view_proj[3][1];
        assert!(x_ndc.abs() < 1e-5 && y_ndc.abs() < 1e-5);
        assert_eq!(u.as_bytes().len(), 64);
    }
}

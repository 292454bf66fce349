use std::{fmt, sync::Arc};

use egui::{emath::TSTransform, mutex::RwLock, Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f32 = 0.02;
pub const MAX_ZOOM: f32 = 20.0;

/// Maps world coordinates onto the canvas: `screen = canvas.min + pan + world * zoom`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub zoom: f32,
    /// Screen offset of the world origin relative to the canvas top left.
    pub pan: Vec2,
    /// Screen rect the graph is drawn into.
    pub canvas: Rect,
}

impl Camera {
    /// World origin at the canvas centre, zoom 1.
    pub fn new(canvas: Rect) -> Self {
        Self {
            zoom: 1.0,
            pan: canvas.size() * 0.5,
            canvas,
        }
    }

    pub fn transform(&self) -> TSTransform {
        TSTransform::new(self.canvas.min.to_vec2() + self.pan, self.zoom)
    }

    pub fn world_to_screen(&self, pos: Pos2) -> Pos2 {
        self.transform() * pos
    }

    pub fn screen_to_world(&self, pos: Pos2) -> Pos2 {
        self.transform().inverse() * pos
    }

    pub fn world_to_screen_size(&self, size: f32) -> f32 {
        size * self.zoom
    }

    /// Part of the world currently inside the canvas.
    pub fn visible_world_rect(&self) -> Rect {
        self.transform().inverse() * self.canvas
    }

    /// Moves the canvas, keeping the world point at its centre.
    pub fn set_canvas(&mut self, canvas: Rect) {
        if canvas == self.canvas {
            return;
        }
        let center = self.screen_to_world(self.canvas.center());
        self.canvas = canvas;
        self.focus_on(center);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Scales by `factor` while the world point under `screen_pos` stays put.
    pub fn zoom_around(&mut self, screen_pos: Pos2, factor: f32) {
        let anchor = self.screen_to_world(screen_pos);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let moved = self.world_to_screen(anchor);
        self.pan += screen_pos - moved;
    }

    /// Centres `pos` in the canvas without changing zoom.
    pub fn focus_on(&mut self, pos: Pos2) {
        self.pan = self.canvas.size() * 0.5 - pos.to_vec2() * self.zoom;
    }

    /// Zooms and centres so `world` fits with `padding` (fraction of its size) around it.
    pub fn fit_to(&mut self, world: Rect, padding: f32) {
        let size = (world.size() * (1.0 + padding)).max(Vec2::splat(1.0));
        let zoom = (self.canvas.width() / size.x).min(self.canvas.height() / size.y);
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
        self.focus_on(world.center());
    }
}

/// Camera shared between the graph view and the minimap.
///
/// Holds `None` until the graph view has laid out its first frame.
#[derive(Clone, Default)]
pub struct CameraHandle(Arc<RwLock<Option<Camera>>>);

impl fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CameraHandle").field(&self.get()).finish()
    }
}

impl CameraHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Camera> {
        *self.0.read()
    }

    pub fn set(&self, camera: Camera) {
        *self.0.write() = Some(camera);
    }

    /// Applies `f` to the camera if there is one. Returns whether it ran.
    pub fn update(&self, f: impl FnOnce(&mut Camera)) -> bool {
        match self.0.write().as_mut() {
            Some(camera) => {
                f(camera);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Rect {
        Rect::from_min_size(Pos2::new(10.0, 20.0), Vec2::new(400.0, 300.0))
    }

    fn close(a: Pos2, b: Pos2) -> bool {
        a.distance(b) < 1e-3
    }

    #[test]
    fn origin_starts_centred() {
        let c = Camera::new(canvas());
        assert!(close(c.world_to_screen(Pos2::ZERO), canvas().center()));
    }

    #[test]
    fn screen_world_round_trip() {
        let mut c = Camera::new(canvas());
        c.zoom = 2.5;
        c.pan_by(Vec2::new(-30.0, 12.0));
        let p = Pos2::new(17.0, -4.0);
        assert!(close(c.screen_to_world(c.world_to_screen(p)), p));
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut c = Camera::new(canvas());
        let anchor = Pos2::new(100.0, 50.0);
        let world = c.screen_to_world(anchor);
        c.zoom_around(anchor, 3.0);
        assert_eq!(c.zoom, 3.0);
        assert!(close(c.world_to_screen(world), anchor));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut c = Camera::new(canvas());
        c.zoom_around(canvas().center(), 1e6);
        assert_eq!(c.zoom, MAX_ZOOM);
    }

    #[test]
    fn fit_to_contains_rect() {
        let mut c = Camera::new(canvas());
        let world = Rect::from_min_max(Pos2::new(-500.0, -100.0), Pos2::new(1500.0, 100.0));
        c.fit_to(world, 0.1);
        let visible = c.visible_world_rect();
        assert!(visible.expand(1e-2).contains_rect(world));
        assert!(close(c.world_to_screen(world.center()), canvas().center()));
    }

    #[test]
    fn handle_is_empty_until_set() {
        let h = CameraHandle::new();
        assert!(h.get().is_none());
        assert!(!h.update(|c| c.zoom = 2.0));
        h.set(Camera::new(canvas()));
        assert!(h.update(|c| c.zoom = 2.0));
        assert_eq!(h.get().map(|c| c.zoom), Some(2.0));
    }

    #[test]
    fn handle_debug_shows_current_camera() {
        let h = CameraHandle::new();
        assert_eq!(format!("{h:?}"), "CameraHandle(None)");
        h.set(Camera::new(canvas()));
        let shown = format!("{h:?}");
        assert!(shown.starts_with("CameraHandle(Some(Camera {"), "{shown}");
    }
}

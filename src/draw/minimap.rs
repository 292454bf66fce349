use egui::{Color32, CornerRadius, Pos2, Rect, Response, Sense, Shape, Stroke, StrokeKind, Ui, Vec2};

use super::{Camera, CameraHandle, ShapeSink};
use crate::{graph::GraphSnapshot, SettingsStyle};

const DOT_RADIUS: f32 = 1.5;

/// Uniform world to minimap mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinimapProjection {
    world: Rect,
    rect: Rect,
    scale: f32,
}

impl MinimapProjection {
    /// Fits `world` into `rect`, leaving `padding` (fraction of the rect size) on each side.
    pub fn new(world: Rect, rect: Rect, padding: f32) -> Self {
        let inner = rect.shrink2(rect.size() * padding);
        let size = world.size().max(Vec2::splat(f32::EPSILON));
        let scale = (inner.width() / size.x).min(inner.height() / size.y);
        Self { world, rect, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn world_to_minimap(&self, pos: Pos2) -> Pos2 {
        self.rect.center() + (pos - self.world.center()) * self.scale
    }

    pub fn minimap_to_world(&self, pos: Pos2) -> Pos2 {
        self.world.center() + (pos - self.rect.center()) / self.scale
    }
}

/// Draws the overview into `rect`: a dot per positioned visible node plus the main
/// viewport outline.
///
/// Returns `None` and draws nothing when there is no camera yet.
pub fn draw_minimap(
    graph: &GraphSnapshot,
    camera: Option<&Camera>,
    rect: Rect,
    padding: f32,
    style: &SettingsStyle,
    sink: &mut impl ShapeSink,
) -> Option<MinimapProjection> {
    let camera = camera?;
    let viewport = camera.visible_world_rect();
    let world = graph.bounds().map_or(viewport, |b| b.union(viewport));
    let proj = MinimapProjection::new(world, rect, padding);

    let (bg, frame) = match style.theme {
        egui::Theme::Dark => (Color32::from_black_alpha(160), Color32::from_gray(90)),
        egui::Theme::Light => (Color32::from_white_alpha(200), Color32::from_gray(170)),
    };
    sink.add(Shape::rect_filled(rect, CornerRadius::same(4), bg));

    for n in graph.visible_nodes() {
        if let Some(loc) = n.effective_location() {
            sink.add(Shape::circle_filled(
                proj.world_to_minimap(loc),
                DOT_RADIUS,
                style.color_for(n.kind()),
            ));
        }
    }

    let view = Rect::from_min_max(
        proj.world_to_minimap(viewport.min),
        proj.world_to_minimap(viewport.max),
    );
    sink.add(Shape::rect_stroke(
        view,
        CornerRadius::ZERO,
        Stroke::new(1.0, frame),
        StrokeKind::Inside,
    ));
    Some(proj)
}

/// Minimap widget. Clicking or dragging on it recentres the shared camera.
pub struct Minimap<'a> {
    graph: &'a GraphSnapshot,
    camera: &'a CameraHandle,
    style: &'a SettingsStyle,
    size: Vec2,
    padding: f32,
}

impl<'a> Minimap<'a> {
    pub fn new(graph: &'a GraphSnapshot, camera: &'a CameraHandle, style: &'a SettingsStyle) -> Self {
        Self {
            graph,
            camera,
            style,
            size: Vec2::new(180.0, 120.0),
            padding: 0.1,
        }
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    pub fn ui(self, ui: &mut Ui) -> Response {
        let (response, mut painter) = ui.allocate_painter(self.size, Sense::click_and_drag());
        let camera = self.camera.get();
        let Some(proj) = draw_minimap(
            self.graph,
            camera.as_ref(),
            response.rect,
            self.padding,
            self.style,
            &mut painter,
        ) else {
            return response;
        };

        if response.clicked() || response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                let target = proj.minimap_to_world(pos);
                self.camera.update(|c| c.focus_on(target));
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use egui::pos2;

    use super::*;
    use crate::{Graph, Node};

    fn graph() -> Graph {
        Graph::from_elements(
            [
                Node::new("a", "t").with_location(pos2(-100.0, 0.0)),
                Node::new("b", "t").with_location(pos2(300.0, 50.0)),
                Node::new("unplaced", "t"),
            ],
            [],
        )
        .unwrap()
    }

    fn rect() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), Vec2::new(200.0, 100.0))
    }

    #[test]
    fn skips_without_camera() {
        let mut shapes = Vec::new();
        let proj = draw_minimap(
            &graph(),
            None,
            rect(),
            0.1,
            &SettingsStyle::default(),
            &mut shapes,
        );
        assert!(proj.is_none());
        assert!(shapes.is_empty());
    }

    #[test]
    fn dots_and_viewport_stay_inside_padding() {
        let g = graph();
        let cam = Camera::new(Rect::from_min_size(pos2(0.0, 0.0), Vec2::splat(100.0)));
        let mut shapes = Vec::new();
        let proj = draw_minimap(
            &g,
            Some(&cam),
            rect(),
            0.1,
            &SettingsStyle::default(),
            &mut shapes,
        )
        .unwrap();

        // background, two dots, viewport outline
        assert_eq!(shapes.len(), 4);
        let inner = rect().shrink2(rect().size() * 0.1).expand(DOT_RADIUS + 1e-3);
        for s in &shapes[1..] {
            assert!(inner.contains_rect(s.visual_bounding_rect()), "{s:?}");
        }
        let back = proj.minimap_to_world(proj.world_to_minimap(pos2(12.0, -7.0)));
        assert!(back.distance(pos2(12.0, -7.0)) < 1e-3);
    }

    #[test]
    fn scale_is_uniform() {
        let world = Rect::from_min_max(pos2(0.0, 0.0), pos2(1000.0, 10.0));
        let proj = MinimapProjection::new(world, rect(), 0.1);
        assert!((proj.scale() - 160.0 / 1000.0).abs() < 1e-6);
        let a = proj.world_to_minimap(pos2(0.0, 0.0));
        let b = proj.world_to_minimap(pos2(0.0, 10.0));
        assert!((b.y - a.y - 10.0 * proj.scale()).abs() < 1e-4);
    }
}

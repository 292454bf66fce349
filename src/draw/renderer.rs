use std::collections::HashMap;

use egui::{
    epaint::TextShape, pos2, vec2, Color32, Context, CornerRadius, FontId, Painter, Pos2, Rect,
    Shape, Stroke, Theme, Vec2,
};
use log::{trace, warn};

use super::{Camera, Highlight};
use crate::{
    graph::GraphSnapshot, icons::ImageCache, Edge, Node, NodeId, SettingsRender, SettingsStyle,
};

/// Alpha of elements outside the highlight while a highlight is active.
pub const DIMMED_ALPHA: u8 = 0x7D;

const HIGHLIGHT_COLOR: Color32 = Color32::from_rgb(0xff, 0xb0, 0x20);
const LABEL_PADDING: Vec2 = vec2(5.0, 2.0);
const ICON_SCALE: f32 = 1.3;
/// Halo stroke at LOD zoom, where the full `halo_width` would swamp the dot.
const LOD_HALO_WIDTH: f32 = 1.0;

/// Receives shapes produced by [`draw_graph`].
pub trait ShapeSink {
    fn add(&mut self, shape: Shape);
}

impl ShapeSink for Vec<Shape> {
    fn add(&mut self, shape: Shape) {
        self.push(shape);
    }
}

impl ShapeSink for Painter {
    fn add(&mut self, shape: Shape) {
        Painter::add(self, shape);
    }
}

/// Everything one frame of drawing reads.
pub struct RenderContext<'a> {
    pub egui: &'a Context,
    pub graph: &'a GraphSnapshot,
    pub camera: &'a Camera,
    pub render: &'a SettingsRender,
    pub style: &'a SettingsStyle,
    pub highlight: &'a Highlight,
    pub icons: Option<&'a ImageCache>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub nodes_drawn: usize,
    pub edges_drawn: usize,
    pub nodes_culled: usize,
    pub edges_culled: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Normal,
    Dimmed,
    Highlighted,
}

impl Emphasis {
    fn apply(self, c: Color32) -> Color32 {
        match self {
            Self::Dimmed => Color32::from_rgba_unmultiplied(c.r(), c.g(), c.b(), DIMMED_ALPHA),
            Self::Normal | Self::Highlighted => c,
        }
    }
}

#[derive(Clone, Copy)]
struct Projected {
    pos: Pos2,
    radius: f32,
    in_view: bool,
}

/// Draws the visible part of the graph.
///
/// Nodes outside the canvas (plus `cull_margin`) are skipped; edges are drawn when at
/// least one endpoint is in view. Below `lod_zoom_threshold` nodes are plain circles
/// and edges have no arrowheads. Highlighted elements are drawn last.
pub fn draw_graph(ctx: &RenderContext<'_>, sink: &mut impl ShapeSink) -> RenderStats {
    let transform = ctx.camera.transform();
    let view = ctx.camera.canvas.expand(ctx.render.cull_margin);
    let zoom = ctx.camera.zoom;
    let lod = zoom < ctx.render.lod_zoom_threshold;
    let rest = if ctx.highlight.is_empty() {
        Emphasis::Normal
    } else {
        Emphasis::Dimmed
    };
    let mut stats = RenderStats::default();

    let mut projected: HashMap<&NodeId, Projected> = HashMap::new();
    for n in ctx.graph.visible_nodes() {
        let Some(loc) = n.effective_location() else {
            continue;
        };
        let pos = transform * loc;
        projected.insert(
            n.id(),
            Projected {
                pos,
                radius: ctx.style.node_radius(n.neighbor_count()) * zoom,
                in_view: view.contains(pos),
            },
        );
    }

    let mut top_edges = Vec::new();
    for e in ctx.graph.visible_edges() {
        let (Some(s), Some(t)) = (projected.get(e.source()), projected.get(e.target())) else {
            continue;
        };
        if !(s.in_view || t.in_view) {
            stats.edges_culled += 1;
            continue;
        }
        if ctx.highlight.contains_edge(e.id()) {
            top_edges.push((e, *s, *t));
            continue;
        }
        draw_edge(ctx, sink, e, *s, *t, lod, rest);
        stats.edges_drawn += 1;
    }
    for (e, s, t) in top_edges {
        draw_edge(ctx, sink, e, s, t, lod, Emphasis::Highlighted);
        stats.edges_drawn += 1;
    }

    let mut top_nodes = Vec::new();
    for n in ctx.graph.visible_nodes() {
        let Some(p) = projected.get(n.id()) else {
            continue;
        };
        if !p.in_view {
            stats.nodes_culled += 1;
            continue;
        }
        if ctx.highlight.contains_node(n.id()) {
            top_nodes.push((n, *p));
            continue;
        }
        draw_node(ctx, sink, n, *p, lod, rest);
        stats.nodes_drawn += 1;
    }
    for (n, p) in top_nodes {
        draw_node(ctx, sink, n, p, lod, Emphasis::Highlighted);
        stats.nodes_drawn += 1;
    }

    trace!("{stats:?}");
    stats
}

fn edge_color(theme: Theme) -> Color32 {
    match theme {
        Theme::Dark => Color32::from_gray(110),
        Theme::Light => Color32::from_gray(160),
    }
}

fn draw_edge(
    ctx: &RenderContext<'_>,
    sink: &mut impl ShapeSink,
    e: &Edge,
    s: Projected,
    t: Projected,
    lod: bool,
    emphasis: Emphasis,
) {
    let highlighted = emphasis == Emphasis::Highlighted;
    let color = if highlighted {
        HIGHLIGHT_COLOR
    } else {
        emphasis.apply(edge_color(ctx.style.theme))
    };
    let width = if highlighted { 2.0 } else { 1.0 };
    sink.add(Shape::line_segment([s.pos, t.pos], Stroke::new(width, color)));

    if lod {
        return;
    }

    let delta = t.pos - s.pos;
    let len = delta.length();
    if len <= t.radius + f32::EPSILON {
        return;
    }
    let dir = delta / len;
    // stop at the target's boundary when the tip sits at the end of the edge
    let along = (len * ctx.style.arrow_rel_pos).min(len - t.radius);
    let tip = s.pos + dir * along;
    let size = ctx.camera.world_to_screen_size(ctx.style.arrow_length).max(2.0);
    let base = tip - dir * size;
    let side = dir.rot90() * (size * 0.5);
    sink.add(Shape::convex_polygon(
        vec![tip, base + side, base - side],
        color,
        Stroke::NONE,
    ));

    if highlighted {
        if let Some(label) = e.label().filter(|l| !l.is_empty()) {
            let mid = s.pos + delta * 0.5;
            draw_label(ctx, sink, label, pos2(mid.x, mid.y + 2.0), Emphasis::Normal);
        }
    }
}

fn draw_node(
    ctx: &RenderContext<'_>,
    sink: &mut impl ShapeSink,
    n: &Node,
    p: Projected,
    lod: bool,
    emphasis: Emphasis,
) {
    let color = emphasis.apply(ctx.style.color_for(n.kind()));

    if lod {
        let r = p.radius * ctx.render.lod_radius_multiplier;
        sink.add(Shape::circle_filled(p.pos, r, color));
        if emphasis == Emphasis::Highlighted {
            sink.add(Shape::circle_stroke(
                p.pos,
                r + LOD_HALO_WIDTH,
                Stroke::new(LOD_HALO_WIDTH, HIGHLIGHT_COLOR),
            ));
        }
        return;
    }

    if emphasis == Emphasis::Highlighted {
        let w = ctx.render.halo_width;
        sink.add(Shape::circle_stroke(
            p.pos,
            p.radius + w,
            Stroke::new(w, HIGHLIGHT_COLOR),
        ));
    }
    sink.add(Shape::circle_filled(p.pos, p.radius, color));

    if n.collapsed() {
        sink.add(Shape::circle_stroke(
            p.pos,
            p.radius,
            Stroke::new(1.5, emphasis.apply(edge_color(ctx.style.theme))),
        ));
    }

    draw_icon(ctx, sink, n, p, emphasis);

    if !n.label().is_empty() {
        draw_label(
            ctx,
            sink,
            n.label(),
            pos2(p.pos.x, p.pos.y + p.radius + 2.0),
            emphasis,
        );
    }
}

/// Draws the icon of the node's kind if it is loaded, otherwise requests it.
/// A node whose icon cannot be drawn keeps its plain circle.
fn draw_icon(
    ctx: &RenderContext<'_>,
    sink: &mut impl ShapeSink,
    n: &Node,
    p: Projected,
    emphasis: Emphasis,
) {
    let (Some(icons), Some(key)) = (ctx.icons, ctx.style.icon_for(n.kind())) else {
        return;
    };
    let Some(icon) = icons.get_cached_image(key) else {
        icons.request(key);
        return;
    };
    match icon.texture(ctx.egui) {
        Ok(tex) => {
            let rect = Rect::from_center_size(p.pos, Vec2::splat(p.radius * ICON_SCALE));
            let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
            sink.add(Shape::image(
                tex.id(),
                rect,
                uv,
                emphasis.apply(Color32::WHITE),
            ));
        }
        Err(err) => {
            if icon.mark_draw_failed() {
                warn!("drawing node {} without icon: {err}", n.id());
            }
        }
    }
}

/// Rounded pill with the label, horizontally centred on `top_center`.
fn draw_label(
    ctx: &RenderContext<'_>,
    sink: &mut impl ShapeSink,
    text: &str,
    top_center: Pos2,
    emphasis: Emphasis,
) {
    let (bg, fg) = match ctx.style.theme {
        Theme::Dark => (Color32::from_black_alpha(190), Color32::from_gray(230)),
        Theme::Light => (Color32::from_white_alpha(210), Color32::from_gray(30)),
    };
    let fg = emphasis.apply(fg);
    let bg = if emphasis == Emphasis::Dimmed {
        bg.gamma_multiply(f32::from(DIMMED_ALPHA) / 255.0)
    } else {
        bg
    };

    let galley = ctx.egui.fonts(|f| {
        f.layout_no_wrap(
            text.to_string(),
            FontId::proportional(ctx.style.label_font_size),
            fg,
        )
    });
    let size = galley.size() + LABEL_PADDING * 2.0;
    let rect = Rect::from_min_size(pos2(top_center.x - size.x * 0.5, top_center.y), size);
    let rounding = CornerRadius::same((size.y * 0.5).min(f32::from(u8::MAX)) as u8);
    sink.add(Shape::rect_filled(rect, rounding, bg));
    sink.add(TextShape::new(rect.min + LABEL_PADDING, galley, fg).into());
}

#[cfg(test)]
mod tests {
    use egui::RawInput;

    use super::*;
    use crate::{
        icons::{Icon, ImageCache},
        settings::KindStyle,
        Edge, Graph, Node,
    };

    fn canvas() -> Rect {
        Rect::from_min_size(Pos2::ZERO, vec2(400.0, 400.0))
    }

    fn graph() -> Graph {
        Graph::from_elements(
            [
                Node::new("near", "person")
                    .with_label("Near")
                    .with_location(pos2(0.0, 0.0)),
                Node::new("far", "person")
                    .with_label("Far")
                    .with_location(pos2(5000.0, 5000.0)),
                Node::new("other", "person").with_location(pos2(50.0, 0.0)),
            ],
            [Edge::new("e", "near", "other")],
        )
        .unwrap()
    }

    fn render(
        graph: &Graph,
        camera: &Camera,
        highlight: &Highlight,
        style: &SettingsStyle,
        icons: Option<&ImageCache>,
    ) -> (Vec<Shape>, RenderStats) {
        let mut out = (Vec::new(), RenderStats::default());
        let ctx = Context::default();
        let _ = ctx.run(RawInput::default(), |ctx| {
            let mut shapes = Vec::new();
            let stats = draw_graph(
                &RenderContext {
                    egui: ctx,
                    graph,
                    camera,
                    render: &SettingsRender::default(),
                    style,
                    highlight,
                    icons,
                },
                &mut shapes,
            );
            out = (shapes, stats);
        });
        out
    }

    #[test]
    fn offscreen_node_is_culled() {
        let g = graph();
        let cam = Camera::new(canvas());
        let (shapes, stats) = render(
            &g,
            &cam,
            &Highlight::default(),
            &SettingsStyle::default(),
            None,
        );
        assert_eq!(stats.nodes_culled, 1);
        assert_eq!(stats.nodes_drawn, 2);

        let far = cam.world_to_screen(pos2(5000.0, 5000.0));
        let near_far = Rect::from_center_size(far, vec2(200.0, 200.0));
        assert!(shapes
            .iter()
            .all(|s| !s.visual_bounding_rect().intersects(near_far)));
    }

    #[test]
    fn edge_with_one_endpoint_in_view_is_drawn() {
        let mut g = graph();
        g.add_edge(Edge::new("nf", "near", "far")).unwrap();
        let cam = Camera::new(canvas());
        let (_, stats) = render(
            &g,
            &cam,
            &Highlight::default(),
            &SettingsStyle::default(),
            None,
        );
        assert_eq!(stats.edges_drawn, 2);
        assert_eq!(stats.edges_culled, 0);
    }

    #[test]
    fn low_zoom_draws_plain_circles() {
        let g = graph();
        let mut cam = Camera::new(canvas());
        cam.zoom = 0.1;
        let (shapes, stats) = render(
            &g,
            &cam,
            &Highlight::default(),
            &SettingsStyle::default(),
            None,
        );
        // one line for the edge, one circle per node, no labels or arrows
        assert_eq!(shapes.len(), stats.edges_drawn + stats.nodes_drawn);
        assert!(shapes.iter().all(|s| matches!(s, Shape::Circle(_) | Shape::LineSegment { .. })));
    }

    #[test]
    fn highlight_dims_the_rest_and_draws_on_top() {
        let g = graph();
        let cam = Camera::new(canvas());
        let style = SettingsStyle::default();
        let hl = Highlight::default().with_node(NodeId::from("near"));
        let (shapes, _) = render(&g, &cam, &hl, &style, None);

        let circles: Vec<_> = shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Circle(c) if c.fill != Color32::TRANSPARENT => Some(c),
                _ => None,
            })
            .collect();
        let last = circles.last().unwrap();
        assert_eq!(last.center, cam.world_to_screen(pos2(0.0, 0.0)));
        assert_eq!(last.fill, style.default_color);
        assert_eq!(circles[0].fill.a(), DIMMED_ALPHA);

        let halo = shapes.iter().any(|s| {
            matches!(s, Shape::Circle(c) if c.stroke.color == HIGHLIGHT_COLOR)
        });
        assert!(halo);
    }

    #[test]
    fn low_zoom_keeps_a_thin_halo_on_highlighted_node() {
        let g = graph();
        let mut cam = Camera::new(canvas());
        cam.zoom = 0.1;
        let hl = Highlight::default().with_node(NodeId::from("near"));
        let (shapes, _) = render(&g, &cam, &hl, &SettingsStyle::default(), None);

        let halos: Vec<_> = shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Circle(c) if c.stroke.color == HIGHLIGHT_COLOR => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(halos.len(), 1);
        assert_eq!(halos[0].center, cam.world_to_screen(pos2(0.0, 0.0)));
        assert!(halos[0].stroke.width > 0.0);
        assert!(halos[0].stroke.width < SettingsRender::default().halo_width);
    }

    #[test]
    fn labels_get_a_pill_below_the_node() {
        let g = graph();
        let cam = Camera::new(canvas());
        let (shapes, _) = render(
            &g,
            &cam,
            &Highlight::default(),
            &SettingsStyle::default(),
            None,
        );
        let center = cam.world_to_screen(pos2(0.0, 0.0));
        let pill = shapes
            .iter()
            .find_map(|s| match s {
                Shape::Rect(r) => Some(r.rect),
                _ => None,
            })
            .unwrap();
        assert!(pill.min.y > center.y);
        assert!((pill.center().x - center.x).abs() < 0.5);
        assert!(shapes.iter().any(|s| matches!(s, Shape::Text(_))));
    }

    #[test]
    fn corrupt_icon_degrades_to_circle() {
        let g = graph();
        let cam = Camera::new(canvas());
        let style = SettingsStyle::default().with_kind(
            "person",
            KindStyle {
                color: Color32::RED,
                icon: Some("person".to_string()),
            },
        );
        let cache = ImageCache::new(|key: &str| -> Result<Vec<u8>, crate::errors::IconError> {
            Err(crate::errors::IconError::Fetch {
                key: key.to_string(),
                reason: "unused".to_string(),
            })
        });
        let mut image = egui::ColorImage::from_rgba_unmultiplied([1, 1], &[0; 4]);
        image.pixels.clear();
        cache.insert(Icon::from_image("person", image));

        let (shapes, stats) = render(&g, &cam, &Highlight::default(), &style, Some(&cache));
        assert_eq!(stats.nodes_drawn, 2);
        assert!(!shapes.iter().any(|s| matches!(s, Shape::Mesh(_))));
        let filled = shapes
            .iter()
            .filter(|s| matches!(s, Shape::Circle(c) if c.fill == Color32::RED))
            .count();
        assert_eq!(filled, 2);
    }
}

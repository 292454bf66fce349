use egui::{CursorIcon, Id, Response, Sense, Ui, Widget};
use instant::Instant;
use log::{debug, trace};

use crate::{
    draw::{draw_graph, Camera, CameraHandle, Highlight, RenderContext},
    icons::ImageCache,
    pathfinder::PathResult,
    Graph, Node, NodeId, SettingsRender, SettingsStyle,
};

/// Padding around the graph when the camera is fitted on the first frame.
const FIT_PADDING: f32 = 0.1;
const SCROLL_ZOOM_SPEED: f32 = 0.002;

/// Widget showing a [`Graph`] and handling interaction with it.
///
/// Left click selects a node (Ctrl, Shift or Cmd adds to the selection), clicking the
/// background clears the selection, double click collapses or expands a node. Dragging
/// a node moves it, dragging the background pans, scrolling or pinching zooms around
/// the pointer.
///
/// The camera lives in a [`CameraHandle`] so a [`crate::Minimap`] can share it. On the
/// first frame, while the handle is still empty, the camera is fitted to the graph.
pub struct GraphView<'a> {
    graph: &'a mut Graph,
    camera: CameraHandle,
    style: SettingsStyle,
    render: SettingsRender,
    icons: Option<&'a ImageCache>,
    path: Option<&'a PathResult>,
}

impl<'a> GraphView<'a> {
    pub fn new(graph: &'a mut Graph, camera: &CameraHandle) -> Self {
        Self {
            graph,
            camera: camera.clone(),
            style: SettingsStyle::default(),
            render: SettingsRender::default(),
            icons: None,
            path: None,
        }
    }

    pub fn with_style(mut self, style: &SettingsStyle) -> Self {
        self.style = style.clamped();
        self
    }

    pub fn with_render(mut self, render: &SettingsRender) -> Self {
        self.render = render.clamped();
        self
    }

    pub fn with_icons(mut self, icons: &'a ImageCache) -> Self {
        self.icons = Some(icons);
        self
    }

    /// Path drawn highlighted on top of everything else.
    pub fn with_path(mut self, path: Option<&'a PathResult>) -> Self {
        self.path = path;
        self
    }

    fn radius(&self, n: &Node) -> f32 {
        self.style.node_radius(n.neighbor_count())
    }

    fn node_under(&self, camera: &Camera, screen_pos: egui::Pos2) -> Option<NodeId> {
        self.graph
            .node_at(camera.screen_to_world(screen_pos), |n| self.radius(n))
            .cloned()
    }

    fn handle_zoom(ui: &Ui, resp: &Response, camera: &mut Camera) {
        if !resp.hovered() {
            return;
        }
        let (pinch, scroll, pointer) = ui.input(|i| {
            (
                i.zoom_delta(),
                i.smooth_scroll_delta.y,
                i.pointer.hover_pos(),
            )
        });
        let factor = if pinch == 1.0 {
            (scroll * SCROLL_ZOOM_SPEED).exp()
        } else {
            pinch
        };
        if let (Some(pos), true) = (pointer, factor != 1.0) {
            camera.zoom_around(pos, factor);
        }
    }

    fn handle_drag(&mut self, ui: &Ui, resp: &Response, camera: &mut Camera) {
        let key = drag_key(resp.id);
        if resp.drag_started() {
            let origin = ui.input(|i| i.pointer.press_origin());
            let grabbed = origin.and_then(|p| self.node_under(camera, p));
            ui.data_mut(|d| d.insert_temp(key, grabbed));
        }

        if resp.dragged() {
            let grabbed = ui.data(|d| d.get_temp::<Option<NodeId>>(key)).flatten();
            let target = grabbed.as_ref().and_then(|id| {
                let loc = self.graph.node(id)?.effective_location()?;
                Some((id, loc + resp.drag_delta() / camera.zoom))
            });
            match target {
                Some((id, pos)) => {
                    if let Err(err) = self.graph.move_node(id, pos) {
                        debug!("drag target vanished: {err}");
                    }
                }
                None => camera.pan_by(resp.drag_delta()),
            }
        }

        if resp.drag_stopped() {
            ui.data_mut(|d| d.remove::<Option<NodeId>>(key));
        }
    }

    fn handle_click(&mut self, ui: &Ui, resp: &Response, hovered: Option<&NodeId>) {
        if resp.double_clicked() {
            if let Some(id) = hovered {
                match self.graph.toggle_collapse(id) {
                    Ok(collapsed) => debug!("node {id} collapsed: {collapsed}"),
                    Err(err) => debug!("{err}"),
                }
            }
            return;
        }
        if !resp.clicked() {
            return;
        }
        match hovered {
            Some(id) => {
                let multi = ui.input(|i| i.modifiers.ctrl || i.modifiers.shift || i.modifiers.command);
                if let Err(err) = self.graph.toggle_selection(id, multi) {
                    debug!("{err}");
                }
            }
            None => self.graph.clear_selection(),
        }
    }
}

fn drag_key(widget: Id) -> Id {
    widget.with("casegraph_dragged_node")
}

impl Widget for &mut GraphView<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let (resp, mut painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());

        let mut camera = self.camera.get().unwrap_or_else(|| {
            let mut c = Camera::new(resp.rect);
            if let Some(bounds) = self.graph.bounds() {
                c.fit_to(bounds, FIT_PADDING);
            }
            c
        });
        camera.set_canvas(resp.rect);

        let hovered = resp.hover_pos().and_then(|p| self.node_under(&camera, p));
        if hovered.is_some() {
            ui.ctx().set_cursor_icon(CursorIcon::PointingHand);
        }

        self.handle_drag(ui, &resp, &mut camera);
        GraphView::handle_zoom(ui, &resp, &mut camera);
        self.handle_click(ui, &resp, hovered.as_ref());

        let mut highlight = Highlight::default().with_selection(self.graph.selection());
        if let Some(id) = hovered {
            highlight = highlight.with_node(id);
        }
        if let Some(path) = self.path {
            highlight = highlight.with_path(path);
        }

        let started = Instant::now();
        let snapshot = self.graph.snapshot();
        let stats = draw_graph(
            &RenderContext {
                egui: ui.ctx(),
                graph: &snapshot,
                camera: &camera,
                render: &self.render,
                style: &self.style,
                highlight: &highlight,
                icons: self.icons,
            },
            &mut painter,
        );
        trace!(
            "frame drawn in {:.2}ms: {stats:?}",
            started.elapsed().as_secs_f32() * 1000.0
        );

        self.camera.set(camera);
        resp
    }
}

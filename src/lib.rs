//! Interactive investigation graph engine for egui.
//!
//! [`Graph`] holds entities and their relationships. [`LayoutEngine`] positions them on a
//! worker thread, [`GraphView`] and [`Minimap`] draw them and handle interaction, and
//! [`find_path`] answers shortest-path queries.

mod draw;
mod elements;
mod errors;
mod graph;
mod graph_view;
mod icons;
mod layouts;
mod pathfinder;
mod settings;

pub use self::draw::{
    draw_graph, draw_minimap, Camera, CameraHandle, Highlight, Minimap, MinimapProjection,
    RenderContext, RenderStats, ShapeSink, DIMMED_ALPHA, MAX_ZOOM, MIN_ZOOM,
};
pub use self::elements::{Edge, EdgeId, EdgePatch, Node, NodeId, NodePatch, Properties, Selection};
pub use self::errors::{GraphError, IconError, LayoutError};
pub use self::graph::{Filter, Graph, GraphSnapshot, Removed};
pub use self::graph_view::GraphView;
pub use self::icons::{FileIconSource, Icon, IconFuture, IconSource, ImageCache};
pub use self::layouts::{
    ForceSimulation, Hierarchical, LayoutAlgorithm, LayoutEdge, LayoutEngine, LayoutMessage,
    LayoutNode, LayoutOptions, LayoutResult, LayoutSnapshot, NodePosition, Orientation,
    RequestId, HIERARCHICAL_NODE_LIMIT,
};
pub use self::pathfinder::{find_path, PathResult};
pub use self::settings::{
    KindStyle, SettingRange, SettingsRender, SettingsSimulation, SettingsStyle,
};

mod camera;
mod highlight;
mod minimap;
mod renderer;

pub use self::camera::{Camera, CameraHandle, MAX_ZOOM, MIN_ZOOM};
pub use self::highlight::Highlight;
pub use self::minimap::{draw_minimap, Minimap, MinimapProjection};
pub use self::renderer::{draw_graph, RenderContext, RenderStats, ShapeSink, DIMMED_ALPHA};

mod edge;
mod ids;
mod node;
mod selection;

use std::collections::BTreeMap;

pub use self::edge::{Edge, EdgePatch};
pub use self::ids::{EdgeId, NodeId};
pub use self::node::{Node, NodePatch};
pub use self::selection::Selection;

/// Free-form entity properties carried opaquely by nodes and edges.
pub type Properties = BTreeMap<String, serde_json::Value>;

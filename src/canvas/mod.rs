//! The canvas graph model: nodes, edges, titles, and derived queries.
//!
//! This module owns the typed view of the replicated canvas. The raw store
//! knows nothing about graphs; everything graph-shaped — node/edge
//! invariants, dangling-edge tolerance, the title registry, centroid
//! queries — lives here.

mod edge;
mod model;
mod node;
mod registry;

pub use edge::CanvasEdge;
pub use model::{GraphModel, NodeFeatures};
pub use node::{CanvasNode, NodeActivity, NodeData, NodeRunState, NodeType, Position, Size};
pub use registry::RegistryEntry;

use miette::Diagnostic;
use thiserror::Error;

use crate::types::NodeId;

/// Failures raised by the graph model.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A read-modify-write targeted a node that is not in the map.
    #[error("node not found: {id}")]
    #[diagnostic(
        code(loomcanvas::canvas::node_missing),
        help("The node may have been deleted by a concurrent editor.")
    )]
    NodeMissing { id: NodeId },

    /// A stored value failed to encode or decode.
    #[error(transparent)]
    #[diagnostic(code(loomcanvas::canvas::codec))]
    Codec(#[from] serde_json::Error),
}

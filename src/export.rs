//! Canvas import/export payloads.
//!
//! The interchange format is plain JSON: a list of nodes (id, geometry,
//! encoded type, title, optional prose content, optional typed payload)
//! plus the raw edges. Exported positions are normalized relative to the
//! minimum bounding box so a payload pastes sensibly anywhere; an edge
//! whose node was deleted between capture and import is carried along and
//! tolerated, matching the dangling-edge invariant everywhere else.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rustc_hash::FxHashMap;

use crate::canvas::{CanvasEdge, CanvasNode, GraphError, GraphModel, NodeData, NodeType, Position, Size};
use crate::types::NodeId;

/// One exported node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: NodeId,
    pub position: Position,
    pub size: Size,
    /// Encoded node type; absent means `default`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    pub title: String,
    /// The node's prose text, when the exporter resolved it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Typed payload passthrough for fields like buddy refs and loop
    /// bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The interchange payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExportPayload {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<CanvasEdge>,
}

/// Export a canvas, normalizing positions to the minimum bounding box.
///
/// `contents` maps node ids to resolved prose; nodes without an entry
/// export without content. Output is sorted by node id so repeated exports
/// of the same canvas are identical.
#[must_use]
pub fn export_graph(model: &GraphModel, contents: &FxHashMap<NodeId, String>) -> ExportPayload {
    let mut nodes = model.nodes();
    nodes.sort_by_key(|n| n.id);

    let min_x = nodes
        .iter()
        .map(|n| n.position.x)
        .fold(f64::INFINITY, f64::min);
    let min_y = nodes
        .iter()
        .map(|n| n.position.y)
        .fold(f64::INFINITY, f64::min);
    let (offset_x, offset_y) = if nodes.is_empty() {
        (0.0, 0.0)
    } else {
        (min_x, min_y)
    };

    let export_nodes = nodes
        .into_iter()
        .map(|node| ExportNode {
            id: node.id,
            position: Position::new(node.position.x - offset_x, node.position.y - offset_y),
            size: node.size,
            node_type: match node.node_type() {
                NodeType::Default => None,
                ty => Some(ty.encode().to_string()),
            },
            title: model.title(node.id).ok().flatten().unwrap_or_default(),
            content: contents.get(&node.id).cloned(),
            data: serde_json::to_value(&node.data).ok(),
        })
        .collect();

    let mut edges = model.edges();
    edges.sort_by(|a, b| a.id.cmp(&b.id));

    ExportPayload {
        nodes: export_nodes,
        edges,
    }
}

/// Import a payload into a canvas.
///
/// Node ids are preserved, so importing the same payload twice is
/// idempotent. Edges referencing nodes absent from the payload are added
/// anyway — they are dangling, and dangling edges are filtered by every
/// traversal rather than rejected here.
pub fn import_payload(model: &GraphModel, payload: &ExportPayload) -> Result<(), GraphError> {
    for node in &payload.nodes {
        let node_type = node
            .node_type
            .as_deref()
            .map(NodeType::decode)
            .unwrap_or(NodeType::Default);
        let data = node
            .data
            .as_ref()
            .and_then(|raw| serde_json::from_value::<NodeData>(raw.clone()).ok())
            .unwrap_or_else(|| NodeData::for_type(node_type));
        let canvas_node = CanvasNode {
            id: node.id,
            position: node.position,
            size: node.size,
            data,
            run: Default::default(),
        };
        model.insert_node(&canvas_node, &node.title)?;
    }
    for edge in &payload.edges {
        model.add_edge(edge)?;
    }
    Ok(())
}

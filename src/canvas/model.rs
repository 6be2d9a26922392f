//! The graph model: typed accessors over the replicated canvas maps.
//!
//! `GraphModel` wraps three replicated maps — `nodes` and `edges` on the
//! canvas document, `registry` on the skill document — and enforces the
//! graph invariants on top of them:
//!
//! - node ids are the map keys, so they are unique per document;
//! - node creation inserts into the nodes map AND the registry in one
//!   logical operation;
//! - node deletion removes the node from both maps plus its incident edges;
//! - dangling edges (an endpoint no longer present) are filtered out of
//!   every traversal, never an error;
//! - node updates are whole-value read-modify-write, one `set` per logical
//!   change.
//!
//! The model performs no permission checks — that is the session's job
//! (see [`crate::session::GraphSession`]), which consults the scope gate
//! before calling in here.

use rustc_hash::{FxHashMap, FxHashSet};

use super::edge::CanvasEdge;
use super::node::{CanvasNode, NodeType, Position};
use super::registry::RegistryEntry;
use super::GraphError;
use crate::store::{Document, TypedMap};
use crate::types::{EdgeId, NodeId};

/// Feature flags derived from a node's type: which companion surfaces the
/// node owns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeFeatures {
    /// The node has a prose page (a rich-text document of its own).
    pub has_page: bool,
    /// The node embeds a nested canvas.
    pub has_canvas: bool,
}

/// Typed accessors over one canvas.
#[derive(Clone)]
pub struct GraphModel {
    nodes: TypedMap<CanvasNode>,
    edges: TypedMap<CanvasEdge>,
    registry: TypedMap<RegistryEntry>,
}

impl GraphModel {
    /// Map names on the canvas document.
    pub const NODES_MAP: &'static str = "nodes";
    pub const EDGES_MAP: &'static str = "edges";
    /// Map name on the skill document.
    pub const REGISTRY_MAP: &'static str = "registry";

    /// Build a model over an opened canvas document and its skill document.
    #[must_use]
    pub fn new(canvas_doc: &Document, skill_doc: &Document) -> Self {
        Self {
            nodes: canvas_doc.get_typed_map(Self::NODES_MAP),
            edges: canvas_doc.get_typed_map(Self::EDGES_MAP),
            registry: skill_doc.get_typed_map(Self::REGISTRY_MAP),
        }
    }

    // ------------------------------------------------------------------
    // Node CRUD
    // ------------------------------------------------------------------

    /// Insert a node and its registry entry in one logical operation.
    pub fn insert_node(&self, node: &CanvasNode, title: &str) -> Result<(), GraphError> {
        let key = node.id.to_string();
        self.nodes.set(&key, node)?;
        self.registry
            .set(&key, &RegistryEntry::new(node.id, title))?;
        Ok(())
    }

    /// Fetch a node by id.
    pub fn node(&self, id: NodeId) -> Result<Option<CanvasNode>, GraphError> {
        Ok(self.nodes.get(&id.to_string())?)
    }

    /// Whole-value read-modify-write update.
    ///
    /// The mutator receives the current value and the result is written back
    /// as ONE `set`, preserving last-write-wins at node granularity. Callers
    /// must fold every field change of a logical operation into one call.
    pub fn update_node(
        &self,
        id: NodeId,
        mutate: impl FnOnce(&mut CanvasNode),
    ) -> Result<CanvasNode, GraphError> {
        let key = id.to_string();
        let mut node = self
            .nodes
            .get(&key)?
            .ok_or(GraphError::NodeMissing { id })?;
        mutate(&mut node);
        node.id = id; // identity is never mutable
        self.nodes.set(&key, &node)?;
        Ok(node)
    }

    /// Remove a node, its registry entry, and every incident edge.
    ///
    /// Edge removal and node removal hit different maps and are not atomic;
    /// a concurrent reader may briefly observe an edge whose endpoint is
    /// gone, which every traversal here tolerates.
    pub fn remove_node(&self, id: NodeId) -> Result<(), GraphError> {
        let key = id.to_string();
        for edge in self.edges.values() {
            if edge.source == id || edge.target == id {
                self.edges.delete(edge.id.as_str());
            }
        }
        self.nodes.delete(&key);
        self.registry.delete(&key);
        Ok(())
    }

    /// All live nodes, in unspecified order.
    #[must_use]
    pub fn nodes(&self) -> Vec<CanvasNode> {
        self.nodes.values()
    }

    // ------------------------------------------------------------------
    // Edge CRUD
    // ------------------------------------------------------------------

    /// Add an edge. The derived id makes re-adding an equivalent edge
    /// idempotent. Endpoints are not validated: edge and node lifecycles
    /// are independent, and an edge to a not-yet-synced node is a normal
    /// transient state.
    pub fn add_edge(&self, edge: &CanvasEdge) -> Result<(), GraphError> {
        self.edges.set(edge.id.as_str(), edge)?;
        Ok(())
    }

    pub fn remove_edge(&self, id: &EdgeId) {
        self.edges.delete(id.as_str());
    }

    /// All edges, including possibly dangling ones.
    #[must_use]
    pub fn edges(&self) -> Vec<CanvasEdge> {
        self.edges.values()
    }

    /// Edges whose endpoints both exist, in stable (created_at, id) order.
    #[must_use]
    pub fn live_edges(&self) -> Vec<CanvasEdge> {
        let ids: FxHashSet<NodeId> = self.nodes().iter().map(|n| n.id).collect();
        let mut live: Vec<CanvasEdge> = self
            .edges
            .values()
            .into_iter()
            .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
            .collect();
        live.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        live
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Display title of a node, if registered.
    pub fn title(&self, id: NodeId) -> Result<Option<String>, GraphError> {
        Ok(self.registry.get(&id.to_string())?.map(|e| e.title))
    }

    pub fn set_title(&self, id: NodeId, title: &str) -> Result<(), GraphError> {
        self.registry
            .set(&id.to_string(), &RegistryEntry::new(id, title))?;
        Ok(())
    }

    /// All registry entries (titles listable without opening node pages).
    #[must_use]
    pub fn registry_entries(&self) -> Vec<RegistryEntry> {
        self.registry.values()
    }

    // ------------------------------------------------------------------
    // Derived queries
    // ------------------------------------------------------------------

    /// Predecessors of `id` through live edges, in edge order.
    #[must_use]
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.live_edges()
            .iter()
            .filter(|e| e.target == id)
            .map(|e| e.source)
            .collect()
    }

    /// Successors of `id` through live edges, in edge order.
    #[must_use]
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.live_edges()
            .iter()
            .filter(|e| e.source == id)
            .map(|e| e.target)
            .collect()
    }

    /// The unique node of a type, if exactly one exists.
    #[must_use]
    pub fn sole_node_of_type(&self, node_type: NodeType) -> Option<CanvasNode> {
        let mut found = None;
        for node in self.nodes() {
            if node.node_type() == node_type {
                if found.is_some() {
                    return None;
                }
                found = Some(node);
            }
        }
        found
    }

    /// The skill's live inputs: predecessors of the unique Input node.
    ///
    /// These are the nodes an end user filling in a published skill is
    /// allowed to edit under `ReadOnlyWithInput` scope.
    #[must_use]
    pub fn input_nodes(&self) -> Vec<NodeId> {
        match self.sole_node_of_type(NodeType::Input) {
            Some(input) => self.predecessors(input.id),
            None => Vec::new(),
        }
    }

    /// Which companion surfaces a node of this type owns.
    #[must_use]
    pub fn node_features(&self, id: NodeId) -> NodeFeatures {
        let Ok(Some(node)) = self.node(id) else {
            return NodeFeatures::default();
        };
        let node_type = node.node_type();
        NodeFeatures {
            has_page: node_type.has_prose(),
            has_canvas: node_type == NodeType::Loop,
        }
    }

    /// The node nearest to the centroid of the given set — used to pick a
    /// placement anchor. Ties resolve to the smaller id so the choice is
    /// deterministic.
    #[must_use]
    pub fn find_central_node(&self, ids: &[NodeId]) -> Option<NodeId> {
        let by_id: FxHashMap<NodeId, Position> = self
            .nodes()
            .into_iter()
            .map(|n| (n.id, n.position))
            .collect();
        let present: Vec<(NodeId, Position)> = ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|p| (*id, *p)))
            .collect();
        if present.is_empty() {
            return None;
        }

        let centroid = Position::new(
            present.iter().map(|(_, p)| p.x).sum::<f64>() / present.len() as f64,
            present.iter().map(|(_, p)| p.y).sum::<f64>() / present.len() as f64,
        );

        present
            .into_iter()
            .min_by(|(a_id, a), (b_id, b)| {
                a.distance_to(&centroid)
                    .total_cmp(&b.distance_to(&centroid))
                    .then(a_id.cmp(b_id))
            })
            .map(|(id, _)| id)
    }
}

//! Canvas edges.

use serde::{Deserialize, Serialize};

use crate::types::{EdgeId, NodeId};

/// A directed connection between two canvas nodes.
///
/// The id is derived from the endpoints and handles, so re-adding an
/// equivalent edge writes the same map key and is idempotent across
/// replicas. Edges may outlive the nodes they reference — consumers filter
/// dangling edges before traversal instead of treating them as corruption.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Creation instant (unix millis), used to keep "edge insertion order"
    /// stable when the compiler assembles a task's inputs. Ties (same
    /// millisecond on two replicas) fall back to the id ordering.
    #[serde(default)]
    pub created_at: i64,
}

impl CanvasEdge {
    /// Create an edge between two nodes, deriving its deterministic id.
    #[must_use]
    pub fn new(
        source: NodeId,
        source_handle: Option<String>,
        target: NodeId,
        target_handle: Option<String>,
    ) -> Self {
        let id = Self::derive_id(
            source,
            source_handle.as_deref(),
            target,
            target_handle.as_deref(),
        );
        Self {
            id,
            source,
            target,
            source_handle,
            target_handle,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Deterministic id for an edge: two replicas adding the same
    /// connection produce the same key.
    #[must_use]
    pub fn derive_id(
        source: NodeId,
        source_handle: Option<&str>,
        target: NodeId,
        target_handle: Option<&str>,
    ) -> EdgeId {
        EdgeId(format!(
            "{source}:{}->{target}:{}",
            source_handle.unwrap_or(""),
            target_handle.unwrap_or("")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_edges_share_an_id() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        let e1 = CanvasEdge::new(a, Some("out".into()), b, Some("in".into()));
        let e2 = CanvasEdge::new(a, Some("out".into()), b, Some("in".into()));
        assert_eq!(e1.id, e2.id);
    }

    #[test]
    fn direction_and_handles_distinguish_edges() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        let forward = CanvasEdge::new(a, None, b, None);
        let reverse = CanvasEdge::new(b, None, a, None);
        let handled = CanvasEdge::new(a, Some("alt".into()), b, None);
        assert_ne!(forward.id, reverse.id);
        assert_ne!(forward.id, handled.id);
    }
}

//! Shared fixtures for integration tests.

use rustc_hash::FxHashMap;

use loomcanvas::buddy::Buddy;
use loomcanvas::canvas::{CanvasEdge, CanvasNode, NodeType, Position};
use loomcanvas::compiler::{GraphSnapshot, StaticResolver};
use loomcanvas::scope::Scope;
use loomcanvas::session::{GraphSession, SessionConfig};
use loomcanvas::store::LocalSyncHub;
use loomcanvas::types::NodeId;

pub const TEST_TOKEN: &str = "test-token";

/// Poll until `condition` holds, failing after a generous deadline.
/// Replication between replicas is asynchronous; tests wait for
/// convergence instead of assuming delivery is instant.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}

pub fn test_buddy() -> Buddy {
    Buddy {
        id: "buddy-1".into(),
        name: "Scholar".into(),
        model: "test-model".into(),
        system_message: "You are a careful research assistant.".into(),
    }
}

pub fn test_hub() -> LocalSyncHub {
    LocalSyncHub::new(TEST_TOKEN)
}

pub async fn open_session(hub: &LocalSyncHub, skill_id: &str, scope: Scope) -> GraphSession {
    GraphSession::open(
        hub,
        SessionConfig::new(skill_id, scope).with_auth_token(TEST_TOKEN),
    )
    .await
    .expect("session opens")
}

/// A node positioned on a simple left-to-right lane.
pub fn node(node_type: NodeType, x: f64) -> CanvasNode {
    CanvasNode::new(node_type, Position::new(x, 0.0))
}

/// An edge with a deterministic creation instant, so snapshot-level tests
/// control insertion order explicitly.
pub fn edge_at(source: NodeId, target: NodeId, created_at: i64) -> CanvasEdge {
    let mut edge = CanvasEdge::new(source, None, target, None);
    edge.created_at = created_at;
    edge
}

/// Snapshot assembled directly, bypassing any store.
pub fn snapshot_of(nodes: Vec<CanvasNode>, edges: Vec<CanvasEdge>) -> GraphSnapshot {
    GraphSnapshot {
        nodes,
        edges,
        titles: FxHashMap::default(),
    }
}

/// The canonical executable graph: Input -> Prompt -> Output, with texts
/// registered for every node.
pub struct LinearGraph {
    pub input: CanvasNode,
    pub prompt: CanvasNode,
    pub output: CanvasNode,
    pub snapshot: GraphSnapshot,
    pub resolver: StaticResolver,
}

pub fn linear_graph() -> LinearGraph {
    let input = node(NodeType::Input, 0.0);
    let prompt = node(NodeType::Prompt, 200.0);
    let output = node(NodeType::Output, 400.0);

    let resolver = StaticResolver::new();
    resolver.insert(input.id, "the quick brown fox");
    resolver.insert(prompt.id, "Summarize: {input}");

    let snapshot = snapshot_of(
        vec![input.clone(), prompt.clone(), output.clone()],
        vec![
            edge_at(input.id, prompt.id, 1),
            edge_at(prompt.id, output.id, 2),
        ],
    );

    LinearGraph {
        input,
        prompt,
        output,
        snapshot,
        resolver,
    }
}

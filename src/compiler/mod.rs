//! The execution plan compiler.
//!
//! `compile` is a pure pass over a [`GraphSnapshot`]: it validates the
//! Input/Output frame, drops dangling edges, excludes annotation nodes not
//! reachable from Input, rejects structural cycles (Loop feedback edges
//! excepted), topologically orders the rest with deterministic
//! tie-breaking, and emits one [`Task`] per action node.
//!
//! The snapshot it consumes doubles as the `method_data` payload submitted
//! to the external executor when a run starts.

mod compile;
mod resolver;
mod task;

pub use compile::{compile, ValidationError, DEFAULT_MAX_LOOP_ITERATIONS};
pub use resolver::{ContentResolutionError, ContentResolver, RetryingResolver, StaticResolver};
pub use task::{ExecutionPlan, Task, TaskKind};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasEdge, CanvasNode, GraphModel};
use crate::types::NodeId;

/// An immutable capture of one canvas: the compiler's input and the
/// executor's `method_data`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<CanvasNode>,
    pub edges: Vec<CanvasEdge>,
    /// Display titles from the registry, used to label tasks.
    #[serde(default)]
    pub titles: FxHashMap<NodeId, String>,
}

impl GraphSnapshot {
    /// Capture the current state of a graph model.
    ///
    /// Nodes and edges are sorted by id so two captures of the same state
    /// are byte-identical — snapshots participate in run submissions and
    /// must not leak map iteration order.
    #[must_use]
    pub fn capture(model: &GraphModel) -> Self {
        let mut nodes = model.nodes();
        nodes.sort_by_key(|n| n.id);
        let mut edges = model.edges();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        let titles = model
            .registry_entries()
            .into_iter()
            .map(|e| (e.id, e.title))
            .collect();
        Self {
            nodes,
            edges,
            titles,
        }
    }
}

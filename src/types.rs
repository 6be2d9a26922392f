//! Core identifier and status types for the loomcanvas engine.
//!
//! This module defines the fundamental types shared across the replicated
//! store, the graph model, and the compiler. These are the core domain
//! concepts that identify *things*; behavior lives in the modules that own
//! it ([`crate::store`], [`crate::canvas`], [`crate::run`]).
//!
//! # Key Types
//!
//! - [`NodeId`] / [`EdgeId`]: identity of canvas nodes and edges
//! - [`ActorId`]: identity of one replica (one client process)
//! - [`DocumentName`]: the addressing unit of the replicated store
//! - [`RunStatus`]: lifecycle of one skill execution
//!
//! # Examples
//!
//! ```rust
//! use loomcanvas::types::{DocumentName, NodeId, RunStatus};
//!
//! let node = NodeId::generate();
//! let doc = DocumentName::canvas("a9f0");
//! assert_eq!(doc.as_str(), "canvas:a9f0");
//!
//! let status = RunStatus::Running;
//! assert_eq!(status.encode(), "running");
//! assert_eq!(RunStatus::decode("running"), RunStatus::Running);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a canvas node.
///
/// Node ids are UUIDs and are unique within a document. Everything else on a
/// node is replaced wholesale on write; the id is the only stable handle.
///
/// `NodeId` is `Ord` so collections of nodes can be ordered deterministically;
/// the compiler relies on this for reproducible tie-breaking in its
/// topological sort.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generate a fresh random node id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a node id from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a canvas edge.
///
/// Edge ids are deterministically derived from the connected endpoints and
/// handles (see [`crate::canvas::CanvasEdge::derive_id`]), so re-adding an
/// equivalent edge is idempotent: every replica computes the same key and
/// concurrent writes converge onto a single map entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one replica: one client process holding in-memory documents.
///
/// The actor id participates in the total order on write stamps, giving
/// last-writer-wins merges a deterministic tie-break when two replicas write
/// at the same logical tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one run of a compiled skill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of an independently synchronized replicated document.
///
/// Every document is addressed by name: one per canvas, one per skill, one
/// per node's prose page. Replicas of the same name converge; documents with
/// different names never interact.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentName(String);

impl DocumentName {
    /// Build a document name from an arbitrary string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Conventional name for the canvas document of a skill.
    #[must_use]
    pub fn canvas(skill_id: &str) -> Self {
        Self(format!("canvas:{skill_id}"))
    }

    /// Conventional name for the skill document (registry + run meta).
    #[must_use]
    pub fn skill(skill_id: &str) -> Self {
        Self(format!("skill:{skill_id}"))
    }

    /// Conventional name for a node's prose page document.
    #[must_use]
    pub fn page(node_id: NodeId) -> Self {
        Self(format!("page:{node_id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of one run, shared between the initiating client and the
/// external executor through the meta map.
///
/// Persisted in its encoded string form so replicas never crash on a status
/// written by a newer build; see [`RunStatus::decode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run has been started, or the previous run's state was cleared.
    Idle,
    /// The client has submitted the plan; the executor has not picked it up.
    Pending,
    /// The executor is working through tasks.
    Running,
    /// The run finished and every task completed.
    Success,
    /// The run finished with at least one failed task.
    Error,
}

impl RunStatus {
    /// Encode into the persisted string form used in the meta map.
    #[must_use]
    pub fn encode(self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    /// Decode a persisted string form. Unrecognized values decode to `Idle`.
    #[must_use]
    pub fn decode(s: &str) -> Self {
        match s {
            "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "success" => RunStatus::Success,
            "error" => RunStatus::Error,
            _ => RunStatus::Idle,
        }
    }

    /// Returns true once the executor can no longer change the status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_conventions() {
        let node = NodeId::generate();
        assert_eq!(DocumentName::canvas("s1").as_str(), "canvas:s1");
        assert_eq!(DocumentName::skill("s1").as_str(), "skill:s1");
        assert!(DocumentName::page(node).as_str().starts_with("page:"));
    }

    #[test]
    fn run_status_round_trip() {
        for status in [
            RunStatus::Idle,
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Error,
        ] {
            assert_eq!(RunStatus::decode(status.encode()), status);
        }
        // Forward compatibility: unknown strings must not panic.
        assert_eq!(RunStatus::decode("paused"), RunStatus::Idle);
    }

    #[test]
    fn run_status_terminality() {
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Error.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}

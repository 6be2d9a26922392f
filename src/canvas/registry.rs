//! Title registry.
//!
//! Titles are duplicated outside the node values so the enclosing skill can
//! list every node's display title without opening the per-node prose
//! documents.

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// One registry entry: the display title of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: NodeId,
    pub title: String,
}

impl RegistryEntry {
    #[must_use]
    pub fn new(id: NodeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

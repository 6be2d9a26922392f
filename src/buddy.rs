//! Buddy: a configured LLM persona.
//!
//! A buddy pairs a model identifier with the system message that fronts
//! every prompt task compiled while it is active. Nodes reference buddies
//! by [`BuddyRef`]; the full configuration lives with the hosting session.

use serde::{Deserialize, Serialize};

/// Full buddy configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buddy {
    pub id: String,
    pub name: String,
    /// Model identifier understood by the external executor.
    pub model: String,
    /// System message prefixed to every prompt task.
    pub system_message: String,
}

impl Buddy {
    /// Lightweight reference for embedding in node payloads.
    #[must_use]
    pub fn to_ref(&self) -> BuddyRef {
        BuddyRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Reference to a buddy, stored on prompt nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuddyRef {
    pub id: String,
    pub name: String,
}

//! Canvas node types.
//!
//! A [`CanvasNode`] is one box on the canvas: identity, geometry, a typed
//! payload ([`NodeData`]) and the shared live-run fields
//! ([`NodeRunState`]). The payload is a closed tagged union keyed by
//! [`NodeType`] — each variant carries only the fields meaningful to that
//! type, with [`NodeData::Unknown`] absorbing node types introduced by
//! newer builds so an old replica never fails to decode a whole map.
//!
//! Nodes are replicated as whole values: read, modify, write back one
//! `set`. Field-level merging is deliberately absent (see
//! [`crate::store::MapHandle`]); a multi-field update issued as separate
//! writes could lose a concurrent peer's write.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::buddy::BuddyRef;
use crate::types::NodeId;

/// Position of a node on the canvas, in canvas coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Rendered size of a node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Default for Size {
    fn default() -> Self {
        Self {
            width: 240.0,
            height: 120.0,
        }
    }
}

/// The closed set of node types a canvas understands.
///
/// The compiler gives most of these their semantics: `Input`/`Output` frame
/// the executable region, `Prompt` and the paper-search types become tasks,
/// the `Response*` types describe where a task's output lands, and `Loop`
/// wraps a bounded sub-plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Default,
    Input,
    Output,
    Prompt,
    Loop,
    ResponseCombined,
    ResponseSingle,
    ResponseMultiple,
    ResponseTable,
    PaperFinder,
    PaperQaCollection,
    ExternalData,
}

impl NodeType {
    /// Encode into the persisted string form used in export payloads.
    #[must_use]
    pub fn encode(self) -> &'static str {
        match self {
            NodeType::Default => "default",
            NodeType::Input => "input",
            NodeType::Output => "output",
            NodeType::Prompt => "prompt",
            NodeType::Loop => "loop",
            NodeType::ResponseCombined => "response-combined",
            NodeType::ResponseSingle => "response-single",
            NodeType::ResponseMultiple => "response-multiple",
            NodeType::ResponseTable => "response-table",
            NodeType::PaperFinder => "paper-finder",
            NodeType::PaperQaCollection => "paper-qa-collection",
            NodeType::ExternalData => "external-data",
        }
    }

    /// Decode a persisted string form; unknown strings fall back to
    /// `Default` so imports never fail on a type from a newer build.
    #[must_use]
    pub fn decode(s: &str) -> Self {
        match s {
            "input" => NodeType::Input,
            "output" => NodeType::Output,
            "prompt" => NodeType::Prompt,
            "loop" => NodeType::Loop,
            "response-combined" => NodeType::ResponseCombined,
            "response-single" => NodeType::ResponseSingle,
            "response-multiple" => NodeType::ResponseMultiple,
            "response-table" => NodeType::ResponseTable,
            "paper-finder" => NodeType::PaperFinder,
            "paper-qa-collection" => NodeType::PaperQaCollection,
            "external-data" => NodeType::ExternalData,
            _ => NodeType::Default,
        }
    }

    /// True for types the compiler turns into tasks.
    #[must_use]
    pub fn is_action(self) -> bool {
        matches!(
            self,
            NodeType::Prompt | NodeType::Loop | NodeType::PaperFinder | NodeType::PaperQaCollection
        )
    }

    /// True for types that describe how a task's output lands.
    #[must_use]
    pub fn is_response(self) -> bool {
        matches!(
            self,
            NodeType::ResponseCombined
                | NodeType::ResponseSingle
                | NodeType::ResponseMultiple
                | NodeType::ResponseTable
        )
    }

    /// True for types that own a prose page. Only these are consulted by
    /// the content resolver when a task's context is assembled; a Loop
    /// node's payload is injected per iteration at run time instead.
    #[must_use]
    pub fn has_prose(self) -> bool {
        !matches!(self, NodeType::Loop)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// Live activity marker driven by the executor during a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeActivity {
    /// The node's task is next in line.
    Active,
    /// The node's task is currently executing.
    Executing,
}

/// Shared live-state fields present on every node regardless of type.
///
/// The executor is the sole writer of `state`/`progress`/`error` during a
/// run; the editing client owns the rest. Both write whole node values, so
/// each side must re-read before writing (the documented read-modify-write
/// convention).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRunState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeActivity>,
    /// Completion of the node's task, 0..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub syncing: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub loading: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub editing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
}

impl NodeRunState {
    /// Clear every executor-written field, leaving editing flags alone.
    pub fn reset_run_fields(&mut self) {
        self.state = None;
        self.progress = None;
        self.error = None;
    }
}

/// Type-specific payload of a canvas node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeData {
    Default,
    Input,
    Output,
    Prompt {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buddy: Option<BuddyRef>,
    },
    Loop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },
    ResponseCombined,
    ResponseSingle,
    ResponseMultiple,
    ResponseTable,
    PaperFinder {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        paper_collection: Option<String>,
    },
    PaperQaCollection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        paper_collection: Option<String>,
    },
    ExternalData,
    /// Forward compatibility: any tag this build does not know.
    #[serde(other)]
    Unknown,
}

impl NodeData {
    /// Default payload for a node type.
    #[must_use]
    pub fn for_type(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Default => NodeData::Default,
            NodeType::Input => NodeData::Input,
            NodeType::Output => NodeData::Output,
            NodeType::Prompt => NodeData::Prompt { buddy: None },
            NodeType::Loop => NodeData::Loop {
                max_iterations: None,
            },
            NodeType::ResponseCombined => NodeData::ResponseCombined,
            NodeType::ResponseSingle => NodeData::ResponseSingle,
            NodeType::ResponseMultiple => NodeData::ResponseMultiple,
            NodeType::ResponseTable => NodeData::ResponseTable,
            NodeType::PaperFinder => NodeData::PaperFinder {
                paper_collection: None,
            },
            NodeType::PaperQaCollection => NodeData::PaperQaCollection {
                paper_collection: None,
            },
            NodeType::ExternalData => NodeData::ExternalData,
        }
    }

    /// The node type this payload belongs to. `Unknown` payloads report
    /// `Default` so the rest of the engine treats them as annotations.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeData::Default | NodeData::Unknown => NodeType::Default,
            NodeData::Input => NodeType::Input,
            NodeData::Output => NodeType::Output,
            NodeData::Prompt { .. } => NodeType::Prompt,
            NodeData::Loop { .. } => NodeType::Loop,
            NodeData::ResponseCombined => NodeType::ResponseCombined,
            NodeData::ResponseSingle => NodeType::ResponseSingle,
            NodeData::ResponseMultiple => NodeType::ResponseMultiple,
            NodeData::ResponseTable => NodeType::ResponseTable,
            NodeData::PaperFinder { .. } => NodeType::PaperFinder,
            NodeData::PaperQaCollection { .. } => NodeType::PaperQaCollection,
            NodeData::ExternalData => NodeType::ExternalData,
        }
    }
}

/// One node of the canvas graph.
///
/// Identity is the UUID; everything else is replaced wholesale on write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    pub id: NodeId,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Size,
    pub data: NodeData,
    #[serde(default)]
    pub run: NodeRunState,
}

impl CanvasNode {
    /// Create a node of the given type at a position, with default size and
    /// payload.
    #[must_use]
    pub fn new(node_type: NodeType, position: Position) -> Self {
        Self {
            id: NodeId::generate(),
            position,
            size: Size::default(),
            data: NodeData::for_type(node_type),
            run: NodeRunState::default(),
        }
    }

    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }
}

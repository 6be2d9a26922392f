//! Compiled tasks and the execution plan.

use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasNode, NodeType};
use crate::message::Message;
use crate::types::NodeId;

/// What kind of work a task asks of the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// One LLM chat completion.
    Prompt,
    /// A document/paper search instead of a chat completion.
    PaperFinder,
    /// A question-answering pass over a paper collection.
    PaperQaCollection,
    /// A bounded sub-plan instantiated once per element of an upstream
    /// collection.
    Loop,
}

impl TaskKind {
    /// The task kind an action node compiles to, if any.
    #[must_use]
    pub fn for_node_type(node_type: NodeType) -> Option<Self> {
        match node_type {
            NodeType::Prompt => Some(TaskKind::Prompt),
            NodeType::PaperFinder => Some(TaskKind::PaperFinder),
            NodeType::PaperQaCollection => Some(TaskKind::PaperQaCollection),
            NodeType::Loop => Some(TaskKind::Loop),
            _ => None,
        }
    }
}

/// One unit of the execution plan.
///
/// A task is emitted per action node, in dependency order. `input_nodes`
/// are the nodes with an edge into the action node, in edge-insertion
/// order; `output_node` is where the executor lands the result, and its
/// type (`response_mode`) says how: overwrite/extend one node, spawn one
/// node per list element, render a table, or fill the skill's Output.
///
/// A task that failed content resolution carries `error` and is skipped by
/// the executor; tasks depending on it are `blocked` and their output
/// nodes stay untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    /// The action node this task was compiled from.
    pub prompt_node: CanvasNode,
    /// Display title of the action node, when registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Nodes feeding this task, in edge-insertion order.
    pub input_nodes: Vec<CanvasNode>,
    /// Where the result lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_node: Option<CanvasNode>,
    /// Type of the output node, telling the executor how to deliver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<NodeType>,
    /// Chat messages for `Prompt` tasks: buddy system message, resolved
    /// input texts, then the prompt node's own text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// Search query for the paper task kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// For `Loop` tasks: the nodes of the loop body, in plan order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loop_body: Vec<NodeId>,
    /// For `Loop` tasks: the iteration guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    /// Content-resolution failure scoped to this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when an upstream task failed; this task must be skipped.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
}

impl Task {
    /// True when the executor can actually run this task.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.error.is_none() && !self.blocked
    }
}

/// The ordered output of a successful compilation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub tasks: Vec<Task>,
}

impl ExecutionPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Position of the task compiled from the given action node.
    #[must_use]
    pub fn position_of(&self, node: NodeId) -> Option<usize> {
        self.tasks.iter().position(|t| t.prompt_node.id == node)
    }

    /// Tasks the executor should actually run.
    pub fn runnable(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_runnable())
    }
}

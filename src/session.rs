//! Graph sessions: the owning object for one opened skill.
//!
//! A [`GraphSession`] holds everything one client needs for one skill: the
//! canvas document (nodes + edges), the skill document (registry + run
//! meta), the scope gate, the undo manager, and the run bridge. It is
//! constructed at session start and torn down with [`GraphSession::close`]
//! when the user navigates away — state is always passed explicitly, never
//! held in ambient globals.
//!
//! Every mutation flows UI → scope gate → graph model → store. The gate is
//! re-evaluated per operation because scope can change while the session
//! is open (publishing a draft demotes it to read-only-with-input).
//!
//! # Examples
//!
//! ```rust
//! use loomcanvas::canvas::{NodeType, Position};
//! use loomcanvas::scope::Scope;
//! use loomcanvas::session::{GraphSession, SessionConfig};
//! use loomcanvas::store::LocalSyncHub;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = LocalSyncHub::new("token");
//! let config = SessionConfig::new("skill-1", Scope::ReadWrite).with_auth_token("token");
//! let session = GraphSession::open(&hub, config).await?;
//!
//! let input = session.create_node(NodeType::Input, Position::new(0.0, 0.0), "Input")?;
//! let prompt = session.create_node(NodeType::Prompt, Position::new(200.0, 0.0), "Summarize")?;
//! session.add_edge(input.id, None, prompt.id, None)?;
//! session.close();
//! # Ok(())
//! # }
//! ```

use parking_lot::{Mutex, RwLock};

use crate::buddy::Buddy;
use crate::canvas::{
    CanvasEdge, CanvasNode, GraphError, GraphModel, NodeType, Position,
};
use crate::compiler::{self, ContentResolver, ExecutionPlan, GraphSnapshot, ValidationError};
use crate::export::{export_graph, import_payload, ExportPayload};
use crate::run::{ExecutorClient, ExecutorError, RunStateBridge};
use crate::scope::{PermissionError, Scope};
use crate::store::{DocEvent, Document, LocalSyncHub, SyncError};
use crate::types::{ActorId, DocumentName, EdgeId, NodeId, RunId};
use crate::undo::{UndoManager, DEFAULT_UNDO_DEPTH};

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Environment variable consulted when no auth token is configured.
pub const SYNC_TOKEN_ENV: &str = "LOOMCANVAS_SYNC_TOKEN";
/// Environment variable overriding the undo stack depth.
pub const UNDO_DEPTH_ENV: &str = "LOOMCANVAS_UNDO_DEPTH";

/// Failures surfaced by session operations.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),
}

/// Configuration for opening a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub skill_id: String,
    pub scope: Scope,
    pub auth_token: Option<String>,
    pub undo_depth: Option<usize>,
    pub actor: Option<ActorId>,
}

impl SessionConfig {
    pub fn new(skill_id: impl Into<String>, scope: Scope) -> Self {
        Self {
            skill_id: skill_id.into(),
            scope,
            auth_token: None,
            undo_depth: None,
            actor: None,
        }
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_actor(mut self, actor: ActorId) -> Self {
        self.actor = Some(actor);
        self
    }

    fn resolve_auth_token(&self) -> String {
        if let Some(token) = &self.auth_token {
            return token.clone();
        }
        dotenvy::dotenv().ok();
        std::env::var(SYNC_TOKEN_ENV).unwrap_or_default()
    }

    fn resolve_undo_depth(&self) -> usize {
        if let Some(depth) = self.undo_depth {
            return depth;
        }
        dotenvy::dotenv().ok();
        std::env::var(UNDO_DEPTH_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_UNDO_DEPTH)
    }
}

/// One client's session over one skill.
pub struct GraphSession {
    skill_id: String,
    scope: RwLock<Scope>,
    canvas_doc: Document,
    skill_doc: Document,
    model: GraphModel,
    undo: Mutex<UndoManager>,
    bridge: RunStateBridge,
}

impl GraphSession {
    /// Open the session's documents through the hub and connect them.
    ///
    /// Resolves only after both documents finished their initial sync, so
    /// callers never observe a half-synced canvas.
    pub async fn open(hub: &LocalSyncHub, config: SessionConfig) -> Result<Self, SessionError> {
        let actor = config.actor.unwrap_or_else(ActorId::generate);
        let token = config.resolve_auth_token();

        let canvas_doc = hub.open_as(DocumentName::canvas(&config.skill_id), &token, actor)?;
        let skill_doc = hub.open_as(DocumentName::skill(&config.skill_id), &token, actor)?;
        canvas_doc.connect().await?;
        skill_doc.connect().await?;

        let model = GraphModel::new(&canvas_doc, &skill_doc);
        let undo = UndoManager::with_depth(canvas_doc.clone(), config.resolve_undo_depth());
        let bridge = RunStateBridge::new(&skill_doc, model.clone());

        tracing::info!(skill = %config.skill_id, %actor, "session opened");
        Ok(Self {
            skill_id: config.skill_id,
            scope: RwLock::new(config.scope),
            canvas_doc,
            skill_doc,
            model,
            undo: Mutex::new(undo),
            bridge,
        })
    }

    /// Tear the session down: disconnect both documents and drop the undo
    /// history. The in-memory replicas stay readable.
    pub fn close(&self) {
        self.canvas_doc.disconnect();
        self.skill_doc.disconnect();
        self.undo.lock().clear();
        tracing::info!(skill = %self.skill_id, "session closed");
    }

    // ------------------------------------------------------------------
    // Scope
    // ------------------------------------------------------------------

    #[must_use]
    pub fn scope(&self) -> Scope {
        *self.scope.read()
    }

    /// Swap the session's scope, e.g. when the hosting entity publishes.
    pub fn set_scope(&self, scope: Scope) {
        *self.scope.write() = scope;
    }

    fn gate(&self, operation: &'static str, is_skill_input: bool) -> Result<(), PermissionError> {
        let scope = *self.scope.read();
        if scope.can_mutate(is_skill_input) {
            Ok(())
        } else {
            Err(PermissionError::new(scope, operation))
        }
    }

    /// Whether a node is a live input to the skill's Input node.
    #[must_use]
    pub fn is_skill_input(&self, id: NodeId) -> bool {
        self.model.input_nodes().contains(&id)
    }

    // ------------------------------------------------------------------
    // Mutations (all gated)
    // ------------------------------------------------------------------

    /// Create a node and its registry entry in one logical operation.
    pub fn create_node(
        &self,
        node_type: NodeType,
        position: Position,
        title: &str,
    ) -> Result<CanvasNode, SessionError> {
        self.gate("create-node", false)?;
        let node = CanvasNode::new(node_type, position);
        let key = node.id.to_string();
        self.undo
            .lock()
            .record(&[(GraphModel::NODES_MAP, key)], || {
                self.model.insert_node(&node, title)
            })?;
        Ok(node)
    }

    /// Whole-value read-modify-write update of one node.
    pub fn update_node(
        &self,
        id: NodeId,
        mutate: impl FnOnce(&mut CanvasNode),
    ) -> Result<CanvasNode, SessionError> {
        self.gate("update-node", self.is_skill_input(id))?;
        let key = id.to_string();
        let updated = self
            .undo
            .lock()
            .record(&[(GraphModel::NODES_MAP, key)], || {
                self.model.update_node(id, mutate)
            })?;
        Ok(updated)
    }

    /// Remove a node, its registry entry, and its incident edges.
    pub fn remove_node(&self, id: NodeId) -> Result<(), SessionError> {
        self.gate("remove-node", false)?;
        let node_key = id.to_string();
        let mut touched: Vec<(&str, String)> = vec![(GraphModel::NODES_MAP, node_key)];
        for edge in self.model.edges() {
            if edge.source == id || edge.target == id {
                touched.push((GraphModel::EDGES_MAP, edge.id.as_str().to_string()));
            }
        }
        self.undo
            .lock()
            .record(&touched, || self.model.remove_node(id))?;
        Ok(())
    }

    /// Connect two nodes. Idempotent for equivalent connections.
    pub fn add_edge(
        &self,
        source: NodeId,
        source_handle: Option<String>,
        target: NodeId,
        target_handle: Option<String>,
    ) -> Result<CanvasEdge, SessionError> {
        self.gate("add-edge", false)?;
        let edge = CanvasEdge::new(source, source_handle, target, target_handle);
        self.undo
            .lock()
            .record(&[(GraphModel::EDGES_MAP, edge.id.as_str().to_string())], || {
                self.model.add_edge(&edge)
            })?;
        Ok(edge)
    }

    pub fn remove_edge(&self, id: &EdgeId) -> Result<(), SessionError> {
        self.gate("remove-edge", false)?;
        self.undo
            .lock()
            .record(&[(GraphModel::EDGES_MAP, id.as_str().to_string())], || {
                self.model.remove_edge(id);
            });
        Ok(())
    }

    pub fn set_title(&self, id: NodeId, title: &str) -> Result<(), SessionError> {
        self.gate("set-title", self.is_skill_input(id))?;
        self.model.set_title(id, title)?;
        Ok(())
    }

    /// Import an export payload into this canvas.
    pub fn import(&self, payload: &ExportPayload) -> Result<(), SessionError> {
        self.gate("import", false)?;
        import_payload(&self.model, payload)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Undo the last local batch. Denied under `ReadOnly` scope.
    pub fn undo(&self) -> Result<bool, SessionError> {
        self.gate("undo", true)?;
        Ok(self.undo.lock().undo())
    }

    /// Redo the last undone batch. Denied under `ReadOnly` scope.
    pub fn redo(&self) -> Result<bool, SessionError> {
        self.gate("redo", true)?;
        Ok(self.undo.lock().redo())
    }

    // ------------------------------------------------------------------
    // Reads & derived data
    // ------------------------------------------------------------------

    #[must_use]
    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    #[must_use]
    pub fn skill_id(&self) -> &str {
        &self.skill_id
    }

    /// Subscribe to raw canvas document events.
    #[must_use]
    pub fn canvas_events(&self) -> flume::Receiver<DocEvent> {
        self.canvas_doc.subscribe()
    }

    /// Capture the current graph for compilation or run submission.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(&self.model)
    }

    /// Export the canvas, normalizing positions to the bounding box.
    #[must_use]
    pub fn export(&self, contents: &FxHashMap<NodeId, String>) -> ExportPayload {
        export_graph(&self.model, contents)
    }

    // ------------------------------------------------------------------
    // Compile & run
    // ------------------------------------------------------------------

    /// Compile the current graph into an execution plan.
    pub async fn compile(
        &self,
        buddy: &Buddy,
        resolver: &dyn ContentResolver,
    ) -> Result<ExecutionPlan, ValidationError> {
        compiler::compile(&self.snapshot(), buddy, resolver).await
    }

    /// Submit the current graph to the external executor.
    pub async fn start_run(
        &self,
        executor: &dyn ExecutorClient,
        buddy: &Buddy,
        is_dev_run: bool,
    ) -> Result<RunId, ExecutorError> {
        self.bridge
            .start_run(executor, &self.skill_id, &self.snapshot(), buddy, is_dev_run)
            .await
    }

    /// The run bridge for this skill.
    #[must_use]
    pub fn run_bridge(&self) -> &RunStateBridge {
        &self.bridge
    }
}

//! The run state bridge.
//!
//! A run's live state is ordinary replicated data: a small `meta` map on
//! the skill document plus the per-node run fields on the canvas. The
//! initiating client and the external executor write disjoint parts of it
//! — the client starts runs and owns structural edits, the executor owns
//! progress — and every connected replica converges on the same view
//! through the store's merge, with no polling anywhere.
//!
//! Stopping is advisory. `request_stop` flips the cooperative cancel
//! token and records the intent in the meta map; a task the executor
//! already dispatched may still complete, and a terminal status arriving
//! after the stop request is accepted and recorded like any other write.

use chrono::Utc;
use serde_json::{json, Value};

use super::executor::{CancelToken, ExecutorClient, ExecutorError, RunRequest};
use crate::buddy::Buddy;
use crate::canvas::{GraphError, GraphModel, NodeActivity};
use crate::compiler::GraphSnapshot;
use crate::store::{DocEvent, Document, MapHandle};
use crate::types::{NodeId, RunId, RunStatus};

/// Map name for run metadata on the skill document.
pub const META_MAP: &str = "meta";

mod keys {
    pub const STATUS: &str = "status";
    pub const ERROR: &str = "error";
    pub const BUDDY: &str = "buddy";
    pub const RUN_ID: &str = "run_id";
    pub const STARTED_AT: &str = "started_at";
    pub const FINISHED_AT: &str = "finished_at";
    pub const STOP_REQUESTED: &str = "stop_requested";
}

/// A change to the run's shared state, derived from meta-map events.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    StatusChanged(RunStatus),
    ErrorChanged(Option<String>),
    StopRequested,
}

/// Read/write surface over a run's replicated state.
#[derive(Clone)]
pub struct RunStateBridge {
    skill_doc: Document,
    meta: MapHandle,
    model: GraphModel,
    cancel: CancelToken,
}

impl RunStateBridge {
    #[must_use]
    pub fn new(skill_doc: &Document, model: GraphModel) -> Self {
        Self {
            skill_doc: skill_doc.clone(),
            meta: skill_doc.get_map(META_MAP),
            model,
            cancel: CancelToken::new(),
        }
    }

    // ------------------------------------------------------------------
    // Reads (any replica)
    // ------------------------------------------------------------------

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.meta
            .get(keys::STATUS)
            .and_then(|v| v.as_str().map(RunStatus::decode))
            .unwrap_or(RunStatus::Idle)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.meta
            .get(keys::ERROR)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    #[must_use]
    pub fn run_id(&self) -> Option<RunId> {
        self.meta
            .get(keys::RUN_ID)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.meta
            .get(keys::STOP_REQUESTED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// The advisory cancel token observed by a local executor.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Subscribe to run-level changes. Map events that do not concern the
    /// meta map are filtered out.
    #[must_use]
    pub fn watch(&self) -> flume::Receiver<RunEvent> {
        use futures_util::StreamExt;

        let (tx, rx) = flume::unbounded();
        let mut events = self.skill_doc.subscribe_stream();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let DocEvent::Change(change) = event else {
                    continue;
                };
                if change.map != META_MAP {
                    continue;
                }
                let mapped = match change.key.as_str() {
                    keys::STATUS => change
                        .current
                        .as_ref()
                        .and_then(Value::as_str)
                        .map(|s| RunEvent::StatusChanged(RunStatus::decode(s))),
                    keys::ERROR => Some(RunEvent::ErrorChanged(
                        change
                            .current
                            .as_ref()
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    )),
                    keys::STOP_REQUESTED
                        if change.current.as_ref().and_then(Value::as_bool) == Some(true) =>
                    {
                        Some(RunEvent::StopRequested)
                    }
                    _ => None,
                };
                if let Some(event) = mapped {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });
        rx
    }

    // ------------------------------------------------------------------
    // Client side: the sole initiator of runs
    // ------------------------------------------------------------------

    /// Submit a run to the external executor and transition to `Pending`.
    ///
    /// The snapshot travels as `method_data` so the executor works from
    /// exactly the graph the client compiled. Stale run fields from a
    /// previous run are cleared first.
    pub async fn start_run(
        &self,
        executor: &dyn ExecutorClient,
        method_id: &str,
        snapshot: &GraphSnapshot,
        buddy: &Buddy,
        is_dev_run: bool,
    ) -> Result<RunId, ExecutorError> {
        let request = RunRequest {
            method_id: method_id.to_string(),
            method_data: serde_json::to_value(snapshot)?,
            buddy: buddy.clone(),
            is_dev_run,
        };
        let run_id = executor.submit(request).await?;

        self.cancel.reset();
        self.clear_node_run_fields();
        self.meta.set(keys::RUN_ID, json!(run_id));
        self.meta.set(keys::BUDDY, json!(buddy));
        self.meta.delete(keys::ERROR);
        self.meta.delete(keys::FINISHED_AT);
        self.meta.set(keys::STOP_REQUESTED, json!(false));
        self.meta
            .set(keys::STARTED_AT, json!(Utc::now().to_rfc3339()));
        self.meta.set(keys::STATUS, json!(RunStatus::Pending.encode()));
        tracing::info!(%run_id, method_id, "run submitted");
        Ok(run_id)
    }

    /// Ask the executor to stop. Advisory: marks intent, flips the local
    /// cancel token, and changes nothing else — any already-dispatched
    /// task may still land its result.
    pub fn request_stop(&self) {
        self.cancel.cancel();
        self.meta.set(keys::STOP_REQUESTED, json!(true));
        tracing::info!("stop requested for current run");
    }

    // ------------------------------------------------------------------
    // Executor side: the sole writer of progress
    // ------------------------------------------------------------------

    pub fn mark_running(&self) {
        self.meta.set(keys::STATUS, json!(RunStatus::Running.encode()));
    }

    /// Record a task's live state on its node, as one whole-value write.
    ///
    /// Updating a node that a concurrent editor deleted is tolerated: the
    /// progress write is dropped with a warning.
    pub fn write_node_progress(
        &self,
        node: NodeId,
        state: Option<NodeActivity>,
        progress: Option<u8>,
        error: Option<String>,
    ) -> Result<(), GraphError> {
        match self.model.update_node(node, |n| {
            n.run.state = state;
            n.run.progress = progress.map(|p| p.min(100));
            n.run.error = error;
        }) {
            Ok(_) => Ok(()),
            Err(GraphError::NodeMissing { id }) => {
                tracing::warn!(node = %id, "dropping progress for deleted node");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Terminal success.
    pub fn complete(&self) {
        self.meta
            .set(keys::FINISHED_AT, json!(Utc::now().to_rfc3339()));
        self.meta.set(keys::STATUS, json!(RunStatus::Success.encode()));
    }

    /// Terminal failure; the message is display-only to this subsystem.
    pub fn fail(&self, error: &str) {
        self.meta.set(keys::ERROR, json!(error));
        self.meta
            .set(keys::FINISHED_AT, json!(Utc::now().to_rfc3339()));
        self.meta.set(keys::STATUS, json!(RunStatus::Error.encode()));
    }

    fn clear_node_run_fields(&self) {
        for node in self.model.nodes() {
            if node.run.state.is_some() || node.run.progress.is_some() || node.run.error.is_some() {
                let _ = self.model.update_node(node.id, |n| n.run.reset_run_fields());
            }
        }
    }
}

//! The external executor seam.
//!
//! The engine never invokes an LLM itself. It compiles a plan, snapshots
//! the graph, and hands both to a "buddy runner" service behind
//! [`ExecutorClient`]; the service writes its progress back through the
//! [`RunStateBridge`](super::RunStateBridge). Cancellation is cooperative:
//! the executor observes the [`CancelToken`] at task boundaries only, so a
//! task already dispatched may still complete after a stop request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buddy::Buddy;
use crate::types::RunId;

/// Submission payload for one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRequest {
    /// The skill being executed.
    pub method_id: String,
    /// Serialized graph snapshot (see
    /// [`GraphSnapshot`](crate::compiler::GraphSnapshot)).
    pub method_data: serde_json::Value,
    /// Active buddy configuration for prompt tasks.
    pub buddy: Buddy,
    /// Development runs may be routed to a cheaper model by the executor.
    pub is_dev_run: bool,
}

/// Failures submitting a run to the executor service.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// The service refused the submission.
    #[error("executor rejected the run: {reason}")]
    #[diagnostic(code(loomcanvas::executor::rejected))]
    Rejected { reason: String },

    /// The service could not be reached.
    #[error("executor unavailable")]
    #[diagnostic(
        code(loomcanvas::executor::unavailable),
        help("The run was not started; retry once the service is reachable.")
    )]
    Unavailable,

    /// The graph snapshot failed to serialize.
    #[error(transparent)]
    #[diagnostic(code(loomcanvas::executor::payload))]
    Payload(#[from] serde_json::Error),
}

/// Client for the external buddy-runner service.
#[async_trait]
pub trait ExecutorClient: Send + Sync {
    /// Submit a run; returns the id the executor will report progress
    /// under.
    async fn submit(&self, request: RunRequest) -> Result<RunId, ExecutorError>;
}

/// Cooperative, advisory cancellation flag.
///
/// Cancelling never interrupts in-flight work; it only asks the executor
/// to stop *between* tasks. The bridge stays correct if a completion
/// status arrives after cancellation was requested.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Re-arm the token for a new run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

//! Test doubles for the external executor service.

use async_trait::async_trait;
use parking_lot::Mutex;

use loomcanvas::run::{ExecutorClient, ExecutorError, RunRequest};
use loomcanvas::types::RunId;

/// Records every submission and returns a fresh run id.
#[derive(Default)]
pub struct RecordingExecutor {
    pub submissions: Mutex<Vec<RunRequest>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }
}

#[async_trait]
impl ExecutorClient for RecordingExecutor {
    async fn submit(&self, request: RunRequest) -> Result<RunId, ExecutorError> {
        self.submissions.lock().push(request);
        Ok(RunId::generate())
    }
}

/// Always refuses the submission.
pub struct RejectingExecutor;

#[async_trait]
impl ExecutorClient for RejectingExecutor {
    async fn submit(&self, _request: RunRequest) -> Result<RunId, ExecutorError> {
        Err(ExecutorError::Rejected {
            reason: "maintenance window".into(),
        })
    }
}

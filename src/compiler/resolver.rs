//! Content resolution: reading a node's prose text.
//!
//! Node prose lives in out-of-scope rich-text documents; the compiler only
//! sees this seam. The one subtlety is timing — a just-created node's page
//! may not have synchronized yet — so [`RetryingResolver`] wraps any
//! resolver with a bounded retry that fails loudly instead of hanging.

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::time::Duration;
use thiserror::Error;

use crate::types::NodeId;

/// Failure to read one node's text. Scoped to a single task: the compiler
/// records it on the offending task and keeps compiling unaffected
/// branches.
#[derive(Debug, Error, Diagnostic)]
pub enum ContentResolutionError {
    /// The node's text is not (yet) readable.
    #[error("content unavailable for node {node}")]
    #[diagnostic(
        code(loomcanvas::resolver::unavailable),
        help("The node's page document may not have synchronized yet.")
    )]
    Unavailable { node: NodeId },

    /// Bounded retry spent its budget without the content appearing.
    #[error("content for node {node} still unavailable after {attempts} attempts")]
    #[diagnostic(code(loomcanvas::resolver::exhausted))]
    Exhausted { node: NodeId, attempts: u32 },
}

/// Seam to the out-of-scope rich-text store.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// The node's current prose text.
    async fn resolve(&self, node: NodeId) -> Result<String, ContentResolutionError>;
}

/// In-memory resolver backed by a plain map.
///
/// Serves two purposes: tests, and sessions whose node texts are already
/// local. Texts registered later become visible to in-flight retries.
#[derive(Default)]
pub struct StaticResolver {
    texts: Mutex<FxHashMap<NodeId, String>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: NodeId, text: impl Into<String>) {
        self.texts.lock().insert(node, text.into());
    }

    pub fn remove(&self, node: NodeId) {
        self.texts.lock().remove(&node);
    }
}

#[async_trait]
impl ContentResolver for StaticResolver {
    async fn resolve(&self, node: NodeId) -> Result<String, ContentResolutionError> {
        self.texts
            .lock()
            .get(&node)
            .cloned()
            .ok_or(ContentResolutionError::Unavailable { node })
    }
}

/// Bounded-retry wrapper around any resolver.
pub struct RetryingResolver<R> {
    inner: R,
    max_attempts: u32,
    delay: Duration,
}

impl<R> RetryingResolver<R> {
    /// Wrap `inner`, retrying `Unavailable` up to `max_attempts` times with
    /// `delay` between attempts.
    #[must_use]
    pub fn new(inner: R, max_attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

#[async_trait]
impl<R: ContentResolver> ContentResolver for RetryingResolver<R> {
    async fn resolve(&self, node: NodeId) -> Result<String, ContentResolutionError> {
        for attempt in 1..=self.max_attempts {
            match self.inner.resolve(node).await {
                Ok(text) => return Ok(text),
                Err(ContentResolutionError::Unavailable { .. }) if attempt < self.max_attempts => {
                    tracing::debug!(%node, attempt, "content unavailable, retrying");
                    tokio::time::sleep(self.delay).await;
                }
                Err(ContentResolutionError::Unavailable { .. }) => {
                    return Err(ContentResolutionError::Exhausted {
                        node,
                        attempts: self.max_attempts,
                    });
                }
                Err(other) => return Err(other),
            }
        }
        unreachable!("retry loop returns on its final attempt")
    }
}

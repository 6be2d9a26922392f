//! Sync provider: the network side of the replicated store.
//!
//! [`LocalSyncHub`] is the in-process provider used by the engine and its
//! tests. It plays the role of the sync server: it keeps the merged
//! authoritative register state per document name, fans local operations out
//! to every other connected replica, and replays its state to a replica on
//! connect so that `connect()` can resolve only after "link accepted" AND
//! "initial state synchronized". A networked provider implements the same
//! [`DocumentProvider`] seam.
//!
//! Connectivity failures are [`SyncError`]s — a different failure domain
//! from compilation or execution errors, surfaced through the document's
//! connection events and healed by [`reconnect_with_backoff`] rather than a
//! user-triggered retry.

use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use parking_lot::Mutex;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use super::document::{Document, MapOp};
use super::stamp::{Crdt, Lww};
use crate::types::{ActorId, DocumentName};

/// Connectivity/auth failures from the replicated map store.
#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    /// The provider rejected the auth token at open.
    #[error("auth token rejected for document {document}")]
    #[diagnostic(
        code(loomcanvas::store::auth_rejected),
        help("Check that the session token matches the hub's token.")
    )]
    AuthRejected { document: DocumentName },

    /// The document was created without a provider; it can only be used
    /// offline.
    #[error("document has no sync provider")]
    #[diagnostic(code(loomcanvas::store::no_provider))]
    NoProvider,

    /// The sync link closed before the initial state exchange completed.
    #[error("sync link closed during connect")]
    #[diagnostic(
        code(loomcanvas::store::channel_closed),
        help("The hub dropped the link; reconnect with backoff.")
    )]
    ChannelClosed,

    /// Reconnection gave up after exhausting its attempt budget.
    #[error("reconnect failed after {attempts} attempts")]
    #[diagnostic(code(loomcanvas::store::reconnect_exhausted))]
    ReconnectExhausted { attempts: u32 },
}

/// One frame delivered from the provider to a replica.
#[derive(Clone, Debug)]
pub enum SyncFrame {
    /// A replicated operation to merge.
    Op(MapOp),
    /// Marks the end of the initial state replay; the connect barrier
    /// resolves when the replica observes this.
    Complete,
}

/// Seam between a document replica and whatever moves its operations.
pub(crate) trait DocumentProvider: Send + Sync {
    /// Accept a replica: exchange initial state and return the inbound
    /// frame channel. The provider must queue its current merged state
    /// followed by [`SyncFrame::Complete`] before any live traffic.
    fn begin_connect(&self, doc: &Document) -> Result<flume::Receiver<SyncFrame>, SyncError>;

    /// Drop the replica's link.
    fn finish_disconnect(&self, name: &DocumentName, actor: ActorId);

    /// Broadcast a local operation to every other replica of the document.
    fn forward(&self, name: &DocumentName, origin: ActorId, op: MapOp);
}

#[derive(Default)]
struct HubDoc {
    /// Merged authoritative registers: map name -> key -> register.
    state: FxHashMap<String, FxHashMap<String, Lww<Option<Value>>>>,
    replicas: Vec<ReplicaSlot>,
}

struct ReplicaSlot {
    actor: ActorId,
    tx: flume::Sender<SyncFrame>,
}

struct HubShared {
    token: String,
    docs: Mutex<FxHashMap<DocumentName, HubDoc>>,
}

/// In-process sync provider connecting every replica opened through it.
///
/// # Examples
///
/// ```rust
/// use loomcanvas::store::LocalSyncHub;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), loomcanvas::store::SyncError> {
/// let hub = LocalSyncHub::new("secret");
/// let a = hub.open("canvas:x".into(), "secret")?;
/// let b = hub.open("canvas:x".into(), "secret")?;
/// a.connect().await?;
/// b.connect().await?;
/// // writes on `a` now appear on `b` and vice versa
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalSyncHub {
    shared: Arc<HubShared>,
}

impl LocalSyncHub {
    /// Create a hub that accepts the given auth token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(HubShared {
                token: token.into(),
                docs: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Open a replica of the named document with a fresh actor identity.
    pub fn open(&self, name: DocumentName, token: &str) -> Result<Document, SyncError> {
        self.open_as(name, token, ActorId::generate())
    }

    /// Open a replica with an explicit actor identity, so several documents
    /// of one session share the same origin in write stamps.
    pub fn open_as(
        &self,
        name: DocumentName,
        token: &str,
        actor: ActorId,
    ) -> Result<Document, SyncError> {
        if token != self.shared.token {
            tracing::warn!(document = %name, "rejected open with bad token");
            return Err(SyncError::AuthRejected { document: name });
        }
        let provider: Arc<dyn DocumentProvider> = self.shared.clone();
        Ok(Document::new(name, actor, Some(provider)))
    }

    /// Drop every replica link for the named document, simulating a
    /// network failure. Replicas observe a closed channel and flip to
    /// `Offline`; their local state is untouched.
    pub fn sever(&self, name: &DocumentName) {
        let mut docs = self.shared.docs.lock();
        if let Some(doc) = docs.get_mut(name) {
            doc.replicas.clear();
        }
    }

    /// Number of currently linked replicas for a document.
    #[must_use]
    pub fn replica_count(&self, name: &DocumentName) -> usize {
        self.shared
            .docs
            .lock()
            .get(name)
            .map(|d| d.replicas.len())
            .unwrap_or(0)
    }
}

impl DocumentProvider for HubShared {
    fn begin_connect(&self, doc: &Document) -> Result<flume::Receiver<SyncFrame>, SyncError> {
        // Pull the replica's state before taking the hub lock; the reverse
        // order could deadlock against a concurrent local write.
        let local_ops = doc.state_ops();
        let actor = doc.actor();

        let mut docs = self.docs.lock();
        let hub_doc = docs.entry(doc.name().clone()).or_default();

        // Upstream sync: merge the replica's offline edits, fanning out the
        // ones that won their entry.
        for op in local_ops {
            if merge_into(&mut hub_doc.state, &op) {
                hub_doc
                    .replicas
                    .retain(|slot| slot.tx.send(SyncFrame::Op(op.clone())).is_ok());
            }
        }

        // Downstream sync: queue the merged state, then the barrier marker.
        let (tx, rx) = flume::unbounded();
        for (map, entries) in &hub_doc.state {
            for (key, register) in entries {
                let _ = tx.send(SyncFrame::Op(MapOp {
                    map: map.clone(),
                    key: key.clone(),
                    register: register.clone(),
                }));
            }
        }
        let _ = tx.send(SyncFrame::Complete);

        hub_doc.replicas.retain(|slot| slot.actor != actor);
        hub_doc.replicas.push(ReplicaSlot { actor, tx });
        Ok(rx)
    }

    fn finish_disconnect(&self, name: &DocumentName, actor: ActorId) {
        let mut docs = self.docs.lock();
        if let Some(doc) = docs.get_mut(name) {
            doc.replicas.retain(|slot| slot.actor != actor);
        }
    }

    fn forward(&self, name: &DocumentName, origin: ActorId, op: MapOp) {
        let mut docs = self.docs.lock();
        let Some(doc) = docs.get_mut(name) else {
            return;
        };
        merge_into(&mut doc.state, &op);
        doc.replicas.retain(|slot| {
            if slot.actor == origin {
                return true;
            }
            slot.tx.send(SyncFrame::Op(op.clone())).is_ok()
        });
    }
}

/// Join an op into the hub's authoritative state; true if it won its entry.
fn merge_into(
    state: &mut FxHashMap<String, FxHashMap<String, Lww<Option<Value>>>>,
    op: &MapOp,
) -> bool {
    let entries = state.entry(op.map.clone()).or_default();
    match entries.get(&op.key) {
        Some(existing) => {
            let merged = existing.join(&op.register);
            if merged == *existing {
                false
            } else {
                entries.insert(op.key.clone(), merged);
                true
            }
        }
        None => {
            entries.insert(op.key.clone(), op.register.clone());
            true
        }
    }
}

/// Backoff schedule for automatic reconnection.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Reconnect a document with exponential backoff and jitter.
///
/// Connectivity loss heals automatically; the user never drives the retry.
/// Gives up with [`SyncError::ReconnectExhausted`] once the attempt budget
/// is spent so callers fail loudly instead of hanging.
pub async fn reconnect_with_backoff(
    doc: &Document,
    policy: &ReconnectPolicy,
) -> Result<(), SyncError> {
    let mut delay = policy.base_delay;
    for attempt in 1..=policy.max_attempts {
        match doc.connect().await {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::warn!(doc = %doc.name(), attempt, %err, "reconnect attempt failed");
            }
        }
        let jitter_ms = rand::rng().random_range(0..=(delay.as_millis() as u64 / 4).max(1));
        tokio::time::sleep(delay + Duration::from_millis(jitter_ms)).await;
        delay = (delay * 2).min(policy.max_delay);
    }
    Err(SyncError::ReconnectExhausted {
        attempts: policy.max_attempts,
    })
}

//! Replicated documents: named collections of conflict-free maps.
//!
//! A [`Document`] is one client's in-memory replica of a named store. Local
//! writes apply immediately and are forwarded to the sync provider; remote
//! operations merge through the last-writer-wins register in
//! [`super::stamp`]. There is no central lock: convergence comes entirely
//! from the per-entry merge plus the whole-value-replace convention
//! documented on [`MapHandle`](super::MapHandle).
//!
//! # Change subscription
//!
//! [`Document::subscribe`] returns a [`flume::Receiver`] of [`DocEvent`]s.
//! Every effective write — local, remote, or an undo replay — produces one
//! [`MapChange`] carrying its [`Origin`], which is how consumers tell a
//! local undo apart from a concurrent remote edit. Connection transitions
//! are delivered on the same feed as [`DocEvent::Connection`] so a UI can
//! show a connection banner without polling.
//!
//! # Examples
//!
//! ```rust
//! use loomcanvas::store::LocalSyncHub;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), loomcanvas::store::SyncError> {
//! let hub = LocalSyncHub::new("token-1");
//! let doc = hub.open("canvas:demo".into(), "token-1")?;
//! doc.connect().await?;
//!
//! let nodes = doc.get_map("nodes");
//! nodes.set("a", json!({"x": 1}));
//! assert_eq!(nodes.get("a"), Some(json!({"x": 1})));
//! doc.disconnect();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use super::map::MapHandle;
use super::provider::{DocumentProvider, SyncError, SyncFrame};
use super::stamp::{Crdt, Lww, Stamp};
use crate::types::{ActorId, DocumentName};

/// Where a map change came from, as seen by one replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A mutation issued through this replica's own handles.
    Local,
    /// An operation merged from another replica.
    Remote(ActorId),
    /// A batched undo/redo replay issued by this replica's snapshot manager.
    Replay,
}

impl Origin {
    /// True for changes this replica initiated (including undo replays).
    #[must_use]
    pub fn is_local(self) -> bool {
        !matches!(self, Origin::Remote(_))
    }
}

/// One effective change to a map entry.
#[derive(Clone, Debug)]
pub struct MapChange {
    pub map: String,
    pub key: String,
    pub origin: Origin,
    pub previous: Option<Value>,
    pub current: Option<Value>,
}

/// Connection state of a document replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Offline,
    Connected,
}

/// Event delivered to document subscribers.
#[derive(Clone, Debug)]
pub enum DocEvent {
    Change(MapChange),
    Connection(ConnectionStatus),
}

/// A replicated operation on one map entry: the entry's full register.
///
/// Sync is state-based per entry — the whole [`Lww`] register travels, and
/// the receiver joins it into its own entry. Applying an op twice, or
/// applying ops out of order, converges to the same state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapOp {
    pub map: String,
    pub key: String,
    pub register: Lww<Option<Value>>,
}

#[derive(Default)]
struct MapState {
    entries: FxHashMap<String, Lww<Option<Value>>>,
}

pub(crate) struct DocumentInner {
    name: DocumentName,
    actor: ActorId,
    clock: Mutex<u64>,
    maps: Mutex<FxHashMap<String, MapState>>,
    subscribers: Mutex<Vec<flume::Sender<DocEvent>>>,
    connection: Mutex<ConnectionStatus>,
    provider: Mutex<Option<Arc<dyn DocumentProvider>>>,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// One client's replica of a named document. Cheap to clone.
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Arc<DocumentInner>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.inner.name)
            .field("actor", &self.inner.actor)
            .finish_non_exhaustive()
    }
}

impl Document {
    pub(crate) fn new(
        name: DocumentName,
        actor: ActorId,
        provider: Option<Arc<dyn DocumentProvider>>,
    ) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                name,
                actor,
                clock: Mutex::new(0),
                maps: Mutex::new(FxHashMap::default()),
                subscribers: Mutex::new(Vec::new()),
                connection: Mutex::new(ConnectionStatus::Offline),
                provider: Mutex::new(provider),
                pump: Mutex::new(None),
            }),
        }
    }

    /// The document's name.
    #[must_use]
    pub fn name(&self) -> &DocumentName {
        &self.inner.name
    }

    /// The local replica's actor id.
    #[must_use]
    pub fn actor(&self) -> ActorId {
        self.inner.actor
    }

    /// Handle onto the named map, created lazily on first access.
    #[must_use]
    pub fn get_map(&self, name: &str) -> MapHandle {
        MapHandle {
            map: name.to_string(),
            doc: self.inner.clone(),
        }
    }

    /// Typed handle onto the named map.
    #[must_use]
    pub fn get_typed_map<V>(&self, name: &str) -> super::TypedMap<V> {
        self.get_map(name).typed()
    }

    /// Subscribe to map changes and connection transitions.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<DocEvent> {
        let (tx, rx) = flume::unbounded();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    /// Subscription as an async stream, for consumers that compose with
    /// stream combinators instead of draining a channel.
    #[must_use]
    pub fn subscribe_stream(&self) -> futures_util::stream::BoxStream<'static, DocEvent> {
        use futures_util::StreamExt;
        self.subscribe().into_stream().boxed()
    }

    /// Current connection status.
    #[must_use]
    pub fn connection(&self) -> ConnectionStatus {
        *self.inner.connection.lock()
    }

    /// Connect to the sync provider.
    ///
    /// Resolves only once both conditions hold: the provider accepted the
    /// link, and the initial state exchange completed in both directions
    /// (the replica's offline edits are pushed up, the provider's merged
    /// state is replayed down). Until then no remote operation is observed.
    pub async fn connect(&self) -> Result<(), SyncError> {
        let provider = self
            .inner
            .provider
            .lock()
            .clone()
            .ok_or(SyncError::NoProvider)?;

        // Stop a leftover pump before the new link exists, so a stale task
        // can never race the fresh connection state.
        if let Some(old) = self.inner.pump.lock().take() {
            old.abort();
        }
        let rx = provider.begin_connect(self)?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let pump = tokio::spawn(pump_frames(self.inner.clone(), rx, ready_tx));
        *self.inner.pump.lock() = Some(pump);

        ready_rx.await.map_err(|_| SyncError::ChannelClosed)?;
        self.inner.set_connection(ConnectionStatus::Connected);
        tracing::debug!(doc = %self.inner.name, "document connected and synced");
        Ok(())
    }

    /// Release the sync link. Local state stays usable offline; later
    /// `connect()` calls re-synchronize through the provider.
    pub fn disconnect(&self) {
        if let Some(provider) = self.inner.provider.lock().clone() {
            provider.finish_disconnect(&self.inner.name, self.inner.actor);
        }
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        self.inner.set_connection(ConnectionStatus::Offline);
    }

    /// Replay a batch of entry values as one logical write, tagged
    /// [`Origin::Replay`]. Used by the undo manager: only the listed
    /// entries are touched, nothing else is rolled back.
    pub fn apply_replay(&self, entries: Vec<(String, String, Option<Value>)>) {
        for (map, key, value) in entries {
            self.inner.apply_local(&map, &key, value, Origin::Replay);
        }
    }

    /// Export the full entry state (tombstones included) as ops, for
    /// provider-side state exchange.
    #[must_use]
    pub fn state_ops(&self) -> Vec<MapOp> {
        let maps = self.inner.maps.lock();
        let mut ops = Vec::new();
        for (map_name, state) in maps.iter() {
            for (key, register) in &state.entries {
                ops.push(MapOp {
                    map: map_name.clone(),
                    key: key.clone(),
                    register: register.clone(),
                });
            }
        }
        ops
    }

    /// Merge a remote operation into this replica.
    pub fn apply_remote(&self, op: MapOp) {
        self.inner.apply_remote(op);
    }
}

async fn pump_frames(
    inner: Arc<DocumentInner>,
    rx: flume::Receiver<SyncFrame>,
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);
    loop {
        match rx.recv_async().await {
            Ok(SyncFrame::Op(op)) => inner.apply_remote(op),
            Ok(SyncFrame::Complete) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
            }
            Err(_) => {
                // Provider dropped the link: surface it and stop. Reconnect
                // is the job of the session's auto-reconnect loop.
                inner.set_connection(ConnectionStatus::Offline);
                break;
            }
        }
    }
}

impl DocumentInner {
    pub(crate) fn read_entry(&self, map: &str, key: &str) -> Option<Value> {
        let maps = self.maps.lock();
        maps.get(map)
            .and_then(|m| m.entries.get(key))
            .and_then(|reg| reg.value.clone())
    }

    pub(crate) fn read_values(&self, map: &str) -> Vec<Value> {
        let maps = self.maps.lock();
        maps.get(map)
            .map(|m| m.entries.values().filter_map(|r| r.value.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn read_keys(&self, map: &str) -> Vec<String> {
        let maps = self.maps.lock();
        maps.get(map)
            .map(|m| {
                m.entries
                    .iter()
                    .filter(|(_, r)| r.value.is_some())
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn apply_local(&self, map: &str, key: &str, value: Option<Value>, origin: Origin) {
        let stamp = {
            let mut clock = self.clock.lock();
            *clock += 1;
            Stamp::new(*clock, self.actor)
        };
        let register = Lww::new(value, stamp);

        let previous = {
            let mut maps = self.maps.lock();
            let state = maps.entry(map.to_string()).or_default();
            state
                .entries
                .insert(key.to_string(), register.clone())
                .and_then(|old| old.value)
        };

        self.publish(DocEvent::Change(MapChange {
            map: map.to_string(),
            key: key.to_string(),
            origin,
            previous,
            current: register.value.clone(),
        }));

        if *self.connection.lock() == ConnectionStatus::Connected {
            if let Some(provider) = self.provider.lock().clone() {
                provider.forward(
                    &self.name,
                    self.actor,
                    MapOp {
                        map: map.to_string(),
                        key: key.to_string(),
                        register,
                    },
                );
            }
        }
    }

    pub(crate) fn apply_remote(&self, op: MapOp) {
        {
            let mut clock = self.clock.lock();
            *clock = (*clock).max(op.register.stamp.tick);
        }

        let changed = {
            let mut maps = self.maps.lock();
            let state = maps.entry(op.map.clone()).or_default();
            match state.entries.get(&op.key) {
                Some(existing) => {
                    let merged = existing.join(&op.register);
                    if merged == *existing {
                        None
                    } else {
                        let previous = existing.value.clone();
                        let current = merged.value.clone();
                        state.entries.insert(op.key.clone(), merged);
                        Some((previous, current))
                    }
                }
                None => {
                    state.entries.insert(op.key.clone(), op.register.clone());
                    Some((None, op.register.value.clone()))
                }
            }
        };

        if let Some((previous, current)) = changed {
            self.publish(DocEvent::Change(MapChange {
                map: op.map,
                key: op.key,
                origin: Origin::Remote(op.register.stamp.actor),
                previous,
                current,
            }));
        }
    }

    pub(crate) fn set_connection(&self, status: ConnectionStatus) {
        let changed = {
            let mut current = self.connection.lock();
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        };
        if changed {
            self.publish(DocEvent::Connection(status));
        }
    }

    fn publish(&self, event: DocEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

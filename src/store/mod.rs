//! Conflict-free replicated map store.
//!
//! The store is organised around three pieces:
//!
//! - [`stamp`]: the last-writer-wins register and its total order
//! - [`Document`]: one client's replica of a named collection of maps
//! - [`LocalSyncHub`]: the provider that moves operations between replicas
//!
//! Convergence does not rely on locks or operational transforms: every map
//! entry is replaced wholesale under a totally ordered stamp, so replicas
//! that have seen the same set of operations hold the same state. Character
//! level merging belongs to the out-of-scope rich-text documents, not here.

mod document;
mod map;
mod provider;
mod stamp;

pub use document::{ConnectionStatus, DocEvent, Document, MapChange, MapOp, Origin};
pub use map::{MapHandle, TypedMap};
pub use provider::{reconnect_with_backoff, LocalSyncHub, ReconnectPolicy, SyncError, SyncFrame};
pub use stamp::{Crdt, Lww, Stamp};

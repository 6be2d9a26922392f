//! Map handles: the public read/write surface of a replicated document.
//!
//! A [`MapHandle`] is an untyped view onto one named map of a
//! [`Document`](super::Document); values are raw [`serde_json::Value`]s.
//! [`TypedMap`] layers serde on top for callers that know the value schema
//! (the graph model stores [`CanvasNode`](crate::canvas::CanvasNode)s and
//! [`CanvasEdge`](crate::canvas::CanvasEdge)s this way).
//!
//! Writes issued through a handle are stamped by the owning document's
//! clock, applied to the local replica immediately, and broadcast to every
//! connected replica of the same document name. There is no field-level
//! merge: a `set` replaces the whole entry, and concurrent writers to the
//! same key race at whole-value granularity (last writer wins).

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::document::{DocumentInner, Origin};

/// Untyped handle onto one named map of a replicated document.
///
/// Cheap to clone; all clones share the same underlying replica state.
#[derive(Clone)]
pub struct MapHandle {
    pub(super) map: String,
    pub(super) doc: Arc<DocumentInner>,
}

impl MapHandle {
    /// Name of the map inside its document.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.map
    }

    /// Current value for `key`, if present and not deleted.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.doc.read_entry(&self.map, key)
    }

    /// Store `value` under `key`, replacing any previous value wholesale.
    pub fn set(&self, key: &str, value: Value) {
        self.doc
            .apply_local(&self.map, key, Some(value), Origin::Local);
    }

    /// Delete `key`. Deletes are tombstones and merge like any other write.
    pub fn delete(&self, key: &str) {
        self.doc.apply_local(&self.map, key, None, Origin::Local);
    }

    /// All live (non-deleted) values, in unspecified order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.doc.read_values(&self.map)
    }

    /// All live keys, in unspecified order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.doc.read_keys(&self.map)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc.read_keys(&self.map).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed wrapper over this handle.
    #[must_use]
    pub fn typed<V>(&self) -> TypedMap<V> {
        TypedMap {
            handle: self.clone(),
            _marker: PhantomData,
        }
    }
}

/// Typed view over a [`MapHandle`].
///
/// `get` surfaces decode failures so callers notice schema drift;
/// `values` skips undecodable entries with a warning, because a single
/// entry written by a newer build must not make the whole map unreadable.
#[derive(Clone)]
pub struct TypedMap<V> {
    handle: MapHandle,
    _marker: PhantomData<V>,
}

impl<V> TypedMap<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Decoded value for `key`.
    pub fn get(&self, key: &str) -> Result<Option<V>, serde_json::Error> {
        match self.handle.get(key) {
            Some(raw) => Ok(Some(serde_json::from_value(raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and store `value` under `key`.
    pub fn set(&self, key: &str, value: &V) -> Result<(), serde_json::Error> {
        self.handle.set(key, serde_json::to_value(value)?);
        Ok(())
    }

    pub fn delete(&self, key: &str) {
        self.handle.delete(key);
    }

    /// All decodable live values. Entries that fail to decode are skipped
    /// with a warning rather than failing the whole read.
    #[must_use]
    pub fn values(&self) -> Vec<V> {
        self.handle
            .values()
            .into_iter()
            .filter_map(|raw| match serde_json::from_value(raw) {
                Ok(v) => Some(v),
                Err(err) => {
                    tracing::warn!(map = %self.handle.map, %err, "skipping undecodable map entry");
                    None
                }
            })
            .collect()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.handle.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handle.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// The untyped handle underneath.
    #[must_use]
    pub fn raw(&self) -> &MapHandle {
        &self.handle
    }
}

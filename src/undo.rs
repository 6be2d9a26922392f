//! Undo/redo snapshot manager.
//!
//! The manager does not roll whole documents back. Each recorded batch
//! captures the before/after values of exactly the entries a local
//! operation touched; `undo` replays the before-values (and `redo` the
//! after-values) as one batched write tagged [`Origin::Replay`], so
//! subscribers can tell a local undo from a remote edit. Remote edits to
//! *other* entries that arrived in between are never reverted. Remote
//! edits to a *captured* entry are overwritten by the replay — the replay
//! is an ordinary write and wins by last-writer-wins, which is the
//! documented trade-off of whole-value replication.
//!
//! The stack is bounded; the oldest batch is evicted when full, and the
//! whole history is cleared when the user navigates away.

use serde_json::Value;

use crate::store::Document;

/// Default bound on the undo stack.
pub const DEFAULT_UNDO_DEPTH: usize = 100;

#[derive(Clone, Debug)]
struct BatchEntry {
    map: String,
    key: String,
    before: Option<Value>,
    after: Option<Value>,
}

/// One undoable unit: every entry touched by one logical operation.
#[derive(Clone, Debug, Default)]
pub struct UndoBatch {
    entries: Vec<BatchEntry>,
}

impl UndoBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Bounded undo/redo history for one document.
pub struct UndoManager {
    doc: Document,
    undo_stack: Vec<UndoBatch>,
    redo_stack: Vec<UndoBatch>,
    depth: usize,
}

impl UndoManager {
    /// Manager over the given document with the default depth.
    #[must_use]
    pub fn new(doc: Document) -> Self {
        Self::with_depth(doc, DEFAULT_UNDO_DEPTH)
    }

    #[must_use]
    pub fn with_depth(doc: Document, depth: usize) -> Self {
        Self {
            doc,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            depth: depth.max(1),
        }
    }

    /// Record a mutation over the given `(map, key)` entries.
    ///
    /// Captures the entries' current values, runs the mutation, captures
    /// the resulting values, and pushes the pair as one batch. Starting a
    /// new batch clears the redo history.
    pub fn record<T>(&mut self, touched: &[(&str, String)], mutate: impl FnOnce() -> T) -> T {
        let before: Vec<Option<Value>> = touched
            .iter()
            .map(|(map, key)| self.doc.get_map(map).get(key))
            .collect();

        let result = mutate();

        let entries = touched
            .iter()
            .zip(before)
            .map(|((map, key), before)| BatchEntry {
                map: (*map).to_string(),
                key: key.clone(),
                before,
                after: self.doc.get_map(map).get(key),
            })
            .collect();

        self.push(UndoBatch { entries });
        result
    }

    fn push(&mut self, batch: UndoBatch) {
        if batch.is_empty() {
            return;
        }
        self.redo_stack.clear();
        if self.undo_stack.len() >= self.depth {
            self.undo_stack.remove(0);
        }
        self.undo_stack.push(batch);
    }

    /// Replay the most recent batch's before-values. Returns false when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(batch) = self.undo_stack.pop() else {
            return false;
        };
        self.doc.apply_replay(
            batch
                .entries
                .iter()
                .map(|e| (e.map.clone(), e.key.clone(), e.before.clone()))
                .collect(),
        );
        self.redo_stack.push(batch);
        true
    }

    /// Replay the most recently undone batch's after-values.
    pub fn redo(&mut self) -> bool {
        let Some(batch) = self.redo_stack.pop() else {
            return false;
        };
        self.doc.apply_replay(
            batch
                .entries
                .iter()
                .map(|e| (e.map.clone(), e.key.clone(), e.after.clone()))
                .collect(),
        );
        self.undo_stack.push(batch);
        true
    }

    /// Drop all history. Called on navigation away from the canvas.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}

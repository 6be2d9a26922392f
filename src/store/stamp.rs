//! Write stamps and the last-writer-wins register.
//!
//! Every entry in a replicated map is an [`Lww`] register: a value plus the
//! [`Stamp`] of the write that produced it. Merging two registers keeps the
//! one with the higher stamp. Stamps are totally ordered — a Lamport tick
//! first, the writing actor's id as tie-break — so the merge is deterministic
//! on every replica regardless of delivery order.
//!
//! The merge satisfies the usual join-semilattice laws (commutative,
//! associative, idempotent); `tests/store_convergence.rs` checks them with
//! proptest.

use serde::{Deserialize, Serialize};

use crate::types::ActorId;

/// A totally ordered write stamp: Lamport tick plus writing actor.
///
/// Ordering is derived lexicographically, so two writes at the same tick are
/// resolved by actor id — arbitrary, but identical on every replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    /// Lamport tick of the originating document clock.
    pub tick: u64,
    /// The replica that issued the write.
    pub actor: ActorId,
}

impl Stamp {
    #[must_use]
    pub fn new(tick: u64, actor: ActorId) -> Self {
        Self { tick, actor }
    }
}

/// A state-based conflict-free replicated value.
///
/// Properties required of `join`:
/// - Commutative: `join(a, b) == join(b, a)`
/// - Associative: `join(join(a, b), c) == join(a, join(b, c))`
/// - Idempotent: `join(a, a) == a`
pub trait Crdt: Sized {
    /// Merge two states into one that includes information from both.
    fn join(&self, other: &Self) -> Self;
}

/// Last-writer-wins register.
///
/// The fundamental merge primitive for whole-value entries: higher stamp
/// wins. Map entries store `Lww<Option<Value>>` — `None` is a delete
/// tombstone, so a delete and a concurrent overwrite of the same key resolve
/// the same way as two competing writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lww<T> {
    pub value: T,
    pub stamp: Stamp,
}

impl<T> Lww<T> {
    pub fn new(value: T, stamp: Stamp) -> Self {
        Self { value, stamp }
    }
}

impl<T: Clone> Crdt for Lww<T> {
    fn join(&self, other: &Self) -> Self {
        if self.stamp >= other.stamp {
            self.clone()
        } else {
            other.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn actor(byte: u8) -> ActorId {
        ActorId(Uuid::from_bytes([byte; 16]))
    }

    #[test]
    fn higher_tick_wins() {
        let a = Lww::new("old", Stamp::new(1, actor(1)));
        let b = Lww::new("new", Stamp::new(2, actor(2)));
        assert_eq!(a.join(&b).value, "new");
        assert_eq!(b.join(&a).value, "new");
    }

    #[test]
    fn actor_breaks_ties_deterministically() {
        let a = Lww::new("from-a", Stamp::new(3, actor(1)));
        let b = Lww::new("from-b", Stamp::new(3, actor(9)));
        // Higher actor id wins the tie on both replicas.
        assert_eq!(a.join(&b), b.join(&a));
        assert_eq!(a.join(&b).value, "from-b");
    }

    #[test]
    fn tombstone_participates_in_merge() {
        let write = Lww::new(Some("text"), Stamp::new(5, actor(1)));
        let delete = Lww::new(None, Stamp::new(6, actor(2)));
        assert_eq!(write.join(&delete).value, None);
    }
}

//! Observable status map for one artifact's actions.
//!
//! The store publishes an immutable, insertion-ordered snapshot that is
//! replaced atomically on every mutation: readers either see the map before a
//! `set_key` or after it, never in between. Subscribers receive snapshots
//! through a `tokio::sync::watch` channel; per-action statuses only move
//! forward, so a subscriber that misses intermediate snapshots still observes
//! monotonically non-decreasing lifecycle states.
//!
//! Terminal entries are never evicted — the store lives exactly as long as
//! its artifact.

use std::sync::Arc;

use tokio::sync::watch;

use crate::action::{ActionState, ActionStatus};

/// Immutable view of the action map, in insertion order.
pub type ActionSnapshot = Arc<Vec<ActionState>>;

/// Ordered `action id → ActionState` map with snapshot publication.
///
/// Cloning the store is cheap and shares the underlying map; all mutations
/// funnel through [`ActionStore::set_key`]. The watch channel is the single
/// source of truth: mutations happen inside the sender's own lock, so two
/// racing `set_key` calls can never publish out of order and overwrite each
/// other's update.
#[derive(Clone)]
pub struct ActionStore {
    tx: Arc<watch::Sender<ActionSnapshot>>,
}

impl ActionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        ActionStore { tx: Arc::new(tx) }
    }

    /// Current snapshot of every known action, in insertion order.
    pub fn get(&self) -> ActionSnapshot {
        self.tx.borrow().clone()
    }

    /// Publish a new value for one action id.
    ///
    /// Inserts at the end when the id is new, replaces in place otherwise.
    /// The updated snapshot is visible to `get()` and all subscribers before
    /// this returns. Earlier snapshots held by readers are untouched.
    pub fn set_key(&self, state: ActionState) {
        self.tx.send_modify(|snapshot| {
            let entries = Arc::make_mut(snapshot);
            match entries.iter_mut().find(|entry| entry.id == state.id) {
                Some(entry) => *entry = state,
                None => entries.push(state),
            }
        });
    }

    /// Look up a single action by id.
    pub fn get_key(&self, id: &str) -> Option<ActionState> {
        self.get().iter().find(|entry| entry.id == id).cloned()
    }

    /// Convenience: status of one action, if known.
    pub fn status(&self, id: &str) -> Option<ActionStatus> {
        self.get_key(id).map(|entry| entry.status)
    }

    /// Subscribe to snapshot updates. The receiver is primed with the
    /// current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ActionSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for ActionStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

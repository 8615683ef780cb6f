//! Lock-backed snapshot cell.
//!
//! [`LockedCell`] keeps the current snapshot behind a `RwLock`. Reads clone
//! the snapshot, which only bumps a reference count on the root.

use std::sync::RwLock;

use crate::snapshot::Snapshot;
use crate::traits::SnapshotCell;

/// The default [`SnapshotCell`].
#[derive(Debug)]
pub struct LockedCell {
    current: RwLock<Snapshot>,
}

impl LockedCell {
    /// A cell holding an empty tree.
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::empty())
    }

    /// A cell holding `initial`.
    pub fn with_snapshot(initial: Snapshot) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }
}

impl Default for LockedCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCell for LockedCell {
    fn load(&self) -> Snapshot {
        self.current.read().expect("lock poisoned").clone()
    }

    fn commit(&self, next: Snapshot) -> (Snapshot, Snapshot) {
        let mut current = self.current.write().expect("lock poisoned");
        let committed = next.stamped(current.version() + 1);
        let previous = std::mem::replace(&mut *current, committed.clone());
        (previous, committed)
    }
}

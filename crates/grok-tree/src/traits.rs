//! The [`SnapshotCell`] trait defining the snapshot pointer interface.
//!
//! The observable tree never owns its current snapshot directly; it goes
//! through a cell so the backing (a lock, an actor, transactional memory)
//! can be chosen by whoever builds the tree.

use crate::snapshot::Snapshot;

/// Holder of the single authoritative snapshot.
///
/// Implementations must be thread-safe and make [`commit`](Self::commit)
/// atomic with respect to other commits: the previous snapshot it returns is
/// exactly the one the committed snapshot replaced.
pub trait SnapshotCell: Send + Sync {
    /// The current snapshot.
    fn load(&self) -> Snapshot;

    /// Replace the current snapshot with `next`.
    ///
    /// The committed snapshot must carry a version one greater than the
    /// previous snapshot's. Returns `(previous, committed)`.
    fn commit(&self, next: Snapshot) -> (Snapshot, Snapshot);
}

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::trace;

use crate::cursor::Cursor;
use crate::error::Result;
use crate::memory::LockedCell;
use crate::node::{Node, Path};
use crate::snapshot::Snapshot;
use crate::subscription::Subscription;
use crate::traits::SnapshotCell;

/// Callback invoked with `(new, old)` values at an observed path.
pub type ObserverFn = Arc<dyn Fn(Option<&Node>, Option<&Node>) + Send + Sync>;

struct Observer {
    id: u64,
    path: Path,
    active: AtomicBool,
    callback: ObserverFn,
}

/// Commits waiting to be announced, oldest first.
#[derive(Default)]
struct Delivery {
    queue: VecDeque<(Snapshot, Snapshot)>,
    running: bool,
}

/// Clears the delivery round if a callback panics, so later commits are
/// still announced.
struct RoundGuard<'a>(&'a Mutex<Delivery>);

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Ok(mut delivery) = self.0.lock() {
                delivery.queue.clear();
                delivery.running = false;
            }
        }
    }
}

/// The process-wide, versioned, observable state tree.
///
/// Writes go through [`stage`](Self::stage), which commits a snapshot and
/// then notifies every observer whose path now holds a different value.
/// Notification happens in subscription order with no internal lock held,
/// so callbacks may read, stage, subscribe, and unsubscribe freely.
///
/// Commits are announced one at a time, in commit order. A commit made while
/// a round is running (from a callback, or from another thread) is queued
/// and announced by that round once the current commit has reached every
/// observer. Each observer therefore sees consecutive versions, and the last
/// `new` value it receives is the one the tree holds.
pub struct ObservableTree {
    cell: Box<dyn SnapshotCell>,
    observers: RwLock<Vec<Arc<Observer>>>,
    delivery: Mutex<Delivery>,
    next_id: AtomicU64,
}

impl ObservableTree {
    /// A tree backed by a [`LockedCell`] holding an empty snapshot.
    pub fn new() -> Self {
        Self::with_cell(LockedCell::new())
    }

    /// A tree backed by a custom snapshot cell.
    pub fn with_cell(cell: impl SnapshotCell + 'static) -> Self {
        Self {
            cell: Box::new(cell),
            observers: RwLock::new(Vec::new()),
            delivery: Mutex::new(Delivery::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.cell.load()
    }

    /// The value at `path` in the current snapshot.
    pub fn get(&self, path: &Path) -> Option<Node> {
        self.cell.load().get_in(path).cloned()
    }

    /// Commit `next` as the current snapshot and notify observers.
    ///
    /// Last writer wins: `next` replaces whatever is current, even if it was
    /// derived from an older snapshot. Returns the committed snapshot.
    ///
    /// When a notification round is already running, the commit is queued
    /// for that round and this call returns without notifying.
    pub fn stage(&self, next: Snapshot) -> Snapshot {
        let committed = {
            let mut delivery = self.delivery.lock().expect("lock poisoned");
            let (previous, committed) = self.cell.commit(next);
            delivery.queue.push_back((previous, committed.clone()));
            if delivery.running {
                trace!(version = committed.version(), "commit queued for running round");
                return committed;
            }
            delivery.running = true;
            committed
        };

        let _guard = RoundGuard(&self.delivery);
        loop {
            let (previous, current) = {
                let mut delivery = self.delivery.lock().expect("lock poisoned");
                match delivery.queue.pop_front() {
                    Some(pair) => pair,
                    None => {
                        delivery.running = false;
                        break;
                    }
                }
            };
            self.announce(&previous, &current);
        }
        committed
    }

    /// Read-combine-write against the snapshot current at call time.
    pub fn update<F>(&self, path: &Path, f: F) -> Result<Snapshot>
    where
        F: FnOnce(Option<&Node>) -> Option<Node>,
    {
        let next = self.snapshot().update_in(path, f)?;
        Ok(self.stage(next))
    }

    /// Store `node` at `path`.
    pub fn set(&self, path: &Path, node: Node) -> Result<Snapshot> {
        self.update(path, move |_| Some(node))
    }

    /// Remove the key at `path`.
    pub fn remove(&self, path: &Path) -> Result<Snapshot> {
        self.update(path, |_| None)
    }

    /// A handle bound to `path`.
    pub fn cursor(self: &Arc<Self>, path: Path) -> Cursor {
        Cursor::new(Arc::clone(self), path)
    }

    /// Call `f(new, old)` whenever a commit changes the value at `path`.
    pub fn observe<F>(self: &Arc<Self>, path: Path, f: F) -> Subscription
    where
        F: Fn(Option<&Node>, Option<&Node>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let observer = Arc::new(Observer {
            id,
            path,
            active: AtomicBool::new(true),
            callback: Arc::new(f),
        });
        self.observers
            .write()
            .expect("lock poisoned")
            .push(Arc::clone(&observer));

        let tree: Weak<ObservableTree> = Arc::downgrade(self);
        Subscription::new(move || {
            observer.active.store(false, Ordering::Release);
            if let Some(tree) = tree.upgrade() {
                tree.detach(observer.id);
            }
        })
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().expect("lock poisoned").len()
    }

    fn announce(&self, previous: &Snapshot, committed: &Snapshot) {
        let observers: Vec<Arc<Observer>> =
            self.observers.read().expect("lock poisoned").clone();

        let mut fired = 0usize;
        for observer in observers {
            if !observer.active.load(Ordering::Acquire) {
                continue;
            }
            let old = previous.get_in(&observer.path);
            let new = committed.get_in(&observer.path);
            if old != new {
                fired += 1;
                (observer.callback)(new, old);
            }
        }
        trace!(version = committed.version(), fired, "snapshot staged");
    }

    fn detach(&self, id: u64) {
        self.observers
            .write()
            .expect("lock poisoned")
            .retain(|observer| observer.id != id);
    }
}

impl Default for ObservableTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObservableTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableTree")
            .field("version", &self.snapshot().version())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn path(keys: &[&str]) -> Path {
        keys.iter().fold(Path::root(), |p, k| p.child(*k))
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(tree: &Arc<ObservableTree>, p: Path, tag: &'static str, log: &Log) -> Subscription {
        let log = Arc::clone(log);
        tree.observe(p, move |new, old| {
            log.lock().unwrap().push(format!(
                "{tag}:{:?}->{:?}",
                old.and_then(Node::as_i64),
                new.and_then(Node::as_i64)
            ));
        })
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    #[test]
    fn stage_replaces_snapshot_and_versions() {
        let tree = ObservableTree::new();
        let first = tree.set(&path(&["a"]), Node::Int(1)).unwrap();
        let second = tree.set(&path(&["a"]), Node::Int(2)).unwrap();
        assert_eq!(first.version(), 1);
        assert_eq!(second.version(), 2);
        assert_eq!(tree.get(&path(&["a"])), Some(Node::Int(2)));
        // Old snapshots stay readable.
        assert_eq!(first.get_in(&path(&["a"])), Some(&Node::Int(1)));
    }

    #[test]
    fn last_writer_wins_on_stale_snapshot() {
        let tree = ObservableTree::new();
        let stale = tree.snapshot();
        tree.set(&path(&["a"]), Node::Int(1)).unwrap();
        tree.stage(stale.set_in(&path(&["b"]), Node::Int(2)).unwrap());

        assert_eq!(tree.get(&path(&["a"])), None);
        assert_eq!(tree.get(&path(&["b"])), Some(Node::Int(2)));
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    #[test]
    fn observer_fires_on_change_only() {
        let tree = Arc::new(ObservableTree::new());
        let log: Log = Arc::default();
        recorder(&tree, path(&["deck", "self"]), "self", &log);

        tree.set(&path(&["deck", "self"]), Node::Int(5)).unwrap();
        tree.set(&path(&["deck", "self"]), Node::Int(5)).unwrap();
        tree.set(&path(&["deck", "root"]), Node::Int(1)).unwrap();
        tree.set(&path(&["deck", "self"]), Node::Int(9)).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["self:None->Some(5)", "self:Some(5)->Some(9)"]
        );
    }

    #[test]
    fn structurally_equal_rebuild_does_not_fire() {
        let tree = Arc::new(ObservableTree::new());
        let p = path(&["deck", "lookup"]);
        tree.set(&p, Node::from_json(&serde_json::json!({"id": 1}))).unwrap();

        let log: Log = Arc::default();
        recorder(&tree, p.clone(), "lookup", &log);
        tree.set(&p, Node::from_json(&serde_json::json!({"id": 1}))).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn parent_observer_sees_child_changes() {
        let tree = Arc::new(ObservableTree::new());
        let log: Log = Arc::default();
        recorder(&tree, path(&["deck"]), "deck", &log);

        tree.set(&path(&["deck", "self"]), Node::Int(5)).unwrap();
        tree.set(&path(&["card", "self"]), Node::Int(5)).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn observers_fire_in_subscription_order() {
        let tree = Arc::new(ObservableTree::new());
        let log: Log = Arc::default();
        recorder(&tree, path(&["x"]), "first", &log);
        recorder(&tree, path(&["x"]), "second", &log);
        recorder(&tree, Path::root(), "root", &log);

        tree.set(&path(&["x"]), Node::Int(1)).unwrap();
        let entries = log.lock().unwrap().clone();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].starts_with("first"));
        assert!(entries[1].starts_with("second"));
        assert!(entries[2].starts_with("root"));
    }

    #[test]
    fn unsubscribe_is_idempotent_and_detaches() {
        let tree = Arc::new(ObservableTree::new());
        let log: Log = Arc::default();
        let sub = recorder(&tree, path(&["x"]), "x", &log);
        assert_eq!(tree.observer_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(tree.observer_count(), 0);

        tree.set(&path(&["x"]), Node::Int(1)).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn observer_unsubscribed_mid_round_does_not_fire() {
        let tree = Arc::new(ObservableTree::new());
        let log: Log = Arc::default();

        let victim: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let v = Arc::clone(&victim);
        tree.observe(path(&["x"]), move |_, _| {
            if let Some(sub) = v.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *victim.lock().unwrap() = Some(recorder(&tree, path(&["x"]), "victim", &log));

        tree.set(&path(&["x"]), Node::Int(1)).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let tree = Arc::new(ObservableTree::new());
        let own: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let hits = Arc::new(AtomicU64::new(0));

        let (o, h) = (Arc::clone(&own), Arc::clone(&hits));
        let sub = tree.observe(path(&["x"]), move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = o.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *own.lock().unwrap() = Some(sub);

        tree.set(&path(&["x"]), Node::Int(1)).unwrap();
        tree.set(&path(&["x"]), Node::Int(2)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(tree.observer_count(), 0);
    }

    #[test]
    fn callback_may_stage_reentrantly() {
        let tree = Arc::new(ObservableTree::new());
        let t = Arc::downgrade(&tree);
        tree.observe(path(&["src"]), move |new, _| {
            if let (Some(tree), Some(value)) = (t.upgrade(), new.and_then(Node::as_i64)) {
                tree.set(&path(&["mirror"]), Node::Int(value * 2)).unwrap();
            }
        });

        tree.set(&path(&["src"]), Node::Int(21)).unwrap();
        assert_eq!(tree.get(&path(&["mirror"])), Some(Node::Int(42)));
        assert_eq!(tree.snapshot().version(), 2);
    }

    #[test]
    fn nested_stage_reaches_later_observers_in_order() {
        let tree = Arc::new(ObservableTree::new());
        let t = Arc::downgrade(&tree);
        tree.observe(path(&["x"]), move |new, _| {
            if let (Some(tree), Some(1)) = (t.upgrade(), new.and_then(Node::as_i64)) {
                tree.set(&path(&["x"]), Node::Int(2)).unwrap();
            }
        });
        let log: Log = Arc::default();
        recorder(&tree, path(&["x"]), "later", &log);

        tree.set(&path(&["x"]), Node::Int(1)).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["later:None->Some(1)", "later:Some(1)->Some(2)"]
        );
        assert_eq!(tree.get(&path(&["x"])), Some(Node::Int(2)));
    }

    #[test]
    fn nested_stages_are_announced_in_commit_order() {
        let tree = Arc::new(ObservableTree::new());
        let t = Arc::downgrade(&tree);
        tree.observe(path(&["x"]), move |new, _| {
            let Some(tree) = t.upgrade() else { return };
            if new.and_then(Node::as_i64) == Some(1) {
                tree.set(&path(&["x"]), Node::Int(2)).unwrap();
                tree.set(&path(&["x"]), Node::Int(3)).unwrap();
            }
        });
        let log: Log = Arc::default();
        recorder(&tree, path(&["x"]), "first", &log);
        recorder(&tree, path(&["x"]), "second", &log);

        tree.set(&path(&["x"]), Node::Int(1)).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:None->Some(1)",
                "second:None->Some(1)",
                "first:Some(1)->Some(2)",
                "second:Some(1)->Some(2)",
                "first:Some(2)->Some(3)",
                "second:Some(2)->Some(3)",
            ]
        );
        assert_eq!(tree.snapshot().version(), 3);
    }

    #[test]
    fn panicking_callback_does_not_stall_delivery() {
        let tree = Arc::new(ObservableTree::new());
        let sub = tree.observe(path(&["boom"]), |_, _| panic!("observer failure"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tree.set(&path(&["boom"]), Node::Int(1)).unwrap();
        }));
        assert!(result.is_err());
        sub.unsubscribe();

        let log: Log = Arc::default();
        recorder(&tree, path(&["x"]), "x", &log);
        tree.set(&path(&["x"]), Node::Int(1)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["x:None->Some(1)"]);
    }

    #[test]
    fn subscription_outliving_tree_is_harmless() {
        let tree = Arc::new(ObservableTree::new());
        let sub = tree.observe(path(&["x"]), |_, _| {});
        drop(tree);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn custom_cell_backs_the_tree() {
        let seeded = Snapshot::empty()
            .set_in(&path(&["route"]), Node::from("library"))
            .unwrap();
        let tree = ObservableTree::with_cell(LockedCell::with_snapshot(seeded));
        assert_eq!(tree.get(&path(&["route"])), Some(Node::from("library")));
    }

    #[test]
    fn debug_format() {
        let tree = ObservableTree::new();
        let debug = format!("{tree:?}");
        assert!(debug.contains("ObservableTree"));
        assert!(debug.contains("observer_count"));
    }
}

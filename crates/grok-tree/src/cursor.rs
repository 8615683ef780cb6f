use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::node::{Key, Node, Path};
use crate::snapshot::Snapshot;
use crate::subscription::Subscription;
use crate::tree::ObservableTree;

/// A handle bound to one path of an [`ObservableTree`].
///
/// Every read goes to the snapshot current at call time.
#[derive(Clone)]
pub struct Cursor {
    tree: Arc<ObservableTree>,
    path: Path,
}

impl Cursor {
    pub fn new(tree: Arc<ObservableTree>, path: Path) -> Self {
        Self { tree, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &Arc<ObservableTree> {
        &self.tree
    }

    pub fn get(&self) -> Option<Node> {
        self.tree.get(&self.path)
    }

    /// The current value, or `default` when nothing is stored.
    pub fn deref_or(&self, default: Node) -> Node {
        self.get().unwrap_or(default)
    }

    pub fn observe<F>(&self, f: F) -> Subscription
    where
        F: Fn(Option<&Node>, Option<&Node>) + Send + Sync + 'static,
    {
        self.tree.observe(self.path.clone(), f)
    }

    pub fn update<F>(&self, f: F) -> Result<Snapshot>
    where
        F: FnOnce(Option<&Node>) -> Option<Node>,
    {
        self.tree.update(&self.path, f)
    }

    pub fn set(&self, node: Node) -> Result<Snapshot> {
        self.tree.set(&self.path, node)
    }

    /// A cursor one level deeper.
    pub fn child(&self, key: impl Into<Key>) -> Cursor {
        Cursor::new(Arc::clone(&self.tree), self.path.clone().child(key))
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("path", &self.path).finish()
    }
}

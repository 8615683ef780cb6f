use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, TreeError};
use crate::node::{Key, Node, Path};

/// One immutable version of the whole state tree.
///
/// Building a new snapshot with [`Snapshot::update_in`] leaves `self` intact
/// and copies only the maps along the updated path. The version is assigned
/// when a snapshot is committed by a [`SnapshotCell`](crate::SnapshotCell);
/// an uncommitted snapshot carries the version it was derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    root: Node,
    version: u64,
}

impl Snapshot {
    /// An empty tree at version zero.
    pub fn empty() -> Self {
        Self {
            root: Node::empty_map(),
            version: 0,
        }
    }

    /// A snapshot wrapping an existing root, at version zero.
    pub fn from_root(root: Node) -> Self {
        Self { root, version: 0 }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Read the node at `path`. Missing segments, or segments that cross a
    /// non-map value, yield `None` rather than an error.
    pub fn get_in(&self, path: &Path) -> Option<&Node> {
        path.keys()
            .iter()
            .try_fold(&self.root, |node, key| node.get(key))
    }

    /// Read the node at `path`, or `default` if there is none.
    pub fn get_in_or(&self, path: &Path, default: Node) -> Node {
        self.get_in(path).cloned().unwrap_or(default)
    }

    /// Build a new snapshot with the value at `path` replaced by `f(current)`.
    ///
    /// Missing intermediate maps are created. Returning `None` from `f`
    /// removes the key; removing a key that does not exist leaves the tree
    /// unchanged. Descending through a scalar, a list, or a tombstone is an
    /// error.
    pub fn update_in<F>(&self, path: &Path, f: F) -> Result<Snapshot>
    where
        F: FnOnce(Option<&Node>) -> Option<Node>,
    {
        let root = update_node(Some(&self.root), path, 0, f)?.unwrap_or_else(Node::empty_map);
        Ok(Snapshot {
            root,
            version: self.version,
        })
    }

    /// Build a new snapshot with `node` stored at `path`.
    pub fn set_in(&self, path: &Path, node: Node) -> Result<Snapshot> {
        self.update_in(path, move |_| Some(node))
    }

    /// Build a new snapshot without the key at `path`.
    pub fn remove_in(&self, path: &Path) -> Result<Snapshot> {
        self.update_in(path, |_| None)
    }

    pub(crate) fn stamped(self, version: u64) -> Snapshot {
        Snapshot {
            root: self.root,
            version,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

fn update_node<F>(node: Option<&Node>, path: &Path, depth: usize, f: F) -> Result<Option<Node>>
where
    F: FnOnce(Option<&Node>) -> Option<Node>,
{
    let Some(key) = path.keys().get(depth) else {
        return Ok(f(node));
    };

    let mut map: BTreeMap<Key, Node> = match node {
        None => BTreeMap::new(),
        Some(Node::Map(map)) => (**map).clone(),
        Some(_) => {
            return Err(TreeError::NotAMap {
                path: path.prefix(depth),
            })
        }
    };

    let updated = update_node(map.get(key), path, depth + 1, f)?;
    match updated {
        Some(child) => {
            map.insert(key.clone(), child);
        }
        None => {
            if node.is_none() {
                return Ok(None);
            }
            if map.remove(key).is_none() {
                return Ok(node.cloned());
            }
        }
    }

    Ok(Some(Node::Map(Arc::new(map))))
}

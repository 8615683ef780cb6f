//! Observable state tree for the grokdb client store.
//!
//! The whole application state lives in one persistent, immutable tree. Every
//! write produces a new [`Snapshot`] with a higher version; readers holding an
//! older snapshot keep a consistent view. Subscribers observe a single
//! [`Path`] and are notified only when the value at that path changes.
//!
//! # Architecture
//!
//! - **Nodes** are immutable values with shared structure: an update copies
//!   only the maps along the updated path.
//! - **Snapshots** pair a root node with a version number. Building one never
//!   touches shared state; it is committed by [`ObservableTree::stage`].
//! - **The snapshot pointer** sits behind the [`SnapshotCell`] trait so the
//!   backing can be swapped; [`LockedCell`] is the default.
//! - **Observers** fire synchronously, in subscription order, before `stage`
//!   returns, and are compared by value, not by container identity.
//!
//! # Modules
//!
//! - [`node`]: [`Node`], [`Key`], and [`Path`]
//! - [`snapshot`]: immutable versioned [`Snapshot`]
//! - [`traits`]: the [`SnapshotCell`] backing interface
//! - [`memory`]: `RwLock`-backed [`LockedCell`]
//! - [`tree`]: [`ObservableTree`]: stage, update, observe
//! - [`cursor`]: path-bound [`Cursor`] handles
//! - [`subscription`]: idempotent [`Subscription`] handles

pub mod cursor;
pub mod error;
pub mod memory;
pub mod node;
pub mod snapshot;
pub mod subscription;
pub mod traits;
pub mod tree;

pub use cursor::Cursor;
pub use error::{Result, TreeError};
pub use memory::LockedCell;
pub use node::{Key, Node, Path};
pub use snapshot::Snapshot;
pub use subscription::Subscription;
pub use traits::SnapshotCell;
pub use tree::{ObservableTree, ObserverFn};

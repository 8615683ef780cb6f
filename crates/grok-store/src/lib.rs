//! Reactive entity cache and observable state store for the grokdb client.
//!
//! The [`Store`] is the entry point for a presentation layer. It owns one
//! [`ObservableTree`](grok_tree::ObservableTree) and, per entity kind, an
//! [`EntityStore`] that batches fetches through a
//! [`BatchLoader`](grok_loader::BatchLoader), caches entities in the tree,
//! and tracks the current selection. Views subscribe through [`Watchable`]s
//! and read through the stores; nothing polls.
//!
//! # Modules
//!
//! - [`entity_store`]: per-kind cache, loads, writes, and selection
//! - [`watch`]: [`Watchable`] and the current-selection watcher
//! - [`review`]: card review submission
//! - [`routes`]: the [`RouteCollaborator`] seam and [`TreeRoutes`]
//! - [`store`]: the [`Store`] facade
//! - [`config`]: [`StoreConfig`], loadable from TOML

pub mod config;
pub mod entity_store;
pub mod error;
pub mod review;
pub mod routes;
pub mod store;
pub mod watch;

#[cfg(test)]
mod testing;

pub use config::StoreConfig;
pub use entity_store::EntityStore;
pub use error::{StoreError, StoreResult};
pub use review::ReviewStore;
pub use routes::{RouteCollaborator, TreeRoutes};
pub use store::Store;
pub use watch::{CurrentWatcher, PathWatcher, WatchCallback, Watchable};

// Re-export key types
pub use grok_request::{InMemoryApi, RequestClient};
pub use grok_tree::{Cursor, Node, Subscription};
pub use grok_types::{
    Card, CardDraft, Deck, DeckDraft, Difficulty, EntityId, EntityKind, Response, ResponseStatus,
    ReviewPatch, Route, Stash, StashDraft,
};

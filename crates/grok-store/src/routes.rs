use std::sync::Arc;

use grok_tree::{Node, ObservableTree, Path};
use grok_types::Route;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::watch::{PathWatcher, Watchable};

/// The routing side of the presentation layer, as seen by the store.
///
/// The store never parses URLs; a router hands it parsed [`Route`]s.
pub trait RouteCollaborator: Send + Sync {
    fn route(&self) -> Route;
    fn watch_route(&self) -> Box<dyn Watchable>;
}

/// Keeps the current route at `["route"]` in the state tree.
#[derive(Clone, Debug)]
pub struct TreeRoutes {
    tree: Arc<ObservableTree>,
}

impl TreeRoutes {
    pub fn new(tree: Arc<ObservableTree>) -> Self {
        Self { tree }
    }

    pub fn path() -> Path {
        Path::root().child("route")
    }

    pub fn set_route(&self, route: Route) -> StoreResult<()> {
        let value =
            serde_json::to_value(route).map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        self.tree.set(&Self::path(), Node::from_json(&value))?;
        Ok(())
    }
}

impl RouteCollaborator for TreeRoutes {
    /// The stored route, or [`Route::Library`] when none was set.
    fn route(&self) -> Route {
        let Some(node) = self.tree.get(&Self::path()) else {
            return Route::default();
        };
        serde_json::from_value(node.to_json()).unwrap_or_else(|err| {
            warn!(error = %err, "unreadable route in state tree");
            Route::default()
        })
    }

    fn watch_route(&self) -> Box<dyn Watchable> {
        Box::new(PathWatcher::new(Arc::clone(&self.tree), Self::path()))
    }
}

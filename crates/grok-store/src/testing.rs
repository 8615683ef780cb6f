//! Fixtures shared by the unit tests.

use std::sync::Arc;

use grok_loader::LoaderConfig;
use grok_request::{InMemoryApi, RequestClient};
use grok_tree::ObservableTree;
use grok_types::{Deck, EntityId, EntityKind};
use serde_json::json;

use crate::entity_store::EntityStore;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) fn id(raw: i64) -> EntityId {
    EntityId::new(raw)
}

/// A library deck with two children.
pub(crate) fn seeded_api() -> Arc<InMemoryApi> {
    init_tracing();
    let api = Arc::new(InMemoryApi::new());
    api.insert(
        EntityKind::Deck,
        json!({"id": 1, "name": "Library", "children": [2, 3]}),
    );
    api.insert(
        EntityKind::Deck,
        json!({"id": 2, "name": "Math", "parent": 1, "has_parent": true}),
    );
    api.insert(
        EntityKind::Deck,
        json!({"id": 3, "name": "Physics", "parent": 1, "has_parent": true}),
    );
    api
}

pub(crate) fn deck_store(api: &Arc<InMemoryApi>) -> EntityStore<Deck> {
    let client: Arc<dyn RequestClient> = api.clone();
    EntityStore::new(
        Arc::new(ObservableTree::new()),
        client,
        "/api",
        LoaderConfig::default(),
    )
}

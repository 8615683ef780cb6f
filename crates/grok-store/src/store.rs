use std::sync::Arc;

use grok_request::RequestClient;
use grok_tree::ObservableTree;
use grok_types::{Card, Deck, Route, Stash};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::entity_store::EntityStore;
use crate::error::StoreResult;
use crate::review::ReviewStore;
use crate::routes::{RouteCollaborator, TreeRoutes};

/// The client store: one state tree shared by a store per entity kind, the
/// review submitter, and the route holder.
///
/// Selection watchers load entities on spawned tasks, so
/// [`EntityStore::watch_current`] must be observed from within a tokio
/// runtime. Outside one, selection changes to an id are logged and dropped.
pub struct Store {
    tree: Arc<ObservableTree>,
    config: StoreConfig,
    decks: EntityStore<Deck>,
    cards: EntityStore<Card>,
    stashes: EntityStore<Stash>,
    review: ReviewStore,
    routes: TreeRoutes,
}

impl Store {
    /// A store over a fresh, empty state tree.
    pub fn new(client: Arc<dyn RequestClient>, config: StoreConfig) -> Self {
        Self::with_tree(Arc::new(ObservableTree::new()), client, config)
    }

    /// A store over an existing state tree.
    pub fn with_tree(
        tree: Arc<ObservableTree>,
        client: Arc<dyn RequestClient>,
        config: StoreConfig,
    ) -> Self {
        let prefix = config.api_prefix.clone();
        let loader = config.loader_config();

        let decks = EntityStore::new(
            Arc::clone(&tree),
            Arc::clone(&client),
            &prefix,
            loader.clone(),
        );
        let cards = EntityStore::new(
            Arc::clone(&tree),
            Arc::clone(&client),
            &prefix,
            loader.clone(),
        );
        let stashes = EntityStore::new(Arc::clone(&tree), client, &prefix, loader);

        info!(prefix = %prefix, max_batch_size = ?config.max_batch_size, "store ready");
        Self {
            review: ReviewStore::new(cards.clone()),
            routes: TreeRoutes::new(Arc::clone(&tree)),
            tree,
            config,
            decks,
            cards,
            stashes,
        }
    }

    // ---- Accessors ----

    pub fn tree(&self) -> &Arc<ObservableTree> {
        &self.tree
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn decks(&self) -> &EntityStore<Deck> {
        &self.decks
    }

    pub fn cards(&self) -> &EntityStore<Card> {
        &self.cards
    }

    pub fn stashes(&self) -> &EntityStore<Stash> {
        &self.stashes
    }

    pub fn review(&self) -> &ReviewStore {
        &self.review
    }

    pub fn routes(&self) -> &TreeRoutes {
        &self.routes
    }

    // ---- Navigation ----

    /// The current route.
    pub fn route(&self) -> Route {
        self.routes.route()
    }

    /// Move to `route`.
    ///
    /// The current deck, card, and stash are updated first from the ids the
    /// route carries, then the route itself is stored, so route watchers see
    /// matching selections. The library view selects the root deck.
    pub fn navigate(&self, route: Route) -> StoreResult<()> {
        let deck = match route {
            Route::Library => self.decks.root_id(),
            _ => route.deck(),
        };
        if let Some(deck) = deck {
            self.decks.set_current_id(Some(deck))?;
        }
        if let Some(card) = route.card() {
            self.cards.set_current_id(Some(card))?;
        }
        if let Some(stash) = route.stash() {
            self.stashes.set_current_id(Some(stash))?;
        }
        self.routes.set_route(route)?;
        debug!(?route, "navigated");
        Ok(())
    }

    /// Empty every entity cache.
    pub fn clear_caches(&self) -> StoreResult<()> {
        self.decks.clear_cache()?;
        self.cards.clear_cache()?;
        self.stashes.clear_cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{id, seeded_api};
    use crate::watch::Watchable;
    use grok_request::Method;
    use grok_types::{CardDraft, CardTab, EntityKind, StashDraft};
    use serde_json::json;
    use std::sync::Mutex;

    fn store() -> (Store, Arc<grok_request::InMemoryApi>) {
        let api = seeded_api();
        api.insert(EntityKind::Card, json!({"id": 10, "title": "q", "deck": 2}));
        api.insert(EntityKind::Stash, json!({"id": 20, "name": "later", "cards": [10]}));
        let client: Arc<dyn RequestClient> = api.clone();
        (Store::new(client, StoreConfig::default()), api)
    }

    #[test]
    fn kinds_share_one_tree() {
        let (store, _) = store();
        assert!(Arc::ptr_eq(store.tree(), store.decks().tree()));
        assert!(Arc::ptr_eq(store.tree(), store.stashes().tree()));
        assert_eq!(store.config().api_prefix, "/api");
    }

    #[test]
    fn navigate_sets_selections_before_route() {
        let (store, _) = store();
        let seen: Arc<Mutex<Vec<(Route, Option<i64>, Option<i64>)>>> = Arc::default();

        let s = Arc::clone(&seen);
        let decks = store.decks().clone();
        let cards = store.cards().clone();
        let routes = store.routes().clone();
        let _sub = store.routes().watch_route().observe(Arc::new(move || {
            s.lock().unwrap().push((
                routes.route(),
                decks.current_id().map(|id| id.get()),
                cards.current_id().map(|id| id.get()),
            ));
        }));

        let route = Route::Card {
            deck: id(2),
            card: id(10),
            tab: CardTab::Front,
        };
        store.navigate(route).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(route, Some(2), Some(10))]);
        assert_eq!(store.route(), route);
    }

    #[test]
    fn library_selects_root_deck() {
        let (store, _) = store();
        store.navigate(Route::Stash { stash: id(20) }).unwrap();
        assert_eq!(store.stashes().current_id(), Some(id(20)));
        assert_eq!(store.decks().current_id(), None);

        store.decks().set_root_id(Some(id(1))).unwrap();
        store.navigate(Route::Library).unwrap();
        assert_eq!(store.decks().current_id(), Some(id(1)));
    }

    #[tokio::test]
    async fn end_to_end_create_and_browse() {
        let (store, api) = store();
        store.decks().set_root_id(Some(id(1))).unwrap();
        store.navigate(Route::Library).unwrap();

        let library = store.decks().current().await.unwrap().unwrap();
        assert_eq!(library.children, vec![id(2), id(3)]);
        let children = store.decks().children().await.unwrap();
        assert_eq!(children.len(), 2);

        let card = store
            .cards()
            .create(&CardDraft::new("Capital of France?", id(2)).sides("?", "Paris"))
            .await
            .unwrap()
            .into_ok()
            .unwrap();
        assert_eq!(card.back, "Paris");

        let stash = store.stashes().create(&StashDraft::new("Tricky")).await.unwrap();
        assert!(stash.is_ok());
        assert_eq!(api.count(Method::Post, "/api/stashes"), 1);
    }

    #[tokio::test]
    async fn clear_caches_empties_every_kind() {
        let (store, _) = store();
        store.decks().get(id(1)).await.unwrap();
        store.cards().get(id(10)).await.unwrap();
        store.stashes().get(id(20)).await.unwrap();

        store.clear_caches().unwrap();
        assert!(store.decks().cached(id(1)).unwrap().is_none());
        assert!(store.cards().cached(id(10)).unwrap().is_none());
        assert!(store.stashes().cached(id(20)).unwrap().is_none());
    }
}

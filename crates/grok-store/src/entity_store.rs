//! Per-kind entity cache over the shared state tree.
//!
//! An [`EntityStore`] owns the sub-tree `[kind]` of the state tree:
//!
//! - `[kind, "lookup", id]`: the cached entity, or a tombstone (`Null`)
//!   when the API confirmed the id does not exist
//! - `[kind, "self"]`: the current selection
//! - `[kind, "root"]`: the root entity of the hierarchy, for decks
//!
//! Cache slots hold the entity's canonical JSON form and are replaced
//! wholesale on every write.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use grok_loader::{BatchLoader, LoaderConfig, RestBatch};
use grok_request::{HttpResponse, RequestClient};
use grok_tree::{Cursor, Node, ObservableTree, Path};
use grok_types::{Deck, Draft, Entity, EntityId, EntityKind, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::watch::CurrentWatcher;

struct StoreInner {
    tree: Arc<ObservableTree>,
    loader: BatchLoader,
    client: Arc<dyn RequestClient>,
    prefix: String,
}

/// Cache, loader, and selection pointer for one entity kind.
pub struct EntityStore<E: Entity> {
    inner: Arc<StoreInner>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for EntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _kind: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for EntityStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("kind", &E::KIND)
            .field("prefix", &self.inner.prefix)
            .field("current", &self.current_id())
            .finish()
    }
}

impl<E: Entity> EntityStore<E> {
    pub fn new(
        tree: Arc<ObservableTree>,
        client: Arc<dyn RequestClient>,
        prefix: impl Into<String>,
        config: LoaderConfig,
    ) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        let batch = RestBatch::new(Arc::clone(&client), E::KIND, prefix.clone());
        Self {
            inner: Arc::new(StoreInner {
                tree,
                loader: BatchLoader::with_config(batch, config),
                client,
                prefix,
            }),
            _kind: PhantomData,
        }
    }

    pub fn kind(&self) -> EntityKind {
        E::KIND
    }

    pub fn tree(&self) -> &Arc<ObservableTree> {
        &self.inner.tree
    }

    // ---- Tree paths ----

    pub fn lookup_path() -> Path {
        Path::root().child(E::KIND.as_str()).child("lookup")
    }

    pub fn entry_path(id: EntityId) -> Path {
        Self::lookup_path().child(id.get())
    }

    pub fn self_path() -> Path {
        Path::root().child(E::KIND.as_str()).child("self")
    }

    pub fn root_path() -> Path {
        Path::root().child(E::KIND.as_str()).child("root")
    }

    // ---- Cache reads ----

    /// The cached entity, without touching the network.
    ///
    /// `Ok(None)` when the id was never loaded; `NotFound` when it is
    /// tombstoned.
    pub fn cached(&self, id: EntityId) -> StoreResult<Option<E>> {
        match self.inner.tree.get(&Self::entry_path(id)) {
            None => Ok(None),
            Some(Node::Null) => Err(StoreError::NotFound { kind: E::KIND, id }),
            Some(node @ Node::Map(_)) => from_node(&node).map(Some),
            Some(_) => Err(StoreError::MalformedResponse(format!(
                "cache slot for {} {id} holds a non-entity value",
                E::KIND
            ))),
        }
    }

    /// Cursor onto the cache slot for `id`.
    pub fn observable(&self, id: EntityId) -> Cursor {
        self.inner.tree.cursor(Self::entry_path(id))
    }

    // ---- Loading ----

    /// Fetch `id` through the batch loader and write the result into the
    /// cache. An id missing from the batch response is tombstoned and
    /// reported as `NotFound`.
    pub async fn load(&self, id: EntityId) -> StoreResult<E> {
        match self.inner.loader.load(id).await? {
            Some(raw) => self.write(&raw),
            None => {
                self.inner.tree.set(&Self::entry_path(id), Node::Null)?;
                debug!(kind = %E::KIND, %id, "tombstoned");
                Err(StoreError::NotFound { kind: E::KIND, id })
            }
        }
    }

    /// Fetch every id in one batch and write all results with one commit.
    ///
    /// The result follows the order of `ids`; ids the API does not know are
    /// tombstoned and come back as `None`.
    pub async fn load_many(&self, ids: &[EntityId]) -> StoreResult<Vec<Option<E>>> {
        let raws = self.inner.loader.load_many(ids).await?;

        let mut snapshot = self.inner.tree.snapshot();
        let mut entities = Vec::with_capacity(ids.len());
        for (id, raw) in ids.iter().zip(raws) {
            match raw {
                Some(raw) => {
                    let entity = decode::<E>(&raw)?;
                    snapshot = snapshot.set_in(&Self::entry_path(*id), Node::from_json(&raw))?;
                    entities.push(Some(entity));
                }
                None => {
                    snapshot = snapshot.set_in(&Self::entry_path(*id), Node::Null)?;
                    entities.push(None);
                }
            }
        }
        self.inner.tree.stage(snapshot);
        debug!(kind = %E::KIND, count = ids.len(), "batch cached");
        Ok(entities)
    }

    /// The cached entity, loading it first when it is not cached.
    ///
    /// After a load the slot is read again, so a write that landed while
    /// the load was in flight wins over the loaded value.
    pub async fn get(&self, id: EntityId) -> StoreResult<E> {
        if let Some(entity) = self.cached(id)? {
            return Ok(entity);
        }
        let loaded = self.load(id).await?;
        Ok(self.cached(id)?.unwrap_or(loaded))
    }

    /// Entities for `ids`, in order. Uncached ids are fetched in one batch.
    /// Fails on the first id that cannot be resolved.
    pub async fn get_many(&self, ids: &[EntityId]) -> StoreResult<Vec<E>> {
        let mut missing = Vec::new();
        for id in ids {
            if self.cached(*id)?.is_none() {
                missing.push(*id);
            }
        }

        let mut loaded: HashMap<EntityId, E> = HashMap::new();
        if !missing.is_empty() {
            for (id, entity) in missing.iter().zip(self.load_many(&missing).await?) {
                match entity {
                    Some(entity) => {
                        loaded.insert(*id, entity);
                    }
                    None => return Err(StoreError::NotFound { kind: E::KIND, id: *id }),
                }
            }
        }

        ids.iter()
            .map(|id| match self.cached(*id)? {
                Some(entity) => Ok(entity),
                None => loaded
                    .get(id)
                    .cloned()
                    .ok_or(StoreError::NotFound { kind: E::KIND, id: *id }),
            })
            .collect()
    }

    /// Drop the loader's pending request for `id` and fetch it again.
    pub async fn refresh(&self, id: EntityId) -> StoreResult<E> {
        self.inner.loader.clear(id);
        self.load(id).await
    }

    // ---- Writes ----

    /// Create an entity from `draft`.
    ///
    /// An invalid draft fails before any request is sent. A non-`200` reply
    /// is reported as an `INVALID` response rather than an error.
    pub async fn create(&self, draft: &E::Draft) -> StoreResult<Response<E>> {
        draft.validate()?;
        let body = to_body(draft)?;
        let response = self
            .inner
            .client
            .post(&self.collection_path(), &body)
            .await?;
        if response.status != 200 {
            return Ok(Response::invalid(failure_message(&response)));
        }

        let entity = self.write(&response.body)?;
        info!(kind = %E::KIND, id = %entity.id(), "created");

        if let Some(parent) = draft.parent_id() {
            self.refresh_if_cached(parent).await;
        }
        Ok(Response::ok(entity))
    }

    /// Whether the API knows `id`.
    pub async fn exists(&self, id: EntityId) -> StoreResult<Response<bool>> {
        let response = self.inner.client.head(&self.entity_path(id)).await?;
        Ok(match response.status {
            200 => Response::ok(true),
            404 => Response::not_found(Some(false)),
            status => Response::invalid(format!("unexpected status {status}")),
        })
    }

    /// Apply a partial update and cache the entity the API returns.
    pub async fn patch(&self, id: EntityId, patch: &E::Patch) -> StoreResult<Response<E>> {
        let body = to_body(patch)?;
        let response = self.inner.client.post(&self.entity_path(id), &body).await?;
        match response.status {
            200 => {
                let entity = self.write(&response.body)?;
                debug!(kind = %E::KIND, %id, "patched");
                Ok(Response::ok(entity))
            }
            404 => Ok(Response::not_found(None)),
            _ => Ok(Response::invalid(failure_message(&response))),
        }
    }

    // ---- Selection ----

    pub fn current_id(&self) -> Option<EntityId> {
        self.read_id(&Self::self_path())
    }

    /// Point the current selection at `id`, or clear it with `None`.
    pub fn set_current_id(&self, id: Option<EntityId>) -> StoreResult<()> {
        self.write_id(&Self::self_path(), id)
    }

    /// The current entity; `Ok(None)` when nothing is selected.
    pub async fn current(&self) -> StoreResult<Option<E>> {
        match self.current_id() {
            Some(id) => self.get(id).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn root_id(&self) -> Option<EntityId> {
        self.read_id(&Self::root_path())
    }

    pub fn set_root_id(&self, id: Option<EntityId>) -> StoreResult<()> {
        self.write_id(&Self::root_path(), id)
    }

    /// Child ids listed by the cached current entity.
    ///
    /// The current entity must already be cached; this never loads. Kinds
    /// without a child list yield an empty list.
    pub fn children_id(&self) -> StoreResult<Vec<EntityId>> {
        let id = self
            .current_id()
            .ok_or(StoreError::NoCurrent { kind: E::KIND })?;
        let node = match self.inner.tree.get(&Self::entry_path(id)) {
            Some(node @ Node::Map(_)) => node,
            _ => return Err(StoreError::NotCached { kind: E::KIND, id }),
        };

        let Some(field) = E::CHILDREN_FIELD else {
            return Ok(Vec::new());
        };
        Ok(node
            .field(field)
            .and_then(Node::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Node::as_i64)
                    .map(EntityId::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Watch the current selection; see [`CurrentWatcher`].
    pub fn watch_current(&self) -> CurrentWatcher<E> {
        CurrentWatcher::new(self.clone())
    }

    /// Forget every cached entity of this kind and every pending load.
    pub fn clear_cache(&self) -> StoreResult<()> {
        self.inner.loader.clear_all();
        self.inner.tree.set(&Self::lookup_path(), Node::empty_map())?;
        debug!(kind = %E::KIND, "cache cleared");
        Ok(())
    }

    // ---- Internals ----

    fn collection_path(&self) -> String {
        format!("{}/{}", self.inner.prefix, E::KIND.collection())
    }

    fn entity_path(&self, id: EntityId) -> String {
        format!("{}/{}/{id}", self.inner.prefix, E::KIND.collection())
    }

    pub(crate) fn client(&self) -> &Arc<dyn RequestClient> {
        &self.inner.client
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Cache the API object as received, so fields the entity type does not
    /// model survive in the tree. Returns the decoded entity.
    fn write(&self, raw: &Value) -> StoreResult<E> {
        let entity = decode::<E>(raw)?;
        self.inner
            .tree
            .set(&Self::entry_path(entity.id()), Node::from_json(raw))?;
        debug!(kind = %E::KIND, id = %entity.id(), "cached");
        Ok(entity)
    }

    async fn refresh_if_cached(&self, id: EntityId) {
        let cached = self
            .inner
            .tree
            .get(&Self::entry_path(id))
            .is_some_and(|node| node.is_map());
        if !cached {
            return;
        }
        if let Err(err) = self.refresh(id).await {
            warn!(kind = %E::KIND, %id, error = %err, "refreshing parent after create failed");
        }
    }

    fn read_id(&self, path: &Path) -> Option<EntityId> {
        self.inner
            .tree
            .get(path)
            .and_then(|node| node.as_i64())
            .map(EntityId::new)
    }

    fn write_id(&self, path: &Path, id: Option<EntityId>) -> StoreResult<()> {
        match id {
            Some(id) => self.inner.tree.set(path, Node::Int(id.get()))?,
            None => self.inner.tree.remove(path)?,
        };
        Ok(())
    }
}

impl EntityStore<Deck> {
    /// Child decks of the current deck, in listed order.
    pub async fn children(&self) -> StoreResult<Vec<Deck>> {
        let ids = self.children_id()?;
        self.get_many(&ids).await
    }

    /// Decks from the top of the hierarchy down to `id`, inclusive.
    pub async fn ancestors(&self, id: EntityId) -> StoreResult<Vec<Deck>> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(StoreError::MalformedResponse(format!(
                    "deck {id} is its own ancestor"
                )));
            }
            let deck = self.get(id).await?;
            next = deck.parent;
            path.push(deck);
        }
        path.reverse();
        Ok(path)
    }
}

fn decode<E: Entity>(raw: &Value) -> StoreResult<E> {
    E::deserialize(raw)
        .map_err(|e| StoreError::MalformedResponse(format!("{}: {e}", E::KIND)))
}

fn from_node<E: Entity>(node: &Node) -> StoreResult<E> {
    decode(&node.to_json())
}

fn to_body<T: Serialize>(body: &T) -> StoreResult<Value> {
    serde_json::to_value(body).map_err(|e| StoreError::InvalidInput(e.to_string()))
}

fn failure_message(response: &HttpResponse) -> String {
    response
        .body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("unexpected status {}", response.status))
}

//! Change notification for the presentation layer.
//!
//! A [`Watchable`] hands out [`Subscription`]s for a parameterless callback.
//! [`CurrentWatcher`] is the interesting one: it follows both the current
//! selection pointer of an [`EntityStore`] and the cached value of whatever
//! entity that pointer names, re-attaching its entry observer whenever the
//! selection moves.

use std::sync::{Arc, Mutex, OnceLock};

use grok_tree::{Node, ObservableTree, Path, Subscription};
use grok_types::{Entity, EntityId};
use tokio::runtime::Handle;
use tracing::{trace, warn};

use crate::entity_store::EntityStore;

/// Callback fired when a watched value changes.
pub type WatchCallback = Arc<dyn Fn() + Send + Sync>;

/// Something the presentation layer can subscribe to.
pub trait Watchable: Send + Sync {
    fn observe(&self, callback: WatchCallback) -> Subscription;
}

/// Fires whenever the value at one tree path changes.
pub struct PathWatcher {
    tree: Arc<ObservableTree>,
    path: Path,
}

impl PathWatcher {
    pub fn new(tree: Arc<ObservableTree>, path: Path) -> Self {
        Self { tree, path }
    }
}

impl Watchable for PathWatcher {
    fn observe(&self, callback: WatchCallback) -> Subscription {
        self.tree.observe(self.path.clone(), move |_, _| callback())
    }
}

struct WatchState {
    tracked: Option<EntityId>,
    generation: u64,
    entry: Option<Subscription>,
    disposed: bool,
}

/// Watches the current selection of one entity kind.
///
/// The callback fires when the cached value of the current entity changes,
/// and once after each change of the current id, after the new entity has
/// been loaded into the cache. A switch overtaken by a newer one while its
/// load is in flight still fires once but leaves the entry observer to the
/// newer switch. Unsubscribing while a load is in flight suppresses it.
///
/// Loads run on the ambient tokio runtime.
pub struct CurrentWatcher<E: Entity> {
    store: EntityStore<E>,
}

impl<E: Entity> CurrentWatcher<E> {
    pub fn new(store: EntityStore<E>) -> Self {
        Self { store }
    }
}

impl<E: Entity> Watchable for CurrentWatcher<E> {
    fn observe(&self, callback: WatchCallback) -> Subscription {
        let tracked = self.store.current_id();
        let shared = Arc::new(Mutex::new(WatchState {
            tracked,
            generation: 0,
            entry: None,
            disposed: false,
        }));

        if let Some(id) = tracked {
            let cached = self
                .store
                .observable(id)
                .get()
                .is_some_and(|node| node.is_map());
            if cached {
                let entry = attach_entry(&self.store, id, Arc::clone(&callback));
                shared.lock().expect("lock poisoned").entry = Some(entry);
            } else {
                spawn_switch(
                    self.store.clone(),
                    Arc::clone(&shared),
                    Arc::clone(&callback),
                    id,
                    0,
                );
            }
        }

        let store = self.store.clone();
        let state = Arc::clone(&shared);
        let self_sub = self
            .store
            .tree()
            .observe(EntityStore::<E>::self_path(), move |new, old| {
                let new_id = read_id(new);
                if new_id == read_id(old) {
                    return;
                }

                let (stale, generation) = {
                    let mut st = state.lock().expect("lock poisoned");
                    if st.disposed || new_id == st.tracked {
                        return;
                    }
                    st.tracked = new_id;
                    st.generation += 1;
                    (st.entry.take(), st.generation)
                };
                if let Some(stale) = stale {
                    stale.unsubscribe();
                }

                match new_id {
                    Some(id) => spawn_switch(
                        store.clone(),
                        Arc::clone(&state),
                        Arc::clone(&callback),
                        id,
                        generation,
                    ),
                    None => callback(),
                }
            });

        let dispose = Subscription::new(move || {
            let entry = {
                let mut st = shared.lock().expect("lock poisoned");
                st.disposed = true;
                st.entry.take()
            };
            if let Some(entry) = entry {
                entry.unsubscribe();
            }
        });
        Subscription::merge([dispose, self_sub])
    }
}

/// Observe the cache slot of `id`, firing `callback` only for changes from
/// one version of that entity to another. Any other change, such as the
/// lookup table being cleared, detaches the observer.
fn attach_entry<E: Entity>(
    store: &EntityStore<E>,
    id: EntityId,
    callback: WatchCallback,
) -> Subscription {
    let own: Arc<OnceLock<Subscription>> = Arc::default();
    let handle = Arc::clone(&own);
    let subscription = store.observable(id).observe(move |new, old| {
        if holds_entity(new, id) && holds_entity(old, id) {
            callback();
            return;
        }
        trace!(%id, "entry observer detached");
        if let Some(subscription) = handle.get() {
            subscription.unsubscribe();
        }
    });
    let _ = own.set(subscription.clone());
    subscription
}

fn spawn_switch<E: Entity>(
    store: EntityStore<E>,
    shared: Arc<Mutex<WatchState>>,
    callback: WatchCallback,
    id: EntityId,
    generation: u64,
) {
    let Ok(runtime) = Handle::try_current() else {
        warn!(kind = %E::KIND, %id, "no tokio runtime, selection change not delivered");
        return;
    };

    runtime.spawn(async move {
        if let Err(err) = store.get(id).await {
            warn!(kind = %E::KIND, %id, error = %err, "loading current entity failed");
        }

        {
            let mut st = shared.lock().expect("lock poisoned");
            if st.disposed {
                return;
            }
            if st.generation == generation {
                st.entry = Some(attach_entry(&store, id, Arc::clone(&callback)));
            } else {
                trace!(kind = %E::KIND, %id, "selection switch overtaken");
            }
        }
        callback();
    });
}

fn read_id(node: Option<&Node>) -> Option<EntityId> {
    node.and_then(Node::as_i64).map(EntityId::new)
}

fn holds_entity(node: Option<&Node>, id: EntityId) -> bool {
    node.filter(|node| node.is_map())
        .and_then(|node| node.field("id"))
        .and_then(Node::as_i64)
        == Some(id.get())
}

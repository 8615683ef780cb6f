//! Same-turn batching with in-flight deduplication.
//!
//! A `load` registers a waiter for its id. The first registration after a
//! dispatch spawns a task that yields once to the scheduler and then drains
//! every waiter queued so far into one [`BatchFn`] call. An id that already
//! has a waiter is not queued again; the new caller subscribes to the
//! existing waiter instead.
//!
//! Results are not memoized: once a waiter is settled it is forgotten, and
//! the next `load` of that id starts a new round-trip.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use grok_types::EntityId;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::traits::BatchFn;

type Outcome = LoaderResult<Option<Value>>;
type Waiter = Arc<watch::Sender<Option<Outcome>>>;

#[derive(Default)]
struct LoaderState {
    pending: HashMap<EntityId, Waiter>,
    queue: Vec<(EntityId, Waiter)>,
    scheduled: bool,
}

struct Inner {
    batch_fn: Box<dyn BatchFn>,
    config: LoaderConfig,
    state: Mutex<LoaderState>,
}

/// Batching, deduplicating loader of raw entities.
///
/// Cloning is cheap and clones share pending requests. Inside a tokio
/// runtime the dispatch runs on a spawned task. Under any other executor the
/// future that queued the first id of a batch drives the dispatch itself, so
/// dropping that future before it settles leaves its batch unanswered.

#[derive(Clone)]
pub struct BatchLoader {
    inner: Arc<Inner>,
}

impl BatchLoader {
    pub fn new(batch_fn: impl BatchFn + 'static) -> Self {
        Self::with_config(batch_fn, LoaderConfig::default())
    }

    pub fn with_config(batch_fn: impl BatchFn + 'static, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                batch_fn: Box::new(batch_fn),
                config,
                state: Mutex::new(LoaderState::default()),
            }),
        }
    }

    /// Load one raw entity. `Ok(None)` means the batch response did not
    /// contain the id.
    pub async fn load(&self, id: EntityId) -> LoaderResult<Option<Value>> {
        let (receiver, drive) = self.register(id);
        if drive {
            self.dispatch_inline().await;
        }
        wait(receiver).await
    }

    /// Load several raw entities, in the order of `ids`.
    ///
    /// All ids are registered before the first await, so they travel in the
    /// same batch. The first failure is returned.
    pub async fn load_many(&self, ids: &[EntityId]) -> LoaderResult<Vec<Option<Value>>> {
        let mut receivers = Vec::with_capacity(ids.len());
        let mut drive = false;
        for id in ids {
            let (receiver, first) = self.register(*id);
            drive |= first;
            receivers.push(receiver);
        }
        if drive {
            self.dispatch_inline().await;
        }
        let mut values = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            values.push(wait(receiver).await?);
        }
        Ok(values)
    }

    /// Forget every pending request so the next `load` of any id goes to the
    /// network. Callers already waiting still receive their results.
    pub fn clear_all(&self) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        let dropped = state.pending.len();
        state.pending.clear();
        trace!(dropped, "loader memo cleared");
    }

    /// Forget the pending request for one id.
    pub fn clear(&self, id: EntityId) {
        self.inner
            .state
            .lock()
            .expect("lock poisoned")
            .pending
            .remove(&id);
    }

    /// Number of ids with a request outstanding.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().expect("lock poisoned").pending.len()
    }

    /// Queue a waiter for `id`. The flag is set when no tokio runtime could
    /// take the dispatch and the caller has to run it.
    fn register(&self, id: EntityId) -> (watch::Receiver<Option<Outcome>>, bool) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if let Some(waiter) = state.pending.get(&id) {
            trace!(%id, "joining pending load");
            return (waiter.subscribe(), false);
        }

        let (sender, receiver) = watch::channel(None);
        let waiter = Arc::new(sender);
        state.pending.insert(id, Arc::clone(&waiter));
        state.queue.push((id, waiter));

        if state.scheduled {
            return (receiver, false);
        }
        state.scheduled = true;
        match Handle::try_current() {
            Ok(runtime) => {
                let loader = self.clone();
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    loader.dispatch().await;
                });
                (receiver, false)
            }
            Err(_) => {
                trace!(%id, "no tokio runtime, caller drives dispatch");
                (receiver, true)
            }
        }
    }

    async fn dispatch_inline(&self) {
        tokio::task::yield_now().await;
        self.dispatch().await;
    }

    async fn dispatch(&self) {
        let queue = {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            state.scheduled = false;
            std::mem::take(&mut state.queue)
        };
        if queue.is_empty() {
            return;
        }

        let mut seen = HashSet::new();
        let ids: Vec<EntityId> = queue
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| seen.insert(*id))
            .collect();

        let chunk_len = self.inner.config.chunk_len(ids.len());
        debug!(
            waiters = queue.len(),
            ids = ids.len(),
            batches = ids.len().div_ceil(chunk_len),
            "dispatching batch"
        );

        let mut outcomes: HashMap<EntityId, Outcome> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(chunk_len) {
            let result = self
                .inner
                .batch_fn
                .load_batch(chunk)
                .await
                .and_then(index_by_id);
            match result {
                Ok(mut found) => {
                    for id in chunk {
                        outcomes.insert(*id, Ok(found.remove(id)));
                    }
                }
                Err(err) => {
                    debug!(error = %err, ids = chunk.len(), "batch failed");
                    for id in chunk {
                        outcomes.insert(*id, Err(err.clone()));
                    }
                }
            }
        }

        let mut state = self.inner.state.lock().expect("lock poisoned");
        for (id, waiter) in queue {
            let outcome = outcomes
                .get(&id)
                .cloned()
                .unwrap_or(Err(LoaderError::Closed));
            waiter.send_replace(Some(outcome));

            let current = state
                .pending
                .get(&id)
                .is_some_and(|pending| Arc::ptr_eq(pending, &waiter));
            if current {
                state.pending.remove(&id);
            }
        }
    }
}

impl fmt::Debug for BatchLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchLoader")
            .field("config", &self.inner.config)
            .field("pending", &self.pending_len())
            .finish()
    }
}

async fn wait(mut receiver: watch::Receiver<Option<Outcome>>) -> Outcome {
    let settled = match receiver.wait_for(Option::is_some).await {
        Ok(slot) => (*slot).clone(),
        Err(_) => None,
    };
    settled.unwrap_or(Err(LoaderError::Closed))
}

fn index_by_id(values: Vec<Value>) -> LoaderResult<HashMap<EntityId, Value>> {
    values
        .into_iter()
        .map(|value| match value.get("id").and_then(Value::as_i64) {
            Some(id) => Ok((EntityId::new(id), value)),
            None => Err(LoaderError::MalformedResponse(
                "batch entry without an integer id".into(),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grok_request::TransportError;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Batch function over a fixed set of ids that records every call.
    #[derive(Default)]
    struct Recording {
        existing: HashSet<i64>,
        calls: Arc<Mutex<Vec<Vec<i64>>>>,
        failures: Mutex<VecDeque<LoaderError>>,
        reverse: bool,
    }

    impl Recording {
        fn with(ids: &[i64]) -> Self {
            Self {
                existing: ids.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BatchFn for Recording {
        async fn load_batch(&self, ids: &[EntityId]) -> LoaderResult<Vec<Value>> {
            self.calls
                .lock()
                .unwrap()
                .push(ids.iter().map(|id| id.get()).collect());
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            let mut found: Vec<Value> = ids
                .iter()
                .filter(|id| self.existing.contains(&id.get()))
                .map(|id| json!({"id": id.get(), "name": format!("entity {id}")}))
                .collect();
            if self.reverse {
                found.reverse();
            }
            Ok(found)
        }
    }

    fn id(raw: i64) -> EntityId {
        EntityId::new(raw)
    }

    fn loader(batch: Recording) -> (BatchLoader, Arc<Mutex<Vec<Vec<i64>>>>) {
        let calls = Arc::clone(&batch.calls);
        (BatchLoader::new(batch), calls)
    }

    // -----------------------------------------------------------------------
    // Batching and dedup
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_loads_of_one_id_share_a_fetch() {
        let (loader, calls) = loader(Recording::with(&[7]));
        let (a, b) = tokio::join!(loader.load(id(7)), loader.load(id(7)));

        assert_eq!(a.unwrap().unwrap()["id"], json!(7));
        assert_eq!(b.unwrap().unwrap()["id"], json!(7));
        assert_eq!(*calls.lock().unwrap(), vec![vec![7]]);
    }

    #[tokio::test]
    async fn same_turn_loads_travel_together() {
        let (loader, calls) = loader(Recording::with(&[1, 2, 3]));
        let (a, b, c) = tokio::join!(loader.load(id(1)), loader.load(id(2)), loader.load(id(3)));

        assert!(a.unwrap().is_some() && b.unwrap().is_some() && c.unwrap().is_some());
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(loader.pending_len(), 0);
    }

    #[tokio::test]
    async fn later_turns_fetch_again() {
        let (loader, calls) = loader(Recording::with(&[1]));
        loader.load(id(1)).await.unwrap();
        loader.load(id(1)).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn results_are_sliced_by_id_not_position() {
        let mut batch = Recording::with(&[1, 2, 3]);
        batch.reverse = true;
        let (loader, _) = loader(batch);

        let values = loader.load_many(&[id(3), id(1), id(2)]).await.unwrap();
        let ids: Vec<i64> = values
            .iter()
            .map(|v| v.as_ref().unwrap()["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn missing_ids_resolve_to_none() {
        let (loader, _) = loader(Recording::with(&[1]));
        let values = loader.load_many(&[id(1), id(404)]).await.unwrap();
        assert!(values[0].is_some());
        assert!(values[1].is_none());
    }

    #[tokio::test]
    async fn load_many_dedups_repeated_ids() {
        let (loader, calls) = loader(Recording::with(&[5]));
        let values = loader.load_many(&[id(5), id(5)]).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(*calls.lock().unwrap(), vec![vec![5]]);
    }

    #[tokio::test]
    async fn max_batch_size_splits_requests() {
        let batch = Recording::with(&[1, 2, 3, 4, 5]);
        let calls = Arc::clone(&batch.calls);
        let loader = BatchLoader::with_config(batch, LoaderConfig::default().max_batch_size(2));

        let values = loader
            .load_many(&[id(1), id(2), id(3), id(4), id(5)])
            .await
            .unwrap();
        assert!(values.iter().all(Option::is_some));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![vec![1, 2], vec![3, 4], vec![5]]
        );
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn batch_failure_reaches_every_waiter() {
        let batch = Recording::with(&[1, 2]);
        batch
            .failures
            .lock()
            .unwrap()
            .push_back(LoaderError::Transport(TransportError::Timeout));
        let (loader, _) = loader(batch);

        let (a, b) = tokio::join!(loader.load(id(1)), loader.load(id(2)));
        let expected = LoaderError::Transport(TransportError::Timeout);
        assert_eq!(a.unwrap_err(), expected);
        assert_eq!(b.unwrap_err(), expected);

        // The failure is not memoized.
        assert!(loader.load(id(1)).await.unwrap().is_some());
    }

    #[test]
    fn entries_without_id_are_malformed() {
        let err = index_by_id(vec![json!({"id": 1}), json!({"name": "x"})]).unwrap_err();
        assert!(matches!(err, LoaderError::MalformedResponse(_)));
    }

    // -----------------------------------------------------------------------
    // Clearing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn clear_all_forces_fresh_fetch_for_new_callers() {
        let (loader, calls) = loader(Recording::with(&[1]));

        let first = loader.load(id(1));
        let second = async {
            loader.clear_all();
            loader.load(id(1)).await
        };
        let (a, b) = tokio::join!(first, second);

        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        // Both waiters were queued in the same turn: one request, one id.
        assert_eq!(*calls.lock().unwrap(), vec![vec![1]]);
        assert_eq!(loader.pending_len(), 0);
    }

    #[tokio::test]
    async fn clear_one_id() {
        let (loader, _) = loader(Recording::with(&[1, 2]));
        let (a, b) = tokio::join!(loader.load(id(1)), async {
            let fut = loader.load(id(2));
            loader.clear(id(1));
            fut.await
        });
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
    }

    // -----------------------------------------------------------------------
    // Executors
    // -----------------------------------------------------------------------

    #[test]
    fn batches_without_a_tokio_runtime() {
        let (loader, calls) = loader(Recording::with(&[1, 2]));
        let (a, b, c) = futures::executor::block_on(async {
            futures::join!(loader.load(id(1)), loader.load(id(2)), loader.load(id(1)))
        });

        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert!(c.unwrap().is_some());
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2]]);
        assert_eq!(loader.pending_len(), 0);
    }

    #[test]
    fn load_many_without_a_tokio_runtime() {
        let (loader, calls) = loader(Recording::with(&[3]));
        let found =
            futures::executor::block_on(loader.load_many(&[id(3), id(4)])).unwrap();
        assert!(found[0].is_some() && found[1].is_none());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn debug_shows_pending() {
        let (loader, _) = loader(Recording::default());
        assert!(format!("{loader:?}").contains("pending: 0"));
    }
}

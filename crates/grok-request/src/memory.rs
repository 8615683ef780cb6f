//! In-process fake of the grokdb REST API.
//!
//! [`InMemoryApi`] serves the same endpoints as the real server from plain
//! maps of JSON objects. Every request is recorded, and scripted [`Fault`]s
//! can replace the next responses, so tests can count round-trips and drive
//! error paths without a network.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use grok_types::EntityKind;
use serde_json::{json, Map, Value};
use tracing::trace;

use crate::error::{TransportError, TransportResult};
use crate::traits::RequestClient;
use crate::types::{HttpResponse, Method, RecordedRequest};

/// A scripted replacement for the next response.
#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    /// Answer with this status and an error body.
    Status(u16),
    /// Fail without producing a response.
    Transport(TransportError),
    /// Answer `200` with this body.
    Body(Value),
}

#[derive(Default)]
struct ApiState {
    collections: BTreeMap<EntityKind, BTreeMap<i64, Value>>,
    next_id: i64,
    clock: i64,
    log: Vec<RecordedRequest>,
    faults: VecDeque<Fault>,
    reverse_batches: bool,
    latency: Duration,
}

/// An in-memory implementation of [`RequestClient`].
pub struct InMemoryApi {
    prefix: String,
    state: Mutex<ApiState>,
}

impl InMemoryApi {
    /// A fake serving under `/api`.
    pub fn new() -> Self {
        Self::with_prefix("/api")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            state: Mutex::new(ApiState::default()),
        }
    }

    /// Store a raw entity, replacing any entity with the same id.
    ///
    /// An object without an integer `id` is given the next free one. Returns
    /// the id the value was stored under.
    pub fn insert(&self, kind: EntityKind, mut value: Value) -> i64 {
        let mut state = self.state.lock().expect("lock poisoned");
        let id = match value.get("id").and_then(Value::as_i64) {
            Some(id) => {
                state.next_id = state.next_id.max(id);
                id
            }
            None => {
                let id = state.allocate_id();
                if let Value::Object(fields) = &mut value {
                    fields.insert("id".into(), json!(id));
                }
                id
            }
        };
        state.table_mut(kind).insert(id, value);
        id
    }

    pub fn remove(&self, kind: EntityKind, id: i64) -> Option<Value> {
        self.state
            .lock()
            .expect("lock poisoned")
            .table_mut(kind)
            .remove(&id)
    }

    /// The stored form of an entity, bypassing the request log.
    pub fn get_raw(&self, kind: EntityKind, id: i64) -> Option<Value> {
        self.state
            .lock()
            .expect("lock poisoned")
            .collections
            .get(&kind)
            .and_then(|table| table.get(&id))
            .cloned()
    }

    /// Queue a fault; queued faults replace responses in FIFO order.
    pub fn inject(&self, fault: Fault) {
        self.state
            .lock()
            .expect("lock poisoned")
            .faults
            .push_back(fault);
    }

    /// Return batch results in reverse order of the requested ids.
    pub fn set_reverse_batches(&self, reverse: bool) {
        self.state.lock().expect("lock poisoned").reverse_batches = reverse;
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().expect("lock poisoned").latency = latency;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().expect("lock poisoned").log.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").log.len()
    }

    /// Number of recorded requests with `method` whose path, without the
    /// query string, equals `route`.
    pub fn count(&self, method: Method, route: &str) -> usize {
        self.state
            .lock()
            .expect("lock poisoned")
            .log
            .iter()
            .filter(|req| req.method == method && req.route() == route)
            .count()
    }

    pub fn clear_log(&self) {
        self.state.lock().expect("lock poisoned").log.clear();
    }

    async fn handle(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> TransportResult<HttpResponse> {
        let (latency, fault) = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.log.push(RecordedRequest {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });
            (state.latency, state.faults.pop_front())
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let response = match fault {
            Some(Fault::Transport(err)) => {
                trace!(%method, path, error = %err, "injected transport failure");
                return Err(err);
            }
            Some(Fault::Status(status)) => error_response(status, "injected failure"),
            Some(Fault::Body(body)) => HttpResponse::ok(body),
            None => self.dispatch(method, path, body),
        };

        trace!(%method, path, status = response.status, "api request served");
        Ok(response)
    }

    fn dispatch(&self, method: Method, path: &str, body: Option<&Value>) -> HttpResponse {
        let (route, query) = match path.split_once('?') {
            Some((route, query)) => (route, Some(query)),
            None => (path, None),
        };
        let Some(rest) = route.strip_prefix(self.prefix.as_str()) else {
            return error_response(404, format!("no route for {route}"));
        };
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let Some((collection, tail)) = segments.split_first() else {
            return error_response(404, format!("no route for {route}"));
        };
        let Ok(kind) = EntityKind::from_collection(collection) else {
            return error_response(404, format!("no route for {route}"));
        };

        let mut state = self.state.lock().expect("lock poisoned");
        match (method, tail) {
            (Method::Get, []) => state.batch(kind, query),
            (Method::Post, []) => state.create(kind, body),
            (Method::Get, [id]) => match parse_id(id) {
                Some(id) => state.fetch(kind, id),
                None => error_response(400, format!("invalid id: {id}")),
            },
            (Method::Head, [id]) => match parse_id(id) {
                Some(id) if state.contains(kind, id) => HttpResponse::empty(200),
                Some(_) => HttpResponse::empty(404),
                None => HttpResponse::empty(400),
            },
            (Method::Post, [id]) => match parse_id(id) {
                Some(id) => state.patch(kind, id, body),
                None => error_response(400, format!("invalid id: {id}")),
            },
            (Method::Post, [id, "review"]) if kind == EntityKind::Card => match parse_id(id) {
                Some(id) => state.review(id, body),
                None => error_response(400, format!("invalid id: {id}")),
            },
            _ => error_response(404, format!("no route for {method} {route}")),
        }
    }
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestClient for InMemoryApi {
    async fn get(&self, path: &str) -> TransportResult<HttpResponse> {
        self.handle(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> TransportResult<HttpResponse> {
        self.handle(Method::Post, path, Some(body)).await
    }

    async fn head(&self, path: &str) -> TransportResult<HttpResponse> {
        self.handle(Method::Head, path, None).await
    }
}

impl ApiState {
    fn table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<i64, Value> {
        self.collections.entry(kind).or_default()
    }

    fn contains(&self, kind: EntityKind, id: i64) -> bool {
        self.collections
            .get(&kind)
            .is_some_and(|table| table.contains_key(&id))
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn batch(&self, kind: EntityKind, query: Option<&str>) -> HttpResponse {
        let table = self.collections.get(&kind);
        let requested = query.and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix(kind.collection())?.strip_prefix('='))
        });

        let mut found: Vec<Value> = match requested {
            None => table
                .map(|table| table.values().cloned().collect())
                .unwrap_or_default(),
            Some(list) => {
                let mut ids = Vec::new();
                for raw in list.split(',').filter(|raw| !raw.is_empty()) {
                    match parse_id(raw) {
                        Some(id) => ids.push(id),
                        None => return error_response(400, format!("invalid id: {raw}")),
                    }
                }
                ids.iter()
                    .filter_map(|id| table.and_then(|table| table.get(id)).cloned())
                    .collect()
            }
        };

        if self.reverse_batches {
            found.reverse();
        }
        HttpResponse::ok(Value::Array(found))
    }

    fn fetch(&self, kind: EntityKind, id: i64) -> HttpResponse {
        match self.collections.get(&kind).and_then(|table| table.get(&id)) {
            Some(entity) => HttpResponse::ok(entity.clone()),
            None => error_response(404, format!("{kind} {id} not found")),
        }
    }

    fn create(&mut self, kind: EntityKind, body: Option<&Value>) -> HttpResponse {
        let Some(fields) = body.and_then(Value::as_object) else {
            return error_response(400, "expected a JSON object");
        };

        let label = match kind {
            EntityKind::Card => "title",
            EntityKind::Deck | EntityKind::Stash => "name",
        };
        let labelled = fields
            .get(label)
            .and_then(Value::as_str)
            .is_some_and(|text| !text.trim().is_empty());
        if !labelled {
            return error_response(400, format!("{label} is required"));
        }
        if kind == EntityKind::Card && fields.get("deck").and_then(Value::as_i64).is_none() {
            return error_response(400, "deck is required");
        }

        let parent = match (kind, fields.get("parent")) {
            (EntityKind::Deck, Some(value)) if !value.is_null() => match value.as_i64() {
                Some(parent) if self.contains(kind, parent) => Some(parent),
                _ => return error_response(400, "parent deck does not exist"),
            },
            _ => None,
        };

        let id = self.allocate_id();
        let now = self.tick();

        let mut entity = defaults(kind);
        for (key, value) in fields {
            entity.insert(key.clone(), value.clone());
        }
        entity.insert("id".into(), json!(id));
        entity.insert("created_at".into(), json!(now));
        entity.insert("updated_at".into(), json!(now));
        if kind == EntityKind::Deck {
            entity.insert("parent".into(), parent.map_or(Value::Null, Value::from));
            entity.insert("has_parent".into(), json!(parent.is_some()));
        }

        if let Some(parent) = parent {
            if let Some(Value::Object(owner)) = self.table_mut(kind).get_mut(&parent) {
                if let Some(children) = owner
                    .entry("children")
                    .or_insert_with(|| json!([]))
                    .as_array_mut()
                {
                    children.push(json!(id));
                }
                owner.insert("updated_at".into(), json!(now));
            }
        }

        let entity = Value::Object(entity);
        self.table_mut(kind).insert(id, entity.clone());
        HttpResponse::ok(entity)
    }

    fn patch(&mut self, kind: EntityKind, id: i64, body: Option<&Value>) -> HttpResponse {
        let Some(fields) = body.and_then(Value::as_object) else {
            return error_response(400, "expected a JSON object");
        };
        let now = self.tick();
        let Some(Value::Object(entity)) = self.table_mut(kind).get_mut(&id) else {
            return error_response(404, format!("{kind} {id} not found"));
        };

        for (key, value) in fields {
            if key != "id" && key != "created_at" {
                entity.insert(key.clone(), value.clone());
            }
        }
        entity.insert("updated_at".into(), json!(now));
        HttpResponse::ok(Value::Object(entity.clone()))
    }

    fn review(&mut self, id: i64, body: Option<&Value>) -> HttpResponse {
        if !body.is_some_and(Value::is_object) {
            return error_response(400, "expected a JSON object");
        }
        let now = self.tick();
        let Some(Value::Object(card)) = self.table_mut(EntityKind::Card).get_mut(&id) else {
            return error_response(404, format!("card {id} not found"));
        };

        let reviewed = card
            .get("times_reviewed")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        card.insert("times_reviewed".into(), json!(reviewed + 1));
        card.insert("updated_at".into(), json!(now));
        HttpResponse::ok(Value::Object(card.clone()))
    }
}

fn defaults(kind: EntityKind) -> Map<String, Value> {
    let value = match kind {
        EntityKind::Deck => json!({
            "description": "",
            "parent": null,
            "has_parent": false,
            "children": [],
        }),
        EntityKind::Card => json!({
            "description": "",
            "front": "",
            "back": "",
            "times_reviewed": 0,
        }),
        EntityKind::Stash => json!({
            "description": "",
            "cards": [],
        }),
    };
    match value {
        Value::Object(fields) => fields,
        _ => Map::new(),
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn error_response(status: u16, message: impl Into<String>) -> HttpResponse {
    HttpResponse::new(status, json!({ "error": message.into() }))
}

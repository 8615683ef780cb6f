use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use grok_request::RequestClient;
use grok_types::{EntityId, EntityKind};
use serde_json::Value;
use tracing::debug;

use crate::error::{LoaderError, LoaderResult};
use crate::traits::BatchFn;

/// [`BatchFn`] over the grokdb batch endpoint
/// `GET {prefix}/{collection}?{collection}=1,2,3`.
pub struct RestBatch {
    client: Arc<dyn RequestClient>,
    kind: EntityKind,
    prefix: String,
}

impl RestBatch {
    pub fn new(
        client: Arc<dyn RequestClient>,
        kind: EntityKind,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            kind,
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn path(&self, ids: &[EntityId]) -> String {
        let collection = self.kind.collection();
        format!(
            "{}/{collection}?{collection}={}",
            self.prefix,
            EntityId::join(ids)
        )
    }
}

impl fmt::Debug for RestBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestBatch")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[async_trait]
impl BatchFn for RestBatch {
    async fn load_batch(&self, ids: &[EntityId]) -> LoaderResult<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = self.path(ids);
        debug!(kind = %self.kind, count = ids.len(), "fetching batch");
        let response = self.client.get(&path).await?;

        if response.status != 200 {
            return Err(LoaderError::InvalidResponse {
                status: response.status,
            });
        }
        match response.body {
            Value::Array(entities) => Ok(entities),
            other => Err(LoaderError::MalformedResponse(format!(
                "expected a list of {}, got {other}",
                self.kind.collection()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grok_request::{Fault, InMemoryApi, Method, TransportError};
    use serde_json::json;

    fn api() -> Arc<InMemoryApi> {
        let api = Arc::new(InMemoryApi::new());
        api.insert(EntityKind::Stash, json!({"id": 1, "name": "a"}));
        api.insert(EntityKind::Stash, json!({"id": 2, "name": "b"}));
        api
    }

    fn ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId::new).collect()
    }

    #[tokio::test]
    async fn fetches_collection_batch() {
        let api = api();
        let batch = RestBatch::new(api.clone(), EntityKind::Stash, "/api/");
        let found = batch.load_batch(&ids(&[2, 1, 9])).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(api.requests()[0].path, "/api/stashes?stashes=2,1,9");
    }

    #[tokio::test]
    async fn empty_ids_skip_the_network() {
        let api = api();
        let batch = RestBatch::new(api.clone(), EntityKind::Stash, "/api");
        assert!(batch.load_batch(&[]).await.unwrap().is_empty());
        assert_eq!(api.count(Method::Get, "/api/stashes"), 0);
    }

    #[tokio::test]
    async fn error_statuses_and_bodies() {
        let api = api();
        let batch = RestBatch::new(api.clone(), EntityKind::Stash, "/api");

        api.inject(Fault::Status(503));
        assert_eq!(
            batch.load_batch(&ids(&[1])).await.unwrap_err(),
            LoaderError::InvalidResponse { status: 503 }
        );

        api.inject(Fault::Body(json!({"id": 1})));
        assert!(matches!(
            batch.load_batch(&ids(&[1])).await.unwrap_err(),
            LoaderError::MalformedResponse(_)
        ));

        api.inject(Fault::Transport(TransportError::Connection("refused".into())));
        assert_eq!(
            batch.load_batch(&ids(&[1])).await.unwrap_err(),
            LoaderError::Transport(TransportError::Connection("refused".into()))
        );
    }
}

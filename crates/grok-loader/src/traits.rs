use async_trait::async_trait;
use grok_types::EntityId;
use serde_json::Value;

use crate::error::LoaderResult;

/// The batch function a [`BatchLoader`](crate::BatchLoader) calls once per
/// dispatched batch.
///
/// Implementations return the raw entities that exist among `ids`, in any
/// order. Each entity must carry an integer `id` field; ids with no entity
/// in the result are reported to their waiters as absent.
#[async_trait]
pub trait BatchFn: Send + Sync {
    async fn load_batch(&self, ids: &[EntityId]) -> LoaderResult<Vec<Value>>;
}

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportResult;
use crate::types::HttpResponse;

/// Transport interface for the grokdb REST API.
///
/// Paths are API-relative and may carry a query string, e.g.
/// `/api/decks?decks=1,2,3`.
#[async_trait]
pub trait RequestClient: Send + Sync {
    async fn get(&self, path: &str) -> TransportResult<HttpResponse>;
    async fn post(&self, path: &str, body: &Value) -> TransportResult<HttpResponse>;
    async fn head(&self, path: &str) -> TransportResult<HttpResponse>;
}

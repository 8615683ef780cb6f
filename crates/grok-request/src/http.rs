//! `reqwest`-backed [`RequestClient`] for talking to a running grokdb server.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::traits::RequestClient;
use crate::types::HttpResponse;

/// HTTP client rooted at a server base URL such as `http://localhost:3030`.
#[derive(Clone, Debug)]
pub struct HttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> TransportResult<String> {
        if !path.starts_with('/') {
            return Err(TransportError::InvalidUrl(path.to_string()));
        }
        Ok(format!("{}{}", self.base_url, path))
    }

    async fn finish(response: reqwest::Response) -> TransportResult<HttpResponse> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_error)?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))?
        };
        Ok(HttpResponse::new(status, body))
    }
}

#[async_trait]
impl RequestClient for HttpClient {
    async fn get(&self, path: &str) -> TransportResult<HttpResponse> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await.map_err(map_error)?;
        Self::finish(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> TransportResult<HttpResponse> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_error)?;
        Self::finish(response).await
    }

    async fn head(&self, path: &str) -> TransportResult<HttpResponse> {
        let url = self.url(path)?;
        debug!(%url, "HEAD");
        let response = self.client.head(&url).send().await.map_err(map_error)?;
        Ok(HttpResponse::empty(response.status().as_u16()))
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else if err.is_builder() {
        TransportError::InvalidUrl(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

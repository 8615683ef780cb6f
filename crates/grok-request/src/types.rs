use std::fmt;

use serde_json::Value;

/// Status code and decoded JSON body of a completed request.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// A `200 OK` carrying `body`.
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// A bodiless response with the given status.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Value::Null)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
        })
    }
}

/// A request as seen by [`InMemoryApi`](crate::InMemoryApi).
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// The path without its query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, q)| q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_range() {
        assert!(HttpResponse::ok(json!([])).is_success());
        assert!(HttpResponse::empty(204).is_success());
        assert!(!HttpResponse::empty(404).is_success());
        assert!(!HttpResponse::empty(500).is_success());
    }

    #[test]
    fn recorded_request_splits_query() {
        let req = RecordedRequest {
            method: Method::Get,
            path: "/api/decks?decks=1,2".into(),
            body: None,
        };
        assert_eq!(req.route(), "/api/decks");
        assert_eq!(req.query(), Some("decks=1,2"));
        assert_eq!(Method::Head.to_string(), "HEAD");
    }
}

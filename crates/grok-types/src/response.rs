use serde::{Deserialize, Serialize};

/// Outcome class of a request whose failure modes are expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    NotFound,
    Invalid,
}

/// An expected-failure outcome modeled as a value.
///
/// Create, exists, patch, and review calls resolve to a `Response` so callers
/// can branch on [`ResponseStatus`] without treating a rejected write or a
/// missing entity as an error. Transport failures are still errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response<T> {
    pub error: Option<String>,
    pub status: ResponseStatus,
    pub value: Option<T>,
}

impl<T> Response<T> {
    pub fn ok(value: T) -> Self {
        Self {
            error: None,
            status: ResponseStatus::Ok,
            value: Some(value),
        }
    }

    pub fn not_found(value: Option<T>) -> Self {
        Self {
            error: None,
            status: ResponseStatus::NotFound,
            value,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            status: ResponseStatus::Invalid,
            value: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// The value, if the request succeeded.
    pub fn into_ok(self) -> Option<T> {
        match self.status {
            ResponseStatus::Ok => self.value,
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            error: self.error,
            status: self.status,
            value: self.value.map(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        let ok = Response::ok(3);
        assert!(ok.is_ok());
        assert_eq!(ok.value, Some(3));

        let missing = Response::not_found(Some(false));
        assert_eq!(missing.status, ResponseStatus::NotFound);
        assert_eq!(missing.value, Some(false));

        let bad: Response<u8> = Response::invalid("unexpected status 500");
        assert_eq!(bad.status, ResponseStatus::Invalid);
        assert_eq!(bad.error.as_deref(), Some("unexpected status 500"));
        assert!(bad.into_ok().is_none());
    }

    #[test]
    fn map_keeps_status() {
        let mapped = Response::ok(2).map(|v| v * 10);
        assert_eq!(mapped, Response::ok(20));
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&ResponseStatus::NotFound).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
    }
}

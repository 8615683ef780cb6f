use thiserror::Error;

/// Failure to complete a request at all.
///
/// A response with a non-success status is not a transport error; it is
/// returned as an [`HttpResponse`](crate::HttpResponse) for the caller to
/// interpret.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("response body could not be decoded: {0}")]
    Decode(String),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

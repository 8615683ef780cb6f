use grok_request::TransportError;
use thiserror::Error;

/// Errors delivered to loader waiters.
///
/// Every waiter of a failed batch receives its own copy of the same error,
/// hence `Clone`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed batch response: {0}")]
    MalformedResponse(String),

    #[error("batch request failed with status {status}")]
    InvalidResponse { status: u16 },

    #[error("loader dispatcher is gone")]
    Closed,
}

pub type LoaderResult<T> = Result<T, LoaderError>;

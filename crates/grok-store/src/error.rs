use grok_loader::LoaderError;
use grok_request::TransportError;
use grok_tree::TreeError;
use grok_types::{EntityId, EntityKind, TypeError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("load failed: {0}")]
    Load(#[from] LoaderError),

    #[error("state tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Rejected before anything was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("{kind} {id} is not cached")]
    NotCached { kind: EntityKind, id: EntityId },

    #[error("no current {kind} selected")]
    NoCurrent { kind: EntityKind },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

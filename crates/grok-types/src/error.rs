use thiserror::Error;

use crate::ids::EntityKind;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id: {0}")]
    InvalidId(String),

    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("invalid {kind} draft: {reason}")]
    InvalidDraft { kind: EntityKind, reason: String },

    #[error("invalid review patch: {0}")]
    InvalidReview(String),
}

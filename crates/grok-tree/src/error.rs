//! Error types for state tree operations.

use thiserror::Error;

use crate::node::Path;

/// Errors that can occur while updating the state tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    /// An update path tried to descend through a value that is not a map.
    #[error("cannot descend into non-map value at {path}")]
    NotAMap { path: Path },
}

/// Convenience type alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

//! Batching entity loader for the grokdb client store.
//!
//! [`BatchLoader`] coalesces every `load` issued within one scheduling turn
//! into a single call of a [`BatchFn`], shares the pending result between
//! callers asking for the same id, and slices the batch response back to
//! each caller by the entities' `id` fields. [`RestBatch`] is the `BatchFn`
//! for the grokdb batch endpoints.

pub mod config;
pub mod error;
pub mod loader;
pub mod rest;
pub mod traits;

pub use config::LoaderConfig;
pub use error::{LoaderError, LoaderResult};
pub use loader::BatchLoader;
pub use rest::RestBatch;
pub use traits::BatchFn;

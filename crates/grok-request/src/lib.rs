//! Request seam between the grokdb client store and the REST API.
//!
//! The store never speaks HTTP itself. It issues `GET`, `POST`, and `HEAD`
//! requests against API-relative paths through a [`RequestClient`] and
//! interprets the returned status and JSON body.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryApi`], an in-process fake of the grokdb endpoints with a
//!   request log and fault injection, used by tests and demos
//! - `HttpClient` (feature `http`), backed by `reqwest`

pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{TransportError, TransportResult};
#[cfg(feature = "http")]
pub use http::HttpClient;
pub use memory::{Fault, InMemoryApi};
pub use traits::RequestClient;
pub use types::{HttpResponse, Method, RecordedRequest};

//! Foundation types for the grokdb client store.
//!
//! This crate provides the identity, entity, and value types shared by every
//! other `grok-*` crate.
//!
//! # Key Types
//!
//! - [`EntityId`]: canonical integer identifier for every entity kind
//! - [`EntityKind`]: deck, card, or stash; names state-tree keys and endpoints
//! - [`Deck`], [`Card`], [`Stash`]: immutable entity values implementing [`Entity`]
//! - [`Response`]: expected-failure outcomes modeled as values
//! - [`Route`]: the navigation state a presentation layer is in
//! - [`ReviewPatch`]: the payload submitted after reviewing a card

pub mod entity;
pub mod error;
pub mod ids;
pub mod response;
pub mod review;
pub mod route;

pub use entity::{
    Card, CardDraft, CardPatch, Deck, DeckDraft, DeckPatch, Draft, Entity, Stash, StashDraft,
    StashPatch,
};
pub use error::TypeError;
pub use ids::{EntityId, EntityKind};
pub use response::{Response, ResponseStatus};
pub use review::{Difficulty, ReviewPatch};
pub use route::{CardTab, Route};

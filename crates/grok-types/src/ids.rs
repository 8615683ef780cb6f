use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Canonical identifier of an entity, unique within its [`EntityKind`].
///
/// Ids arrive from routes as strings and from the API as JSON numbers. Both
/// are coerced into an `EntityId` once, at the edge; everything past that
/// point works with this type only.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wrap a raw integer id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Join ids into the comma-separated form used by batch endpoints.
    pub fn join(ids: &[EntityId]) -> String {
        ids.iter()
            .map(|id| id.0.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<EntityId> for i64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidId(s.to_string()))
    }
}

/// The kinds of entity the store caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Deck,
    Card,
    Stash,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Deck, EntityKind::Card, EntityKind::Stash];

    /// Singular name, used as the state-tree key for the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Deck => "deck",
            EntityKind::Card => "card",
            EntityKind::Stash => "stash",
        }
    }

    /// Plural name, used in endpoint paths and batch query parameters.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Deck => "decks",
            EntityKind::Card => "cards",
            EntityKind::Stash => "stashes",
        }
    }

    /// Resolve a kind from its plural collection name.
    pub fn from_collection(name: &str) -> Result<Self, TypeError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.collection() == name)
            .ok_or_else(|| TypeError::UnknownKind(name.to_string()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Entity values and the requests that create or change them.
//!
//! Entities are immutable: an update from the API produces a new value which
//! replaces the cached one. Decoding is lenient about optional fields (a
//! missing or `null` description becomes `""`) but strict about the field
//! that names the entity.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TypeError;
use crate::ids::{EntityId, EntityKind};

/// A cached domain object addressed by an [`EntityId`].
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Which kind this is; selects the state-tree key and the endpoints.
    const KIND: EntityKind;

    /// Name of the field carrying the ordered child ids, if the kind has one.
    const CHILDREN_FIELD: Option<&'static str> = None;

    /// Body of a create request.
    type Draft: Draft;

    /// Body of a patch request.
    type Patch: Serialize + Send + Sync;

    fn id(&self) -> EntityId;
}

/// Body of a create request, checked before anything is sent.
pub trait Draft: Serialize + Send + Sync {
    fn validate(&self) -> Result<(), TypeError>;

    /// Parent entity of the same kind whose child list the create changes.
    fn parent_id(&self) -> Option<EntityId> {
        None
    }
}

fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn require_text(kind: EntityKind, field: &str, value: &str) -> Result<(), TypeError> {
    if value.trim().is_empty() {
        return Err(TypeError::InvalidDraft {
            kind,
            reason: format!("{field} is required"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Deck
// ---------------------------------------------------------------------------

/// A node in the deck hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: EntityId,
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub description: String,
    #[serde(default)]
    pub parent: Option<EntityId>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub has_parent: bool,
    #[serde(default, deserialize_with = "null_to_default")]
    pub children: Vec<EntityId>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub updated_at: i64,
}

impl Entity for Deck {
    const KIND: EntityKind = EntityKind::Deck;
    const CHILDREN_FIELD: Option<&'static str> = Some("children");
    type Draft = DeckDraft;
    type Patch = DeckPatch;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Request body for creating a deck.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<EntityId>,
}

impl DeckDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parent: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl Draft for DeckDraft {
    fn validate(&self) -> Result<(), TypeError> {
        require_text(EntityKind::Deck, "name", &self.name)
    }

    fn parent_id(&self) -> Option<EntityId> {
        self.parent
    }
}

/// Partial update of a deck. Unset fields are left alone by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<EntityId>,
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// A reviewable card belonging to exactly one deck.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: EntityId,
    pub title: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub front: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub back: String,
    pub deck: EntityId,
    #[serde(default, deserialize_with = "null_to_default")]
    pub times_reviewed: u64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub updated_at: i64,
}

impl Entity for Card {
    const KIND: EntityKind = EntityKind::Card;
    type Draft = CardDraft;
    type Patch = CardPatch;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Request body for creating a card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
    pub deck: EntityId,
}

impl CardDraft {
    pub fn new(title: impl Into<String>, deck: EntityId) -> Self {
        Self {
            title: title.into(),
            description: None,
            front: String::new(),
            back: String::new(),
            deck,
        }
    }

    pub fn sides(mut self, front: impl Into<String>, back: impl Into<String>) -> Self {
        self.front = front.into();
        self.back = back.into();
        self
    }
}

impl Draft for CardDraft {
    fn validate(&self) -> Result<(), TypeError> {
        require_text(EntityKind::Card, "title", &self.title)
    }
}

/// Partial update of a card.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck: Option<EntityId>,
}

// ---------------------------------------------------------------------------
// Stash
// ---------------------------------------------------------------------------

/// A user-curated collection of cards, reviewable as a unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    pub id: EntityId,
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub cards: Vec<EntityId>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "null_to_default")]
    pub updated_at: i64,
}

impl Entity for Stash {
    const KIND: EntityKind = EntityKind::Stash;
    const CHILDREN_FIELD: Option<&'static str> = Some("cards");
    type Draft = StashDraft;
    type Patch = StashPatch;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Request body for creating a stash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StashDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

impl Draft for StashDraft {
    fn validate(&self) -> Result<(), TypeError> {
        require_text(EntityKind::Stash, "name", &self.name)
    }
}

/// Partial update of a stash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deck_fills_optional_fields() {
        let deck: Deck = serde_json::from_value(json!({"id": 1, "name": "Library"})).unwrap();
        assert_eq!(deck.id, EntityId::new(1));
        assert_eq!(deck.description, "");
        assert_eq!(deck.parent, None);
        assert!(!deck.has_parent);
        assert!(deck.children.is_empty());
    }

    #[test]
    fn deck_tolerates_null_description() {
        let deck: Deck = serde_json::from_value(json!({
            "id": 2,
            "name": "Math",
            "description": null,
            "parent": 1,
            "has_parent": true,
            "children": [5, 3]
        }))
        .unwrap();
        assert_eq!(deck.description, "");
        assert_eq!(deck.parent, Some(EntityId::new(1)));
        assert_eq!(deck.children, vec![EntityId::new(5), EntityId::new(3)]);
    }

    #[test]
    fn deck_requires_name() {
        let result = serde_json::from_value::<Deck>(json!({"id": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn card_requires_deck_and_title() {
        assert!(serde_json::from_value::<Card>(json!({"id": 1, "title": "t"})).is_err());
        let card: Card =
            serde_json::from_value(json!({"id": 1, "title": "t", "deck": 4})).unwrap();
        assert_eq!(card.deck, EntityId::new(4));
        assert_eq!(card.times_reviewed, 0);
    }

    #[test]
    fn draft_validation() {
        assert!(DeckDraft::new("Foo").validate().is_ok());
        let err = DeckDraft::new("  ").validate().unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidDraft {
                kind: EntityKind::Deck,
                reason: "name is required".into()
            }
        );
        assert!(CardDraft::new("", EntityId::new(1)).validate().is_err());
        assert!(StashDraft::new("later").validate().is_ok());
    }

    #[test]
    fn deck_draft_omits_unset_fields() {
        let body = serde_json::to_value(DeckDraft::new("Foo")).unwrap();
        assert_eq!(body, json!({"name": "Foo"}));

        let body =
            serde_json::to_value(DeckDraft::new("Foo").description("d").parent(EntityId::new(3)))
                .unwrap();
        assert_eq!(body, json!({"name": "Foo", "description": "d", "parent": 3}));
    }

    #[test]
    fn draft_parent_only_for_decks() {
        let deck = DeckDraft::new("Foo").parent(EntityId::new(3));
        assert_eq!(deck.parent_id(), Some(EntityId::new(3)));
        assert_eq!(StashDraft::new("s").parent_id(), None);
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let body = serde_json::to_value(CardPatch::default()).unwrap();
        assert_eq!(body, json!({}));
    }
}

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Which face of a card a view shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTab {
    #[default]
    Front,
    Back,
    Description,
    Stashes,
    Meta,
}

/// Where the presentation layer currently is.
///
/// URL parsing lives outside the store; a router hands over an already parsed
/// `Route`. Variants carry the ids of the entities they select, which is what
/// keeps the per-kind current selections in step with navigation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Route {
    #[default]
    Library,
    Deck {
        deck: EntityId,
    },
    DeckCards {
        deck: EntityId,
    },
    Card {
        deck: EntityId,
        card: EntityId,
        tab: CardTab,
    },
    DeckReview {
        deck: EntityId,
        card: EntityId,
        tab: CardTab,
    },
    Stashes,
    Stash {
        stash: EntityId,
    },
    StashCard {
        stash: EntityId,
        card: EntityId,
        tab: CardTab,
    },
    StashCardReview {
        stash: EntityId,
        card: EntityId,
        tab: CardTab,
    },
    Settings,
}

impl Route {
    /// The deck this route selects, if any.
    pub fn deck(&self) -> Option<EntityId> {
        match *self {
            Route::Deck { deck }
            | Route::DeckCards { deck }
            | Route::Card { deck, .. }
            | Route::DeckReview { deck, .. } => Some(deck),
            _ => None,
        }
    }

    /// The card this route selects, if any.
    pub fn card(&self) -> Option<EntityId> {
        match *self {
            Route::Card { card, .. }
            | Route::DeckReview { card, .. }
            | Route::StashCard { card, .. }
            | Route::StashCardReview { card, .. } => Some(card),
            _ => None,
        }
    }

    /// The stash this route selects, if any.
    pub fn stash(&self) -> Option<EntityId> {
        match *self {
            Route::Stash { stash }
            | Route::StashCard { stash, .. }
            | Route::StashCardReview { stash, .. } => Some(stash),
            _ => None,
        }
    }

    /// The card tab shown, for routes that show a card.
    pub fn tab(&self) -> Option<CardTab> {
        match *self {
            Route::Card { tab, .. }
            | Route::DeckReview { tab, .. }
            | Route::StashCard { tab, .. }
            | Route::StashCardReview { tab, .. } => Some(tab),
            _ => None,
        }
    }

    pub fn is_review(&self) -> bool {
        matches!(self, Route::DeckReview { .. } | Route::StashCardReview { .. })
    }
}

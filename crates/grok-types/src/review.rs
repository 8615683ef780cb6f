use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::EntityId;

/// How hard a card felt during review.
///
/// The scheduler on the server turns this into the card's next due time;
/// the client only reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    None,
    Forgot,
    Hard,
    Fair,
    Good,
    Easy,
}

/// The result of reviewing one card, submitted to the review endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPatch {
    #[serde(skip)]
    card: EntityId,
    difficulty: Difficulty,
    skip_card: bool,
}

impl ReviewPatch {
    pub fn new(card: EntityId) -> Self {
        Self {
            card,
            difficulty: Difficulty::None,
            skip_card: false,
        }
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn skip_card(mut self, skip: bool) -> Self {
        self.skip_card = skip;
        self
    }

    pub fn card(&self) -> EntityId {
        self.card
    }

    pub fn rated(&self) -> Difficulty {
        self.difficulty
    }

    pub fn is_skip(&self) -> bool {
        self.skip_card
    }

    /// A review must either rate the card or skip it.
    pub fn validate(&self) -> Result<(), TypeError> {
        if !self.skip_card && self.difficulty == Difficulty::None {
            return Err(TypeError::InvalidReview(format!(
                "card {} was neither rated nor skipped",
                self.card
            )));
        }
        Ok(())
    }
}

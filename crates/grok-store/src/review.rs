use grok_types::{Card, Response, ReviewPatch};
use tracing::{debug, warn};

use crate::entity_store::EntityStore;
use crate::error::{StoreError, StoreResult};

/// Submits card reviews and keeps the reviewed card's cache slot current.
///
/// Scheduling is the server's concern; the client reports the outcome and
/// re-fetches the card it changed.
#[derive(Clone, Debug)]
pub struct ReviewStore {
    cards: EntityStore<Card>,
}

impl ReviewStore {
    pub fn new(cards: EntityStore<Card>) -> Self {
        Self { cards }
    }

    /// Post `patch` to `{prefix}/cards/{id}/review`.
    ///
    /// A patch that neither rates nor skips the card fails before sending.
    /// On `200` the card is re-fetched into the cache and returned.
    pub async fn review_card(&self, patch: &ReviewPatch) -> StoreResult<Response<Card>> {
        patch.validate()?;
        let card = patch.card();
        let body =
            serde_json::to_value(patch).map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        let path = format!("{}/cards/{card}/review", self.cards.prefix());

        let response = self.cards.client().post(&path, &body).await?;
        match response.status {
            200 => {
                debug!(
                    %card,
                    difficulty = ?patch.rated(),
                    skipped = patch.is_skip(),
                    "review recorded"
                );
                self.cards.refresh(card).await.map(Response::ok)
            }
            404 => Ok(Response::not_found(None)),
            status => {
                warn!(%card, status, "review rejected");
                Ok(Response::invalid(format!("unexpected status {status}")))
            }
        }
    }
}

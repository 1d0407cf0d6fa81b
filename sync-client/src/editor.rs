//! Submit callbacks for a presentation layer.
//!
//! [`CardSetEditor`] is what a UI holds: it turns user gestures into
//! [`StateUpdate`]s and hands them to whatever owns the session. Both
//! [`CardSetSession`](crate::CardSetSession) (direct use) and
//! [`SessionHandle`](crate::SessionHandle) (session running in its own task)
//! implement it, so the callbacks are written once.
//!
//! Gestures that depend on the current snapshot (drawing the top card,
//! shuffling, changing a duplication count) go through
//! [`CardSetEditor::submit_with`], which builds the update from the same
//! snapshot it is applied to.

use async_trait::async_trait;
use cardset_sync_types::{
    Card, CardId, CardSetState, Destination, HandId, HandInfo, OriginalCard, StateUpdate,
};
use rand::seq::SliceRandom;

use crate::session::ClientError;

/// Builds an update from the working snapshot it will be applied to.
pub type EditBuilder = Box<dyn FnOnce(&CardSetState) -> Result<StateUpdate, ClientError> + Send>;

/// Edits a card set by submitting updates.
///
/// Every callback returns the working snapshot after the edit.
#[async_trait]
pub trait CardSetEditor: Send + Sync {
    /// Apply an update locally and queue it for the store.
    async fn submit(&self, update: StateUpdate) -> Result<CardSetState, ClientError>;

    /// Build an update from the working snapshot and queue it, with no other
    /// edit landing in between.
    async fn submit_with(&self, build: EditBuilder) -> Result<CardSetState, ClientError>;

    /// The current working snapshot.
    async fn snapshot(&self) -> CardSetState;

    /// Add a card at the top of the deck.
    async fn submit_add(&self, card: Card) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::add_card(card)).await
    }

    /// Delete a card and, for an Original, its duplicates.
    async fn submit_delete(&self, card_id: CardId) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::delete_card(card_id)).await
    }

    /// Replace an Original's fields; a duplication count reconciles duplicates.
    async fn submit_update(&self, card: OriginalCard) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::update_card(card)).await
    }

    /// Move a card to the deck or a hand.
    async fn submit_move(
        &self,
        card_id: CardId,
        destination: Destination,
    ) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::move_card(card_id, destination))
            .await
    }

    /// Reorder the deck.
    async fn submit_reorder(&self, order: Vec<CardId>) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::reorder_deck(order)).await
    }

    /// Create or rename a hand.
    async fn submit_upsert_hand(&self, hand: HandInfo) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::upsert_hand(hand)).await
    }

    /// Delete a hand; its cards go back to the top of the deck.
    async fn submit_delete_hand(&self, hand_id: HandId) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::delete_hand(hand_id)).await
    }

    /// Rename the card set.
    async fn submit_rename(&self, name: &str) -> Result<CardSetState, ClientError> {
        self.submit(StateUpdate::rename_set(name)).await
    }

    /// Add a blank Original at the top of the deck.
    async fn submit_new_card(&self) -> Result<CardSetState, ClientError> {
        self.submit_add(OriginalCard::blank().into()).await
    }

    /// Set how many copies of an Original exist, counting the Original.
    async fn change_duplication(
        &self,
        card_id: CardId,
        count: u32,
    ) -> Result<CardSetState, ClientError> {
        self.submit_with(Box::new(move |state: &CardSetState| {
            let original = state
                .card(&card_id)
                .and_then(Card::as_original)
                .cloned()
                .ok_or(ClientError::UnknownCard(card_id))?;
            Ok(StateUpdate::update_card(original.with_duplication(count)))
        }))
        .await
    }

    /// Shuffle the deck.
    async fn submit_shuffle(&self) -> Result<CardSetState, ClientError> {
        self.submit_with(Box::new(|state: &CardSetState| {
            let mut order = state.deck.clone();
            order.shuffle(&mut rand::thread_rng());
            Ok(StateUpdate::reorder_deck(order))
        }))
        .await
    }

    /// Move the top card of the deck to the front of a hand.
    async fn draw_top_card(&self, hand_id: HandId) -> Result<CardSetState, ClientError> {
        self.submit_with(Box::new(move |state: &CardSetState| {
            let top = state.deck.first().cloned().ok_or(ClientError::EmptyDeck)?;
            Ok(StateUpdate::move_card(top, Destination::hand(hand_id, 0)))
        }))
        .await
    }

    /// Create an empty hand with a fresh id.
    async fn submit_new_hand(&self, name: &str) -> Result<CardSetState, ClientError> {
        self.submit_upsert_hand(HandInfo::new(HandId::random(), name))
            .await
    }
}

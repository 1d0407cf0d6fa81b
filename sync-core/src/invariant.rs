//! Single-location invariant checks.
//!
//! A valid [`CardSetState`] places every card id in exactly one of: the deck,
//! or exactly one hand. Nothing else may appear in those containers, and every
//! Duplicate references a live Original.

use cardset_sync_types::{Card, CardId, CardSetState, HandId};
use std::collections::BTreeMap;
use thiserror::Error;

/// A broken invariant. Reaching one is a defect, never a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    /// A card exists but is not in the deck or any hand.
    #[error("card {0} is not located in the deck or any hand")]
    Unlocated(CardId),

    /// A container references a card that does not exist.
    #[error("card {0} is located but does not exist")]
    UnknownCard(CardId),

    /// A card appears more than once across deck and hands.
    #[error("card {id} appears {count} times across deck and hands")]
    MultipleLocations {
        /// The repeated card.
        id: CardId,
        /// How many times it appears.
        count: usize,
    },

    /// A Duplicate's parent is missing or is itself a Duplicate.
    #[error("duplicate {id} references {parent}, which is not a live original")]
    OrphanDuplicate {
        /// The duplicate.
        id: CardId,
        /// Its dangling parent reference.
        parent: CardId,
    },

    /// The map key of a card differs from the card's own id.
    #[error("card stored under {key} has id {id}")]
    KeyMismatch {
        /// Map key.
        key: CardId,
        /// Id inside the card.
        id: CardId,
    },

    /// The map key of a hand differs from the hand's own id.
    #[error("hand stored under {key} has id {id}")]
    HandKeyMismatch {
        /// Map key.
        key: HandId,
        /// Id inside the hand.
        id: HandId,
    },
}

/// Validate every structural invariant of a snapshot.
///
/// Reports the first violation found; checks run in a fixed order so the
/// same broken snapshot always yields the same error.
pub fn validate(state: &CardSetState) -> Result<(), InvariantError> {
    for (key, hand) in &state.hands {
        if key != &hand.id {
            return Err(InvariantError::HandKeyMismatch {
                key: key.clone(),
                id: hand.id.clone(),
            });
        }
    }

    let mut seen: BTreeMap<&CardId, usize> = BTreeMap::new();
    for id in state.located_ids() {
        *seen.entry(id).or_default() += 1;
    }

    for (id, count) in &seen {
        if !state.cards.contains_key(*id) {
            return Err(InvariantError::UnknownCard((*id).clone()));
        }
        if *count > 1 {
            return Err(InvariantError::MultipleLocations {
                id: (*id).clone(),
                count: *count,
            });
        }
    }

    for (key, card) in &state.cards {
        if key != card.id() {
            return Err(InvariantError::KeyMismatch {
                key: key.clone(),
                id: card.id().clone(),
            });
        }
        if !seen.contains_key(key) {
            return Err(InvariantError::Unlocated(key.clone()));
        }
        if let Card::Duplicate(dup) = card {
            if !matches!(state.cards.get(&dup.parent_id), Some(Card::Original(_))) {
                return Err(InvariantError::OrphanDuplicate {
                    id: dup.id.clone(),
                    parent: dup.parent_id.clone(),
                });
            }
        }
    }

    Ok(())
}

//! Discrete, idempotent state mutations.

use serde::{Deserialize, Serialize};

use crate::{Card, CardId, HandId, HandInfo, OriginalCard, UpdateId};

/// One state mutation plus the id that makes it idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Globally unique, caller-assigned id.
    pub id: UpdateId,
    /// What to change.
    pub op: Operation,
}

impl StateUpdate {
    /// Wrap an operation with a fresh id.
    pub fn new(op: Operation) -> Self {
        Self {
            id: UpdateId::new(),
            op,
        }
    }

    /// Insert a card at the top of the deck.
    pub fn add_card(card: impl Into<Card>) -> Self {
        Self::new(Operation::AddCard { card: card.into() })
    }

    /// Delete a card (cascading to duplicates of an Original).
    pub fn delete_card(card_id: impl Into<CardId>) -> Self {
        Self::new(Operation::DeleteCard {
            card_id: card_id.into(),
        })
    }

    /// Replace a card's fields.
    pub fn update_card(card: OriginalCard) -> Self {
        Self::new(Operation::UpdateCard {
            card: Card::Original(card),
        })
    }

    /// Move a card.
    pub fn move_card(card_id: impl Into<CardId>, destination: Destination) -> Self {
        Self::new(Operation::MoveCard(CardMove {
            card_id: card_id.into(),
            destination,
        }))
    }

    /// Reorder the deck.
    pub fn reorder_deck(order: Vec<CardId>) -> Self {
        Self::new(Operation::Reorder {
            target: ReorderTarget::Deck { order },
        })
    }

    /// Create or rename a hand.
    pub fn upsert_hand(hand: HandInfo) -> Self {
        Self::new(Operation::UpsertHand { hand })
    }

    /// Delete a hand.
    pub fn delete_hand(hand_id: impl Into<HandId>) -> Self {
        Self::new(Operation::DeleteHand {
            hand_id: hand_id.into(),
        })
    }

    /// Rename the card set.
    pub fn rename_set(name: &str) -> Self {
        Self::new(Operation::RenameSet {
            name: name.to_string(),
        })
    }
}

/// The mutation carried by a [`StateUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert a card at the top of the deck (overwrite in place if it exists).
    AddCard {
        /// The card to add.
        card: Card,
    },
    /// Delete a card; deleting an Original deletes its duplicates too.
    DeleteCard {
        /// The card to delete.
        card_id: CardId,
    },
    /// Replace a card's stored value, reconciling duplicates if a count is requested.
    UpdateCard {
        /// The new card value.
        card: Card,
    },
    /// Move a card to a position in the deck or a hand.
    MoveCard(CardMove),
    /// Re-sort a container.
    Reorder {
        /// Which container and the requested order.
        target: ReorderTarget,
    },
    /// Create a hand or rename an existing one.
    UpsertHand {
        /// Hand id and name.
        hand: HandInfo,
    },
    /// Remove a hand, returning its cards to the deck.
    DeleteHand {
        /// The hand to delete.
        hand_id: HandId,
    },
    /// Rename the card set.
    RenameSet {
        /// New name.
        name: String,
    },
}

impl Operation {
    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::AddCard { .. } => "add_card",
            Operation::DeleteCard { .. } => "delete_card",
            Operation::UpdateCard { .. } => "update_card",
            Operation::MoveCard(_) => "move_card",
            Operation::Reorder { .. } => "reorder",
            Operation::UpsertHand { .. } => "upsert_hand",
            Operation::DeleteHand { .. } => "delete_hand",
            Operation::RenameSet { .. } => "rename_set",
        }
    }
}

/// A card move: which card and where to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMove {
    /// The card to move.
    pub card_id: CardId,
    /// Target container and position.
    pub destination: Destination,
}

/// Target of a move. Positions are clamped to the container length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// A position in the deck.
    Deck {
        /// Insert index (0 = top).
        position: usize,
    },
    /// A position in a hand.
    Hand {
        /// Target hand.
        hand_id: HandId,
        /// Insert index.
        position: usize,
    },
}

impl Destination {
    /// The top of the deck.
    pub fn deck_top() -> Self {
        Destination::Deck { position: 0 }
    }

    /// A position in the given hand.
    pub fn hand(hand_id: impl Into<HandId>, position: usize) -> Self {
        Destination::Hand {
            hand_id: hand_id.into(),
            position,
        }
    }
}

/// Container to re-sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReorderTarget {
    /// Re-sort the deck.
    Deck {
        /// Requested relative order.
        order: Vec<CardId>,
    },
    /// Re-sort a hand (not supported by the reducer).
    Hand {
        /// Target hand.
        hand_id: HandId,
        /// Requested relative order.
        order: Vec<CardId>,
    },
}

//! The card set snapshot: cards plus where each of them lives.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Card, CardId, CollectionId, HandId};

/// Name given to a fresh card set.
pub const DEFAULT_SET_NAME: &str = "Deck";

/// Name given to the hand a fresh card set starts with.
pub const DEFAULT_HAND_NAME: &str = "Hand";

/// A named, ordered container of card ids held outside the deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    /// Hand id.
    pub id: HandId,
    /// Display name.
    pub name: String,
    /// Card ids, in display order.
    pub contents: Vec<CardId>,
}

impl Hand {
    /// Create an empty hand.
    pub fn new(id: HandId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            contents: Vec::new(),
        }
    }

    /// The hand's identity without its contents.
    pub fn info(&self) -> HandInfo {
        HandInfo {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// A hand without its contents, as carried by `UpsertHand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandInfo {
    /// Hand id.
    pub id: HandId,
    /// Display name.
    pub name: String,
}

impl HandInfo {
    /// Create hand metadata.
    pub fn new(id: impl Into<HandId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
        }
    }
}

/// Where a card currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// In the deck at the given index.
    Deck(usize),
    /// In the given hand at the given index.
    Hand(HandId, usize),
}

/// Snapshot of one card set.
///
/// Maps are ordered so equal snapshots serialize to identical bytes.
/// Every id in `cards` lives in exactly one place: the deck or a single hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSetState {
    /// Collection this snapshot belongs to.
    pub id: CollectionId,
    /// Display name of the set.
    pub name: String,
    /// All live cards by id.
    pub cards: BTreeMap<CardId, Card>,
    /// Undrawn cards, top first.
    pub deck: Vec<CardId>,
    /// Hands by id.
    pub hands: BTreeMap<HandId, Hand>,
}

impl CardSetState {
    /// An empty set with one default hand.
    pub fn new(id: CollectionId) -> Self {
        let hand = Hand::new(HandId::default_hand(), DEFAULT_HAND_NAME);
        let mut hands = BTreeMap::new();
        hands.insert(hand.id.clone(), hand);
        Self {
            id,
            name: DEFAULT_SET_NAME.to_string(),
            cards: BTreeMap::new(),
            deck: Vec::new(),
            hands,
        }
    }

    /// Look up a card.
    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    /// Look up a hand.
    pub fn hand(&self, id: &HandId) -> Option<&Hand> {
        self.hands.get(id)
    }

    /// Find where a card lives. The deck is searched first, then hands in id order.
    pub fn location_of(&self, id: &CardId) -> Option<Location> {
        if let Some(index) = self.deck.iter().position(|c| c == id) {
            return Some(Location::Deck(index));
        }
        self.hands.values().find_map(|hand| {
            hand.contents
                .iter()
                .position(|c| c == id)
                .map(|index| Location::Hand(hand.id.clone(), index))
        })
    }

    /// Every located card id: the deck top to bottom, then each hand in id order.
    pub fn located_ids(&self) -> impl Iterator<Item = &CardId> {
        self.deck
            .iter()
            .chain(self.hands.values().flat_map(|hand| hand.contents.iter()))
    }

    /// Duplicates of `original`, in location order.
    ///
    /// Duplicates that are not located anywhere (only possible in a broken
    /// snapshot) follow in id order.
    pub fn duplicates_of(&self, original: &CardId) -> Vec<CardId> {
        let is_duplicate = |id: &CardId| {
            matches!(self.cards.get(id), Some(Card::Duplicate(d)) if &d.parent_id == original)
        };
        let mut found: Vec<CardId> = self
            .located_ids()
            .filter(|id| is_duplicate(id))
            .cloned()
            .collect();
        for id in self.cards.keys() {
            if is_duplicate(id) && !found.contains(id) {
                found.push(id.clone());
            }
        }
        found
    }

    /// Derived duplication count: 1 + number of duplicates.
    ///
    /// Returns 0 when `id` is not a live Original.
    pub fn duplication_of(&self, id: &CardId) -> usize {
        match self.cards.get(id) {
            Some(Card::Original(_)) => 1 + self.duplicates_of(id).len(),
            _ => 0,
        }
    }

    /// Name/id summary used when listing card sets.
    pub fn summary(&self) -> CardSetSummary {
        CardSetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// The `{id, name}` pair shown when listing card sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSetSummary {
    /// Collection id.
    pub id: CollectionId,
    /// Display name.
    pub name: String,
}

//! The card model: user-authored Originals and their lightweight Duplicates.

use serde::{Deserialize, Serialize};

use crate::CardId;

/// A card in a card set.
///
/// Tagged on the wire as `{"type": "original", ...}` / `{"type": "duplicate", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Card {
    /// A user-authored card, source of truth for its duplicates.
    Original(OriginalCard),
    /// A clone referencing an Original.
    Duplicate(DuplicateCard),
}

impl Card {
    /// The card's id.
    pub fn id(&self) -> &CardId {
        match self {
            Card::Original(card) => &card.id,
            Card::Duplicate(card) => &card.id,
        }
    }

    /// The id of the Original this card shows: itself, or its parent.
    pub fn original_id(&self) -> &CardId {
        match self {
            Card::Original(card) => &card.id,
            Card::Duplicate(card) => &card.parent_id,
        }
    }

    /// Borrow the Original variant, if this is one.
    pub fn as_original(&self) -> Option<&OriginalCard> {
        match self {
            Card::Original(card) => Some(card),
            Card::Duplicate(_) => None,
        }
    }

    /// Check if this card is an Original.
    pub fn is_original(&self) -> bool {
        matches!(self, Card::Original(_))
    }
}

impl From<OriginalCard> for Card {
    fn from(card: OriginalCard) -> Self {
        Card::Original(card)
    }
}

impl From<DuplicateCard> for Card {
    fn from(card: DuplicateCard) -> Self {
        Card::Duplicate(card)
    }
}

/// A user-authored card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalCard {
    /// Unique card id.
    pub id: CardId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Requested duplication count.
    ///
    /// Only meaningful on `AddCard`/`UpdateCard` requests, where it triggers
    /// duplicate creation or deletion. Stored cards always carry `None`; the
    /// live count is derived from the duplicates present.
    #[serde(default)]
    pub duplication: Option<u32>,
}

impl OriginalCard {
    /// Create an Original with the given id and name and an empty description.
    pub fn new(id: impl Into<CardId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            description: String::new(),
            duplication: None,
        }
    }

    /// A blank Original with a random id, as created by "new card".
    pub fn blank() -> Self {
        Self::new(CardId::random(), "")
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Request a duplication count.
    pub fn with_duplication(mut self, count: u32) -> Self {
        self.duplication = Some(count);
        self
    }

    /// The stored form of this card: the same fields without a count request.
    pub fn normalized(&self) -> Self {
        Self {
            duplication: None,
            ..self.clone()
        }
    }
}

/// A clone of an Original.
///
/// Duplicates carry no mutable fields; they are created and deleted, never
/// updated. Deleting the parent deletes every duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCard {
    /// Unique card id.
    pub id: CardId,
    /// Id of the Original this card duplicates.
    pub parent_id: CardId,
}

impl DuplicateCard {
    /// Create a duplicate of `parent_id`.
    pub fn new(id: impl Into<CardId>, parent_id: impl Into<CardId>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_is_tagged_by_variant() {
        let card = Card::Duplicate(DuplicateCard::new("d1", "c1"));
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["type"], "duplicate");
        assert_eq!(json["parent_id"], "c1");
    }

    #[test]
    fn original_without_duplication_field_deserializes() {
        let json = r#"{"type":"original","id":"c1","name":"X","description":""}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card, Card::Original(OriginalCard::new("c1", "X")));
    }

    #[test]
    fn original_id_of_duplicate_is_parent() {
        let card = Card::from(DuplicateCard::new("d1", "c1"));
        assert_eq!(card.original_id(), &CardId::from("c1"));
        assert!(!card.is_original());
        assert!(card.as_original().is_none());
    }

    #[test]
    fn normalized_drops_count_request() {
        let card = OriginalCard::new("c1", "X").with_duplication(3);
        let stored = card.normalized();
        assert_eq!(stored.duplication, None);
        assert_eq!(stored.name, "X");
    }
}

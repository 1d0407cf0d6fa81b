//! Structural diff between two snapshots.
//!
//! Used when only two snapshots are available (a remote snapshot versus the
//! branchpoint it diverged from), not an update trail. The result converts
//! back into [`StateUpdate`]s that turn `from` into `to` when replayed in
//! order.
//!
//! Moves are one per disturbed position, not a minimal edit script. A
//! position counts as disturbed when the id there differs from what the
//! replay would already have produced at that point, so every container ends
//! up exactly as in `to`.

use cardset_sync_types::{
    Card, CardId, CardMove, CardSetState, Destination, Hand, HandId, HandInfo, Operation,
    OriginalCard, StateUpdate,
};
use std::collections::BTreeSet;

/// Differences between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    /// Cards present only in `to`, Originals before Duplicates.
    pub adds: Vec<Card>,
    /// Cards present only in `from`.
    pub deletes: Vec<CardId>,
    /// Originals present in both whose value changed.
    pub updates: Vec<OriginalCard>,
    /// Positional fixes, deck first, then hands in id order, each ascending.
    pub moves: Vec<CardMove>,
    /// Hands created or renamed in `to`.
    pub upserted_hands: Vec<HandInfo>,
    /// Hands present only in `from`.
    pub deleted_hands: Vec<HandId>,
    /// New set name, if it changed.
    pub renamed: Option<String>,
}

impl StateDiff {
    /// Check if the snapshots are identical.
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.deletes.is_empty()
            && self.updates.is_empty()
            && self.moves.is_empty()
            && self.upserted_hands.is_empty()
            && self.deleted_hands.is_empty()
            && self.renamed.is_none()
    }

    /// Ids of every card this diff adds, updates, deletes or moves.
    pub fn touched_cards(&self) -> BTreeSet<&CardId> {
        self.adds
            .iter()
            .map(Card::id)
            .chain(self.deletes.iter())
            .chain(self.updates.iter().map(|card| &card.id))
            .chain(self.moves.iter().map(|mv| &mv.card_id))
            .collect()
    }

    /// Convert into updates, in replay order: deletes, adds, hand upserts,
    /// updates, moves, hand deletes, rename.
    pub fn into_updates(self) -> Vec<StateUpdate> {
        let mut updates = Vec::new();
        updates.extend(self.deletes.into_iter().map(StateUpdate::delete_card));
        updates.extend(self.adds.into_iter().map(StateUpdate::add_card));
        updates.extend(self.upserted_hands.into_iter().map(StateUpdate::upsert_hand));
        updates.extend(self.updates.into_iter().map(StateUpdate::update_card));
        updates.extend(
            self.moves
                .into_iter()
                .map(|mv| StateUpdate::new(Operation::MoveCard(mv))),
        );
        updates.extend(self.deleted_hands.into_iter().map(StateUpdate::delete_hand));
        if let Some(name) = self.renamed {
            updates.push(StateUpdate::rename_set(&name));
        }
        updates
    }
}

/// Compute the updates that transform `from` into `to`.
pub fn diff(from: &CardSetState, to: &CardSetState) -> StateDiff {
    let mut out = StateDiff::default();

    for (id, card) in &from.cards {
        match to.cards.get(id) {
            None => out.deletes.push(id.clone()),
            // Ids are never reused for a different card; treat it as delete + add.
            Some(other) if replaced(card, other) => out.deletes.push(id.clone()),
            Some(Card::Original(new)) => {
                if card.as_original() != Some(new) {
                    out.updates.push(new.normalized());
                }
            }
            Some(Card::Duplicate(_)) => {}
        }
    }

    let added = |card: &&Card| match from.cards.get(card.id()) {
        None => true,
        Some(old) => replaced(old, card),
    };
    out.adds.extend(to.cards.values().filter(added).filter(|c| c.is_original()).cloned());
    out.adds.extend(to.cards.values().filter(added).filter(|c| !c.is_original()).cloned());

    for (id, hand) in &to.hands {
        match from.hands.get(id) {
            Some(old) if old.name == hand.name => {}
            _ => out.upserted_hands.push(hand.info()),
        }
    }
    out.deleted_hands = from
        .hands
        .keys()
        .filter(|id| !to.hands.contains_key(*id))
        .cloned()
        .collect();

    if from.name != to.name {
        out.renamed = Some(to.name.clone());
    }

    out.moves = moves(from, to, &out);
    out
}

/// A variant change, or a Duplicate pointing at a different parent.
fn replaced(old: &Card, new: &Card) -> bool {
    old.is_original() != new.is_original() || (!new.is_original() && old != new)
}

/// Replay the structural part of the diff on a scratch copy, then emit a
/// move wherever the scratch container disagrees with `to`.
fn moves(from: &CardSetState, to: &CardSetState, partial: &StateDiff) -> Vec<CardMove> {
    let mut scratch = from.clone();
    scratch.deck.retain(|id| !partial.deletes.contains(id));
    for hand in scratch.hands.values_mut() {
        hand.contents.retain(|id| !partial.deletes.contains(id));
    }
    for card in &partial.adds {
        scratch.deck.insert(0, card.id().clone());
    }
    for info in &partial.upserted_hands {
        scratch
            .hands
            .entry(info.id.clone())
            .or_insert_with(|| Hand::new(info.id.clone(), &info.name));
    }

    let mut moves = Vec::new();
    align(&mut scratch, &mut moves, &to.deck, None);
    for (hand_id, hand) in &to.hands {
        align(&mut scratch, &mut moves, &hand.contents, Some(hand_id));
    }
    moves
}

fn align(
    scratch: &mut CardSetState,
    moves: &mut Vec<CardMove>,
    target: &[CardId],
    hand_id: Option<&HandId>,
) {
    for (position, id) in target.iter().enumerate() {
        let current = match hand_id {
            None => scratch.deck.get(position),
            Some(hand_id) => scratch
                .hands
                .get(hand_id)
                .and_then(|hand| hand.contents.get(position)),
        };
        if current == Some(id) {
            continue;
        }
        if let Some(hand_id) = hand_id {
            if !scratch.hands.contains_key(hand_id) {
                continue;
            }
        }

        scratch.deck.retain(|c| c != id);
        for hand in scratch.hands.values_mut() {
            hand.contents.retain(|c| c != id);
        }
        let (container, destination) = match hand_id {
            None => (&mut scratch.deck, Destination::Deck { position }),
            Some(hand_id) => match scratch.hands.get_mut(hand_id) {
                Some(hand) => (&mut hand.contents, Destination::hand(hand_id.clone(), position)),
                None => continue,
            },
        };
        container.insert(position.min(container.len()), id.clone());
        moves.push(CardMove {
            card_id: id.clone(),
            destination,
        });
    }
}

//! State reducer: applies one [`StateUpdate`] to a [`CardSetState`].
//!
//! This is a pure function - no side effects, no I/O. Every code path that
//! mutates a card set (live edits, relay batches, merge replay) goes through
//! it. Preconditions are checked before anything is touched, so a failed
//! update leaves the state exactly as it was.
//!
//! Every operation is idempotent: applying the same update twice yields the
//! same state as applying it once. Duplicate reconciliation compares the
//! requested count against the *derived* count and synthesizes ids from the
//! update id, so a replayed `UpdateCard` finds nothing left to do.

use cardset_sync_types::{
    Card, CardId, CardMove, CardSetState, Destination, DuplicateCard, Hand, HandId, HandInfo,
    Location, Operation, OriginalCard, ReorderTarget, StateUpdate, UpdateId,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Most copies of one Original a single update may ask for, counting the
/// Original itself.
pub const MAX_DUPLICATION: u32 = 1_000;

/// A structurally invalid update. Fatal to the update, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// The update references a hand that does not exist.
    #[error("unknown hand: {0}")]
    UnknownHand(HandId),

    /// The operation is not supported.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A Duplicate would reference something other than a live Original.
    #[error("duplicate {id} references {parent}, which is not a live original")]
    OrphanDuplicate {
        /// The duplicate being added.
        id: CardId,
        /// Its parent reference.
        parent: CardId,
    },

    /// A Duplicate is added again under a different Original.
    #[error("duplicate {id} already belongs to {parent}")]
    ParentMismatch {
        /// The duplicate being added.
        id: CardId,
        /// The parent it is stored with.
        parent: CardId,
    },

    /// The update would change a card's variant or edit a Duplicate.
    #[error("card {0} cannot change variant or be edited as a duplicate")]
    VariantMismatch(CardId),

    /// The requested duplication count is above [`MAX_DUPLICATION`].
    #[error("card {id} asks for {requested} copies (limit: {limit})")]
    DuplicationTooLarge {
        /// The Original being duplicated.
        id: CardId,
        /// Requested number of copies.
        requested: u32,
        /// The limit in force.
        limit: u32,
    },
}

/// Apply one update, consuming and returning the state.
pub fn apply(mut state: CardSetState, update: &StateUpdate) -> Result<CardSetState, ReduceError> {
    apply_in_place(&mut state, update)?;
    Ok(state)
}

/// Apply one update in place.
pub fn apply_in_place(state: &mut CardSetState, update: &StateUpdate) -> Result<(), ReduceError> {
    match &update.op {
        Operation::AddCard { card } => add_card(state, &update.id, card),
        Operation::DeleteCard { card_id } => {
            delete_card(state, card_id);
            Ok(())
        }
        Operation::UpdateCard { card } => update_card(state, &update.id, card),
        Operation::MoveCard(mv) => move_card(state, mv),
        Operation::Reorder { target } => reorder(state, target),
        Operation::UpsertHand { hand } => {
            upsert_hand(state, hand);
            Ok(())
        }
        Operation::DeleteHand { hand_id } => {
            delete_hand(state, hand_id);
            Ok(())
        }
        Operation::RenameSet { name } => {
            state.name = name.clone();
            Ok(())
        }
    }
}

/// Replay a sequence of updates over a copy of `base`, in order.
pub fn replay<'a>(
    base: &CardSetState,
    updates: impl IntoIterator<Item = &'a StateUpdate>,
) -> Result<CardSetState, ReduceError> {
    let mut state = base.clone();
    for update in updates {
        apply_in_place(&mut state, update)?;
    }
    Ok(state)
}

fn add_card(
    state: &mut CardSetState,
    update_id: &UpdateId,
    card: &Card,
) -> Result<(), ReduceError> {
    let id = card.id().clone();

    match card {
        Card::Duplicate(dup) => {
            if dup.parent_id == dup.id || !is_live_original(state, &dup.parent_id) {
                return Err(ReduceError::OrphanDuplicate {
                    id,
                    parent: dup.parent_id.clone(),
                });
            }
        }
        Card::Original(original) => check_duplication(&id, original.duplication)?,
    }

    match (state.cards.get(&id), card) {
        (Some(existing), _) if existing.is_original() != card.is_original() => {
            return Err(ReduceError::VariantMismatch(id));
        }
        (Some(Card::Duplicate(existing)), Card::Duplicate(dup))
            if existing.parent_id != dup.parent_id =>
        {
            return Err(ReduceError::ParentMismatch {
                id,
                parent: existing.parent_id.clone(),
            });
        }
        (Some(_), _) => {
            // Overwrite in place: the card keeps its location.
            state.cards.insert(id.clone(), stored_form(card));
        }
        (None, _) => {
            state.cards.insert(id.clone(), stored_form(card));
            state.deck.insert(0, id.clone());
        }
    }

    if let Card::Original(OriginalCard {
        duplication: Some(count),
        ..
    }) = card
    {
        reconcile_duplication(state, update_id, &id, *count);
    }
    Ok(())
}

fn delete_card(state: &mut CardSetState, card_id: &CardId) {
    let doomed = match state.cards.get(card_id) {
        None => return,
        Some(Card::Original(_)) => {
            let mut ids = state.duplicates_of(card_id);
            ids.push(card_id.clone());
            ids
        }
        Some(Card::Duplicate(_)) => vec![card_id.clone()],
    };

    for id in &doomed {
        state.cards.remove(id);
    }
    remove_everywhere(state, &doomed);
}

fn update_card(
    state: &mut CardSetState,
    update_id: &UpdateId,
    card: &Card,
) -> Result<(), ReduceError> {
    let id = card.id();
    match (state.cards.get(id), card) {
        // Deleted concurrently: the delete wins.
        (None, _) => Ok(()),
        (Some(Card::Original(_)), Card::Original(new)) => {
            check_duplication(id, new.duplication)?;
            state
                .cards
                .insert(id.clone(), Card::Original(new.normalized()));
            if let Some(count) = new.duplication {
                reconcile_duplication(state, update_id, id, count);
            }
            Ok(())
        }
        (Some(Card::Duplicate(existing)), Card::Duplicate(new)) if existing == new => Ok(()),
        _ => Err(ReduceError::VariantMismatch(id.clone())),
    }
}

fn check_duplication(id: &CardId, requested: Option<u32>) -> Result<(), ReduceError> {
    match requested {
        Some(requested) if requested > MAX_DUPLICATION => Err(ReduceError::DuplicationTooLarge {
            id: id.clone(),
            requested,
            limit: MAX_DUPLICATION,
        }),
        _ => Ok(()),
    }
}

/// Bring the number of copies of `original` to `requested` (at least 1).
///
/// New duplicates are placed right after the Original when it sits in the
/// deck, otherwise at the top of the deck. Surplus duplicates are removed in
/// location order.
fn reconcile_duplication(
    state: &mut CardSetState,
    update_id: &UpdateId,
    original: &CardId,
    requested: u32,
) {
    let target = requested.max(1) as usize;
    let current = state.duplication_of(original);

    if target > current {
        let insert_at = match state.location_of(original) {
            Some(Location::Deck(index)) => index + 1,
            _ => 0,
        };
        let mut added = Vec::with_capacity(target - current);
        let mut ordinal = 0;
        while added.len() < target - current {
            let id = CardId::synthesized(update_id, ordinal);
            ordinal += 1;
            if state.cards.contains_key(&id) {
                continue;
            }
            state.cards.insert(
                id.clone(),
                Card::Duplicate(DuplicateCard::new(id.clone(), original.clone())),
            );
            added.push(id);
        }
        state.deck.splice(insert_at..insert_at, added);
    } else if target < current {
        let surplus: Vec<CardId> = state
            .duplicates_of(original)
            .into_iter()
            .take(current - target)
            .collect();
        for id in &surplus {
            state.cards.remove(id);
        }
        remove_everywhere(state, &surplus);
    }
}
fn move_card(state: &mut CardSetState, mv: &CardMove) -> Result<(), ReduceError> {
    if let Destination::Hand { hand_id, .. } = &mv.destination {
        if !state.hands.contains_key(hand_id) {
            return Err(ReduceError::UnknownHand(hand_id.clone()));
        }
    }
    if !state.cards.contains_key(&mv.card_id) {
        return Ok(());
    }

    remove_everywhere(state, std::slice::from_ref(&mv.card_id));

    let (container, position) = match &mv.destination {
        Destination::Deck { position } => (&mut state.deck, *position),
        Destination::Hand { hand_id, position } => match state.hands.get_mut(hand_id) {
            Some(hand) => (&mut hand.contents, *position),
            None => return Err(ReduceError::UnknownHand(hand_id.clone())),
        },
    };
    // Stale positions after concurrent removals are clamped.
    let position = position.min(container.len());
    container.insert(position, mv.card_id.clone());
    Ok(())
}

fn reorder(state: &mut CardSetState, target: &ReorderTarget) -> Result<(), ReduceError> {
    match target {
        ReorderTarget::Deck { order } => {
            let mut rank: HashMap<&CardId, usize> = HashMap::with_capacity(order.len());
            for (index, id) in order.iter().enumerate() {
                rank.entry(id).or_insert(index);
            }
            // Stable: ids missing from `order` keep their relative order at the end.
            let mut deck = std::mem::take(&mut state.deck);
            deck.sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
            state.deck = deck;
            Ok(())
        }
        ReorderTarget::Hand { .. } => Err(ReduceError::NotImplemented("hand reorder")),
    }
}

fn upsert_hand(state: &mut CardSetState, info: &HandInfo) {
    state
        .hands
        .entry(info.id.clone())
        .and_modify(|hand| hand.name = info.name.clone())
        .or_insert_with(|| Hand::new(info.id.clone(), &info.name));
}

/// Remove a hand; its cards go back to the top of the deck in hand order.
fn delete_hand(state: &mut CardSetState, hand_id: &HandId) {
    if let Some(hand) = state.hands.remove(hand_id) {
        let mut deck = hand.contents;
        deck.append(&mut state.deck);
        state.deck = deck;
    }
}

fn remove_everywhere(state: &mut CardSetState, ids: &[CardId]) {
    let doomed: HashSet<&CardId> = ids.iter().collect();
    state.deck.retain(|id| !doomed.contains(id));
    for hand in state.hands.values_mut() {
        hand.contents.retain(|id| !doomed.contains(id));
    }
}

fn is_live_original(state: &CardSetState, id: &CardId) -> bool {
    matches!(state.cards.get(id), Some(Card::Original(_)))
}

fn stored_form(card: &Card) -> Card {
    match card {
        Card::Original(original) => Card::Original(original.normalized()),
        Card::Duplicate(dup) => Card::Duplicate(dup.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariant::validate;
    use cardset_sync_types::CollectionId;
    use proptest::prelude::*;

    fn empty() -> CardSetState {
        CardSetState::new(CollectionId::from("set"))
    }

    fn ids(list: &[&str]) -> Vec<CardId> {
        list.iter().map(|s| CardId::from(*s)).collect()
    }

    fn default_hand(state: &CardSetState) -> &Vec<CardId> {
        &state.hand(&HandId::default_hand()).unwrap().contents
    }

    fn with_deck(names: &[&str]) -> CardSetState {
        // Add in reverse so the deck reads in the given order.
        let mut state = empty();
        for name in names.iter().rev() {
            apply_in_place(&mut state, &StateUpdate::add_card(OriginalCard::new(*name, name)))
                .unwrap();
        }
        state
    }

    #[test]
    fn add_then_delete() {
        let state = apply(
            empty(),
            &StateUpdate::add_card(OriginalCard::new("c1", "X")),
        )
        .unwrap();
        assert_eq!(state.deck, ids(&["c1"]));

        let state = apply(state, &StateUpdate::delete_card("c1")).unwrap();
        assert!(state.deck.is_empty());
        assert!(state.cards.is_empty());
    }

    #[test]
    fn add_places_card_on_top_of_deck() {
        let state = with_deck(&["a", "b"]);
        let state = apply(state, &StateUpdate::add_card(OriginalCard::new("c", "C"))).unwrap();
        assert_eq!(state.deck, ids(&["c", "a", "b"]));
    }

    #[test]
    fn add_existing_card_overwrites_in_place() {
        let state = with_deck(&["a", "b"]);
        let update = StateUpdate::add_card(OriginalCard::new("b", "renamed"));
        let state = apply(state, &update).unwrap();
        assert_eq!(state.deck, ids(&["a", "b"]));
        assert_eq!(
            state.card(&"b".into()).and_then(Card::as_original).unwrap().name,
            "renamed"
        );
    }

    #[test]
    fn add_duplicate_of_missing_original_fails() {
        let state = empty();
        let result = apply(state, &StateUpdate::add_card(DuplicateCard::new("d1", "c1")));
        assert_eq!(
            result,
            Err(ReduceError::OrphanDuplicate {
                id: "d1".into(),
                parent: "c1".into()
            })
        );
    }

    #[test]
    fn add_duplicate_of_duplicate_fails() {
        let mut state = with_deck(&["c1"]);
        apply_in_place(&mut state, &StateUpdate::add_card(DuplicateCard::new("d1", "c1")))
            .unwrap();
        let update = StateUpdate::add_card(DuplicateCard::new("d2", "d1"));
        let result = apply_in_place(&mut state, &update);
        assert!(matches!(result, Err(ReduceError::OrphanDuplicate { .. })));
        assert!(state.card(&"d2".into()).is_none());
    }

    #[test]
    fn add_duplicate_again_keeps_it_in_place() {
        let mut state = with_deck(&["c1", "c2"]);
        let dup = StateUpdate::add_card(DuplicateCard::new("d1", "c1"));
        apply_in_place(&mut state, &dup).unwrap();
        let before = state.clone();

        let again = StateUpdate::add_card(DuplicateCard::new("d1", "c1"));
        apply_in_place(&mut state, &again).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn add_cannot_move_duplicate_to_another_original() {
        let mut state = with_deck(&["c1", "c2"]);
        apply_in_place(&mut state, &StateUpdate::add_card(DuplicateCard::new("d1", "c1")))
            .unwrap();
        let before = state.clone();

        let update = StateUpdate::add_card(DuplicateCard::new("d1", "c2"));
        let result = apply_in_place(&mut state, &update);

        assert_eq!(
            result,
            Err(ReduceError::ParentMismatch {
                id: "d1".into(),
                parent: "c1".into()
            })
        );
        assert_eq!(state, before);
        assert_eq!(state.duplication_of(&"c1".into()), 2);
        assert_eq!(state.duplication_of(&"c2".into()), 1);
    }

    #[test]
    fn delete_missing_card_is_noop() {
        let state = with_deck(&["a"]);
        let after = apply(state.clone(), &StateUpdate::delete_card("zzz")).unwrap();
        assert_eq!(after, state);
    }

    #[test]
    fn delete_original_cascades_to_duplicates() {
        let mut state = with_deck(&["c1", "c2"]);
        apply_in_place(
            &mut state,
            &StateUpdate::update_card(OriginalCard::new("c1", "c1").with_duplication(3)),
        )
        .unwrap();
        let dup = state.duplicates_of(&"c1".into())[0].clone();
        apply_in_place(
            &mut state,
            &StateUpdate::move_card(dup, Destination::hand(HandId::default_hand(), 0)),
        )
        .unwrap();

        apply_in_place(&mut state, &StateUpdate::delete_card("c1")).unwrap();

        assert_eq!(state.deck, ids(&["c2"]));
        assert!(default_hand(&state).is_empty());
        assert_eq!(state.cards.len(), 1);
        assert_eq!(validate(&state), Ok(()));
    }

    #[test]
    fn delete_duplicate_leaves_original() {
        let mut state = with_deck(&["c1"]);
        apply_in_place(&mut state, &StateUpdate::add_card(DuplicateCard::new("d1", "c1")))
            .unwrap();
        apply_in_place(&mut state, &StateUpdate::delete_card("d1")).unwrap();
        assert_eq!(state.deck, ids(&["c1"]));
        assert_eq!(state.duplication_of(&"c1".into()), 1);
    }

    #[test]
    fn duplication_increase_inserts_adjacent() {
        let state = with_deck(&["a", "c1", "b"]);
        let update = StateUpdate::update_card(OriginalCard::new("c1", "c1").with_duplication(3));
        let state = apply(state, &update).unwrap();

        let dups = state.duplicates_of(&"c1".into());
        assert_eq!(dups.len(), 2);
        assert_eq!(state.deck.len(), 5);
        assert_eq!(state.deck[1], CardId::from("c1"));
        assert_eq!(&state.deck[2..4], dups.as_slice());
        assert_eq!(state.deck[4], CardId::from("b"));
        for dup in &dups {
            assert!(matches!(
                state.card(dup),
                Some(Card::Duplicate(d)) if d.parent_id == CardId::from("c1")
            ));
        }
        // The stored card never keeps the count.
        assert_eq!(
            state.card(&"c1".into()).and_then(Card::as_original).unwrap().duplication,
            None
        );
    }

    #[test]
    fn duplication_of_card_in_hand_goes_to_deck_top() {
        let mut state = with_deck(&["a", "c1"]);
        apply_in_place(
            &mut state,
            &StateUpdate::move_card("c1", Destination::hand(HandId::default_hand(), 0)),
        )
        .unwrap();
        apply_in_place(
            &mut state,
            &StateUpdate::update_card(OriginalCard::new("c1", "c1").with_duplication(2)),
        )
        .unwrap();

        assert_eq!(state.deck.len(), 2);
        assert_eq!(state.deck[1], CardId::from("a"));
        assert_eq!(validate(&state), Ok(()));
    }

    #[test]
    fn duplication_decrease_removes_in_location_order() {
        let mut state = with_deck(&["c1"]);
        apply_in_place(
            &mut state,
            &StateUpdate::update_card(OriginalCard::new("c1", "c1").with_duplication(4)),
        )
        .unwrap();
        let before = state.duplicates_of(&"c1".into());

        apply_in_place(
            &mut state,
            &StateUpdate::update_card(OriginalCard::new("c1", "c1").with_duplication(2)),
        )
        .unwrap();

        assert_eq!(state.duplicates_of(&"c1".into()), vec![before[2].clone()]);
        assert_eq!(state.deck.len(), 2);
    }

    #[test]
    fn duplication_zero_is_clamped_to_one() {
        let mut state = with_deck(&["c1"]);
        apply_in_place(
            &mut state,
            &StateUpdate::update_card(OriginalCard::new("c1", "c1").with_duplication(3)),
        )
        .unwrap();
        apply_in_place(
            &mut state,
            &StateUpdate::update_card(OriginalCard::new("c1", "c1").with_duplication(0)),
        )
        .unwrap();
        assert_eq!(state.deck, ids(&["c1"]));
        assert_eq!(state.duplication_of(&"c1".into()), 1);
    }

    #[test]
    fn duplication_above_limit_is_refused() {
        let mut state = with_deck(&["a", "c1"]);
        let before = state.clone();

        let too_many = MAX_DUPLICATION + 1;
        let card = OriginalCard::new("c1", "renamed").with_duplication(too_many);
        let result = apply_in_place(&mut state, &StateUpdate::update_card(card));
        assert_eq!(
            result,
            Err(ReduceError::DuplicationTooLarge {
                id: "c1".into(),
                requested: too_many,
                limit: MAX_DUPLICATION,
            })
        );
        assert_eq!(state, before);

        let card = OriginalCard::new("c2", "new").with_duplication(u32::MAX);
        let result = apply_in_place(&mut state, &StateUpdate::add_card(card));
        assert!(matches!(
            result,
            Err(ReduceError::DuplicationTooLarge { requested: u32::MAX, .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn duplication_at_limit_is_one_contiguous_run() {
        let state = with_deck(&["a", "c1", "b"]);
        let card = OriginalCard::new("c1", "c1").with_duplication(MAX_DUPLICATION);
        let state = apply(state, &StateUpdate::update_card(card)).unwrap();
        let limit = MAX_DUPLICATION as usize;

        let dups = state.duplicates_of(&"c1".into());
        assert_eq!(dups.len(), limit - 1);
        assert_eq!(state.deck.len(), limit + 2);
        assert_eq!(state.deck[1], CardId::from("c1"));
        assert_eq!(&state.deck[2..limit + 1], dups.as_slice());
        assert_eq!(state.deck[limit + 1], CardId::from("b"));
        assert_eq!(validate(&state), Ok(()));

        let card = OriginalCard::new("c1", "c1").with_duplication(1);
        let state = apply(state, &StateUpdate::update_card(card)).unwrap();
        assert_eq!(state.deck, ids(&["a", "c1", "b"]));
        assert_eq!(state.cards.len(), 3);
    }

    #[test]
    fn same_count_is_pure_field_update() {
        let state = with_deck(&["c1", "b"]);
        let update = StateUpdate::update_card(
            OriginalCard::new("c1", "new name")
                .with_description("text")
                .with_duplication(1),
        );
        let state = apply(state, &update).unwrap();
        assert_eq!(state.deck, ids(&["c1", "b"]));
        let card = state.card(&"c1".into()).and_then(Card::as_original).unwrap();
        assert_eq!(card.name, "new name");
        assert_eq!(card.description, "text");
    }

    #[test]
    fn update_missing_card_is_noop() {
        let state = with_deck(&["a"]);
        let after = apply(
            state.clone(),
            &StateUpdate::update_card(OriginalCard::new("gone", "X")),
        )
        .unwrap();
        assert_eq!(after, state);
    }

    #[test]
    fn update_cannot_turn_original_into_duplicate() {
        let mut state = with_deck(&["a", "b"]);
        let update = StateUpdate::new(Operation::UpdateCard {
            card: DuplicateCard::new("a", "b").into(),
        });
        assert_eq!(
            apply_in_place(&mut state, &update),
            Err(ReduceError::VariantMismatch("a".into()))
        );
    }

    #[test]
    fn move_between_deck_and_hand() {
        let state = with_deck(&["a", "b"]);
        let state = apply(
            state,
            &StateUpdate::move_card("a", Destination::hand(HandId::default_hand(), 0)),
        )
        .unwrap();
        assert_eq!(state.deck, ids(&["b"]));
        assert_eq!(default_hand(&state), &ids(&["a"]));
    }

    #[test]
    fn move_clamps_stale_position() {
        let state = with_deck(&["a", "b", "c"]);
        let update = StateUpdate::move_card("a", Destination::Deck { position: 99 });
        let state = apply(state, &update).unwrap();
        assert_eq!(state.deck, ids(&["b", "c", "a"]));
    }

    #[test]
    fn move_within_deck() {
        let state = with_deck(&["a", "b", "c"]);
        let state = apply(state, &StateUpdate::move_card("c", Destination::deck_top())).unwrap();
        assert_eq!(state.deck, ids(&["c", "a", "b"]));
    }

    #[test]
    fn move_missing_card_is_noop() {
        let state = with_deck(&["a"]);
        let update = StateUpdate::move_card("zzz", Destination::deck_top());
        let after = apply(state.clone(), &update).unwrap();
        assert_eq!(after, state);
    }

    #[test]
    fn move_to_unknown_hand_fails_without_changes() {
        let mut state = with_deck(&["a"]);
        let before = state.clone();
        let result = apply_in_place(
            &mut state,
            &StateUpdate::move_card("a", Destination::hand("nope", 0)),
        );
        assert_eq!(result, Err(ReduceError::UnknownHand("nope".into())));
        assert_eq!(state, before);
    }

    #[test]
    fn reorder_deck_is_stable_for_unknown_ids() {
        let state = with_deck(&["a", "b", "c", "d"]);
        let state = apply(state, &StateUpdate::reorder_deck(ids(&["c", "zzz", "a"]))).unwrap();
        assert_eq!(state.deck, ids(&["c", "a", "b", "d"]));
    }

    #[test]
    fn reorder_hand_is_not_implemented() {
        let state = with_deck(&["a"]);
        let update = StateUpdate::new(Operation::Reorder {
            target: ReorderTarget::Hand {
                hand_id: HandId::default_hand(),
                order: vec![],
            },
        });
        assert_eq!(
            apply(state, &update),
            Err(ReduceError::NotImplemented("hand reorder"))
        );
    }

    #[test]
    fn upsert_hand_creates_then_renames_keeping_contents() {
        let mut state = with_deck(&["a"]);
        let updates = [
            StateUpdate::upsert_hand(HandInfo::new("h1", "Alice")),
            StateUpdate::move_card("a", Destination::hand("h1", 0)),
            StateUpdate::upsert_hand(HandInfo::new("h1", "Bob")),
        ];
        for update in &updates {
            apply_in_place(&mut state, update).unwrap();
        }

        let hand = state.hand(&"h1".into()).unwrap();
        assert_eq!(hand.name, "Bob");
        assert_eq!(hand.contents, ids(&["a"]));
    }

    #[test]
    fn delete_hand_drains_to_deck_top() {
        let mut state = with_deck(&["a", "b", "c"]);
        let updates = [
            StateUpdate::upsert_hand(HandInfo::new("h1", "H")),
            StateUpdate::move_card("b", Destination::hand("h1", 0)),
            StateUpdate::move_card("c", Destination::hand("h1", 1)),
        ];
        for update in &updates {
            apply_in_place(&mut state, update).unwrap();
        }

        apply_in_place(&mut state, &StateUpdate::delete_hand("h1")).unwrap();

        assert!(state.hand(&"h1".into()).is_none());
        assert_eq!(state.deck, ids(&["b", "c", "a"]));
        assert_eq!(validate(&state), Ok(()));
    }

    #[test]
    fn rename_set() {
        let state = apply(empty(), &StateUpdate::rename_set("Monsters")).unwrap();
        assert_eq!(state.name, "Monsters");
    }

    #[test]
    fn replay_applies_in_order() {
        let updates = vec![
            StateUpdate::add_card(OriginalCard::new("a", "A")),
            StateUpdate::add_card(OriginalCard::new("b", "B")),
            StateUpdate::move_card("a", Destination::deck_top()),
        ];
        let state = replay(&empty(), &updates).unwrap();
        assert_eq!(state.deck, ids(&["a", "b"]));
    }

    // ===========================================
    // Properties
    // ===========================================

    const CARD_IDS: [&str; 5] = ["c0", "c1", "c2", "c3", "c4"];
    const HAND_IDS: [&str; 3] = ["default", "h1", "h2"];

    fn card_id() -> impl Strategy<Value = CardId> {
        prop::sample::select(&CARD_IDS[..]).prop_map(CardId::from)
    }

    fn hand_id() -> impl Strategy<Value = HandId> {
        prop::sample::select(&HAND_IDS[..]).prop_map(HandId::from)
    }

    fn destination() -> impl Strategy<Value = Destination> {
        prop_oneof![
            (0usize..8).prop_map(|position| Destination::Deck { position }),
            (hand_id(), 0usize..8)
                .prop_map(|(hand_id, position)| Destination::Hand { hand_id, position }),
        ]
    }

    fn update() -> impl Strategy<Value = StateUpdate> {
        prop_oneof![
            (card_id(), prop::option::of(0u32..5)).prop_map(|(id, dup)| {
                let mut card = OriginalCard::new(id, "added");
                card.duplication = dup;
                StateUpdate::add_card(card)
            }),
            card_id().prop_map(StateUpdate::delete_card),
            (card_id(), prop::option::of(0u32..5)).prop_map(|(id, dup)| {
                let mut card = OriginalCard::new(id, "edited");
                card.duplication = dup;
                StateUpdate::update_card(card)
            }),
            (card_id(), destination()).prop_map(|(id, dest)| StateUpdate::move_card(id, dest)),
            prop::collection::vec(card_id(), 0..5).prop_map(StateUpdate::reorder_deck),
            hand_id().prop_map(|id| StateUpdate::upsert_hand(HandInfo { id, name: "H".into() })),
            hand_id().prop_map(StateUpdate::delete_hand),
        ]
    }

    proptest! {
        #[test]
        fn invariant_holds_for_any_sequence(updates in prop::collection::vec(update(), 0..40)) {
            let mut state = empty();
            for update in &updates {
                let before = state.clone();
                if apply_in_place(&mut state, update).is_err() {
                    prop_assert_eq!(&state, &before);
                }
                prop_assert_eq!(validate(&state), Ok(()));
            }
        }

        #[test]
        fn applying_twice_equals_applying_once(
            setup in prop::collection::vec(update(), 0..20),
            last in update(),
        ) {
            let mut state = empty();
            for update in &setup {
                let _ = apply_in_place(&mut state, update);
            }
            let mut once = state.clone();
            let _ = apply_in_place(&mut once, &last);
            let mut twice = once.clone();
            let _ = apply_in_place(&mut twice, &last);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn duplication_count_matches_request(
            setup in prop::collection::vec(update(), 0..20),
            counts in prop::collection::vec(1u32..6, 1..5),
        ) {
            let mut state = empty();
            for update in &setup {
                let _ = apply_in_place(&mut state, update);
            }
            let add = StateUpdate::add_card(OriginalCard::new("target", "T"));
            apply_in_place(&mut state, &add).unwrap();
            for count in counts {
                let card = OriginalCard::new("target", "T").with_duplication(count);
                apply_in_place(&mut state, &StateUpdate::update_card(card)).unwrap();
                prop_assert_eq!(state.duplicates_of(&"target".into()).len(), count as usize - 1);
            }
        }
    }
}

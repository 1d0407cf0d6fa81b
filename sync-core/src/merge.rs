//! Three-way merge of a remote and a local snapshot over their common ancestor.
//!
//! Both sides are diffed against the ancestor, the two diffs are combined
//! into one replay plan, and the plan is applied to a copy of the ancestor
//! through the reducer. The result is validated before it is returned; the
//! merged snapshot becomes the next branchpoint.
//!
//! # Conflict policy
//!
//! - Deletes win: a card or hand deleted on either side stays deleted, and
//!   edits or moves of it from the other side are dropped.
//! - Local wins: when both sides update the same card, move the same card,
//!   upsert the same hand or rename the set, the local value is kept.
//! - Adds are unioned. A Duplicate added on one side whose Original was
//!   deleted on either side is dropped along with it.
//!
//! Replay order: card deletes, card adds, hand upserts, card updates, moves
//! (remote-only moves, then local moves), hand deletes, rename.

use cardset_sync_types::{
    Card, CardId, CardMove, CardSetState, Destination, HandId, HandInfo, Operation, OriginalCard,
    StateUpdate,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::diff::{diff, StateDiff};
use crate::invariant::{validate, InvariantError};
use crate::reducer::{replay, ReduceError};

/// The merge produced something it should never produce.
///
/// Both variants point at a defect in the conflict policy, not at bad input.
/// The session halts rather than continue from such a state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// The reducer refused a step of the replay plan.
    #[error("merge replay failed: {0}")]
    Replay(#[from] ReduceError),

    /// The merged snapshot breaks the single-location invariant.
    #[error("merged state is invalid: {0}")]
    Invariant(#[from] InvariantError),
}

/// Merge `remote` and `local`, both descended from `ancestor`.
///
/// Deterministic: the same three inputs always produce the same snapshot.
pub fn merge(
    ancestor: &CardSetState,
    remote: &CardSetState,
    local: &CardSetState,
) -> Result<CardSetState, MergeError> {
    let plan = plan(ancestor, diff(ancestor, remote), diff(ancestor, local));
    let merged = replay(ancestor, &plan)?;
    validate(&merged)?;
    Ok(merged)
}

fn plan(ancestor: &CardSetState, remote: StateDiff, local: StateDiff) -> Vec<StateUpdate> {
    let deleted: BTreeSet<CardId> = remote
        .deletes
        .iter()
        .chain(local.deletes.iter())
        .cloned()
        .collect();
    let deleted_hands: BTreeSet<HandId> = remote
        .deleted_hands
        .iter()
        .chain(local.deleted_hands.iter())
        .cloned()
        .collect();

    // Later inserts win, so local goes second.
    let mut adds: BTreeMap<CardId, Card> = BTreeMap::new();
    for card in remote.adds.into_iter().chain(local.adds) {
        adds.insert(card.id().clone(), card);
    }
    let parent_live = |parent: &CardId, adds: &BTreeMap<CardId, Card>| match adds.get(parent) {
        Some(card) => card.is_original(),
        None => {
            !deleted.contains(parent)
                && matches!(ancestor.cards.get(parent), Some(Card::Original(_)))
        }
    };
    let orphans: Vec<CardId> = adds
        .values()
        .filter_map(|card| match card {
            Card::Duplicate(dup) if !parent_live(&dup.parent_id, &adds) => Some(dup.id.clone()),
            _ => None,
        })
        .collect();
    for id in &orphans {
        adds.remove(id);
    }

    // Deleted and not recreated.
    let gone: BTreeSet<&CardId> = deleted.iter().filter(|id| !adds.contains_key(*id)).collect();

    let mut hands: BTreeMap<HandId, HandInfo> = BTreeMap::new();
    for info in remote.upserted_hands.into_iter().chain(local.upserted_hands) {
        hands.insert(info.id.clone(), info);
    }

    let mut updates: BTreeMap<CardId, OriginalCard> = BTreeMap::new();
    for card in remote.updates.into_iter().chain(local.updates) {
        updates.insert(card.id.clone(), card);
    }

    let movable = |mv: &CardMove| {
        !gone.contains(&mv.card_id)
            && match &mv.destination {
                Destination::Deck { .. } => true,
                Destination::Hand { hand_id, .. } => !deleted_hands.contains(hand_id),
            }
    };
    let locally_moved: BTreeSet<&CardId> = local.moves.iter().map(|mv| &mv.card_id).collect();
    let mut moves: Vec<CardMove> = remote
        .moves
        .iter()
        .filter(|mv| !locally_moved.contains(&mv.card_id) && movable(*mv))
        .cloned()
        .collect();
    moves.extend(local.moves.iter().filter(|mv| movable(*mv)).cloned());

    let mut plan = Vec::new();
    plan.extend(deleted.iter().cloned().map(StateUpdate::delete_card));
    let (originals, duplicates): (Vec<Card>, Vec<Card>) =
        adds.into_values().partition(Card::is_original);
    plan.extend(originals.into_iter().map(StateUpdate::add_card));
    plan.extend(duplicates.into_iter().map(StateUpdate::add_card));
    plan.extend(
        hands
            .into_iter()
            .filter(|(id, _)| !deleted_hands.contains(id))
            .map(|(_, info)| StateUpdate::upsert_hand(info)),
    );
    plan.extend(
        updates
            .into_iter()
            .filter(|(id, _)| !gone.contains(id))
            .map(|(_, card)| StateUpdate::update_card(card)),
    );
    plan.extend(
        moves
            .into_iter()
            .map(|mv| StateUpdate::new(Operation::MoveCard(mv))),
    );
    plan.extend(deleted_hands.into_iter().map(StateUpdate::delete_hand));
    if let Some(name) = local.renamed.or(remote.renamed) {
        plan.push(StateUpdate::rename_set(&name));
    }
    plan
}

//! Applied-update ledger for the store side.
//!
//! Clients resubmit unacknowledged updates on every round until one
//! succeeds, so a store can see the same update id many times. The ledger
//! remembers the most recent ids it applied and skips repeats, which makes
//! resubmission safe even for interleavings where a replayed update would
//! not be a no-op on its own (a move replayed after a later move, say).
//!
//! The ledger is bounded: once `capacity` ids are recorded, the oldest is
//! forgotten. It is persisted alongside the document it guards.

use cardset_sync_types::{CardSetState, StateUpdate, UpdateId};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::reducer::{apply_in_place, ReduceError};

/// Default number of remembered update ids.
pub const DEFAULT_LEDGER_CAPACITY: usize = 4096;

/// Bounded FIFO set of applied update ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "LedgerRecord", into = "LedgerRecord")]
pub struct AppliedLedger {
    capacity: usize,
    order: VecDeque<UpdateId>,
    seen: HashSet<UpdateId>,
}

/// Serialized form: capacity plus ids oldest first.
#[derive(Serialize, Deserialize)]
struct LedgerRecord {
    capacity: usize,
    ids: Vec<UpdateId>,
}

impl From<LedgerRecord> for AppliedLedger {
    fn from(record: LedgerRecord) -> Self {
        let mut ledger = AppliedLedger::new(record.capacity);
        for id in record.ids {
            ledger.record(id);
        }
        ledger
    }
}

impl From<AppliedLedger> for LedgerRecord {
    fn from(ledger: AppliedLedger) -> Self {
        LedgerRecord {
            capacity: ledger.capacity,
            ids: ledger.order.into_iter().collect(),
        }
    }
}

impl PartialEq for AppliedLedger {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity && self.order == other.order
    }
}

impl Eq for AppliedLedger {}

impl Default for AppliedLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

/// What happened to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Updates applied to the state.
    pub applied: usize,
    /// Updates skipped because their id was already applied.
    pub skipped: usize,
    /// Updates refused by the reducer. The state is unchanged by each of them.
    pub rejected: Vec<(UpdateId, ReduceError)>,
}

impl AppliedLedger {
    /// Create an empty ledger remembering at most `capacity` ids.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Check if an update id has been applied.
    pub fn contains(&self, id: &UpdateId) -> bool {
        self.seen.contains(id)
    }

    /// Record an id, evicting the oldest one when full.
    pub fn record(&mut self, id: UpdateId) {
        if !self.seen.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    /// Number of remembered ids.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of remembered ids.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply a batch in order, skipping ids already applied.
    ///
    /// A refused update is reported in the outcome and still recorded, so a
    /// client resubmitting it does not get the same refusal forever. The rest
    /// of the batch is applied regardless.
    pub fn apply_batch(
        &mut self,
        state: &mut CardSetState,
        updates: &[StateUpdate],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for update in updates {
            if self.contains(&update.id) {
                outcome.skipped += 1;
                continue;
            }
            match apply_in_place(state, update) {
                Ok(()) => outcome.applied += 1,
                Err(err) => outcome.rejected.push((update.id, err)),
            }
            self.record(update.id);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardset_sync_types::{CollectionId, Destination, OriginalCard};

    fn state() -> CardSetState {
        CardSetState::new(CollectionId::from("set"))
    }

    #[test]
    fn record_and_contains() {
        let mut ledger = AppliedLedger::new(4);
        let id = UpdateId::new();

        assert!(!ledger.contains(&id));
        ledger.record(id);
        assert!(ledger.contains(&id));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn record_twice_is_noop() {
        let mut ledger = AppliedLedger::new(4);
        let id = UpdateId::new();
        ledger.record(id);
        ledger.record(id);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn oldest_is_evicted() {
        let mut ledger = AppliedLedger::new(2);
        let ids: Vec<UpdateId> = (0..3).map(|_| UpdateId::new()).collect();
        for id in &ids {
            ledger.record(*id);
        }

        assert_eq!(ledger.len(), 2);
        assert!(!ledger.contains(&ids[0]));
        assert!(ledger.contains(&ids[1]));
        assert!(ledger.contains(&ids[2]));
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(AppliedLedger::new(0).capacity(), 1);
    }

    #[test]
    fn resubmitted_batch_is_skipped() {
        let mut ledger = AppliedLedger::default();
        let mut state = state();
        let batch = vec![
            StateUpdate::add_card(OriginalCard::new("a", "A")),
            StateUpdate::add_card(OriginalCard::new("b", "B")),
            StateUpdate::move_card("a", Destination::deck_top()),
        ];

        let first = ledger.apply_batch(&mut state, &batch);
        assert_eq!(first.applied, 3);
        let after_first = state.clone();

        // A later edit, then the stale batch again.
        ledger.apply_batch(
            &mut state,
            &[StateUpdate::move_card("a", Destination::Deck { position: 1 })],
        );
        let moved = state.clone();
        let second = ledger.apply_batch(&mut state, &batch);

        assert_eq!(second.skipped, 3);
        assert_eq!(second.applied, 0);
        assert_eq!(state, moved);
        assert_ne!(state, after_first);
    }

    #[test]
    fn rejected_update_is_reported_and_recorded() {
        let mut ledger = AppliedLedger::default();
        let mut state = state();
        let bad = StateUpdate::move_card("a", Destination::hand("missing", 0));
        let batch = vec![
            StateUpdate::add_card(OriginalCard::new("a", "A")),
            bad.clone(),
            StateUpdate::rename_set("after"),
        ];

        let outcome = ledger.apply_batch(&mut state, &batch);

        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].0, bad.id);
        assert!(ledger.contains(&bad.id));
        assert_eq!(state.name, "after");
        assert_eq!(state.deck, vec![cardset_sync_types::CardId::from("a")]);
    }

    #[test]
    fn ledger_survives_serialization() {
        let mut ledger = AppliedLedger::new(3);
        let id = UpdateId::new();
        ledger.record(id);

        let json = serde_json::to_string(&ledger).unwrap();
        let restored: AppliedLedger = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, ledger);
        assert!(restored.contains(&id));
        assert_eq!(restored.capacity(), 3);
    }
}

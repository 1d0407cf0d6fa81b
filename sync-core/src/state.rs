//! Sync round state machine.
//!
//! This module provides a pure, side-effect-free state machine for driving
//! sync rounds of one session. It takes events as input and produces a new
//! phase plus a list of actions to execute.
//!
//! The actual I/O (timers, submitting to the store) is performed by
//! sync-client, not by this module. Debouncing falls out of the transitions:
//! every local edit while `Dirty` restarts the debounce, so a burst of edits
//! becomes a single round.

/// Sync phase of a session - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing queued, waiting for an edit or the next poll.
    Idle,
    /// Edits queued, waiting for the debounce to elapse.
    Dirty,
    /// A round is running.
    InFlight {
        /// Edits arrived while the round was running.
        dirty: bool,
        /// Consecutive failed rounds before this one.
        attempt: u32,
    },
    /// The last round failed; the next poll tick retries with the same queue.
    Retrying {
        /// Number of consecutive failed rounds.
        attempt: u32,
    },
    /// An invariant broke. Terminal: every event is ignored.
    Halted {
        /// What went wrong.
        reason: String,
    },
}

impl SyncPhase {
    /// Create a new state machine in the Idle phase.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Halted is terminal
            (state @ Self::Halted { .. }, _) => (state, vec![]),

            (_, Event::InvariantViolated { reason }) => (
                Self::Halted {
                    reason: reason.clone(),
                },
                vec![
                    Action::CancelDebounce,
                    Action::Emit(SessionEvent::Halted { reason }),
                ],
            ),

            // From Idle
            (Self::Idle, Event::LocalEdit) => (Self::Dirty, vec![Action::StartDebounce]),
            (Self::Idle, Event::PollTick) => (
                Self::InFlight {
                    dirty: false,
                    attempt: 0,
                },
                vec![Action::RunRound],
            ),

            // From Dirty
            (Self::Dirty, Event::LocalEdit) => (Self::Dirty, vec![Action::StartDebounce]),
            (Self::Dirty, Event::DebounceElapsed) => (
                Self::InFlight {
                    dirty: false,
                    attempt: 0,
                },
                vec![Action::RunRound],
            ),
            (Self::Dirty, Event::PollTick) => (
                Self::InFlight {
                    dirty: false,
                    attempt: 0,
                },
                vec![Action::CancelDebounce, Action::RunRound],
            ),

            // From InFlight
            (Self::InFlight { attempt, .. }, Event::LocalEdit) => {
                (Self::InFlight { dirty: true, attempt }, vec![])
            }
            (Self::InFlight { dirty, .. }, Event::RoundSucceeded) => {
                if dirty {
                    (
                        Self::Dirty,
                        vec![Action::Emit(SessionEvent::Synced), Action::StartDebounce],
                    )
                } else {
                    (Self::Idle, vec![Action::Emit(SessionEvent::Synced)])
                }
            }
            (Self::InFlight { attempt, .. }, Event::RoundFailed { error }) => {
                let attempt = attempt.saturating_add(1);
                (
                    Self::Retrying { attempt },
                    vec![Action::Emit(SessionEvent::RoundFailed { attempt, error })],
                )
            }

            // From Retrying
            (Self::Retrying { attempt }, Event::PollTick) => (
                Self::InFlight {
                    dirty: false,
                    attempt,
                },
                vec![Action::RunRound],
            ),

            // Everything else (ticks during a round, stray debounces,
            // edits while retrying) leaves the phase unchanged
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a round is running.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight { .. })
    }

    /// Check if the session has halted.
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }
}

impl Default for SyncPhase {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive the sync phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An update was appended to the log.
    LocalEdit,
    /// The debounce timer fired.
    DebounceElapsed,
    /// The poll interval ticked.
    PollTick,
    /// The round finished and its result was merged.
    RoundSucceeded,
    /// The round failed in transport; the queue is intact.
    RoundFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// A merge or validation produced an invalid state.
    InvariantViolated {
        /// What went wrong.
        reason: String,
    },
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// (Re)start the debounce timer.
    StartDebounce,
    /// Cancel any pending debounce.
    CancelDebounce,
    /// Submit the queue and merge the result.
    RunRound,
    /// Emit an event to the application.
    Emit(SessionEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A round completed; the snapshot is up to date with the store.
    Synced,
    /// A round failed and will be retried on the next poll.
    RoundFailed {
        /// Consecutive failures so far.
        attempt: u32,
        /// Error message describing the failure.
        error: String,
    },
    /// The session stopped accepting edits.
    Halted {
        /// What went wrong.
        reason: String,
    },
}

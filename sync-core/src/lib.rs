//! # sync-core
//!
//! Pure logic for cardset-sync (no I/O, instant tests).
//!
//! This crate implements the reducer, the diff and merge engines and the
//! sync round state machine without any network or disk I/O, enabling fast
//! unit and property tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! Every path that mutates a card set goes through [`apply`]: live edits,
//! batches applied by the store, and merge replay. The actual I/O is
//! performed by `sync-client` and `sync-relay`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod invariant;
pub mod ledger;
pub mod log;
pub mod merge;
pub mod reducer;
pub mod state;

pub use diff::{diff, StateDiff};
pub use invariant::{validate, InvariantError};
pub use ledger::{AppliedLedger, BatchOutcome, DEFAULT_LEDGER_CAPACITY};
pub use log::{LogError, UpdateLog};
pub use merge::{merge, MergeError};
pub use reducer::{apply, apply_in_place, replay, ReduceError, MAX_DUPLICATION};
pub use state::{Action, Event, SessionEvent, SyncPhase};

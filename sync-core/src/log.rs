//! Client-side update log.
//!
//! The log holds every local update that the store has not yet acknowledged:
//! - FIFO ordering, never reordered or mutated after append
//! - In-flight tracking (updates submitted in the current round)
//! - A capacity bound so an offline client cannot grow without limit
//!
//! A sync round takes a bounded prefix of the log with
//! [`UpdateLog::begin_round`]. On success the acknowledged ids are pruned with
//! [`UpdateLog::ack`]; on failure [`UpdateLog::nack_all`] returns them to the
//! queue so the next round resubmits the same ids. Edits appended while a
//! round is in flight, and anything past the batch limit, stay queued behind
//! it.

use cardset_sync_types::{StateUpdate, UpdateId};
use std::collections::{HashSet, VecDeque};

/// Error type for log operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// Log is at capacity.
    Full {
        /// Configured capacity.
        capacity: usize,
    },
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::Full { capacity } => {
                write!(f, "update log full (capacity: {})", capacity)
            }
        }
    }
}

impl std::error::Error for LogError {}

#[derive(Debug, Clone)]
struct LogEntry {
    update: StateUpdate,
    in_flight: bool,
}

/// Append-only queue of unacknowledged updates.
#[derive(Debug, Clone)]
pub struct UpdateLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl UpdateLog {
    /// Create a log holding at most `capacity` updates (queued + in flight).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    /// Append an update to the end of the log.
    pub fn append(&mut self, update: StateUpdate) -> Result<(), LogError> {
        if self.entries.len() >= self.capacity {
            return Err(LogError::Full {
                capacity: self.capacity,
            });
        }
        self.entries.push_back(LogEntry {
            update,
            in_flight: false,
        });
        Ok(())
    }

    /// Mark the oldest `max_batch` updates in flight and return them.
    ///
    /// Later updates stay queued for the next round. Updates already in
    /// flight from an unfinished round are included again; resubmission is
    /// safe because the store skips ids it has applied. A limit of zero is
    /// raised to one.
    pub fn begin_round(&mut self, max_batch: usize) -> Vec<StateUpdate> {
        self.entries
            .iter_mut()
            .take(max_batch.max(1))
            .map(|entry| {
                entry.in_flight = true;
                entry.update.clone()
            })
            .collect()
    }

    /// Prune acknowledged updates.
    pub fn ack<'a>(&mut self, ids: impl IntoIterator<Item = &'a UpdateId>) {
        let acked: HashSet<&UpdateId> = ids.into_iter().collect();
        self.entries.retain(|entry| !acked.contains(&entry.update.id));
    }

    /// Return every in-flight update to the queue, keeping log order.
    pub fn nack_all(&mut self) {
        for entry in &mut self.entries {
            entry.in_flight = false;
        }
    }

    /// All updates in log order, in flight or not.
    pub fn updates(&self) -> impl Iterator<Item = &StateUpdate> {
        self.entries.iter().map(|entry| &entry.update)
    }

    /// Updates not part of the current round.
    pub fn queued(&self) -> impl Iterator<Item = &StateUpdate> {
        self.entries
            .iter()
            .filter(|entry| !entry.in_flight)
            .map(|entry| &entry.update)
    }

    /// Check if an update is in flight.
    pub fn is_in_flight(&self, id: &UpdateId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.in_flight && &entry.update.id == id)
    }

    /// Number of unacknowledged updates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if every update has been acknowledged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of in-flight updates.
    pub fn in_flight_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.in_flight).count()
    }

    /// Maximum number of updates.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Per-session timers.
//!
//! Each running session owns one [`Scheduler`]: a poll interval and at most
//! one pending debounce deadline. Restarting the debounce replaces the
//! deadline; cancelling clears it. Nothing is shared between sessions.

use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant, Interval, MissedTickBehavior};

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The poll interval elapsed.
    Poll,
    /// The debounce deadline passed.
    Debounce,
}

/// Poll interval plus a cancellable debounce deadline.
#[derive(Debug)]
pub struct Scheduler {
    poll: Interval,
    debounce: Duration,
    deadline: Option<Instant>,
}

impl Scheduler {
    /// Create a scheduler. The first poll fires immediately.
    pub fn new(poll_interval: Duration, debounce: Duration) -> Self {
        let mut poll = interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            poll,
            debounce,
            deadline: None,
        }
    }

    /// Arm the debounce, replacing any pending deadline.
    pub fn start_debounce(&mut self) {
        self.deadline = Some(Instant::now() + self.debounce);
    }

    /// Disarm the debounce.
    pub fn cancel_debounce(&mut self) {
        self.deadline = None;
    }

    /// Check if a debounce is pending.
    pub fn debounce_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the next timer to fire.
    ///
    /// Cancel safe: dropping the future leaves the debounce armed.
    pub async fn next(&mut self) -> Tick {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.poll.tick() => Tick::Poll,
                    _ = sleep_until(deadline) => {
                        self.deadline = None;
                        Tick::Debounce
                    }
                }
            }
            None => {
                self.poll.tick().await;
                Tick::Poll
            }
        }
    }
}

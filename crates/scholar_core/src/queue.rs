use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff_delay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    Pending,
    InFlight,
    Completed,
    Failed,
}

/// What the orchestrator should do after an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Back to `Pending`; wait `delay` before the next dispatch.
    Retry { delay: Duration },
    /// Attempts used up; the entry is `Failed`.
    Exhausted,
}

/// One URL of the crawl queue and its retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    url: String,
    attempt: u32,
    state: EntryState,
}

impl QueueEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempt: 0,
            state: EntryState::Pending,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of dispatches so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    /// `Pending -> InFlight`. Returns the 1-based attempt number, or `None`
    /// when the entry is not pending.
    pub fn dispatch(&mut self) -> Option<u32> {
        if self.state != EntryState::Pending {
            return None;
        }
        self.attempt += 1;
        self.state = EntryState::InFlight;
        Some(self.attempt)
    }

    /// `InFlight -> Completed`. Zero extracted contacts still counts as success.
    pub fn complete(&mut self) {
        if self.state == EntryState::InFlight {
            self.state = EntryState::Completed;
        }
    }

    /// `InFlight -> Pending` while attempts remain, `InFlight -> Failed` otherwise.
    pub fn record_failure(&mut self, max_retries: u32) -> AttemptOutcome {
        if self.attempt >= max_retries {
            self.state = EntryState::Failed;
            AttemptOutcome::Exhausted
        } else {
            self.state = EntryState::Pending;
            AttemptOutcome::Retry {
                delay: backoff_delay(self.attempt),
            }
        }
    }

    /// Gives up on a pending entry without another dispatch (job stopped mid-backoff).
    pub fn abandon(&mut self) {
        if self.state == EntryState::Pending && self.attempt > 0 {
            self.state = EntryState::Failed;
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, EntryState::Completed | EntryState::Failed)
    }
}

/// Splits operator input into URLs: one per line, trimmed, blanks dropped.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

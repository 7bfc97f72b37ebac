use serde::{Deserialize, Serialize};

/// Counters accumulated over one crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobStats {
    /// URLs whose fetch and extraction succeeded.
    pub processed: usize,
    /// URLs that exhausted their attempts.
    pub failed: usize,
    /// Contacts that passed format and exclusion checks.
    pub contacts_found: usize,
    /// Contacts handed to the sink.
    pub persisted: usize,
    pub duplicates: usize,
    /// Candidates dropped by the format check or the role-account filter.
    pub rejected: usize,
}

impl JobStats {
    /// URLs with a final outcome, success or failure.
    pub fn settled(&self) -> usize {
        self.processed + self.failed
    }
}

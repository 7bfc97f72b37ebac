use std::fmt;

use scholar_core::{ContactRecord, DedupKey, JobStats, JobStatus, QueueEntry};

pub type JobId = u64;

/// Events delivered to the presentation layer, in URL-submission order
/// except `Verified`, which arrives whenever a background domain check settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Emitted right before URL number `current` (1-based) is dispatched.
    Progress {
        current: usize,
        total: usize,
        url: String,
    },
    /// Contacts accepted from one page, duplicates flagged.
    Results {
        url: String,
        contacts: Vec<ContactRecord>,
    },
    /// A URL exhausted its attempts; reported once.
    Error {
        url: String,
        kind: FailureKind,
        message: String,
    },
    Verified {
        key: DedupKey,
        verified: bool,
    },
    /// The sink refused a record; its key stays free for a later sighting.
    PersistFailed {
        key: DedupKey,
        message: String,
    },
    Finished(JobSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub stats: JobStats,
    pub entries: Vec<QueueEntry>,
    /// Distinct emails among the contacts accepted by this job.
    pub unique_emails: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Per-URL failure taxonomy. Every kind is retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Network,
    Blocked,
    Extraction,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Blocked => write!(f, "blocked"),
            FailureKind::Extraction => write!(f, "extraction failure"),
        }
    }
}

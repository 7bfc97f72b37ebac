use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the single active crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

/// Operator or engine request that moves a job between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Pause,
    Resume,
    Stop,
    Complete,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {transition:?} while job is {from}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub transition: Transition,
}

impl JobStatus {
    /// A job is active while it owns the queue, paused or not.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Stopped | JobStatus::Completed)
    }

    /// Pure transition function over `Idle -> Running -> {Paused <-> Running} -> {Stopped, Completed}`.
    ///
    /// `Start` from a terminal status resets implicitly; `Reset` is only legal
    /// when no job is active.
    pub fn apply(self, transition: Transition) -> Result<JobStatus, TransitionError> {
        use JobStatus::*;
        let next = match (self, transition) {
            (Idle | Stopped | Completed, Transition::Start) => Running,
            (Running, Transition::Pause) => Paused,
            (Paused, Transition::Resume) => Running,
            (Running | Paused, Transition::Stop) => Stopped,
            (Running | Paused, Transition::Complete) => Completed,
            (Idle | Stopped | Completed, Transition::Reset) => Idle,
            (from, transition) => return Err(TransitionError { from, transition }),
        };
        Ok(next)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Stopped => "stopped",
            JobStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

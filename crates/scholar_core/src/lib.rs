//! Scholar core: pure crawl-job state machines and the contact data model.
mod options;
mod queue;
mod record;
mod stats;
mod status;

pub use options::{backoff_delay, JobOptions, OptionsError, MAX_BACKOFF_MS};
pub use queue::{parse_url_list, AttemptOutcome, EntryState, QueueEntry};
pub use record::{ContactRecord, DedupKey, RawContact};
pub use stats::JobStats;
pub use status::{JobStatus, Transition, TransitionError};

//! Scholar engine: fetch, extraction, validation and the crawl-job orchestrator.
mod config;
mod dedup;
mod export;
mod extract;
mod fetch;
mod gate;
mod links;
mod orchestrator;
mod persist;
mod sink;
mod types;
mod validate;

pub use config::{EngineConfig, FetchSettings};
pub use dedup::DedupStore;
pub use export::{
    export_filename, export_stats, render, render_csv, render_json, render_json_with_stats,
    render_txt, write_export, ExportError, ExportFormat, ExportStats,
};
pub use extract::{ContactExtractor, ExtractionError, Extractor};
pub use fetch::{PageFetcher, ReqwestFetcher};
pub use gate::{AccessGate, StaticGate};
pub use links::{discover_article_links, DEFAULT_MAX_LINKS};
pub use orchestrator::{
    ChannelEventSink, Clock, EventSink, JobHandle, JobOrchestrator, OrchestratorBuilder,
    StartError,
};
pub use persist::{ensure_output_dir, write_atomic, PersistError};
pub use sink::{ImportSummary, MemorySink, ResultFilter, ResultSink, SinkError};
pub use types::{FailureKind, FetchError, JobEvent, JobId, JobSummary};
pub use validate::{
    email_domain, DnsMxResolver, DomainCheckError, DomainValidator, EmailValidator, MxResolver,
    EXCLUDED_PATTERNS,
};

pub use scholar_core::{
    ContactRecord, DedupKey, EntryState, JobOptions, JobStats, JobStatus, QueueEntry, RawContact,
};

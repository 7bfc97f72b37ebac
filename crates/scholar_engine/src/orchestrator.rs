use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use scholar_core::{
    AttemptOutcome, ContactRecord, DedupKey, EntryState, JobOptions, JobStats, JobStatus, OptionsError,
    QueueEntry, RawContact, Transition, TransitionError,
};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::validate::{DnsMxResolver, DomainValidator, EmailValidator, MxResolver};
use crate::{
    AccessGate, ContactExtractor, DedupStore, EngineConfig, Extractor, FailureKind, FetchError,
    JobEvent, JobId, JobSummary, PageFetcher, ResultSink, StaticGate,
};

/// Receives job events, synchronously from the control loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<JobEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<JobEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

/// Timestamp source for `captured_at`.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("a job is already {0}")]
    JobAlreadyActive(JobStatus),
    #[error("operator is not authorized to run jobs")]
    Unauthorized,
    #[error("invalid job options: {0}")]
    InvalidOptions(#[from] OptionsError),
}

/// Handle to a started job.
pub struct JobHandle {
    job_id: JobId,
    join: JoinHandle<JobSummary>,
}

impl JobHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Resolves once the job is `Completed` or `Stopped` and its domain checks settled.
    pub async fn wait(self) -> Result<JobSummary, JoinError> {
        self.join.await
    }
}

pub struct OrchestratorBuilder {
    fetcher: Arc<dyn PageFetcher>,
    sink: Arc<dyn ResultSink>,
    extractor: Option<Arc<dyn Extractor>>,
    resolver: Option<Arc<dyn MxResolver>>,
    gate: Option<Arc<dyn AccessGate>>,
    dedup: Option<Arc<DedupStore>>,
    clock: Option<Clock>,
    config: EngineConfig,
}

impl OrchestratorBuilder {
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn MxResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn gate(mut self, gate: Arc<dyn AccessGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Shares an existing store, e.g. one seeded from saved results.
    pub fn dedup(mut self, dedup: Arc<DedupStore>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Without an explicit resolver this creates the DNS resolver, which needs a tokio runtime.
    pub fn build(self) -> JobOrchestrator {
        let dns_timeout = self.config.dns_timeout();
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(DnsMxResolver::new(dns_timeout)));
        let (status, _) = watch::channel(JobStatus::Idle);
        JobOrchestrator {
            inner: Arc::new(Inner {
                fetcher: self.fetcher,
                extractor: self
                    .extractor
                    .unwrap_or_else(|| Arc::new(ContactExtractor::new())),
                emails: EmailValidator,
                domains: DomainValidator::new(resolver, dns_timeout),
                dedup: self.dedup.unwrap_or_default(),
                sink: self.sink,
                gate: self.gate.unwrap_or_else(|| Arc::new(StaticGate::allow())),
                clock: self.clock.unwrap_or_else(|| Arc::new(Utc::now)),
                fetch_timeout: self.config.fetch.request_timeout(),
                status,
                cursor: AtomicUsize::new(0),
                cancel: Mutex::new(CancellationToken::new()),
                last_job_id: AtomicU64::new(0),
            }),
        }
    }
}

/// Runs one crawl job at a time: ordered dispatch, rate limiting, retries with
/// backoff, pause/resume/stop, and the extract → validate → dedup → persist
/// pipeline for every page.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    emails: EmailValidator,
    domains: DomainValidator,
    dedup: Arc<DedupStore>,
    sink: Arc<dyn ResultSink>,
    gate: Arc<dyn AccessGate>,
    clock: Clock,
    fetch_timeout: Duration,
    status: watch::Sender<JobStatus>,
    /// Index of the next URL to dispatch.
    cursor: AtomicUsize,
    /// Stop signal of the current job. Also serializes start against stop.
    cancel: Mutex<CancellationToken>,
    last_job_id: AtomicU64,
}

/// Everything a single job run owns.
struct JobRun {
    job_id: JobId,
    options: JobOptions,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
    stats: JobStats,
    accepted: HashSet<String>,
    validations: JoinSet<()>,
}

impl JobOrchestrator {
    pub fn builder(fetcher: Arc<dyn PageFetcher>, sink: Arc<dyn ResultSink>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            fetcher,
            sink,
            extractor: None,
            resolver: None,
            gate: None,
            dedup: None,
            clock: None,
            config: EngineConfig::default(),
        }
    }

    pub fn status(&self) -> JobStatus {
        *self.inner.status.borrow()
    }

    /// Status updates, for observers that prefer a watch over polling.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.inner.status.subscribe()
    }

    pub fn cursor(&self) -> usize {
        self.inner.cursor.load(Ordering::SeqCst)
    }

    pub fn dedup(&self) -> &Arc<DedupStore> {
        &self.inner.dedup
    }

    /// Starts processing `urls` in order on the current tokio runtime.
    ///
    /// A terminal previous job is reset implicitly; a running or paused one
    /// rejects the request.
    pub fn start(
        &self,
        urls: Vec<String>,
        options: JobOptions,
        events: Arc<dyn EventSink>,
    ) -> Result<JobHandle, StartError> {
        options.validate()?;
        if !self.inner.gate.authorize() {
            engine_warn!("start rejected: operator not authorized");
            return Err(StartError::Unauthorized);
        }

        let mut cancel_slot = self.inner.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rejected: Option<TransitionError> = None;
        self.inner
            .status
            .send_if_modified(|status| match status.apply(Transition::Start) {
                Ok(next) => {
                    *status = next;
                    true
                }
                Err(err) => {
                    rejected = Some(err);
                    false
                }
            });
        if let Some(err) = rejected {
            engine_warn!("start rejected: job already {}", err.from);
            return Err(StartError::JobAlreadyActive(err.from));
        }

        let cancel = CancellationToken::new();
        *cancel_slot = cancel.clone();
        drop(cancel_slot);

        self.inner.cursor.store(0, Ordering::SeqCst);
        let job_id = self.inner.last_job_id.fetch_add(1, Ordering::SeqCst) + 1;
        engine_logging::set_active_job(job_id);
        engine_info!(
            "starting job with {} urls (rate limit {} ms, max retries {})",
            urls.len(),
            options.rate_limit_ms,
            options.max_retries
        );

        let run = JobRun {
            job_id,
            options,
            events,
            cancel,
            stats: JobStats::default(),
            accepted: HashSet::new(),
            validations: JoinSet::new(),
        };
        let inner = self.inner.clone();
        let join = tokio::spawn(async move { inner.run(run, urls).await });
        Ok(JobHandle { job_id, join })
    }

    /// Operator-facing submission: one URL per entry, trimmed, blanks dropped.
    pub fn start_scraping<S: AsRef<str>>(
        &self,
        urls: &[S],
        options: JobOptions,
        events: Arc<dyn EventSink>,
    ) -> Result<JobHandle, StartError> {
        let urls = urls
            .iter()
            .map(|url| url.as_ref().trim())
            .filter(|url| !url.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        self.start(urls, options, events)
    }

    /// `Running -> Paused`. Returns whether the status changed.
    pub fn pause(&self) -> bool {
        let changed = self.transition(Transition::Pause);
        if changed {
            engine_info!("paused at url {}", self.cursor() + 1);
        }
        changed
    }

    /// `Paused -> Running`. Returns whether the status changed.
    pub fn resume(&self) -> bool {
        let changed = self.transition(Transition::Resume);
        if changed {
            engine_info!("resumed at url {}", self.cursor() + 1);
        }
        changed
    }

    /// Requests a stop; the job reaches `Stopped` at its next check point.
    /// Idempotent. Returns whether an active job received the request.
    pub fn stop(&self) -> bool {
        let cancel = self.inner.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.status().is_active() {
            return false;
        }
        if !cancel.is_cancelled() {
            engine_info!("stop requested");
            cancel.cancel();
        }
        true
    }

    /// Returns a terminal job to `Idle`.
    pub fn reset(&self) -> Result<(), TransitionError> {
        let mut result = Ok(());
        self.inner
            .status
            .send_if_modified(|status| match status.apply(Transition::Reset) {
                Ok(next) => {
                    let changed = *status != next;
                    *status = next;
                    changed
                }
                Err(err) => {
                    result = Err(err);
                    false
                }
            });
        if result.is_ok() {
            self.inner.cursor.store(0, Ordering::SeqCst);
        }
        result
    }

    /// Drops all stored results and dedup keys. Refused while a job is active.
    pub fn clear_results(&self) -> Result<(), StartError> {
        let status = self.status();
        if status.is_active() {
            return Err(StartError::JobAlreadyActive(status));
        }
        self.inner.dedup.clear();
        if let Err(err) = self.inner.sink.clear() {
            engine_error!("failed to clear result sink: {}", err);
        }
        Ok(())
    }

    fn transition(&self, transition: Transition) -> bool {
        self.inner
            .status
            .send_if_modified(|status| match status.apply(transition) {
                Ok(next) => {
                    *status = next;
                    true
                }
                Err(_) => false,
            })
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut run: JobRun, urls: Vec<String>) -> JobSummary {
        let total = urls.len();
        let mut entries: Vec<QueueEntry> = urls.into_iter().map(QueueEntry::new).collect();
        // A stop that only cuts the domain checks short still completes.
        let mut halted = false;

        for index in 0..total {
            if !self.wait_until_dispatchable(&run.cancel).await {
                halted = true;
                break;
            }
            self.cursor.store(index, Ordering::SeqCst);
            let url = entries[index].url().to_string();
            run.events.emit(JobEvent::Progress {
                current: index + 1,
                total,
                url: url.clone(),
            });

            match self.process_entry(&mut entries[index], &run).await {
                Ok(raw) => {
                    run.stats.processed += 1;
                    let contacts = self.admit(raw, &url, &mut run);
                    run.events.emit(JobEvent::Results { url, contacts });
                }
                Err(err) => {
                    run.stats.failed += 1;
                    halted |= abandoned(&entries[index], run.options.max_retries);
                    run.events.emit(JobEvent::Error {
                        url,
                        kind: err.kind,
                        message: err.message,
                    });
                }
            }
            self.cursor.store(index + 1, Ordering::SeqCst);

            let rate_limit = run.options.rate_limit();
            if index + 1 < total
                && !rate_limit.is_zero()
                && !sleep_unless_cancelled(rate_limit, &run.cancel).await
            {
                halted = true;
                break;
            }
        }

        while let Some(joined) = run.validations.join_next().await {
            if let Err(err) = joined {
                engine_error!("domain check task failed: {}", err);
            }
        }

        let finish = if halted {
            Transition::Stop
        } else {
            Transition::Complete
        };
        let mut status = JobStatus::Idle;
        self.status.send_modify(|current| {
            if let Ok(next) = current.apply(finish) {
                *current = next;
            }
            status = *current;
        });

        let summary = JobSummary {
            job_id: run.job_id,
            status,
            stats: run.stats,
            entries,
            unique_emails: DedupStore::count_unique(run.accepted.iter().map(String::as_str)),
        };
        engine_info!(
            "job {}: {} processed, {} failed, {} persisted, {} duplicates, {} rejected",
            status,
            summary.stats.processed,
            summary.stats.failed,
            summary.stats.persisted,
            summary.stats.duplicates,
            summary.stats.rejected
        );
        run.events.emit(JobEvent::Finished(summary.clone()));
        summary
    }

    /// Blocks while paused. `false` means the job was stopped.
    async fn wait_until_dispatchable(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let mut status_rx = self.status.subscribe();
        let unpaused = async {
            status_rx
                .wait_for(|status| *status != JobStatus::Paused)
                .await
                .is_ok()
        };
        let resumed = tokio::select! {
            _ = cancel.cancelled() => false,
            resumed = unpaused => resumed,
        };
        resumed && !cancel.is_cancelled()
    }

    /// Fetch + extract with retries. Each attempt starts from scratch.
    async fn process_entry(
        &self,
        entry: &mut QueueEntry,
        run: &JobRun,
    ) -> Result<Vec<RawContact>, FetchError> {
        let max_retries = run.options.max_retries;
        loop {
            let attempt = entry.dispatch().unwrap_or(entry.attempt());
            let err = match self.attempt(entry.url()).await {
                Ok(raw) => {
                    entry.complete();
                    return Ok(raw);
                }
                Err(err) => err,
            };
            match entry.record_failure(max_retries) {
                AttemptOutcome::Retry { delay } => {
                    engine_warn!(
                        "attempt {}/{} for {} failed ({}); retrying in {} ms",
                        attempt,
                        max_retries,
                        entry.url(),
                        err,
                        delay.as_millis()
                    );
                    if !sleep_unless_cancelled(delay, &run.cancel).await {
                        entry.abandon();
                        return Err(err);
                    }
                }
                AttemptOutcome::Exhausted => {
                    engine_warn!(
                        "giving up on {} after {} attempts: {}",
                        entry.url(),
                        attempt,
                        err
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<Vec<RawContact>, FetchError> {
        let html = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url, self.fetch_timeout))
            .await
            .map_err(|_| FetchError::new(FailureKind::Timeout, "fetch exceeded its deadline"))??;
        Ok(self.extractor.extract(&html, url)?)
    }

    /// Validates, dedups and persists the page's candidates; returns what the page yielded.
    fn admit(&self, raw: Vec<RawContact>, url: &str, run: &mut JobRun) -> Vec<ContactRecord> {
        let mut contacts = Vec::with_capacity(raw.len());
        for candidate in raw {
            if !self.emails.accepts(&candidate.email) {
                engine_debug!("rejected {} from {}", candidate.email, url);
                run.stats.rejected += 1;
                continue;
            }
            run.stats.contacts_found += 1;
            run.accepted.insert(candidate.email.clone());

            let mut record = ContactRecord::from_raw(candidate, url, (self.clock)());
            if self.dedup.try_insert(&record.email, &record.source_url) {
                if let Err(err) = self.sink.persist(record.clone()) {
                    engine_error!("failed to persist {}: {}", record.email, err);
                    self.dedup.remove(&record.email, &record.source_url);
                    run.events.emit(JobEvent::PersistFailed {
                        key: record.key(),
                        message: err.to_string(),
                    });
                    continue;
                }
                run.stats.persisted += 1;
                self.spawn_domain_check(record.key(), run);
            } else {
                record.duplicate = true;
                run.stats.duplicates += 1;
            }
            contacts.push(record);
        }
        contacts
    }

    fn spawn_domain_check(&self, key: DedupKey, run: &mut JobRun) {
        let domains = self.domains.clone();
        let sink = self.sink.clone();
        let events = run.events.clone();
        let cancel = run.cancel.clone();
        run.validations.spawn(async move {
            let verified = tokio::select! {
                _ = cancel.cancelled() => return,
                verified = domains.validate_domain(&key.email) => verified,
            };
            if verified {
                if let Err(err) = sink.update_verified(&key, true) {
                    engine_error!("failed to mark {} verified: {}", key.email, err);
                }
            }
            events.emit(JobEvent::Verified { key, verified });
        });
    }
}

/// A stop during backoff fails the entry before its attempts run out.
fn abandoned(entry: &QueueEntry, max_retries: u32) -> bool {
    entry.state() == EntryState::Failed && entry.attempt() < max_retries
}

/// `false` if the job was stopped before `delay` elapsed.
async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

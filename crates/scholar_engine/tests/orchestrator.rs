use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use scholar_engine::{
    ChannelEventSink, ContactRecord, DedupKey, DomainCheckError, EngineConfig, EntryState,
    EventSink, ExportError, ExportFormat, FailureKind, FetchError, FetchSettings, JobEvent,
    JobOptions, JobOrchestrator, JobStatus, MemorySink, MxResolver, PageFetcher, ResultSink,
    SinkError, StartError,
};
use tokio::time::Instant;

#[derive(Clone)]
enum Reply {
    Page(String),
    Fail(FailureKind),
    Slow(Duration, String),
}

/// Replies per URL in call order; the last reply repeats.
#[derive(Default)]
struct ScriptedFetcher {
    script: HashMap<String, Vec<Reply>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self::default()
    }

    fn on(mut self, url: &str, replies: Vec<Reply>) -> Self {
        self.script.insert(url.to_string(), replies);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    fn call_times(&self, url: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| called == url)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait::async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        let previous = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls.iter().filter(|(called, _)| called == url).count();
            calls.push((url.to_string(), Instant::now()));
            previous
        };
        let replies = self
            .script
            .get(url)
            .ok_or_else(|| FetchError::new(FailureKind::Network, "unscripted url"))?;
        match replies[previous.min(replies.len() - 1)].clone() {
            Reply::Page(html) => Ok(html),
            Reply::Fail(kind) => Err(FetchError::new(kind, "scripted failure")),
            Reply::Slow(delay, html) => {
                tokio::time::sleep(delay).await;
                Ok(html)
            }
        }
    }
}

/// Domains listed here publish one MX record; everything else is NXDOMAIN.
struct StaticResolver {
    with_mx: Vec<&'static str>,
}

#[async_trait::async_trait]
impl MxResolver for StaticResolver {
    async fn mx_records(&self, domain: &str) -> Result<Vec<String>, DomainCheckError> {
        if self.with_mx.iter().any(|known| *known == domain) {
            Ok(vec![format!("mx.{domain}")])
        } else {
            Err(DomainCheckError::Resolve("NXDOMAIN".to_string()))
        }
    }
}

/// Answers every lookup, but only after `delay`.
struct SlowResolver {
    delay: Duration,
}

#[async_trait::async_trait]
impl MxResolver for SlowResolver {
    async fn mx_records(&self, domain: &str) -> Result<Vec<String>, DomainCheckError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![format!("mx.{domain}")])
    }
}

/// Refuses the first `failures` records, then stores like a `MemorySink`.
struct FlakySink {
    inner: MemorySink,
    failures: Mutex<usize>,
}

impl FlakySink {
    fn failing(failures: usize) -> Self {
        Self {
            inner: MemorySink::new(),
            failures: Mutex::new(failures),
        }
    }
}

impl ResultSink for FlakySink {
    fn persist(&self, record: ContactRecord) -> Result<(), SinkError> {
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(SinkError::Poisoned);
        }
        self.inner.persist(record)
    }

    fn update_verified(&self, key: &DedupKey, verified: bool) -> Result<bool, SinkError> {
        self.inner.update_verified(key, verified)
    }

    fn export_all(&self, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        self.inner.export_all(format)
    }

    fn clear(&self) -> Result<(), SinkError> {
        self.inner.clear()
    }
}

#[derive(Default)]
struct RecordingEvents {
    events: Mutex<Vec<JobEvent>>,
}

impl RecordingEvents {
    fn all(&self) -> Vec<JobEvent> {
        self.events.lock().unwrap().clone()
    }

    fn progress(&self) -> Vec<(usize, usize, String)> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::Progress {
                    current,
                    total,
                    url,
                } => Some((current, total, url)),
                _ => None,
            })
            .collect()
    }

    fn results(&self) -> Vec<(String, Vec<ContactRecord>)> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::Results { url, contacts } => Some((url, contacts)),
                _ => None,
            })
            .collect()
    }

    fn errors(&self) -> Vec<(String, FailureKind)> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::Error { url, kind, .. } => Some((url, kind)),
                _ => None,
            })
            .collect()
    }

    fn verified(&self) -> Vec<(DedupKey, bool)> {
        let mut verified: Vec<_> = self
            .all()
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::Verified { key, verified } => Some((key, verified)),
                _ => None,
            })
            .collect();
        verified.sort();
        verified
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: JobEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    fetcher: Arc<ScriptedFetcher>,
    sink: Arc<MemorySink>,
    events: Arc<RecordingEvents>,
    orchestrator: JobOrchestrator,
}

fn captured_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn harness(fetcher: ScriptedFetcher) -> Harness {
    harness_with_config(fetcher, EngineConfig::default())
}

fn harness_with_config(fetcher: ScriptedFetcher, config: EngineConfig) -> Harness {
    engine_logging::initialize_for_tests();
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(MemorySink::new());
    let orchestrator = JobOrchestrator::builder(fetcher.clone(), sink.clone())
        .resolver(Arc::new(StaticResolver {
            with_mx: vec!["uni.edu"],
        }))
        .clock(Arc::new(captured_at))
        .config(config)
        .build();
    Harness {
        fetcher,
        sink,
        events: Arc::new(RecordingEvents::default()),
        orchestrator,
    }
}

fn page(emails: &[&str]) -> String {
    let body: String = emails
        .iter()
        .map(|email| format!("<p>Contact: {email}</p>"))
        .collect();
    format!("<html><head><title>Paper</title></head><body>{body}</body></html>")
}

fn options(rate_limit_ms: u64, max_retries: u32) -> JobOptions {
    JobOptions {
        rate_limit_ms,
        max_retries,
    }
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|url| url.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn timeout_on_one_url_does_not_abort_the_job() {
    let fetcher = ScriptedFetcher::new()
        .on("a.test", vec![Reply::Page(page(&["x@uni.edu"]))])
        .on("b.test", vec![Reply::Fail(FailureKind::Timeout)]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test"]), options(0, 1), h.events.clone())
        .expect("start");
    let summary = handle.wait().await.expect("join");

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(h.orchestrator.status(), JobStatus::Completed);
    let emails: Vec<_> = h.sink.records().into_iter().map(|r| r.email).collect();
    assert_eq!(emails, vec!["x@uni.edu"]);
    assert_eq!(
        h.events.errors(),
        vec![("b.test".to_string(), FailureKind::Timeout)]
    );
    assert_eq!(summary.stats.processed, 1);
    assert_eq!(summary.stats.failed, 1);
    assert_eq!(summary.unique_emails, 1);
    assert_eq!(summary.entries[0].state(), EntryState::Completed);
    assert_eq!(summary.entries[1].state(), EntryState::Failed);
    assert!(matches!(h.events.all().last(), Some(JobEvent::Finished(_))));
}

#[tokio::test(start_paused = true)]
async fn progress_fires_once_per_url_in_order() {
    let fetcher = ScriptedFetcher::new()
        .on("a.test", vec![Reply::Page(page(&[]))])
        .on("b.test", vec![Reply::Fail(FailureKind::Blocked)])
        .on("c.test", vec![Reply::Page(page(&["c@uni.edu"]))]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test", "c.test"]), options(100, 2), h.events.clone())
        .expect("start");
    handle.wait().await.expect("join");

    assert_eq!(
        h.events.progress(),
        vec![
            (1, 3, "a.test".to_string()),
            (2, 3, "b.test".to_string()),
            (3, 3, "c.test".to_string()),
        ]
    );
    assert_eq!(h.orchestrator.cursor(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_url_yields_one_record_and_one_duplicate() {
    let html = page(&["x@uni.edu"]);
    let fetcher = ScriptedFetcher::new().on("a.test", vec![Reply::Page(html)]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "a.test"]), options(0, 1), h.events.clone())
        .expect("start");
    let summary = handle.wait().await.expect("join");

    let results = h.events.results();
    assert_eq!(results.len(), 2);
    assert!(!results[0].1[0].duplicate);
    assert!(results[1].1[0].duplicate);
    assert_eq!(h.sink.len(), 1);
    assert_eq!(summary.stats.persisted, 1);
    assert_eq!(summary.stats.duplicates, 1);
    assert_eq!(summary.unique_emails, 1);
}

#[tokio::test(start_paused = true)]
async fn same_email_on_two_pages_is_two_records() {
    let html = page(&["x@uni.edu"]);
    let fetcher = ScriptedFetcher::new()
        .on("a.test", vec![Reply::Page(html.clone())])
        .on("b.test", vec![Reply::Page(html)]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test"]), options(0, 1), h.events.clone())
        .expect("start");
    let summary = handle.wait().await.expect("join");

    assert_eq!(h.sink.len(), 2);
    assert_eq!(summary.stats.duplicates, 0);
    assert_eq!(summary.unique_emails, 1);
}

#[tokio::test(start_paused = true)]
async fn role_accounts_never_reach_the_sink() {
    let fetcher = ScriptedFetcher::new().on(
        "a.test",
        vec![Reply::Page(page(&["admin@uni.edu", "x@uni.edu"]))],
    );
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 1), h.events.clone())
        .expect("start");
    let summary = handle.wait().await.expect("join");

    let emails: Vec<_> = h.sink.records().into_iter().map(|r| r.email).collect();
    assert_eq!(emails, vec!["x@uni.edu"]);
    let reported: Vec<_> = h.events.results()[0]
        .1
        .iter()
        .map(|r| r.email.clone())
        .collect();
    assert_eq!(reported, vec!["x@uni.edu"]);
    assert_eq!(summary.stats.rejected, 1);
    assert!(h
        .events
        .verified()
        .iter()
        .all(|(key, _)| key.email != "admin@uni.edu"));
}

#[tokio::test(start_paused = true)]
async fn domain_check_updates_the_persisted_record() {
    let fetcher = ScriptedFetcher::new().on(
        "a.test",
        vec![Reply::Page(page(&["x@uni.edu", "y@nomx.test"]))],
    );
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 1), h.events.clone())
        .expect("start");
    handle.wait().await.expect("join");

    assert_eq!(
        h.events.verified(),
        vec![
            (DedupKey::new("x@uni.edu", "a.test"), true),
            (DedupKey::new("y@nomx.test", "a.test"), false),
        ]
    );
    let verified: Vec<_> = h
        .sink
        .records()
        .into_iter()
        .map(|r| (r.email, r.verified))
        .collect();
    assert_eq!(
        verified,
        vec![
            ("x@uni.edu".to_string(), true),
            ("y@nomx.test".to_string(), false),
        ]
    );
    // The record reported with the page is the pending state.
    assert!(h.events.results()[0].1.iter().all(|r| !r.verified));
    assert!(h
        .sink
        .records()
        .iter()
        .all(|r| r.captured_at == captured_at()));
}

#[tokio::test(start_paused = true)]
async fn retries_back_off_exponentially_and_report_once() {
    let fetcher = ScriptedFetcher::new().on("a.test", vec![Reply::Fail(FailureKind::Network)]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 4), h.events.clone())
        .expect("start");
    let summary = handle.wait().await.expect("join");

    let times = h.fetcher.call_times("a.test");
    assert_eq!(times.len(), 4);
    let gaps: Vec<_> = times.windows(2).map(|pair| pair[1] - pair[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(1_000),
            Duration::from_millis(2_000),
            Duration::from_millis(4_000),
        ]
    );
    assert_eq!(
        h.events.errors(),
        vec![("a.test".to_string(), FailureKind::Network)]
    );
    assert_eq!(summary.entries[0].attempt(), 4);
    assert_eq!(summary.entries[0].state(), EntryState::Failed);
}

#[tokio::test(start_paused = true)]
async fn retry_that_succeeds_reports_no_error() {
    let fetcher = ScriptedFetcher::new().on(
        "a.test",
        vec![
            Reply::Fail(FailureKind::Blocked),
            Reply::Page(String::new()),
            Reply::Page(page(&["x@uni.edu"])),
        ],
    );
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 3), h.events.clone())
        .expect("start");
    let summary = handle.wait().await.expect("join");

    assert!(h.events.errors().is_empty());
    assert_eq!(h.fetcher.calls().len(), 3);
    assert_eq!(h.sink.len(), 1);
    assert_eq!(summary.entries[0].attempt(), 3);
    assert_eq!(summary.entries[0].state(), EntryState::Completed);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_separates_dispatches() {
    let fetcher = ScriptedFetcher::new()
        .on("a.test", vec![Reply::Page(page(&[]))])
        .on("b.test", vec![Reply::Page(page(&[]))]);
    let h = harness(fetcher);

    let started = Instant::now();
    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test"]), options(3_000, 1), h.events.clone())
        .expect("start");
    handle.wait().await.expect("join");

    let gap = h.fetcher.call_times("b.test")[0] - h.fetcher.call_times("a.test")[0];
    assert_eq!(gap, Duration::from_millis(3_000));
    // No wait after the last URL.
    assert_eq!(Instant::now() - started, Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn fetch_is_bounded_by_the_configured_timeout() {
    let fetcher = ScriptedFetcher::new().on(
        "a.test",
        vec![Reply::Slow(Duration::from_secs(60), page(&["x@uni.edu"]))],
    );
    let config = EngineConfig {
        fetch: FetchSettings {
            request_timeout_ms: 1_000,
            ..FetchSettings::default()
        },
        ..EngineConfig::default()
    };
    let h = harness_with_config(fetcher, config);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 1), h.events.clone())
        .expect("start");
    handle.wait().await.expect("join");

    assert_eq!(
        h.events.errors(),
        vec![("a.test".to_string(), FailureKind::Timeout)]
    );
    assert!(h.sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_start_while_running_is_rejected() {
    let fetcher = ScriptedFetcher::new().on(
        "a.test",
        vec![Reply::Slow(Duration::from_secs(5), page(&[]))],
    );
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 1), h.events.clone())
        .expect("start");
    let err = h
        .orchestrator
        .start(urls(&["b.test"]), options(0, 1), h.events.clone())
        .err();
    assert_eq!(err, Some(StartError::JobAlreadyActive(JobStatus::Running)));

    let first = handle.wait().await.expect("join");
    assert_eq!(first.status, JobStatus::Completed);

    let again = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 1), h.events.clone())
        .expect("restart after completion");
    assert_eq!(again.job_id(), first.job_id + 1);
    again.wait().await.expect("join");
}

#[tokio::test(start_paused = true)]
async fn unauthorized_operator_cannot_start() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = JobOrchestrator::builder(Arc::new(ScriptedFetcher::new()), sink)
        .resolver(Arc::new(StaticResolver { with_mx: vec![] }))
        .gate(Arc::new(|| false))
        .build();

    let err = orchestrator
        .start(urls(&["a.test"]), JobOptions::default(), Arc::new(RecordingEvents::default()))
        .err();
    assert_eq!(err, Some(StartError::Unauthorized));
    assert_eq!(orchestrator.status(), JobStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_is_invalid() {
    let h = harness(ScriptedFetcher::new());
    let err = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 0), h.events.clone())
        .err();
    assert!(matches!(err, Some(StartError::InvalidOptions(_))));
    assert_eq!(h.orchestrator.status(), JobStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn stop_halts_dispatch_but_reports_the_inflight_url() {
    let fetcher = ScriptedFetcher::new()
        .on(
            "a.test",
            vec![Reply::Slow(Duration::from_secs(2), page(&["x@uni.edu"]))],
        )
        .on("b.test", vec![Reply::Page(page(&["y@uni.edu"]))])
        .on("c.test", vec![Reply::Page(page(&["z@uni.edu"]))]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test", "c.test"]), options(1_000, 1), h.events.clone())
        .expect("start");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(h.orchestrator.stop());
    assert!(h.orchestrator.stop());

    let summary = handle.wait().await.expect("join");
    assert_eq!(summary.status, JobStatus::Stopped);
    assert_eq!(h.fetcher.calls(), vec!["a.test"]);
    assert_eq!(h.events.results().len(), 1);
    assert_eq!(h.events.progress().len(), 1);
    assert_eq!(summary.entries[1].state(), EntryState::Pending);
    assert!(!h.orchestrator.stop());
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_reports_the_last_failure_once() {
    let fetcher = ScriptedFetcher::new()
        .on("a.test", vec![Reply::Fail(FailureKind::Timeout)])
        .on("b.test", vec![Reply::Page(page(&[]))]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test"]), options(0, 3), h.events.clone())
        .expect("start");
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.orchestrator.stop();

    let summary = handle.wait().await.expect("join");
    assert_eq!(summary.status, JobStatus::Stopped);
    assert_eq!(h.fetcher.calls(), vec!["a.test"]);
    assert_eq!(
        h.events.errors(),
        vec![("a.test".to_string(), FailureKind::Timeout)]
    );
    assert_eq!(summary.entries[0].state(), EntryState::Failed);
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_of_the_last_url_is_stopped() {
    let fetcher = ScriptedFetcher::new().on("a.test", vec![Reply::Fail(FailureKind::Network)]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 3), h.events.clone())
        .expect("start");
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.orchestrator.stop();

    let summary = handle.wait().await.expect("join");
    assert_eq!(summary.status, JobStatus::Stopped);
    assert_eq!(summary.entries[0].attempt(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_after_the_last_url_still_completes() {
    engine_logging::initialize_for_tests();
    let fetcher = Arc::new(
        ScriptedFetcher::new().on("a.test", vec![Reply::Page(page(&["x@uni.edu"]))]),
    );
    let sink = Arc::new(MemorySink::new());
    let events = Arc::new(RecordingEvents::default());
    let orchestrator = JobOrchestrator::builder(fetcher, sink.clone())
        .resolver(Arc::new(SlowResolver {
            delay: Duration::from_secs(3),
        }))
        .clock(Arc::new(captured_at))
        .build();

    let handle = orchestrator
        .start(urls(&["a.test"]), options(0, 1), events.clone())
        .expect("start");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(orchestrator.stop());

    let summary = handle.wait().await.expect("join");
    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(orchestrator.status(), JobStatus::Completed);
    assert_eq!(summary.stats.processed, 1);
    assert_eq!(sink.len(), 1);
    assert!(events.verified().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_persist_leaves_the_key_free() {
    engine_logging::initialize_for_tests();
    let fetcher = Arc::new(
        ScriptedFetcher::new().on("a.test", vec![Reply::Page(page(&["x@uni.edu"]))]),
    );
    let sink = Arc::new(FlakySink::failing(1));
    let events = Arc::new(RecordingEvents::default());
    let orchestrator = JobOrchestrator::builder(fetcher, sink.clone())
        .resolver(Arc::new(StaticResolver {
            with_mx: vec!["uni.edu"],
        }))
        .clock(Arc::new(captured_at))
        .build();

    let handle = orchestrator
        .start(urls(&["a.test", "a.test"]), options(0, 1), events.clone())
        .expect("start");
    let summary = handle.wait().await.expect("join");

    let results = events.results();
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_empty());
    assert_eq!(results[1].1.len(), 1);
    assert!(!results[1].1[0].duplicate);
    let refused: Vec<_> = events
        .all()
        .into_iter()
        .filter_map(|event| match event {
            JobEvent::PersistFailed { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(refused, vec![DedupKey::new("x@uni.edu", "a.test")]);
    assert_eq!(sink.inner.len(), 1);
    assert_eq!(summary.stats.persisted, 1);
    assert_eq!(summary.stats.duplicates, 0);
    assert!(orchestrator.dedup().contains("x@uni.edu", "a.test"));
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_keep_the_cursor() {
    let fetcher = ScriptedFetcher::new()
        .on("a.test", vec![Reply::Page(page(&["a@uni.edu"]))])
        .on("b.test", vec![Reply::Page(page(&["b@uni.edu"]))])
        .on("c.test", vec![Reply::Page(page(&["c@uni.edu"]))]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test", "c.test"]), options(1_000, 1), h.events.clone())
        .expect("start");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(h.orchestrator.pause());
    assert!(!h.orchestrator.pause());
    assert_eq!(h.orchestrator.status(), JobStatus::Paused);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.fetcher.calls(), vec!["a.test"]);
    assert_eq!(h.orchestrator.cursor(), 1);

    assert!(h.orchestrator.resume());
    assert!(!h.orchestrator.resume());
    let summary = handle.wait().await.expect("join");

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(h.fetcher.calls(), vec!["a.test", "b.test", "c.test"]);
    assert_eq!(
        h.events
            .progress()
            .into_iter()
            .map(|(current, _, _)| current)
            .collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test(start_paused = true)]
async fn stop_while_paused_ends_the_job() {
    let fetcher = ScriptedFetcher::new()
        .on("a.test", vec![Reply::Page(page(&[]))])
        .on("b.test", vec![Reply::Page(page(&[]))]);
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test", "b.test"]), options(1_000, 1), h.events.clone())
        .expect("start");
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.orchestrator.pause();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.orchestrator.stop());

    let summary = handle.wait().await.expect("join");
    assert_eq!(summary.status, JobStatus::Stopped);
    assert_eq!(h.fetcher.calls(), vec!["a.test"]);
}

#[tokio::test(start_paused = true)]
async fn reset_and_clear_require_an_inactive_job() {
    let fetcher = ScriptedFetcher::new().on(
        "a.test",
        vec![Reply::Slow(Duration::from_secs(1), page(&["x@uni.edu"]))],
    );
    let h = harness(fetcher);

    let handle = h
        .orchestrator
        .start(urls(&["a.test"]), options(0, 1), h.events.clone())
        .expect("start");
    assert!(h.orchestrator.reset().is_err());
    assert!(h.orchestrator.clear_results().is_err());
    handle.wait().await.expect("join");

    assert_eq!(h.sink.len(), 1);
    assert_eq!(h.orchestrator.dedup().len(), 1);
    h.orchestrator.clear_results().expect("clear");
    assert!(h.sink.is_empty());
    assert!(h.orchestrator.dedup().is_empty());

    h.orchestrator.reset().expect("reset");
    assert_eq!(h.orchestrator.status(), JobStatus::Idle);
    assert_eq!(h.orchestrator.cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_scraping_drops_blank_lines_and_feeds_a_channel() {
    let fetcher = ScriptedFetcher::new().on("a.test", vec![Reply::Page(page(&["x@uni.edu"]))]);
    let h = harness(fetcher);
    let (tx, rx) = mpsc::channel();

    let handle = h
        .orchestrator
        .start_scraping(
            &["  a.test ", "", "   "],
            options(0, 1),
            Arc::new(ChannelEventSink::new(tx)),
        )
        .expect("start");
    handle.wait().await.expect("join");

    let events: Vec<JobEvent> = rx.try_iter().collect();
    assert!(matches!(
        &events[0],
        JobEvent::Progress { current: 1, total: 1, url } if url == "a.test"
    ));
    match events.last() {
        Some(JobEvent::Finished(summary)) => {
            assert_eq!(summary.status, JobStatus::Completed);
            assert_eq!(summary.stats.persisted, 1);
        }
        other => panic!("expected Finished, got {other:?}"),
    }
}

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use engine_logging::{engine_error, engine_info, engine_warn};
use scholar_core::parse_url_list;
use scholar_engine::{
    discover_article_links, ensure_output_dir, export_filename, render_json_with_stats,
    write_atomic, write_export, ChannelEventSink, DedupStore, EngineConfig, ExportFormat,
    JobEvent, JobOrchestrator, JobSummary, MemorySink, PageFetcher, ReqwestFetcher,
};

/// Where the URL list of a run comes from.
#[derive(Debug, Clone)]
pub enum UrlSource {
    File(PathBuf),
    Search(String),
}

/// Runs one crawl job to completion, then saves the snapshot and the export.
pub async fn run_job(config: EngineConfig, source: UrlSource, format: ExportFormat) -> Result<()> {
    let output_dir = config.output_dir.clone();
    ensure_output_dir(&output_dir)?;

    let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.clone())?);
    let urls = collect_urls(&source, fetcher.as_ref(), &config).await?;
    if urls.is_empty() {
        bail!("no URLs to process");
    }

    let sink = Arc::new(MemorySink::load_from(&output_dir)?);
    let dedup = Arc::new(DedupStore::new());
    let restored = dedup.seed(sink.keys());
    if restored > 0 {
        engine_info!("restored {} known contacts from previous runs", restored);
    }

    let orchestrator = JobOrchestrator::builder(fetcher, sink.clone())
        .dedup(dedup)
        .config(config.clone())
        .build();

    let (tx, rx) = mpsc::channel();
    println!("Processing {} URLs. Commands: p = pause, r = resume, s = stop.", urls.len());
    let handle = orchestrator.start(urls, config.job, Arc::new(ChannelEventSink::new(tx)))?;

    let printer = thread::spawn(move || print_events(rx));
    spawn_stdin_controls(orchestrator.clone());
    let ctrl_c = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine_warn!("interrupted, stopping after the current URL");
                orchestrator.stop();
            }
        })
    };

    let summary = handle.wait().await?;
    ctrl_c.abort();
    if printer.join().is_err() {
        engine_error!("event printer panicked");
    }

    let snapshot = sink.save_to(&output_dir)?;
    let export = write_export(&output_dir, &sink.records(), format, Local::now().date_naive())?;
    print_summary(&summary);
    println!("Results snapshot: {}", snapshot.display());
    println!("Export: {}", export.display());
    Ok(())
}

async fn collect_urls(
    source: &UrlSource,
    fetcher: &dyn PageFetcher,
    config: &EngineConfig,
) -> Result<Vec<String>> {
    match source {
        UrlSource::File(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading URL list {}", path.display()))?;
            Ok(parse_url_list(&raw))
        }
        UrlSource::Search(url) => {
            let html = fetcher
                .fetch(url, config.fetch.request_timeout())
                .await
                .with_context(|| format!("fetching search page {url}"))?;
            let links = discover_article_links(&html, url, config.max_search_links);
            engine_info!("found {} article links on {}", links.len(), url);
            Ok(links)
        }
    }
}

/// Stdin is read on a plain thread so a pending read never holds up shutdown.
fn spawn_stdin_controls(orchestrator: JobOrchestrator) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match line.trim() {
                "p" => {
                    if !orchestrator.pause() {
                        println!("Nothing to pause ({}).", orchestrator.status());
                    }
                }
                "r" => {
                    if !orchestrator.resume() {
                        println!("Nothing to resume ({}).", orchestrator.status());
                    }
                }
                "s" => {
                    orchestrator.stop();
                }
                "" => {}
                other => println!("Unknown command {other:?}; use p, r or s."),
            }
            if orchestrator.status().is_terminal() {
                break;
            }
        }
    });
}

fn print_events(rx: mpsc::Receiver<JobEvent>) {
    for event in rx {
        match event {
            JobEvent::Progress {
                current,
                total,
                url,
            } => println!("[{current}/{total}] {url}"),
            JobEvent::Results { contacts, .. } => {
                for contact in contacts {
                    let marker = if contact.duplicate { " (duplicate)" } else { "" };
                    println!(
                        "    {} | {} | {}{}",
                        contact.email,
                        contact.name.as_deref().unwrap_or("-"),
                        contact.journal.as_deref().unwrap_or("-"),
                        marker
                    );
                }
            }
            JobEvent::Error { url, kind, message } => {
                println!("    failed: {url}: {kind} ({message})")
            }
            JobEvent::Verified { key, verified } => {
                if verified {
                    println!("    verified mail domain for {}", key.email);
                }
            }
            JobEvent::PersistFailed { key, message } => {
                println!("    could not store {}: {message}", key.email)
            }
            JobEvent::Finished(_) => break,
        }
    }
}

fn print_summary(summary: &JobSummary) {
    let stats = &summary.stats;
    println!();
    println!("Job {} {}.", summary.job_id, summary.status);
    println!(
        "URLs: {} processed, {} failed, {} not reached",
        stats.processed,
        stats.failed,
        summary.entries.len().saturating_sub(stats.settled())
    );
    println!(
        "Contacts: {} new, {} duplicates, {} rejected, {} unique emails",
        stats.persisted, stats.duplicates, stats.rejected, summary.unique_emails
    );
}

/// Writes the saved results in `format` into `output_dir`.
pub fn export_saved(output_dir: &Path, format: ExportFormat, with_stats: bool) -> Result<PathBuf> {
    let sink = MemorySink::load_from(output_dir)?;
    if sink.is_empty() {
        engine_warn!("no saved results in {:?}", output_dir);
    }
    let today = Local::now().date_naive();
    let path = if with_stats && format == ExportFormat::Json {
        let document = render_json_with_stats(&sink.records(), Utc::now())?;
        write_atomic(output_dir, &export_filename(format, today), document.as_bytes())?
    } else {
        if with_stats {
            engine_warn!("--with-stats only applies to json exports");
        }
        write_export(output_dir, &sink.records(), format, today)?
    };
    engine_info!("exported {} records to {:?}", sink.len(), path);
    Ok(path)
}

/// Statistics report over the saved results.
pub fn saved_stats(output_dir: &Path) -> Result<String> {
    let sink = MemorySink::load_from(output_dir)?;
    Ok(sink.stats().to_text(Utc::now()))
}

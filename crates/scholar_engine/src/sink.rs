use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use engine_logging::{engine_info, engine_warn};
use scholar_core::{ContactRecord, DedupKey};

use crate::export::{export_stats, render, ExportError, ExportFormat, ExportStats};
use crate::persist::{write_atomic, PersistError};

const SNAPSHOT_FILENAME: &str = ".scholar_results.json";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("result store lock poisoned")]
    Poisoned,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Persistence and export capability. The orchestrator calls `persist` at most
/// once per `(email, source_url)` key.
pub trait ResultSink: Send + Sync {
    fn persist(&self, record: ContactRecord) -> Result<(), SinkError>;

    /// Keyed update of the `verified` flag once the domain check settles.
    /// Returns `false` when no record has that key.
    fn update_verified(&self, key: &DedupKey, verified: bool) -> Result<bool, SinkError>;

    fn export_all(&self, format: ExportFormat) -> Result<Vec<u8>, ExportError>;

    fn clear(&self) -> Result<(), SinkError>;
}

/// Criteria for [`MemorySink::filter`]; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub verified: Option<bool>,
    /// Case-insensitive substring of the journal name.
    pub journal: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Keep only the first record per email.
    pub exclude_duplicates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub added: usize,
    pub duplicates: usize,
}

/// In-memory result store with JSON snapshots on disk.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ContactRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ContactRecord>>, SinkError> {
        self.records.lock().map_err(|_| SinkError::Poisoned)
    }

    pub fn records(&self) -> Vec<ContactRecord> {
        self.lock().map(|records| records.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<DedupKey> {
        self.records().iter().map(ContactRecord::key).collect()
    }

    pub fn stats(&self) -> ExportStats {
        export_stats(&self.records())
    }

    /// Case-insensitive match on email, name, journal or topic.
    pub fn search(&self, query: &str) -> Vec<ContactRecord> {
        let needle = query.to_lowercase();
        let hit = |field: Option<&str>| field.is_some_and(|v| v.to_lowercase().contains(&needle));
        self.records()
            .into_iter()
            .filter(|r| {
                hit(Some(r.email.as_str()))
                    || hit(r.name.as_deref())
                    || hit(r.journal.as_deref())
                    || hit(r.topic.as_deref())
            })
            .collect()
    }

    pub fn filter(&self, filter: &ResultFilter) -> Vec<ContactRecord> {
        let journal = filter.journal.as_ref().map(|j| j.to_lowercase());
        let mut seen = HashSet::new();
        self.records()
            .into_iter()
            .filter(|r| filter.verified.is_none_or(|v| r.verified == v))
            .filter(|r| {
                journal.as_ref().is_none_or(|needle| {
                    r.journal
                        .as_ref()
                        .is_some_and(|j| j.to_lowercase().contains(needle.as_str()))
                })
            })
            .filter(|r| filter.from.is_none_or(|from| r.captured_at >= from))
            .filter(|r| filter.to.is_none_or(|to| r.captured_at <= to))
            .filter(|r| !filter.exclude_duplicates || seen.insert(r.email.clone()))
            .collect()
    }

    /// Adds records from a JSON array, skipping keys already present.
    pub fn import_json(&self, bytes: &[u8]) -> Result<ImportSummary, SinkError> {
        let incoming: Vec<ContactRecord> = serde_json::from_slice(bytes)?;
        let mut records = self.lock()?;
        let mut keys: HashSet<DedupKey> =
            records.iter().map(ContactRecord::key).collect();
        let imported = incoming.len();
        let mut added = 0;
        for mut record in incoming {
            if keys.insert(record.key()) {
                record.duplicate = false;
                records.push(record);
                added += 1;
            }
        }
        Ok(ImportSummary {
            imported,
            added,
            duplicates: imported - added,
        })
    }

    /// Writes all records to `{dir}/.scholar_results.json`.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, SinkError> {
        let json = serde_json::to_vec_pretty(&*self.lock()?)?;
        let path = write_atomic(dir, SNAPSHOT_FILENAME, &json)?;
        engine_info!("saved results snapshot to {:?}", path);
        Ok(path)
    }

    /// Loads a snapshot written by [`MemorySink::save_to`]; a missing file is an empty store.
    pub fn load_from(dir: &Path) -> Result<Self, SinkError> {
        let path = dir.join(SNAPSHOT_FILENAME);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(err.into()),
        };
        let records: Vec<ContactRecord> = serde_json::from_slice(&bytes)?;
        engine_info!("loaded {} results from {:?}", records.len(), path);
        Ok(Self {
            records: Mutex::new(records),
        })
    }
}

impl ResultSink for MemorySink {
    fn persist(&self, record: ContactRecord) -> Result<(), SinkError> {
        self.lock()?.push(record);
        Ok(())
    }

    fn update_verified(&self, key: &DedupKey, verified: bool) -> Result<bool, SinkError> {
        let mut records = self.lock()?;
        match records
            .iter_mut()
            .find(|r| r.email == key.email && r.source_url == key.source_url)
        {
            Some(record) => {
                record.verified = verified;
                Ok(true)
            }
            None => {
                engine_warn!("verification for unknown record {}", key.email);
                Ok(false)
            }
        }
    }

    fn export_all(&self, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        let records = self.lock().map_err(|_| ExportError::StoreUnavailable)?;
        render(&records, format)
    }

    fn clear(&self) -> Result<(), SinkError> {
        self.lock()?.clear();
        Ok(())
    }
}

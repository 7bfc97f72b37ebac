use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use scholar_core::ContactRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::persist::{write_atomic, PersistError};

/// Stable column order; downstream spreadsheets depend on it.
const CSV_HEADERS: [&str; 8] = [
    "name",
    "email",
    "journal",
    "topic",
    "verified",
    "duplicate",
    "source_url",
    "timestamp",
];

const EXPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Txt,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "txt" => Ok(ExportFormat::Txt),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("result store is unavailable")]
    StoreUnavailable,
}

/// Aggregate figures over a set of records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExportStats {
    pub total: usize,
    pub verified: usize,
    pub unverified: usize,
    pub unique: usize,
    pub duplicates: usize,
    /// Record count per journal; records without one count under "Unknown".
    pub journals: BTreeMap<String, usize>,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

pub fn export_stats(records: &[ContactRecord]) -> ExportStats {
    let mut journals = BTreeMap::new();
    for record in records {
        let journal = record.journal.as_deref().unwrap_or("Unknown").to_string();
        *journals.entry(journal).or_insert(0) += 1;
    }
    let verified = records.iter().filter(|r| r.verified).count();
    ExportStats {
        total: records.len(),
        verified,
        unverified: records.len() - verified,
        unique: records
            .iter()
            .map(|r| r.email.as_str())
            .collect::<HashSet<_>>()
            .len(),
        duplicates: records.iter().filter(|r| r.duplicate).count(),
        journals,
        earliest: records.iter().map(|r| r.captured_at).min(),
        latest: records.iter().map(|r| r.captured_at).max(),
    }
}

impl ExportStats {
    /// Plain-text report, journals ordered by descending count.
    pub fn to_text(&self, exported_at: DateTime<Utc>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Scholar Harvester - Export Statistics");
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(out);
        let _ = writeln!(out, "Export Date: {}", exported_at.to_rfc3339());
        let _ = writeln!(out, "Total Records: {}", self.total);
        let _ = writeln!(out, "Verified Emails: {}", self.verified);
        let _ = writeln!(out, "Unverified Emails: {}", self.unverified);
        let _ = writeln!(out, "Unique Emails: {}", self.unique);
        let _ = writeln!(out, "Duplicates: {}", self.duplicates);
        let _ = writeln!(out);
        if let (Some(earliest), Some(latest)) = (self.earliest, self.latest) {
            let _ = writeln!(
                out,
                "Date Range: {} - {}",
                earliest.date_naive(),
                latest.date_naive()
            );
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "Journals:");
        let _ = writeln!(out, "{}", "-".repeat(20));
        let mut journals: Vec<_> = self.journals.iter().collect();
        journals.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (journal, count) in journals {
            let _ = writeln!(out, "{journal}: {count}");
        }
        out
    }
}

pub fn render(records: &[ContactRecord], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    Ok(match format {
        ExportFormat::Csv => render_csv(records).into_bytes(),
        ExportFormat::Json => render_json(records)?.into_bytes(),
        ExportFormat::Txt => render_txt(records).into_bytes(),
    })
}

/// Header row plus one row per record, `\n` separated, no trailing newline.
pub fn render_csv(records: &[ContactRecord]) -> String {
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(CSV_HEADERS.join(","));
    for record in records {
        let fields = [
            csv_field(record.name.as_deref().unwrap_or_default()),
            csv_field(&record.email),
            csv_field(record.journal.as_deref().unwrap_or_default()),
            csv_field(record.topic.as_deref().unwrap_or_default()),
            record.verified.to_string(),
            record.duplicate.to_string(),
            csv_field(&record.source_url),
            timestamp(record.captured_at),
        ];
        rows.push(fields.join(","));
    }
    rows.join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn render_json(records: &[ContactRecord]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// JSON document with an export metadata header ahead of the records.
pub fn render_json_with_stats(
    records: &[ContactRecord],
    exported_at: DateTime<Utc>,
) -> Result<String, ExportError> {
    let document = json!({
        "metadata": {
            "export_date": timestamp(exported_at),
            "version": EXPORT_VERSION,
            "statistics": export_stats(records),
        },
        "data": records,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn render_txt(records: &[ContactRecord]) -> String {
    records
        .iter()
        .map(|record| {
            [
                format!("Name: {}", record.name.as_deref().unwrap_or("N/A")),
                format!("Email: {}", record.email),
                format!("Journal: {}", record.journal.as_deref().unwrap_or("N/A")),
                format!("Topic: {}", record.topic.as_deref().unwrap_or("N/A")),
                format!("Verified: {}", if record.verified { "Yes" } else { "No" }),
                format!("Source: {}", record.source_url),
                format!("Date: {}", timestamp(record.captured_at)),
                "---".to_string(),
            ]
            .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `scholar_export_{date}.{ext}`
pub fn export_filename(format: ExportFormat, date: NaiveDate) -> String {
    format!("scholar_export_{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// Renders `records` and writes them atomically into `dir`.
pub fn write_export(
    dir: &Path,
    records: &[ContactRecord],
    format: ExportFormat,
    date: NaiveDate,
) -> Result<PathBuf, ExportError> {
    let bytes = render(records, format)?;
    Ok(write_atomic(dir, &export_filename(format, date), &bytes)?)
}

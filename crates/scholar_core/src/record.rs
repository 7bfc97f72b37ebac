use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Candidate found on a page, before validation and dedup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawContact {
    pub email: String,
    pub name: Option<String>,
    pub journal: Option<String>,
    pub topic: Option<String>,
}

impl RawContact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

/// Identity of an emitted contact: the same email found on two pages is two records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub email: String,
    pub source_url: String,
}

impl DedupKey {
    pub fn new(email: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            source_url: source_url.into(),
        }
    }
}

/// A validated contact as handed to the result sink.
///
/// Only `verified` and `duplicate` change after emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub duplicate: bool,
    pub source_url: String,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
}

impl ContactRecord {
    pub fn from_raw(raw: RawContact, source_url: &str, captured_at: DateTime<Utc>) -> Self {
        Self {
            name: raw.name,
            email: raw.email,
            journal: raw.journal,
            topic: raw.topic,
            verified: false,
            duplicate: false,
            source_url: source_url.to_string(),
            captured_at,
        }
    }

    pub fn key(&self) -> DedupKey {
        DedupKey::new(&self.email, &self.source_url)
    }
}

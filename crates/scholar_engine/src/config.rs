use std::path::PathBuf;
use std::time::Duration;

use scholar_core::JobOptions;
use serde::{Deserialize, Serialize};

use crate::links::DEFAULT_MAX_LINKS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    /// Pool the fetcher picks a random user agent from for every request.
    pub user_agents: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
            ],
        }
    }
}

impl FetchSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Engine-wide settings; every field has a default so partial config files work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub dns_timeout_ms: u64,
    pub job: JobOptions,
    pub output_dir: PathBuf,
    pub max_search_links: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            dns_timeout_ms: 5_000,
            job: JobOptions::default(),
            output_dir: PathBuf::from("output"),
            max_search_links: DEFAULT_MAX_LINKS,
        }
    }
}

impl EngineConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use engine_logging::engine_info;
use scholar_engine::EngineConfig;

pub const DEFAULT_CONFIG_FILE: &str = "scholar.ron";

/// Loads `explicit`, or `./scholar.ron` when present, or the built-in defaults.
/// Fields missing from the file keep their defaults.
pub fn load(explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.is_file() {
                return Ok(EngineConfig::default());
            }
            fallback
        }
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: EngineConfig =
        ron::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))?;
    engine_info!("loaded configuration from {:?}", path);
    Ok(config)
}

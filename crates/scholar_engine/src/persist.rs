use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` if needed and checks that it is a directory.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PersistError::OutputDir(format!(
            "{} is not a directory",
            dir.display()
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))
        }
        Err(err) => Err(PersistError::OutputDir(err.to_string())),
    }
}

/// Writes `bytes` to `{dir}/{filename}` through a synced temp file in the same
/// directory, then renames it over the target. Readers see the old or the new
/// file, never a partial one.
pub fn write_atomic(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, PersistError> {
    ensure_output_dir(dir)?;

    let target = dir.join(filename);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
    Ok(target)
}

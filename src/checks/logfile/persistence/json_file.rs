// SPDX-License-Identifier: Apache-2.0

//! JSON file state store with atomic writes.
//!
//! Writes go to a temp file in the same directory which is then renamed over
//! the real file, so a crash never leaves a half-written state file behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use portable_atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::checks::logfile::error::{Error, Result};

use super::schema::StateMap;

#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted map. A missing, unreadable or corrupt file is a
    /// normal cold start and yields an empty map.
    pub fn load(&self) -> StateMap {
        match self.try_load() {
            Ok(Some(map)) => {
                debug!(path = ?self.path, files = map.len(), "Loaded logfile state");
                map
            }
            Ok(None) => {
                debug!(path = ?self.path, "No logfile state found, starting fresh");
                StateMap::new()
            }
            Err(e) => {
                warn!(
                    path = ?self.path,
                    error = %e,
                    "Failed to load logfile state, starting fresh"
                );
                StateMap::new()
            }
        }
    }

    fn try_load(&self) -> Result<Option<StateMap>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let map = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(map))
    }

    /// Persist the full map atomically.
    pub fn save(&self, state: &StateMap) -> Result<()> {
        atomic_write(&self.path, state)
    }
}

/// Write state to file atomically (write to temp, then rename)
fn atomic_write(path: &Path, state: &StateMap) -> Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("failed to create parent directory: {}", e))
            })?;
        }
    }

    // Unique per process and per call so concurrent writers never share a temp file
    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let result = write_then_rename(&temp_path, path, state);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_then_rename(temp_path: &Path, path: &Path, state: &StateMap) -> Result<()> {
    let file = File::create(temp_path)
        .map_err(|e| Error::Persistence(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, state)
        .map_err(|e| Error::Persistence(format!("failed to write state: {}", e)))?;

    writer
        .flush()
        .map_err(|e| Error::Persistence(format!("failed to flush state: {}", e)))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::Persistence(format!("failed to sync state: {}", e)))?;
    drop(writer);

    fs::rename(temp_path, path)
        .map_err(|e| Error::Persistence(format!("failed to rename state file: {}", e)))?;

    Ok(())
}

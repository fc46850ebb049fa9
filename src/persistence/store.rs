// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::schema::{ItemState, PersistedState, STATE_VERSION};
use crate::error::{Error, Result};

/// Item states kept in a JSON file.
///
/// Changes stay in memory until [`CursorStore::flush`] writes the whole
/// document through a temporary file that replaces the old one.
#[derive(Clone)]
pub struct CursorStore {
    path: PathBuf,
    state: Arc<RwLock<PersistedState>>,
}

impl CursorStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if path.exists() {
            let file = File::open(&path)
                .map_err(|e| Error::Persistence(format!("failed to open state file: {}", e)))?;
            let state: PersistedState = serde_json::from_reader(BufReader::new(file))
                .map_err(|e| Error::Persistence(format!("failed to parse state file: {}", e)))?;
            if state.version > STATE_VERSION {
                return Err(Error::Persistence(format!(
                    "state file version {} is newer than supported version {}",
                    state.version, STATE_VERSION
                )));
            }
            debug!(path = ?path, items = state.items.len(), "Loaded item state");
            state
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).map_err(|e| {
                        Error::Persistence(format!("failed to create state directory: {}", e))
                    })?;
                }
            }
            PersistedState::default()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Store that is never written to disk
    pub fn open_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(PersistedState::default())),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<ItemState>> {
        let state = self
            .state
            .read()
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(state.items.get(key).cloned())
    }

    pub fn set(&self, key: impl Into<String>, item: ItemState) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| Error::Persistence(e.to_string()))?;
        state.items.insert(key.into(), item);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<Option<ItemState>> {
        let mut state = self
            .state
            .write()
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(state.items.remove(key))
    }

    /// Write the current state to disk
    pub fn flush(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        let state = self
            .state
            .read()
            .map_err(|e| Error::Persistence(e.to_string()))?;
        atomic_write(&self.path, &state)
    }
}

fn atomic_write(path: &Path, state: &PersistedState) -> Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    // pid and counter keep concurrent writers off each other's temp files
    let unique_id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let file = File::create(&temp_path)
        .map_err(|e| Error::Persistence(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, state)
        .map_err(|e| Error::Persistence(format!("failed to write state: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Persistence(format!("failed to flush state: {}", e)))?;
    drop(writer);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Persistence(format!(
            "failed to replace state file: {}",
            e
        )));
    }

    Ok(())
}

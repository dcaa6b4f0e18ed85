use crate::error::StoreError;
use crate::storage::interface::{PredictionRecord, RecordStore};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Append-only JSON-lines file, one record per line.
///
/// Appends are serialized through a mutex; reads take no lock and skip a
/// trailing line that has no newline yet, so a concurrent reader at worst
/// misses the record being written.
#[derive(Debug)]
pub struct RecordStoreJsonl {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl RecordStoreJsonl {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for RecordStoreJsonl {
    fn append(&self, record: PredictionRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.append_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        debug!(owner = %record.owner_id, path = %self.path.display(), "record appended");
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let complete = match text.rfind('\n') {
            Some(end) => &text[..end],
            None => "",
        };

        complete
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
                    line: index + 1,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

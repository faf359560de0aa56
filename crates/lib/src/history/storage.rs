//! File-backed execution history.
//!
//! # Storage Layout
//!
//! ```text
//! {history_dir}/
//! └── <identity key>.json   # HistoryRecord for one identity
//! ```
//!
//! One file per identity keeps entries independent: a failed write for one
//! identity cannot damage another.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use super::ExecutionHistoryStore;
use super::types::{ExecutionState, HistoryError, HistoryRecord};
use crate::consts::HISTORY_FORMAT_VERSION;
use crate::platform::paths::history_dir;
use crate::work::Identity;

/// Persists execution state as one JSON file per identity.
///
/// Writes are atomic (write to temp, then rename).
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
  base_path: PathBuf,
}

impl FileHistoryStore {
  pub fn new(base_path: PathBuf) -> Self {
    Self { base_path }
  }

  /// History store at the configured location (`STINT_HISTORY`, else the data directory).
  pub fn default_store() -> Self {
    Self::new(history_dir())
  }

  pub fn base_path(&self) -> &PathBuf {
    &self.base_path
  }

  fn record_path(&self, identity: &Identity) -> PathBuf {
    self.base_path.join(format!("{}.json", identity.key()))
  }

  fn ensure_dir(&self) -> Result<(), HistoryError> {
    fs::create_dir_all(&self.base_path).map_err(HistoryError::CreateDir)
  }

  /// Load the full record, including its envelope.
  pub fn load_record(&self, identity: &Identity) -> Result<Option<HistoryRecord>, HistoryError> {
    let path = self.record_path(identity);

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(HistoryError::Read(e)),
    };

    let record: HistoryRecord = serde_json::from_str(&content).map_err(HistoryError::Parse)?;
    if record.version != HISTORY_FORMAT_VERSION {
      return Err(HistoryError::UnsupportedVersion(record.version));
    }

    Ok(Some(record))
  }
}

impl ExecutionHistoryStore for FileHistoryStore {
  fn load(&self, identity: &Identity) -> Result<Option<ExecutionState>, HistoryError> {
    Ok(self.load_record(identity)?.map(|record| record.state))
  }

  fn store(&self, identity: &Identity, state: &ExecutionState) -> Result<(), HistoryError> {
    self.ensure_dir()?;

    let path = self.record_path(identity);
    let temp_path = self.base_path.join(format!("{}.json.tmp", identity.key()));
    let record = HistoryRecord::new(HISTORY_FORMAT_VERSION, identity.clone(), state.clone());

    let content = serde_json::to_string_pretty(&record).map_err(HistoryError::Serialize)?;
    fs::write(&temp_path, &content).map_err(HistoryError::Write)?;
    fs::rename(&temp_path, &path).map_err(HistoryError::Write)?;

    debug!(identity = %identity, path = %path.display(), "stored execution state");
    Ok(())
  }

  fn remove(&self, identity: &Identity) -> Result<(), HistoryError> {
    match fs::remove_file(self.record_path(identity)) {
      Ok(()) => {
        debug!(identity = %identity, "removed execution state");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(HistoryError::Remove(e)),
    }
  }
}

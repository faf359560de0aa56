use std::collections::BTreeMap;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::{FileFingerprint, FileSystemSnapshot, ValueSnapshot};
use crate::work::Identity;

/// Which run produced a recorded state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMetadata {
  pub build_invocation_id: String,
  pub execution_time: Duration,
}

impl OriginMetadata {
  pub fn new(build_invocation_id: impl Into<String>, execution_time: Duration) -> Self {
    Self {
      build_invocation_id: build_invocation_id.into(),
      execution_time,
    }
  }
}

/// State recorded after a unit of work executed.
///
/// Superseded as a whole by the next execution, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
  pub input_properties: BTreeMap<String, ValueSnapshot>,
  pub input_file_properties: BTreeMap<String, FileFingerprint>,
  pub output_files_produced_by_work: BTreeMap<String, FileSystemSnapshot>,
  pub origin: OriginMetadata,
  /// False when the recorded execution failed; such a state is never up to date.
  pub successful: bool,
}

/// On-disk envelope of an [`ExecutionState`].
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryRecord {
  pub version: u32,
  pub identity: Identity,
  pub recorded_at: u64,
  pub state: ExecutionState,
}

impl HistoryRecord {
  pub fn new(version: u32, identity: Identity, state: ExecutionState) -> Self {
    Self {
      version,
      identity,
      recorded_at: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      state,
    }
  }
}

/// Errors that can occur when reading or writing execution history.
#[derive(Debug, Error)]
pub enum HistoryError {
  #[error("failed to create history directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read execution history: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write execution history: {0}")]
  Write(#[source] io::Error),

  #[error("failed to remove execution history: {0}")]
  Remove(#[source] io::Error),

  #[error("failed to parse execution history: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize execution history: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported execution history version: {0}")]
  UnsupportedVersion(u32),

  #[error("execution history lock poisoned")]
  Poisoned,
}

//! Execution history.
//!
//! A persisted mapping from a unit-of-work identity to the state recorded by
//! its last execution. Stores hold no policy: the pipeline decides when state
//! is written, read, or dropped.
//!
//! # Submodules
//!
//! - [`memory`] - Process-local store
//! - [`storage`] - One JSON file per identity

pub mod memory;
pub mod storage;
mod types;

pub use memory::InMemoryHistoryStore;
pub use storage::FileHistoryStore;
pub use types::*;

use crate::work::Identity;

/// Storage contract for execution history.
pub trait ExecutionHistoryStore: Send + Sync {
  fn load(&self, identity: &Identity) -> Result<Option<ExecutionState>, HistoryError>;

  fn store(&self, identity: &Identity, state: &ExecutionState) -> Result<(), HistoryError>;

  fn remove(&self, identity: &Identity) -> Result<(), HistoryError>;
}

#[cfg(test)]
pub(crate) fn test_state(invocation: &str) -> ExecutionState {
  use crate::fingerprint::{FileFingerprint, FileSystemSnapshot, ValueSnapshot};
  use crate::util::hash::hash_bytes;
  use std::collections::BTreeMap;
  use std::time::Duration;

  let mut input_properties = BTreeMap::new();
  input_properties.insert("release".to_string(), ValueSnapshot::Bool(true));
  let mut input_file_properties = BTreeMap::new();
  input_file_properties.insert(
    "sources".to_string(),
    FileFingerprint::from_entries(vec![("Main.java".to_string(), hash_bytes(b"class Main {}"))]),
  );
  let mut outputs = BTreeMap::new();
  outputs.insert("classes".to_string(), FileSystemSnapshot::empty());

  ExecutionState {
    input_properties,
    input_file_properties,
    output_files_produced_by_work: outputs,
    origin: OriginMetadata::new(invocation, Duration::from_millis(42)),
    successful: true,
  }
}

//! Process-local execution history.

use std::collections::HashMap;
use std::sync::Mutex;

use super::ExecutionHistoryStore;
use super::types::{ExecutionState, HistoryError};
use crate::work::Identity;

/// Keeps execution state in memory; lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
  states: Mutex<HashMap<Identity, ExecutionState>>,
}

impl InMemoryHistoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.states.lock().map(|s| s.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl ExecutionHistoryStore for InMemoryHistoryStore {
  fn load(&self, identity: &Identity) -> Result<Option<ExecutionState>, HistoryError> {
    let states = self.states.lock().map_err(|_| HistoryError::Poisoned)?;
    Ok(states.get(identity).cloned())
  }

  fn store(&self, identity: &Identity, state: &ExecutionState) -> Result<(), HistoryError> {
    let mut states = self.states.lock().map_err(|_| HistoryError::Poisoned)?;
    states.insert(identity.clone(), state.clone());
    Ok(())
  }

  fn remove(&self, identity: &Identity) -> Result<(), HistoryError> {
    let mut states = self.states.lock().map_err(|_| HistoryError::Poisoned)?;
    states.remove(identity);
    Ok(())
  }
}

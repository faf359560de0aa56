use std::path::PathBuf;
use std::sync::Arc;

use crate::history::FileHistoryStore;
use crate::platform::paths::{history_dir, workspaces_dir};
use crate::workspace::LeasedWorkspaceProvider;

/// Where workspaces and history live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  pub workspaces_dir: PathBuf,
  pub history_dir: PathBuf,
}

impl EngineConfig {
  /// Locations from `STINT_WORKSPACES` and `STINT_HISTORY`, else platform defaults.
  pub fn from_env() -> Self {
    Self {
      workspaces_dir: workspaces_dir(),
      history_dir: history_dir(),
    }
  }

  pub fn history_store(&self) -> FileHistoryStore {
    FileHistoryStore::new(self.history_dir.clone())
  }

  pub fn workspace_provider(&self) -> LeasedWorkspaceProvider {
    LeasedWorkspaceProvider::new(self.workspaces_dir.clone(), Arc::new(self.history_store()))
  }
}

//! Workspaces leased to one execution of an identity at a time.
//!
//! # Layout
//!
//! ```text
//! {workspaces_dir}/
//! ├── <identity key>/       # workspace handed to the unit of work
//! └── <identity key>.lock   # held while an execution runs
//! ```
//!
//! Executions of the same identity are serialized twice: by an in-process
//! lease and by the lock file, which covers other processes.

pub mod lock;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

pub use lock::{LockMetadata, WorkspaceLock};

use crate::consts::WORKSPACE_LOCK_EXTENSION;
use crate::execution::{CachingResult, ExecutionError};
use crate::history::ExecutionHistoryStore;
use crate::platform::paths::workspaces_dir;
use crate::work::Identity;

/// Callback run while a workspace is leased.
pub type WorkspaceAction<'a> =
  dyn FnMut(&Path, &Arc<dyn ExecutionHistoryStore>) -> Result<CachingResult, ExecutionError> + 'a;

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error(
    "Workspace of {identity} is locked by another process (PID {pid}, started {started_at})\n\
             If you're sure no stint process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    identity: Identity,
    pid: u32,
    started_at: String,
    lock_path: PathBuf,
  },

  #[error(
    "Workspace is locked (could not read lock metadata)\n\
             If you're sure no stint process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("Failed to create workspace directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("Failed to open lock file: {0}")]
  OpenLock(#[source] io::Error),

  #[error("Failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("Failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Hands out workspaces and the history store that goes with them.
pub trait WorkspaceProvider: Send + Sync {
  /// Run `action` with exclusive use of the workspace for `identity`.
  fn with_workspace(
    &self,
    identity: &Identity,
    action: &mut WorkspaceAction<'_>,
  ) -> Result<CachingResult, ExecutionError>;

  fn history(&self) -> Arc<dyn ExecutionHistoryStore>;
}

/// Stable per-identity workspaces under one root directory.
pub struct LeasedWorkspaceProvider {
  root: PathBuf,
  history: Arc<dyn ExecutionHistoryStore>,
  leases: Mutex<HashMap<Identity, Arc<Mutex<()>>>>,
}

impl LeasedWorkspaceProvider {
  pub fn new(root: PathBuf, history: Arc<dyn ExecutionHistoryStore>) -> Self {
    Self {
      root,
      history,
      leases: Mutex::new(HashMap::new()),
    }
  }

  /// Provider rooted at the configured location (`STINT_WORKSPACES`, else the cache directory).
  pub fn default_provider(history: Arc<dyn ExecutionHistoryStore>) -> Self {
    Self::new(workspaces_dir(), history)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn workspace_path(&self, identity: &Identity) -> PathBuf {
    self.root.join(identity.key().0)
  }

  pub fn lock_path(&self, identity: &Identity) -> PathBuf {
    self
      .root
      .join(format!("{}.{}", identity.key(), WORKSPACE_LOCK_EXTENSION))
  }

  fn lease(&self, identity: &Identity) -> Arc<Mutex<()>> {
    let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
    leases.entry(identity.clone()).or_default().clone()
  }

  fn release(&self, identity: &Identity, lease: &Arc<Mutex<()>>) {
    let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
    // One reference in the map, one held by the caller.
    if Arc::strong_count(lease) == 2 {
      leases.remove(identity);
    }
  }

  fn run_leased(
    &self,
    identity: &Identity,
    lease: &Mutex<()>,
    action: &mut WorkspaceAction<'_>,
  ) -> Result<CachingResult, ExecutionError> {
    let _guard = lease.lock().unwrap_or_else(PoisonError::into_inner);

    let workspace = self.workspace_path(identity);
    std::fs::create_dir_all(&workspace).map_err(WorkspaceError::CreateDir)?;
    let _lock = WorkspaceLock::acquire(&self.lock_path(identity), identity)?;

    debug!(identity = %identity, workspace = %workspace.display(), "leased workspace");
    action(&workspace, &self.history)
  }

  #[cfg(test)]
  fn active_leases(&self) -> usize {
    self.leases.lock().map(|l| l.len()).unwrap_or(0)
  }
}

impl WorkspaceProvider for LeasedWorkspaceProvider {
  fn with_workspace(
    &self,
    identity: &Identity,
    action: &mut WorkspaceAction<'_>,
  ) -> Result<CachingResult, ExecutionError> {
    let lease = self.lease(identity);
    let result = self.run_leased(identity, &lease, action);
    self.release(identity, &lease);
    result
  }

  fn history(&self) -> Arc<dyn ExecutionHistoryStore> {
    self.history.clone()
  }
}

//! Units of work and their contract with the execution engine.
//!
//! A unit of work declares its inputs and outputs through visitors and knows
//! how to run itself. Everything else (fingerprinting, history, up-to-date
//! checks, cleanup) is done by the pipeline.

mod identity;

pub use identity::Identity;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::execution::ExecutionOutcome;
use crate::fingerprint::{InputFingerprinter, InputVisitor};
use crate::history::ExecutionState;
use crate::workspace::WorkspaceProvider;

/// Logical result value of a unit of work.
pub type OutputValue = serde_json::Value;

static DEFAULT_FINGERPRINTER: InputFingerprinter = InputFingerprinter::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
  File,
  Directory,
}

/// Receives output property declarations.
pub trait OutputVisitor {
  fn visit_output_property(&mut self, name: &str, kind: OutputKind, root: &Path);
}

/// How the work may treat its previous outputs on this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputChanges {
  /// Previous state is available and only incremental inputs changed.
  pub incremental: bool,
  /// Input file properties whose fingerprints differ from the previous run.
  pub modified_properties: Vec<String>,
}

/// Everything a unit of work is handed when it runs.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
  pub workspace: &'a Path,
  pub previous_state: Option<&'a ExecutionState>,
  pub input_changes: &'a InputChanges,
}

/// What the work reports back after running.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkOutput {
  /// False when the work found nothing to do.
  pub did_work: bool,
  pub output: OutputValue,
}

impl WorkOutput {
  pub fn worked(output: OutputValue) -> Self {
    Self { did_work: true, output }
  }

  pub fn no_work(output: OutputValue) -> Self {
    Self { did_work: false, output }
  }

  /// Outcome this report maps to, given the changes it was executed with.
  pub fn outcome(&self, input_changes: &InputChanges) -> ExecutionOutcome {
    if !self.did_work {
      ExecutionOutcome::UpToDate
    } else if input_changes.incremental {
      ExecutionOutcome::Executed
    } else {
      ExecutionOutcome::ExecutedNonIncrementally
    }
  }
}

/// A piece of work the engine can fingerprint, skip, and execute.
pub trait UnitOfWork: Send + Sync {
  /// Identity used as the history and workspace key.
  fn identity(&self) -> Identity;

  fn display_name(&self) -> String {
    self.identity().to_string()
  }

  fn workspace_provider(&self) -> &dyn WorkspaceProvider;

  /// Whether executions are recorded in the workspace provider's history.
  fn tracks_history(&self) -> bool {
    true
  }

  /// Whether recorded outputs are deleted before a non-incremental execution.
  fn cleanup_outputs_on_non_incremental_execution(&self) -> bool {
    true
  }

  fn input_fingerprinter(&self) -> &InputFingerprinter {
    &DEFAULT_FINGERPRINTER
  }

  /// Report value and file input properties.
  fn visit_regular_inputs(&self, visitor: &mut dyn InputVisitor);

  /// Report output properties; `workspace` is the directory leased for this run.
  fn visit_outputs(&self, workspace: &Path, visitor: &mut dyn OutputVisitor);

  /// Notified once the file system inputs relevant to this run are known.
  ///
  /// Called with `None` before execution when the work is going to run, or
  /// with the outcome when the work was skipped.
  fn broadcast_relevant_file_system_inputs(&self, _outcome: Option<ExecutionOutcome>) {}

  /// Rebuild the output value from a workspace without executing.
  fn load_restored_output(&self, workspace: &Path) -> OutputValue;

  fn execute(&self, request: &ExecutionRequest<'_>) -> anyhow::Result<WorkOutput>;
}

/// A unit of work built from default-constructed, caller-configured parameters.
pub trait ConfigurableUnitOfWork: UnitOfWork + Sized {
  type Params: Default;

  fn create(params: Self::Params, workspace: Arc<dyn WorkspaceProvider>) -> Result<Self, ConfigurationError>;
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConfigurationError {
  pub message: String,
}

impl ConfigurationError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

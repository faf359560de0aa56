use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cleanup::CleanupError;
use crate::fingerprint::{FileSystemSnapshot, FingerprintError};
use crate::history::{HistoryError, OriginMetadata};
use crate::work::OutputValue;
use crate::workspace::WorkspaceError;

/// What happened to a unit of work on one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
  /// Executed with knowledge of the previous state.
  Executed,
  /// Executed from scratch, or previous outputs were cleaned up.
  ExecutedNonIncrementally,
  /// Nothing to do and nothing to clean.
  ShortCircuited,
  /// Inputs and outputs match the previous execution.
  UpToDate,
}

impl ExecutionOutcome {
  pub fn did_work(self) -> bool {
    matches!(
      self,
      ExecutionOutcome::Executed | ExecutionOutcome::ExecutedNonIncrementally
    )
  }
}

impl std::fmt::Display for ExecutionOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      ExecutionOutcome::Executed => "EXECUTED",
      ExecutionOutcome::ExecutedNonIncrementally => "EXECUTED_NON_INCREMENTALLY",
      ExecutionOutcome::ShortCircuited => "SHORT_CIRCUITED",
      ExecutionOutcome::UpToDate => "UP_TO_DATE",
    };
    write!(f, "{}", name)
  }
}

/// Outcome plus the logical output value of the work.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
  pub outcome: ExecutionOutcome,
  pub output: OutputValue,
}

/// Whether a build cache was consulted for this execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CachingState {
  /// The deciding stage never looked at a cache.
  NotDetermined,
  Disabled { reasons: Vec<String> },
}

/// Result of driving one unit of work through the pipeline.
#[derive(Debug)]
pub struct CachingResult {
  pub output_files_produced_by_work: BTreeMap<String, FileSystemSnapshot>,
  pub duration: Duration,
  /// Failures of the work itself land here instead of being raised.
  pub execution_result: Result<ExecutionResult, anyhow::Error>,
  pub caching_state: CachingState,
  pub execution_reasons: Vec<String>,
  pub reused_origin_metadata: Option<OriginMetadata>,
}

impl CachingResult {
  /// The outcome, when the work did not fail.
  pub fn outcome(&self) -> Option<ExecutionOutcome> {
    self.execution_result.as_ref().ok().map(|r| r.outcome)
  }

  pub fn is_success(&self) -> bool {
    self.execution_result.is_ok()
  }
}

/// Errors that abort an execution attempt without producing a result.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// The unit of work could not be created from its parameters.
  #[error("cannot configure {work}: {message}")]
  Configuration { work: String, message: String },

  #[error("fingerprinting failed: {0}")]
  Fingerprint(#[from] FingerprintError),

  #[error("cleaning previous outputs failed: {0}")]
  Cleanup(#[from] CleanupError),

  #[error("execution history error: {0}")]
  History(#[from] HistoryError),

  #[error("workspace error: {0}")]
  Workspace(#[from] WorkspaceError),
}

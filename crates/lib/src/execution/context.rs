//! Contexts threaded through the step pipeline.
//!
//! Each stage receives an immutable context and hands a derived one to the
//! next stage. Derivation copies the base and overrides named fields through
//! `with_*` methods.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fingerprint::{FileFingerprint, FileSystemSnapshot, InputPropertyType, ValueSnapshot};
use crate::history::{ExecutionHistoryStore, ExecutionState};
use crate::work::{Identity, InputChanges};

/// What the caller asked for, before a workspace is assigned.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
  /// Forces execution and is reported as the only execution reason.
  pub rebuild_reason: Option<String>,
}

impl RequestContext {
  pub fn rebuild(reason: impl Into<String>) -> Self {
    Self {
      rebuild_reason: Some(reason.into()),
    }
  }
}

/// Workspace, history handle, and the state recorded by the previous execution.
#[derive(Clone)]
pub struct PreviousExecutionContext {
  identity: Identity,
  workspace: PathBuf,
  history: Option<Arc<dyn ExecutionHistoryStore>>,
  previous_state: Option<Arc<ExecutionState>>,
  input_properties: BTreeMap<String, ValueSnapshot>,
  input_file_properties: BTreeMap<String, FileFingerprint>,
  rebuild_reason: Option<String>,
}

impl PreviousExecutionContext {
  pub fn new(
    identity: Identity,
    workspace: PathBuf,
    history: Option<Arc<dyn ExecutionHistoryStore>>,
    previous_state: Option<ExecutionState>,
  ) -> Self {
    Self {
      identity,
      workspace,
      history,
      previous_state: previous_state.map(Arc::new),
      input_properties: BTreeMap::new(),
      input_file_properties: BTreeMap::new(),
      rebuild_reason: None,
    }
  }

  pub fn with_rebuild_reason(mut self, reason: Option<String>) -> Self {
    self.rebuild_reason = reason;
    self
  }

  pub fn with_input_properties(mut self, input_properties: BTreeMap<String, ValueSnapshot>) -> Self {
    self.input_properties = input_properties;
    self
  }

  pub fn with_input_file_properties(mut self, input_file_properties: BTreeMap<String, FileFingerprint>) -> Self {
    self.input_file_properties = input_file_properties;
    self
  }

  pub fn identity(&self) -> &Identity {
    &self.identity
  }

  pub fn workspace(&self) -> &Path {
    &self.workspace
  }

  pub fn history(&self) -> Option<&Arc<dyn ExecutionHistoryStore>> {
    self.history.as_ref()
  }

  pub fn previous_state(&self) -> Option<&ExecutionState> {
    self.previous_state.as_deref()
  }

  /// Value snapshots already known to earlier stages.
  pub fn input_properties(&self) -> &BTreeMap<String, ValueSnapshot> {
    &self.input_properties
  }

  /// File fingerprints already known to earlier stages.
  pub fn input_file_properties(&self) -> &BTreeMap<String, FileFingerprint> {
    &self.input_file_properties
  }

  pub fn rebuild_reason(&self) -> Option<&str> {
    self.rebuild_reason.as_deref()
  }
}

/// Everything captured about inputs and outputs right before execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeforeExecutionState {
  pub input_properties: BTreeMap<String, ValueSnapshot>,
  pub input_file_properties: BTreeMap<String, FileFingerprint>,
  pub input_file_property_types: BTreeMap<String, InputPropertyType>,
  pub outputs_before_execution: BTreeMap<String, FileSystemSnapshot>,
}

#[derive(Clone)]
pub struct BeforeExecutionContext {
  previous: PreviousExecutionContext,
  before_execution_state: Arc<BeforeExecutionState>,
}

impl BeforeExecutionContext {
  pub fn new(previous: PreviousExecutionContext, before_execution_state: BeforeExecutionState) -> Self {
    Self {
      previous,
      before_execution_state: Arc::new(before_execution_state),
    }
  }

  pub fn previous(&self) -> &PreviousExecutionContext {
    &self.previous
  }

  pub fn before_execution_state(&self) -> &BeforeExecutionState {
    &self.before_execution_state
  }

  pub fn identity(&self) -> &Identity {
    self.previous.identity()
  }

  pub fn workspace(&self) -> &Path {
    self.previous.workspace()
  }

  pub fn history(&self) -> Option<&Arc<dyn ExecutionHistoryStore>> {
    self.previous.history()
  }

  pub fn previous_state(&self) -> Option<&ExecutionState> {
    self.previous.previous_state()
  }
}

/// Context for a unit of work that must execute, with the reasons why.
#[derive(Clone)]
pub struct IncrementalChangesContext {
  before: BeforeExecutionContext,
  execution_reasons: Vec<String>,
  input_changes: InputChanges,
}

impl IncrementalChangesContext {
  pub fn new(before: BeforeExecutionContext, execution_reasons: Vec<String>, input_changes: InputChanges) -> Self {
    Self {
      before,
      execution_reasons,
      input_changes,
    }
  }

  pub fn before(&self) -> &BeforeExecutionContext {
    &self.before
  }

  pub fn execution_reasons(&self) -> &[String] {
    &self.execution_reasons
  }

  pub fn input_changes(&self) -> &InputChanges {
    &self.input_changes
  }

  pub fn identity(&self) -> &Identity {
    self.before.identity()
  }

  pub fn workspace(&self) -> &Path {
    self.before.workspace()
  }

  pub fn history(&self) -> Option<&Arc<dyn ExecutionHistoryStore>> {
    self.before.history()
  }

  pub fn previous_state(&self) -> Option<&ExecutionState> {
    self.before.previous_state()
  }

  pub fn before_execution_state(&self) -> &BeforeExecutionState {
    self.before.before_execution_state()
  }
}

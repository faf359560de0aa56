//! Test fixtures for stint-lib unit tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use crate::cleanup::OutputChangeListener;
use crate::execution::{CachingResult, CachingState, ExecutionError, ExecutionOutcome, ExecutionResult};
use crate::fingerprint::{FileValueSupplier, InputPropertyType, InputVisitor, ValueSupplier};
use crate::history::InMemoryHistoryStore;
use crate::steps::Step;
use crate::work::{
  ExecutionRequest, Identity, InputChanges, OutputKind, OutputValue, OutputVisitor, UnitOfWork, WorkOutput,
};
use crate::workspace::{LeasedWorkspaceProvider, WorkspaceProvider};

/// Workspace provider under `root` backed by an in-memory history.
pub fn test_provider(root: &Path) -> Arc<dyn WorkspaceProvider> {
  Arc::new(LeasedWorkspaceProvider::new(
    root.join("workspaces"),
    Arc::new(InMemoryHistoryStore::new()),
  ))
}

/// A compile-like unit of work with configurable inputs and outputs.
///
/// Executing writes one marker file per output property: the file itself for
/// file outputs, `out.txt` inside directory outputs.
pub struct TestWork {
  identity: Identity,
  provider: Arc<dyn WorkspaceProvider>,
  sources: Option<PathBuf>,
  classpath: Option<PathBuf>,
  values: BTreeMap<String, serde_json::Value>,
  outputs: Vec<(String, OutputKind, PathBuf)>,
  failure: Option<String>,
  executions: AtomicUsize,
  broadcasts: Mutex<Vec<Option<ExecutionOutcome>>>,
  changes: Mutex<Vec<InputChanges>>,
}

impl TestWork {
  pub fn new(identity: &str, provider: Arc<dyn WorkspaceProvider>) -> Self {
    Self {
      identity: Identity::new(identity),
      provider,
      sources: None,
      classpath: None,
      values: BTreeMap::new(),
      outputs: Vec::new(),
      failure: None,
      executions: AtomicUsize::new(0),
      broadcasts: Mutex::new(Vec::new()),
      changes: Mutex::new(Vec::new()),
    }
  }

  /// Primary input `sources`.
  pub fn with_sources(mut self, root: &Path) -> Self {
    self.sources = Some(root.to_path_buf());
    self
  }

  /// Non-incremental input `classpath`.
  pub fn with_classpath(mut self, root: &Path) -> Self {
    self.classpath = Some(root.to_path_buf());
    self
  }

  pub fn with_value(mut self, name: &str, value: serde_json::Value) -> Self {
    self.values.insert(name.to_string(), value);
    self
  }

  pub fn with_output(mut self, name: &str, kind: OutputKind, root: &Path) -> Self {
    self.outputs.push((name.to_string(), kind, root.to_path_buf()));
    self
  }

  pub fn failing(mut self, message: &str) -> Self {
    self.failure = Some(message.to_string());
    self
  }

  pub fn executions(&self) -> usize {
    self.executions.load(Ordering::SeqCst)
  }

  pub fn broadcasts(&self) -> Vec<Option<ExecutionOutcome>> {
    self.broadcasts.lock().unwrap().clone()
  }

  /// Input changes handed to each execution, in order.
  pub fn changes(&self) -> Vec<InputChanges> {
    self.changes.lock().unwrap().clone()
  }
}

impl UnitOfWork for TestWork {
  fn identity(&self) -> Identity {
    self.identity.clone()
  }

  fn workspace_provider(&self) -> &dyn WorkspaceProvider {
    self.provider.as_ref()
  }

  fn visit_regular_inputs(&self, visitor: &mut dyn InputVisitor) {
    for (name, value) in &self.values {
      visitor.visit_input_property(name, ValueSupplier::of(value));
    }
    if let Some(sources) = &self.sources {
      visitor.visit_input_file_property(
        "sources",
        InputPropertyType::Primary,
        FileValueSupplier::new([sources.clone()]),
      );
    }
    if let Some(classpath) = &self.classpath {
      visitor.visit_input_file_property(
        "classpath",
        InputPropertyType::NonIncremental,
        FileValueSupplier::new([classpath.clone()]),
      );
    }
  }

  fn visit_outputs(&self, _workspace: &Path, visitor: &mut dyn OutputVisitor) {
    for (name, kind, root) in &self.outputs {
      visitor.visit_output_property(name, *kind, root);
    }
  }

  fn broadcast_relevant_file_system_inputs(&self, outcome: Option<ExecutionOutcome>) {
    self.broadcasts.lock().unwrap().push(outcome);
  }

  fn load_restored_output(&self, workspace: &Path) -> OutputValue {
    json!({ "restored_from": workspace.display().to_string() })
  }

  fn execute(&self, request: &ExecutionRequest<'_>) -> anyhow::Result<WorkOutput> {
    self.executions.fetch_add(1, Ordering::SeqCst);
    self.changes.lock().unwrap().push(request.input_changes.clone());

    if let Some(message) = &self.failure {
      anyhow::bail!("{}", message);
    }

    for (_, kind, root) in &self.outputs {
      let file = match kind {
        OutputKind::File => root.clone(),
        OutputKind::Directory => root.join("out.txt"),
      };
      fs::write(&file, format!("built by {}", self.identity))?;
    }

    Ok(WorkOutput::worked(json!({ "identity": self.identity.as_str() })))
  }
}

/// A pipeline stage that records the contexts it receives.
pub struct RecordingStep<C> {
  outcome: ExecutionOutcome,
  calls: Mutex<Vec<C>>,
}

impl<C: Clone> RecordingStep<C> {
  pub fn new(outcome: ExecutionOutcome) -> Self {
    Self {
      outcome,
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn calls(&self) -> Vec<C> {
    self.calls.lock().unwrap().clone()
  }
}

impl<C: Send> Step<C> for RecordingStep<C> {
  fn execute(&self, _work: &dyn UnitOfWork, context: C) -> Result<CachingResult, ExecutionError> {
    self.calls.lock().unwrap().push(context);
    Ok(CachingResult {
      output_files_produced_by_work: BTreeMap::new(),
      duration: Duration::from_millis(1),
      execution_result: Ok(ExecutionResult {
        outcome: self.outcome,
        output: OutputValue::Null,
      }),
      caching_state: CachingState::NotDetermined,
      execution_reasons: Vec::new(),
      reused_origin_metadata: None,
    })
  }
}

/// Records every announced set of output roots.
#[derive(Default)]
pub struct RecordingListener {
  announcements: Mutex<Vec<Vec<PathBuf>>>,
}

impl RecordingListener {
  pub fn announcements(&self) -> Vec<Vec<PathBuf>> {
    self.announcements.lock().unwrap().clone()
  }
}

impl OutputChangeListener for RecordingListener {
  fn before_output_change(&self, roots: &[PathBuf]) {
    self.announcements.lock().unwrap().push(roots.to_vec());
  }
}

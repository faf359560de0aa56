//! Shared helpers for engine integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::json;
use stint_lib::cleanup::OutputOwnership;
use stint_lib::engine::{EngineServices, ExecutionEngine};
use stint_lib::fingerprint::{FileValueSupplier, InputPropertyType, InputVisitor, ValueSupplier};
use stint_lib::history::{ExecutionHistoryStore, FileHistoryStore};
use stint_lib::work::{
  ExecutionRequest, Identity, OutputKind, OutputValue, OutputVisitor, UnitOfWork, WorkOutput,
};
use stint_lib::workspace::{LeasedWorkspaceProvider, WorkspaceProvider};
use tempfile::TempDir;

/// Isolated engine environment.
///
/// Each test gets its own temporary directory holding sources, build
/// outputs, workspaces and a file-backed history.
pub struct TestEnv {
  pub temp: TempDir,
  pub engine: ExecutionEngine,
  pub provider: Arc<LeasedWorkspaceProvider>,
}

impl TestEnv {
  /// Environment whose `build/` directory is owned by the build.
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let ownership = Arc::new(OutputOwnership::new());
    ownership.register(&temp.path().join("build"));

    let engine = ExecutionEngine::new(EngineServices {
      ownership,
      ..EngineServices::default()
    });
    let history = Arc::new(FileHistoryStore::new(temp.path().join("history")));
    let provider = Arc::new(LeasedWorkspaceProvider::new(temp.path().join("workspaces"), history));

    Self { temp, engine, provider }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative: &str, content: &str) {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  pub fn history(&self) -> Arc<dyn ExecutionHistoryStore> {
    self.provider.history()
  }

  /// Compile `src/{name}` into `build/{name}`.
  pub fn compile_work(&self, name: &str) -> CompileWork {
    fs::create_dir_all(self.path(&format!("src/{}", name))).unwrap();
    CompileWork {
      identity: Identity::new(format!(":{}:compile", name)),
      provider: self.provider.clone(),
      sources: self.path(&format!("src/{}", name)),
      classes: self.path(&format!("build/{}/classes", name)),
      release: 17,
      fail: AtomicBool::new(false),
      executions: AtomicUsize::new(0),
    }
  }
}

/// Turns every `X.java` below `sources` into `X.class` in `classes`.
pub struct CompileWork {
  pub identity: Identity,
  pub provider: Arc<LeasedWorkspaceProvider>,
  pub sources: PathBuf,
  pub classes: PathBuf,
  pub release: u32,
  pub fail: AtomicBool,
  pub executions: AtomicUsize,
}

impl CompileWork {
  pub fn executions(&self) -> usize {
    self.executions.load(Ordering::SeqCst)
  }

  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }
}

impl UnitOfWork for CompileWork {
  fn identity(&self) -> Identity {
    self.identity.clone()
  }

  fn workspace_provider(&self) -> &dyn WorkspaceProvider {
    self.provider.as_ref()
  }

  fn visit_regular_inputs(&self, visitor: &mut dyn InputVisitor) {
    visitor.visit_input_property("release", ValueSupplier::of(&self.release));
    visitor.visit_input_file_property(
      "sources",
      InputPropertyType::Primary,
      FileValueSupplier::new([self.sources.clone()]),
    );
  }

  fn visit_outputs(&self, _workspace: &Path, visitor: &mut dyn OutputVisitor) {
    visitor.visit_output_property("classes", OutputKind::Directory, &self.classes);
  }

  fn load_restored_output(&self, _workspace: &Path) -> OutputValue {
    json!({ "classes": self.classes.display().to_string() })
  }

  fn execute(&self, _request: &ExecutionRequest<'_>) -> anyhow::Result<WorkOutput> {
    self.executions.fetch_add(1, Ordering::SeqCst);
    if self.fail.load(Ordering::SeqCst) {
      anyhow::bail!("compilation failed");
    }

    let mut compiled = 0;
    for entry in fs::read_dir(&self.sources)? {
      let path = entry?.path();
      if path.extension().is_some_and(|ext| ext == "java") {
        let class = self.classes.join(path.with_extension("class").file_name().unwrap_or_default());
        fs::write(class, fs::read_to_string(&path)?.to_uppercase())?;
        compiled += 1;
      }
    }

    Ok(WorkOutput::worked(json!({ "compiled": compiled })))
  }
}

//! File-copying unit of work driven by `stint run`.
//!
//! Copies every file below the source roots into the output directory and
//! records a small JSON summary in the workspace, which is what an
//! up-to-date run reports back as its output.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use stint_lib::fingerprint::{FileValueSupplier, InputPropertyType, InputVisitor, ValueSupplier};
use stint_lib::work::{
  ConfigurableUnitOfWork, ConfigurationError, ExecutionRequest, Identity, OutputKind, OutputValue, OutputVisitor,
  UnitOfWork, WorkOutput,
};
use stint_lib::workspace::WorkspaceProvider;

const SUMMARY_FILE: &str = "output.json";

#[derive(Debug, Default)]
pub struct CopyParams {
  pub identity: Option<String>,
  pub sources: Vec<PathBuf>,
  pub out: Option<PathBuf>,
  /// Keep the directory layout below each source root.
  pub preserve_layout: bool,
}

/// What a copy run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySummary {
  pub out: PathBuf,
  pub copied: usize,
  pub removed: usize,
}

pub struct CopyWork {
  identity: Identity,
  sources: Vec<PathBuf>,
  out: PathBuf,
  preserve_layout: bool,
  workspace: Arc<dyn WorkspaceProvider>,
}

impl CopyWork {
  pub fn out(&self) -> &Path {
    &self.out
  }

  /// Source files keyed by their path relative to the output directory.
  fn collect_files(&self) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for root in &self.sources {
      if !root.exists() {
        continue;
      }
      for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
          continue;
        }
        let relative = match entry.path().strip_prefix(root) {
          Ok(rel) if self.preserve_layout && !rel.as_os_str().is_empty() => rel.to_path_buf(),
          _ => PathBuf::from(entry.file_name()),
        };
        files.push((relative.to_string_lossy().replace('\\', "/"), entry.into_path()));
      }
    }
    Ok(files)
  }

  /// Delete files in the output directory that no source maps to anymore.
  fn prune_stale(&self, keep: &BTreeSet<String>) -> anyhow::Result<usize> {
    let mut removed = 0;
    if !self.out.exists() {
      return Ok(removed);
    }
    for entry in WalkDir::new(&self.out).contents_first(true) {
      let entry = entry.with_context(|| format!("Failed to walk {}", self.out.display()))?;
      if !entry.file_type().is_file() {
        continue;
      }
      let Ok(relative) = entry.path().strip_prefix(&self.out) else {
        continue;
      };
      if !keep.contains(&relative.to_string_lossy().replace('\\', "/")) {
        fs::remove_file(entry.path()).with_context(|| format!("Failed to remove {}", entry.path().display()))?;
        debug!(path = %entry.path().display(), "removed stale copy");
        removed += 1;
      }
    }
    Ok(removed)
  }
}

impl ConfigurableUnitOfWork for CopyWork {
  type Params = CopyParams;

  fn create(params: CopyParams, workspace: Arc<dyn WorkspaceProvider>) -> Result<Self, ConfigurationError> {
    let identity = params
      .identity
      .filter(|id| !id.trim().is_empty())
      .ok_or_else(|| ConfigurationError::new("an identity is required"))?;
    let out = params
      .out
      .ok_or_else(|| ConfigurationError::new("an output directory is required"))?;
    if params.sources.is_empty() {
      return Err(ConfigurationError::new("at least one source is required"));
    }
    if params.sources.iter().any(|source| out.starts_with(source)) {
      return Err(ConfigurationError::new(format!(
        "output directory {} lies inside a source",
        out.display()
      )));
    }

    Ok(Self {
      identity: Identity::new(identity),
      sources: params.sources,
      out,
      preserve_layout: params.preserve_layout,
      workspace,
    })
  }
}

impl UnitOfWork for CopyWork {
  fn identity(&self) -> Identity {
    self.identity.clone()
  }

  fn workspace_provider(&self) -> &dyn WorkspaceProvider {
    self.workspace.as_ref()
  }

  fn visit_regular_inputs(&self, visitor: &mut dyn InputVisitor) {
    visitor.visit_input_property("preserveLayout", ValueSupplier::of(&self.preserve_layout));
    visitor.visit_input_file_property(
      "sources",
      InputPropertyType::Primary,
      FileValueSupplier::new(self.sources.iter().cloned()),
    );
  }

  fn visit_outputs(&self, _workspace: &Path, visitor: &mut dyn OutputVisitor) {
    visitor.visit_output_property("out", OutputKind::Directory, &self.out);
  }

  fn load_restored_output(&self, workspace: &Path) -> OutputValue {
    fs::read_to_string(workspace.join(SUMMARY_FILE))
      .ok()
      .and_then(|content| serde_json::from_str(&content).ok())
      .unwrap_or(OutputValue::Null)
  }

  fn execute(&self, request: &ExecutionRequest<'_>) -> anyhow::Result<WorkOutput> {
    let files = self.collect_files()?;
    let keep: BTreeSet<String> = files.iter().map(|(relative, _)| relative.clone()).collect();

    let removed = if request.input_changes.incremental {
      self.prune_stale(&keep)?
    } else {
      0
    };

    for (relative, source) in &files {
      let target = self.out.join(relative);
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
      }
      fs::copy(source, &target)
        .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;
    }

    let summary = CopySummary {
      out: self.out.clone(),
      copied: files.len(),
      removed,
    };
    let output = serde_json::to_value(&summary)?;
    fs::create_dir_all(request.workspace)
      .with_context(|| format!("Failed to create workspace {}", request.workspace.display()))?;
    fs::write(request.workspace.join(SUMMARY_FILE), serde_json::to_string_pretty(&output)?)
      .context("Failed to write copy summary")?;

    Ok(WorkOutput::worked(output))
  }
}

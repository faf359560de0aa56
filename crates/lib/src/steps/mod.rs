//! The execution pipeline.
//!
//! Each step handles one concern and hands a derived context to the step it
//! wraps. The engine assembles them in this order:
//!
//! 1. [`LoadPreviousExecutionStep`] - lease the workspace, read history
//! 2. [`SkipEmptyWorkStep`] - short-circuit work whose primary inputs are empty
//! 3. [`CaptureStateBeforeExecutionStep`] - fingerprint inputs, snapshot outputs
//! 4. [`SkipUpToDateStep`] - reuse the previous execution when nothing changed
//! 5. [`StoreExecutionStateStep`] - record what the execution produced
//! 6. [`RemovePreviousOutputsStep`] - clean up before a non-incremental run
//! 7. [`ExecuteStep`] - run the work

mod capture_state;
mod execute;
mod load_previous;
mod remove_outputs;
mod skip_empty;
mod skip_up_to_date;
mod store_state;

pub use capture_state::CaptureStateBeforeExecutionStep;
pub use execute::ExecuteStep;
pub use load_previous::LoadPreviousExecutionStep;
pub use remove_outputs::RemovePreviousOutputsStep;
pub use skip_empty::SkipEmptyWorkStep;
pub use skip_up_to_date::SkipUpToDateStep;
pub use store_state::StoreExecutionStateStep;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::execution::{CachingResult, ExecutionError};
use crate::fingerprint::{FileSystemSnapshot, FingerprintError};
use crate::work::{OutputKind, OutputVisitor, UnitOfWork};

/// One stage of the pipeline, taking context `C`.
pub trait Step<C>: Send + Sync {
  fn execute(&self, work: &dyn UnitOfWork, context: C) -> Result<CachingResult, ExecutionError>;
}

impl<C, S: Step<C> + ?Sized> Step<C> for Box<S> {
  fn execute(&self, work: &dyn UnitOfWork, context: C) -> Result<CachingResult, ExecutionError> {
    (**self).execute(work, context)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredOutput {
  pub kind: OutputKind,
  pub root: PathBuf,
}

#[derive(Default)]
struct OutputCollector(BTreeMap<String, DeclaredOutput>);

impl OutputVisitor for OutputCollector {
  fn visit_output_property(&mut self, name: &str, kind: OutputKind, root: &Path) {
    self.0.insert(
      name.to_string(),
      DeclaredOutput {
        kind,
        root: root.to_path_buf(),
      },
    );
  }
}

/// Output properties `work` declares for `workspace`.
pub(crate) fn declared_outputs(work: &dyn UnitOfWork, workspace: &Path) -> BTreeMap<String, DeclaredOutput> {
  let mut collector = OutputCollector::default();
  work.visit_outputs(workspace, &mut collector);
  collector.0
}

pub(crate) fn snapshot_outputs(
  outputs: &BTreeMap<String, DeclaredOutput>,
) -> Result<BTreeMap<String, FileSystemSnapshot>, FingerprintError> {
  outputs
    .iter()
    .map(|(name, output)| {
      let snapshot = FileSystemSnapshot::capture(std::slice::from_ref(&output.root))?;
      Ok((name.clone(), snapshot))
    })
    .collect()
}

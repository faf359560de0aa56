use std::sync::Arc;

use tracing::debug;

use super::Step;
use crate::cleanup::{Deleter, OutputChangeListener, OutputOwnership, clean_previous_outputs};
use crate::execution::{CachingResult, ExecutionError, IncrementalChangesContext};
use crate::work::UnitOfWork;

/// Deletes the outputs of the previous execution before a non-incremental one.
///
/// Only files owned by the build are removed.
pub struct RemovePreviousOutputsStep<S> {
  ownership: Arc<OutputOwnership>,
  deleter: Arc<dyn Deleter>,
  listener: Arc<dyn OutputChangeListener>,
  delegate: S,
}

impl<S> RemovePreviousOutputsStep<S> {
  pub fn new(
    ownership: Arc<OutputOwnership>,
    deleter: Arc<dyn Deleter>,
    listener: Arc<dyn OutputChangeListener>,
    delegate: S,
  ) -> Self {
    Self {
      ownership,
      deleter,
      listener,
      delegate,
    }
  }
}

impl<S: Step<IncrementalChangesContext>> Step<IncrementalChangesContext> for RemovePreviousOutputsStep<S> {
  fn execute(
    &self,
    work: &dyn UnitOfWork,
    context: IncrementalChangesContext,
  ) -> Result<CachingResult, ExecutionError> {
    if !context.input_changes().incremental
      && work.cleanup_outputs_on_non_incremental_execution()
      && let Some(previous) = context.previous_state()
    {
      let did_work = clean_previous_outputs(
        &previous.output_files_produced_by_work,
        &self.ownership,
        self.deleter.as_ref(),
        self.listener.as_ref(),
      )?;
      debug!(identity = %context.identity(), did_work, "removed previous outputs");
    }

    self.delegate.execute(work, context)
  }
}

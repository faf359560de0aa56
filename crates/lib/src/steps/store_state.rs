use tracing::debug;

use super::Step;
use crate::execution::{CachingResult, ExecutionError, IncrementalChangesContext};
use crate::history::{ExecutionState, OriginMetadata};
use crate::work::UnitOfWork;

/// Records the state of every execution in history.
///
/// A failed execution is recorded as unsuccessful, so the next attempt
/// executes again while still knowing which outputs to clean up.
pub struct StoreExecutionStateStep<S> {
  build_invocation_id: String,
  delegate: S,
}

impl<S> StoreExecutionStateStep<S> {
  pub fn new(build_invocation_id: impl Into<String>, delegate: S) -> Self {
    Self {
      build_invocation_id: build_invocation_id.into(),
      delegate,
    }
  }
}

impl<S: Step<IncrementalChangesContext>> Step<IncrementalChangesContext> for StoreExecutionStateStep<S> {
  fn execute(
    &self,
    work: &dyn UnitOfWork,
    context: IncrementalChangesContext,
  ) -> Result<CachingResult, ExecutionError> {
    let result = self.delegate.execute(work, context.clone())?;

    if let Some(history) = context.history() {
      let before = context.before_execution_state();
      let state = ExecutionState {
        input_properties: before.input_properties.clone(),
        input_file_properties: before.input_file_properties.clone(),
        output_files_produced_by_work: result.output_files_produced_by_work.clone(),
        origin: OriginMetadata::new(self.build_invocation_id.clone(), result.duration),
        successful: result.is_success(),
      };
      history.store(context.identity(), &state)?;
      debug!(
        identity = %context.identity(),
        successful = state.successful,
        "recorded execution state"
      );
    }

    Ok(result)
  }
}

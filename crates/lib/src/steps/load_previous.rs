use tracing::debug;

use super::Step;
use crate::execution::{CachingResult, ExecutionError, PreviousExecutionContext, RequestContext};
use crate::work::UnitOfWork;

/// Leases the workspace and loads the state of the previous execution.
///
/// Everything after this step runs while the lease is held.
pub struct LoadPreviousExecutionStep<S> {
  delegate: S,
}

impl<S> LoadPreviousExecutionStep<S> {
  pub fn new(delegate: S) -> Self {
    Self { delegate }
  }
}

impl<S: Step<PreviousExecutionContext>> Step<RequestContext> for LoadPreviousExecutionStep<S> {
  fn execute(&self, work: &dyn UnitOfWork, context: RequestContext) -> Result<CachingResult, ExecutionError> {
    let identity = work.identity();

    work
      .workspace_provider()
      .with_workspace(&identity, &mut |workspace, history| {
        let history = work.tracks_history().then(|| history.clone());
        let previous_state = match &history {
          Some(history) => history.load(&identity)?,
          None => None,
        };
        debug!(
          identity = %identity,
          has_previous_state = previous_state.is_some(),
          "loaded previous execution"
        );

        let context = PreviousExecutionContext::new(identity.clone(), workspace.to_path_buf(), history, previous_state)
          .with_rebuild_reason(context.rebuild_reason.clone());
        self.delegate.execute(work, context)
      })
  }
}

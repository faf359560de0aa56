use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::Step;
use crate::cleanup::{Deleter, OutputChangeListener, OutputOwnership, clean_previous_outputs};
use crate::execution::{
  CachingResult, CachingState, ExecutionError, ExecutionOutcome, ExecutionResult, PreviousExecutionContext,
};
use crate::fingerprint::{FileFingerprint, FileValueSupplier, InputPropertyType, InputVisitor, union};
use crate::work::UnitOfWork;

/// Skips work whose primary inputs are all empty.
///
/// Such work cannot be up to date, so its history is dropped and whatever it
/// produced last time is cleaned up. Work with at least one non-empty primary
/// input, or with no primary inputs at all, continues down the pipeline.
pub struct SkipEmptyWorkStep<S> {
  ownership: Arc<OutputOwnership>,
  deleter: Arc<dyn Deleter>,
  listener: Arc<dyn OutputChangeListener>,
  delegate: S,
}

impl<S> SkipEmptyWorkStep<S> {
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

impl<S: Step<PreviousExecutionContext>> Step<PreviousExecutionContext> for SkipEmptyWorkStep<S> {
  fn execute(
    &self,
    work: &dyn UnitOfWork,
    context: PreviousExecutionContext,
  ) -> Result<CachingResult, ExecutionError> {
    let no_previous_values = BTreeMap::new();
    let previous_values = context
      .previous_state()
      .map_or(&no_previous_values, |state| &state.input_properties);

    let new_inputs = work.input_fingerprinter().fingerprint_input_properties(
      previous_values,
      context.input_properties(),
      context.input_file_properties(),
      |visitor| work.visit_regular_inputs(&mut PrimaryInputsOnly { delegate: visitor }),
    )?;
    let sources = new_inputs.file_fingerprints;

    if sources.is_empty() {
      debug!(identity = %context.identity(), "no primary inputs to check for emptiness");
      return self.execute_with_no_empty_sources(work, context);
    }

    if sources.values().all(FileFingerprint::is_empty) {
      return self.skip_execution_with_empty_sources(work, &context);
    }

    let input_file_properties = union(context.input_file_properties(), &sources);
    self.execute_with_no_empty_sources(work, context.with_input_file_properties(input_file_properties))
  }
}

impl<S: Step<PreviousExecutionContext>> SkipEmptyWorkStep<S> {
  fn execute_with_no_empty_sources(
    &self,
    work: &dyn UnitOfWork,
    context: PreviousExecutionContext,
  ) -> Result<CachingResult, ExecutionError> {
    work.broadcast_relevant_file_system_inputs(None);
    self.delegate.execute(work, context)
  }

  fn skip_execution_with_empty_sources(
    &self,
    work: &dyn UnitOfWork,
    context: &PreviousExecutionContext,
  ) -> Result<CachingResult, ExecutionError> {
    if let Some(history) = context.history() {
      history.remove(context.identity())?;
    }

    let previous_outputs = context
      .previous_state()
      .map(|state| &state.output_files_produced_by_work)
      .filter(|outputs| !outputs.is_empty());

    let outcome = match previous_outputs {
      None => {
        info!(
          identity = %context.identity(),
          "Skipping {} as it has no source files and no previous output files.",
          work.display_name()
        );
        ExecutionOutcome::ShortCircuited
      }
      Some(outputs) => {
        let did_work = clean_previous_outputs(
          outputs,
          &self.ownership,
          self.deleter.as_ref(),
          self.listener.as_ref(),
        )?;
        if did_work {
          info!(
            identity = %context.identity(),
            "Cleaned previous output of {} as it has no source files.",
            work.display_name()
          );
          ExecutionOutcome::ExecutedNonIncrementally
        } else {
          ExecutionOutcome::ShortCircuited
        }
      }
    };

    work.broadcast_relevant_file_system_inputs(Some(outcome));

    Ok(CachingResult {
      output_files_produced_by_work: BTreeMap::new(),
      duration: Duration::ZERO,
      execution_result: Ok(ExecutionResult {
        outcome,
        output: work.load_restored_output(context.workspace()),
      }),
      caching_state: CachingState::NotDetermined,
      execution_reasons: Vec::new(),
      reused_origin_metadata: None,
    })
  }
}

/// Forwards primary file properties only.
struct PrimaryInputsOnly<'a, 'b> {
  delegate: &'a mut (dyn InputVisitor + 'b),
}

impl InputVisitor for PrimaryInputsOnly<'_, '_> {
  fn visit_input_file_property(&mut self, name: &str, kind: InputPropertyType, value: FileValueSupplier) {
    if kind.is_skip_when_empty() {
      self.delegate.visit_input_file_property(name, kind, value);
    }
  }
}

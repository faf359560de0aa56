use std::collections::BTreeMap;

use tracing::debug;

use super::{Step, declared_outputs, snapshot_outputs};
use crate::execution::{
  BeforeExecutionContext, BeforeExecutionState, CachingResult, ExecutionError, PreviousExecutionContext,
};
use crate::fingerprint::{FileValueSupplier, InputPropertyType, InputVisitor, union};
use crate::work::UnitOfWork;

/// Fingerprints every input and snapshots every output before execution.
///
/// Fingerprints computed by earlier steps are reused, not recomputed.
pub struct CaptureStateBeforeExecutionStep<S> {
  delegate: S,
}

impl<S> CaptureStateBeforeExecutionStep<S> {
  pub fn new(delegate: S) -> Self {
    Self { delegate }
  }
}

impl<S: Step<BeforeExecutionContext>> Step<PreviousExecutionContext> for CaptureStateBeforeExecutionStep<S> {
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
      |visitor| work.visit_regular_inputs(visitor),
    )?;

    let mut input_properties = context.input_properties().clone();
    input_properties.extend(new_inputs.value_snapshots);
    let input_file_properties = union(context.input_file_properties(), &new_inputs.file_fingerprints);

    let mut types = PropertyTypes::default();
    work.visit_regular_inputs(&mut types);

    let outputs = declared_outputs(work, context.workspace());
    let outputs_before_execution = snapshot_outputs(&outputs)?;

    debug!(
      identity = %context.identity(),
      values = input_properties.len(),
      files = input_file_properties.len(),
      outputs = outputs_before_execution.len(),
      "captured state before execution"
    );

    let state = BeforeExecutionState {
      input_properties,
      input_file_properties,
      input_file_property_types: types.0,
      outputs_before_execution,
    };
    self.delegate.execute(work, BeforeExecutionContext::new(context, state))
  }
}

/// Records the declared type of each input file property.
#[derive(Default)]
struct PropertyTypes(BTreeMap<String, InputPropertyType>);

impl InputVisitor for PropertyTypes {
  fn visit_input_file_property(&mut self, name: &str, kind: InputPropertyType, _value: FileValueSupplier) {
    self.0.insert(name.to_string(), kind);
  }
}

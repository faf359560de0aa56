use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, warn};

use super::{DeclaredOutput, Step, declared_outputs, snapshot_outputs};
use crate::execution::{CachingResult, CachingState, ExecutionError, ExecutionResult, IncrementalChangesContext};
use crate::work::{ExecutionRequest, OutputKind, UnitOfWork};

const CACHING_DISABLED: &str = "Build cache is not enabled.";

/// Runs the work and snapshots what it produced.
///
/// A failure of the work is captured in the result; the outputs are
/// snapshotted either way.
#[derive(Debug, Default)]
pub struct ExecuteStep;

impl ExecuteStep {
  pub fn new() -> Self {
    Self
  }
}

impl Step<IncrementalChangesContext> for ExecuteStep {
  fn execute(
    &self,
    work: &dyn UnitOfWork,
    context: IncrementalChangesContext,
  ) -> Result<CachingResult, ExecutionError> {
    let workspace = context.workspace();
    let outputs = declared_outputs(work, workspace);
    let request = ExecutionRequest {
      workspace,
      previous_state: context.previous_state(),
      input_changes: context.input_changes(),
    };

    let start = Instant::now();
    let execution_result = create_outputs(&outputs)
      .and_then(|()| work.execute(&request))
      .map(|output| ExecutionResult {
        outcome: output.outcome(context.input_changes()),
        output: output.output,
      });
    let duration = start.elapsed();

    match &execution_result {
      Ok(result) => debug!(
        identity = %context.identity(),
        outcome = %result.outcome,
        duration_ms = duration.as_millis() as u64,
        "executed work"
      ),
      Err(e) => warn!(identity = %context.identity(), error = %e, "execution of {} failed", work.display_name()),
    }

    let output_files_produced_by_work = snapshot_outputs(&outputs)?;

    Ok(CachingResult {
      output_files_produced_by_work,
      duration,
      execution_result,
      caching_state: CachingState::Disabled {
        reasons: vec![CACHING_DISABLED.to_string()],
      },
      execution_reasons: context.execution_reasons().to_vec(),
      reused_origin_metadata: None,
    })
  }
}

/// Make sure output locations can be written to.
fn create_outputs(outputs: &BTreeMap<String, DeclaredOutput>) -> anyhow::Result<()> {
  for (name, output) in outputs {
    let dir = match output.kind {
      OutputKind::Directory => Some(output.root.as_path()),
      OutputKind::File => output.root.parent(),
    };
    if let Some(dir) = dir {
      fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory for '{}': {}", name, dir.display()))?;
    }
  }
  Ok(())
}

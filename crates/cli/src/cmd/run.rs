//! Run command implementation.
//!
//! Drives one copy unit of work through the execution engine and reports
//! how it was handled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use stint_lib::engine::{EngineConfig, EngineServices, ExecutionEngine};
use stint_lib::execution::{CachingResult, CachingState, ExecutionOutcome};
use stint_lib::work::OutputValue;
use stint_lib::workspace::WorkspaceProvider;

use crate::copy::{CopyParams, CopyWork};
use crate::output::{Mark, OutputFormat, format_duration, print_field, print_item, print_json, print_mark};

pub struct RunArgs {
  pub identity: String,
  pub sources: Vec<PathBuf>,
  pub out: PathBuf,
  pub preserve_layout: bool,
  pub rerun: Option<String>,
}

#[derive(Serialize)]
struct RunReport<'a> {
  identity: &'a str,
  outcome: Option<ExecutionOutcome>,
  duration_ms: u128,
  execution_reasons: &'a [String],
  caching_state: &'a CachingState,
  output: Option<&'a OutputValue>,
  error: Option<String>,
}

pub fn cmd_run(args: RunArgs, output: OutputFormat) -> Result<()> {
  let config = EngineConfig::from_env();
  let out = absolute(&args.out)?;
  let sources = args.sources.iter().map(|s| absolute(s)).collect::<Result<Vec<_>>>()?;

  let services = EngineServices::default();
  services.ownership.register(&out);
  let engine = ExecutionEngine::new(services);
  debug!(
    workspaces = %config.workspaces_dir.display(),
    history = %config.history_dir.display(),
    "running {}",
    args.identity
  );

  let provider: Arc<dyn WorkspaceProvider> = Arc::new(config.workspace_provider());
  let mut command = engine.prepare();
  if let Some(reason) = args.rerun {
    command = command.rebuild_because(reason);
  }

  let identity = args.identity.clone();
  let preserve_layout = args.preserve_layout;
  let result = command
    .workspace(provider)
    .work_unit::<CopyWork, _>(move |params: &mut CopyParams| {
      params.identity = Some(identity);
      params.sources = sources;
      params.out = Some(out);
      params.preserve_layout = preserve_layout;
    })
    .execute_now()
    .with_context(|| format!("Failed to run {}", args.identity))?;

  report(&args.identity, &result, output)?;

  match &result.execution_result {
    Ok(_) => Ok(()),
    Err(e) => Err(anyhow::anyhow!("{} failed: {:#}", args.identity, e)),
  }
}

fn report(identity: &str, result: &CachingResult, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    return print_json(&RunReport {
      identity,
      outcome: result.outcome(),
      duration_ms: result.duration.as_millis(),
      execution_reasons: &result.execution_reasons,
      caching_state: &result.caching_state,
      output: result.execution_result.as_ref().ok().map(|r| &r.output),
      error: result.execution_result.as_ref().err().map(|e| format!("{:#}", e)),
    });
  }

  let outcome = result.outcome();
  let label = outcome.map_or_else(|| "FAILED".to_string(), |o| o.to_string());
  print_mark(Mark::for_outcome(outcome), &format!("{} {}", identity, label));
  print_field("Duration", &format_duration(result.duration));
  if let Some(origin) = &result.reused_origin_metadata {
    print_field("Reused from", &origin.build_invocation_id);
  }
  if !result.execution_reasons.is_empty() {
    print_field("Reasons", "");
    for reason in &result.execution_reasons {
      print_item(reason);
    }
  }
  match &result.execution_result {
    Ok(executed) if !executed.output.is_null() => print_field("Output", &executed.output.to_string()),
    _ => {}
  }

  Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
  let absolute = std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))?;
  Ok(dunce::simplified(&absolute).to_path_buf())
}

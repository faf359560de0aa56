//! History command implementations.
//!
//! Inspect or drop the state recorded for one identity.

use std::fs;
use std::time::{Duration, UNIX_EPOCH};

use anyhow::{Context, Result};

use stint_lib::engine::EngineConfig;
use stint_lib::history::ExecutionHistoryStore;
use stint_lib::work::Identity;
use stint_lib::workspace::WorkspaceLock;

use crate::output::{Mark, OutputFormat, format_duration, print_field, print_item, print_json, print_mark};

pub fn cmd_history_show(identity: &str, output: OutputFormat) -> Result<()> {
  let config = EngineConfig::from_env();
  let identity = Identity::new(identity);

  let record = config
    .history_store()
    .load_record(&identity)
    .with_context(|| format!("Failed to load history of {}", identity))?;

  let Some(record) = record else {
    if output.is_json() {
      return print_json(&serde_json::Value::Null);
    }
    print_mark(Mark::Note, &format!("No history recorded for {}.", identity));
    return Ok(());
  };

  if output.is_json() {
    return print_json(&record);
  }

  let state = &record.state;
  let recorded_at = UNIX_EPOCH + Duration::from_secs(record.recorded_at);
  print_mark(Mark::Done, &format!("History of {}", identity));
  print_field("Workspace", &identity.key().0);
  print_field("Recorded", &humantime::format_rfc3339_seconds(recorded_at).to_string());
  print_field("Build invocation", &state.origin.build_invocation_id);
  print_field("Execution time", &format_duration(state.origin.execution_time));
  print_field("Successful", &state.successful.to_string());

  print_field("Inputs", "");
  for name in state.input_properties.keys() {
    print_item(name);
  }
  for (name, fingerprint) in &state.input_file_properties {
    print_item(&format!("{} ({} files)", name, fingerprint.len()));
  }

  print_field("Outputs", "");
  for (name, snapshot) in &state.output_files_produced_by_work {
    print_item(&format!("{} ({} entries)", name, snapshot.entries().len()));
  }

  Ok(())
}

/// Remove the recorded state and workspace of `identity`.
///
/// Refuses while another process holds the workspace lock.
pub fn cmd_history_forget(identity: &str) -> Result<()> {
  let config = EngineConfig::from_env();
  let identity = Identity::new(identity);
  let provider = config.workspace_provider();

  let lock = WorkspaceLock::try_acquire(&provider.lock_path(&identity), &identity)
    .with_context(|| format!("Failed to lock workspace of {}", identity))?;

  let history = config.history_store();
  let had_history = history
    .load(&identity)
    .with_context(|| format!("Failed to load history of {}", identity))?
    .is_some();
  history
    .remove(&identity)
    .with_context(|| format!("Failed to remove history of {}", identity))?;

  let workspace = provider.workspace_path(&identity);
  let had_workspace = workspace.exists();
  if had_workspace {
    fs::remove_dir_all(&workspace).with_context(|| format!("Failed to remove {}", workspace.display()))?;
  }

  drop(lock);

  if had_history || had_workspace {
    print_mark(Mark::Done, &format!("Forgot {}", identity));
  } else {
    print_mark(Mark::Warning, &format!("Nothing recorded for {}", identity));
  }
  Ok(())
}

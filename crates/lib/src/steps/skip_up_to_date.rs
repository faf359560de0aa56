use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::info;

use super::Step;
use crate::consts::MAX_OUT_OF_DATE_MESSAGES;
use crate::execution::{
  BeforeExecutionContext, BeforeExecutionState, CachingResult, CachingState, ExecutionError, ExecutionOutcome,
  ExecutionResult, IncrementalChangesContext,
};
use crate::fingerprint::{FileFingerprint, FileSystemSnapshot, SnapshotEntry};
use crate::history::ExecutionState;
use crate::work::{InputChanges, UnitOfWork};

const NO_HISTORY: &str = "No history is available.";
const PREVIOUS_FAILED: &str = "Previous execution failed.";

/// Reuses the previous execution when no input or output has changed since.
///
/// Otherwise the reasons for executing are collected, capped at
/// [`MAX_OUT_OF_DATE_MESSAGES`], and the work is told whether it may run
/// incrementally.
pub struct SkipUpToDateStep<S> {
  delegate: S,
}

impl<S> SkipUpToDateStep<S> {
  pub fn new(delegate: S) -> Self {
    Self { delegate }
  }
}

impl<S: Step<IncrementalChangesContext>> Step<BeforeExecutionContext> for SkipUpToDateStep<S> {
  fn execute(&self, work: &dyn UnitOfWork, context: BeforeExecutionContext) -> Result<CachingResult, ExecutionError> {
    let (mut reasons, input_changes) = match (context.previous().rebuild_reason(), context.previous_state()) {
      (Some(reason), _) => (vec![reason.to_string()], InputChanges::default()),
      (None, None) => (vec![NO_HISTORY.to_string()], InputChanges::default()),
      (None, Some(previous)) if !previous.successful => (vec![PREVIOUS_FAILED.to_string()], InputChanges::default()),
      (None, Some(previous)) => {
        let changes = detect_changes(previous, context.before_execution_state());
        if changes.reasons.is_empty() {
          return Ok(up_to_date(work, &context, previous));
        }
        let input_changes = InputChanges {
          incremental: !changes.non_incremental,
          modified_properties: changes.modified_properties,
        };
        (changes.reasons, input_changes)
      }
    };

    reasons.truncate(MAX_OUT_OF_DATE_MESSAGES);
    info!(
      identity = %context.identity(),
      incremental = input_changes.incremental,
      "{} is not up-to-date because:\n  {}",
      work.display_name(),
      reasons.join("\n  ")
    );

    self
      .delegate
      .execute(work, IncrementalChangesContext::new(context, reasons, input_changes))
  }
}

fn up_to_date(work: &dyn UnitOfWork, context: &BeforeExecutionContext, previous: &ExecutionState) -> CachingResult {
  info!(identity = %context.identity(), "Skipping {} as it is up-to-date.", work.display_name());

  CachingResult {
    output_files_produced_by_work: previous.output_files_produced_by_work.clone(),
    duration: previous.origin.execution_time,
    execution_result: Ok(ExecutionResult {
      outcome: ExecutionOutcome::UpToDate,
      output: work.load_restored_output(context.workspace()),
    }),
    caching_state: CachingState::NotDetermined,
    execution_reasons: Vec::new(),
    reused_origin_metadata: Some(previous.origin.clone()),
  }
}

#[derive(Debug, Default)]
struct Changes {
  reasons: Vec<String>,
  /// A change the work cannot process incrementally.
  non_incremental: bool,
  modified_properties: Vec<String>,
}

fn detect_changes(previous: &ExecutionState, current: &BeforeExecutionState) -> Changes {
  let mut changes = Changes::default();

  for name in keys(&previous.input_properties, &current.input_properties) {
    let message = match (previous.input_properties.get(name), current.input_properties.get(name)) {
      (Some(before), Some(now)) if before == now => continue,
      (Some(_), Some(_)) => format!("Value of input property '{}' has changed.", name),
      (None, _) => format!("Input property '{}' has been added.", name),
      (_, None) => format!("Input property '{}' has been removed.", name),
    };
    changes.reasons.push(message);
    changes.non_incremental = true;
  }

  for name in keys(&previous.input_file_properties, &current.input_file_properties) {
    let (before, now) = match (
      previous.input_file_properties.get(name),
      current.input_file_properties.get(name),
    ) {
      (Some(before), Some(now)) if before == now => continue,
      (Some(before), Some(now)) => (before, now),
      (None, _) => {
        changes.reasons.push(format!("Input property '{}' has been added.", name));
        changes.non_incremental = true;
        continue;
      }
      (_, None) => {
        changes.reasons.push(format!("Input property '{}' has been removed.", name));
        changes.non_incremental = true;
        continue;
      }
    };

    changes.reasons.extend(file_changes("Input", name, before, now));
    changes.modified_properties.push(name.clone());
    let incremental = current
      .input_file_property_types
      .get(name)
      .is_some_and(|kind| kind.is_incremental());
    if !incremental {
      changes.non_incremental = true;
    }
  }

  for name in keys(&previous.output_files_produced_by_work, &current.outputs_before_execution) {
    let messages = match (
      previous.output_files_produced_by_work.get(name),
      current.outputs_before_execution.get(name),
    ) {
      (Some(before), Some(now)) => output_changes(name, before, now),
      (None, _) => vec![format!("Output property '{}' has been added.", name)],
      (_, None) => vec![format!("Output property '{}' has been removed.", name)],
    };
    if !messages.is_empty() {
      changes.reasons.extend(messages);
      changes.non_incremental = true;
    }
  }

  changes
}

fn keys<'a, V>(before: &'a BTreeMap<String, V>, now: &'a BTreeMap<String, V>) -> BTreeSet<&'a String> {
  before.keys().chain(now.keys()).collect()
}

fn file_changes(kind: &str, property: &str, before: &FileFingerprint, now: &FileFingerprint) -> Vec<String> {
  let mut messages = Vec::new();
  for path in keys(before.entries(), now.entries()) {
    let change = match (before.entries().get(path), now.entries().get(path)) {
      (Some(a), Some(b)) if a == b => continue,
      (Some(_), Some(_)) => "has changed",
      (None, _) => "has been added",
      (_, None) => "has been removed",
    };
    messages.push(format!("{} property '{}' file {} {}.", kind, property, path, change));
  }
  messages
}

fn output_changes(property: &str, before: &FileSystemSnapshot, now: &FileSystemSnapshot) -> Vec<String> {
  let before = present_entries(before);
  let now = present_entries(now);

  let paths: BTreeSet<&Path> = before.keys().chain(now.keys()).copied().collect();
  let mut messages = Vec::new();
  for path in paths {
    let change = match (before.get(path), now.get(path)) {
      (Some(a), Some(b)) if a == b => continue,
      (Some(_), Some(_)) => "has changed",
      (None, _) => "has been added",
      (_, None) => "has been removed",
    };
    messages.push(format!(
      "Output property '{}' file {} {}.",
      property,
      path.display(),
      change
    ));
  }
  messages
}

fn present_entries(snapshot: &FileSystemSnapshot) -> BTreeMap<&Path, &SnapshotEntry> {
  snapshot
    .entries()
    .iter()
    .filter(|entry| !matches!(entry, SnapshotEntry::Missing { .. }))
    .map(|entry| (entry.path(), entry))
    .collect()
}

//! Reporting for `stint` commands: marked status lines on the terminal, or
//! pretty JSON for scripts.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use stint_lib::execution::ExecutionOutcome;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Leading symbol of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
  Done,
  Skipped,
  Failed,
  Note,
  Warning,
}

impl Mark {
  /// Done when the work ran, skipped when it did not, failed without an outcome.
  pub fn for_outcome(outcome: Option<ExecutionOutcome>) -> Self {
    match outcome {
      Some(outcome) if outcome.did_work() => Mark::Done,
      Some(_) => Mark::Skipped,
      None => Mark::Failed,
    }
  }

  fn symbol(self) -> &'static str {
    match self {
      Mark::Done => "✓",
      Mark::Skipped => "-",
      Mark::Failed => "✗",
      Mark::Note => "•",
      Mark::Warning => "⚠",
    }
  }

  fn stream(self) -> Stream {
    match self {
      Mark::Failed | Mark::Warning => Stream::Stderr,
      _ => Stream::Stdout,
    }
  }

  fn painted(self) -> String {
    let symbol = self.symbol();
    let stream = self.stream();
    match self {
      Mark::Done => symbol.if_supports_color(stream, |s| s.green()).to_string(),
      Mark::Skipped => symbol.if_supports_color(stream, |s| s.dimmed()).to_string(),
      Mark::Failed => symbol.if_supports_color(stream, |s| s.red()).to_string(),
      Mark::Note => symbol.if_supports_color(stream, |s| s.blue()).to_string(),
      Mark::Warning => symbol.if_supports_color(stream, |s| s.yellow()).to_string(),
    }
  }
}

/// Failures and warnings go to stderr, everything else to stdout.
pub fn print_mark(mark: Mark, message: &str) {
  match mark.stream() {
    Stream::Stderr => eprintln!("{} {}", mark.painted(), message),
    _ => println!("{} {}", mark.painted(), message),
  }
}

pub fn print_field(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Indented entry below a field, such as one execution reason.
pub fn print_item(text: &str) {
  println!("    {} {}", "→".if_supports_color(Stream::Stdout, |s| s.dimmed()), text);
}

/// Millisecond precision is enough for execution times.
pub fn format_duration(duration: Duration) -> String {
  let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

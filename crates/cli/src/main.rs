mod cmd;
mod copy;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::RunArgs;
use crate::output::{Mark, OutputFormat, print_mark};

/// stint - incremental execution of units of work
#[derive(Parser)]
#[command(name = "stint")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Copy sources into an output directory, skipping the copy when nothing changed
  Run {
    /// Identity of the unit of work; history is kept per identity
    identity: String,

    /// Source file or directory (repeatable)
    #[arg(short, long = "source", required = true)]
    sources: Vec<PathBuf>,

    /// Output directory, owned by this run
    #[arg(short, long)]
    out: PathBuf,

    /// Keep the directory layout below each source
    #[arg(long)]
    preserve_layout: bool,

    /// Execute even when up to date, reporting this reason
    #[arg(long, value_name = "REASON")]
    rerun: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Inspect or drop recorded execution history
  History {
    #[command(subcommand)]
    command: HistoryCommands,
  },
}

#[derive(Subcommand)]
enum HistoryCommands {
  /// Show the state recorded by the last execution
  Show {
    identity: String,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Remove the recorded state and workspace
  Forget { identity: String },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Run {
      identity,
      sources,
      out,
      preserve_layout,
      rerun,
      output,
    } => cmd::cmd_run(
      RunArgs {
        identity,
        sources,
        out,
        preserve_layout,
        rerun,
      },
      output,
    ),
    Commands::History { command } => match command {
      HistoryCommands::Show { identity, output } => cmd::cmd_history_show(&identity, output),
      HistoryCommands::Forget { identity } => cmd::cmd_history_forget(&identity),
    },
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_mark(Mark::Failed, &format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}

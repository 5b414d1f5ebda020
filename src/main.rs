use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use weft_config::TraceScript;

mod ops;
mod runner;

/// Weft - record deferred operations into graphs and dispatch them
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Record a trace script and execute it
  Run {
    /// Path to the trace script (JSON)
    script_file: PathBuf,
  },

  /// Record a trace script and print its graph without executing it
  Summary {
    /// Path to the trace script (JSON)
    script_file: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run { script_file }) => run_script(script_file)?,
    Some(Commands::Summary { script_file }) => summarize_script(script_file)?,
    None => {
      println!("weft - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_script(script_file: &Path) -> Result<TraceScript> {
  let script = TraceScript::from_path(script_file)
    .with_context(|| format!("failed to load trace script: {}", script_file.display()))?;
  eprintln!("Loaded trace script with {} steps", script.steps.len());
  Ok(script)
}

fn run_script(script_file: PathBuf) -> Result<()> {
  let script = load_script(&script_file)?;

  let report = runner::run(&script).context("trace execution failed")?;
  eprintln!("Trace finished: {:?}", report.outcome);

  let output = json!({
    "outcome": report.outcome,
    "results": report.results,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

fn summarize_script(script_file: PathBuf) -> Result<()> {
  let script = load_script(&script_file)?;

  let summary = runner::summarize(&script)?;
  println!("{}", serde_json::to_string_pretty(&summary)?);

  Ok(())
}

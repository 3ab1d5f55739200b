mod bench;
mod config;
mod ext;
mod format;
mod run;
mod stats;
mod table;

use std::{
  num::{NonZeroU64, NonZeroUsize},
  path::PathBuf,
  process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use self::{
  bench::{Bench, Layout},
  config::{Preset, Registry},
  run::System,
};

#[derive(Parser)]
#[command(about = "Times HVM programs against other evaluators, writing one CSV per program")]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  Bench {
    /// JSON registry of programs and evaluators, replacing `--preset`.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Built-in registry to use without `--config`.
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,
    /// Directory holding one directory per program.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Staging directory for compiled binaries [default: <root>/.bin]
    #[arg(long)]
    bin_dir: Option<PathBuf>,
    /// Directory to write `<program>.csv` files in [default: <root>/_results_]
    #[arg(long)]
    results: Option<PathBuf>,
    /// Timed executions per input size, after a discarded warm-up run.
    #[arg(long)]
    runs: Option<NonZeroUsize>,
    /// Kills a timed execution after this many seconds.
    #[arg(long)]
    timeout: Option<NonZeroU64>,
    /// Only benchmark these programs.
    #[arg(short, long)]
    program: Vec<String>,
    /// Only benchmark under these evaluators.
    #[arg(short, long)]
    evaluator: Vec<String>,
  },
  /// Prints a built-in registry as JSON, as accepted by `bench --config`.
  DumpConfig {
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,
  },
}

fn main() -> ExitCode {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  report(run_command(Args::parse().command))
}

/// Logs a top-level error once and maps it to the process exit code.
fn report(result: Result<()>) -> ExitCode {
  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      log::error!("{err:#}");
      ExitCode::FAILURE
    }
  }
}

fn run_command(command: Command) -> Result<()> {
  match command {
    Command::Bench {
      config,
      preset,
      root,
      bin_dir,
      results,
      runs,
      timeout,
      program,
      evaluator,
    } => {
      let mut registry = match config {
        Some(path) => Registry::load(&path).context("load config")?,
        None => Registry::preset(preset),
      };

      if let Some(runs) = runs {
        registry.runs = runs;
      }
      if timeout.is_some() {
        registry.timeout_secs = timeout;
      }
      registry.select(&program, &evaluator).context("select")?;
      registry.validate()?;

      let layout = Layout::resolve(&root, bin_dir, results).context("layout")?;
      log::info!(
        "benchmarking {} programs under {} evaluators ({} runs each, staging in {})",
        registry.programs.len(),
        registry.evaluators.len(),
        registry.runs,
        layout.bin.display(),
      );

      let written = Bench::new(&registry, &layout, System).bench().context("bench")?;
      log::info!("done, wrote {} result files", written.len());
    }
    Command::DumpConfig { preset } => {
      let json = serde_json::to_string_pretty(&Registry::preset(preset)).context("serialize")?;

      println!("{json}");
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn errors_become_a_failure_exit_code() {
    let code = report(Err(anyhow::anyhow!("no programs configured")));
    assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));

    assert_eq!(format!("{:?}", report(Ok(()))), format!("{:?}", ExitCode::SUCCESS));
  }

  #[test]
  fn zero_timeout_is_rejected_on_the_command_line() {
    assert!(Args::try_parse_from(["hvm-compare", "bench", "--timeout", "0"]).is_err());
    assert!(Args::try_parse_from(["hvm-compare", "bench", "--runs", "0"]).is_err());
    assert!(Args::try_parse_from(["hvm-compare", "bench", "--timeout", "5"]).is_ok());
  }
}

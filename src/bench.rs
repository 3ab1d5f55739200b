use std::{
  fs,
  path::{Path, PathBuf},
  time::Instant,
};

use anyhow::{Context, Result};

use crate::{
  config::{EvaluatorSpec, ProgramSpec, Registry, Vars},
  format,
  run::{self, Shell},
  stats::{Measurement, Timings},
  table::ResultTable,
};

/// Where programs are read from and artifacts are written to.
#[derive(Clone, Debug)]
pub struct Layout {
  /// Directory holding one sub-directory per program.
  pub root: PathBuf,
  /// Staging directory for compiled binaries, `{bin}` in templates.
  pub bin: PathBuf,
  /// Directory receiving `<program>.csv`.
  pub results: PathBuf,
}

impl Layout {
  /// Resolves `root` and `bin` to absolute paths, creating `bin` if needed.
  pub fn resolve(root: &Path, bin: Option<PathBuf>, results: Option<PathBuf>) -> Result<Self> {
    let root = root.canonicalize().with_context(|| format!("{root:?} does not exist"))?;

    let bin = bin.unwrap_or_else(|| root.join(".bin"));
    fs::create_dir_all(&bin).with_context(|| format!("create {bin:?}"))?;
    let bin = bin.canonicalize().context("canonicalize bin")?;

    let results = results.unwrap_or_else(|| root.join("_results_"));

    Ok(Self { root, bin, results })
  }
}

/// Why an evaluator stopped short for a program.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
  #[error("source file {0:?} does not exist")]
  MissingSource(PathBuf),
  #[error("build failed: {0:#}")]
  Build(anyhow::Error),
  #[error("execution failed for input {n}: {cause:#}")]
  Execution { n: u64, cause: anyhow::Error },
}

/// Outcome of one evaluator on one program. Measurements taken before a
/// failure are kept.
#[derive(Debug)]
pub struct EvaluatorRun {
  pub evaluator: String,
  pub measurements: Vec<Measurement>,
  pub failure: Option<Failure>,
}

pub struct Bench<'a, S> {
  registry: &'a Registry,
  layout: &'a Layout,
  shell: S,
}

impl<'a, S: Shell> Bench<'a, S> {
  pub fn new(registry: &'a Registry, layout: &'a Layout, shell: S) -> Self {
    Self {
      registry,
      layout,
      shell,
    }
  }

  /// Benchmarks every program, writing each program's CSV as soon as all of
  /// its evaluators are done. Returns the written paths.
  pub fn bench(&mut self) -> Result<Vec<PathBuf>> {
    let registry = self.registry;
    fs::create_dir_all(&self.layout.bin).context("create bin dir")?;

    let mut written = Vec::with_capacity(registry.programs.len());
    for program in &registry.programs {
      let runs = self.bench_program(program);

      let table = ResultTable::pivot(program, &registry.evaluators, runs.iter().flat_map(|r| &r.measurements))
        .with_context(|| format!("pivot {}", program.name))?;
      let path = table.write(&self.layout.results).context("write results")?;

      log::info!("[{}] results saved to {}", program.name, path.display());
      println!("{}", format::format(&table).context("format")?);

      written.push(path);
    }

    Ok(written)
  }

  /// Runs every evaluator on `program`, in registry order. Failures are logged
  /// and recorded, never propagated.
  pub fn bench_program(&mut self, program: &ProgramSpec) -> Vec<EvaluatorRun> {
    let registry = self.registry;

    registry
      .evaluators
      .iter()
      .map(|evaluator| {
        let mut measurements = Vec::with_capacity(program.input_sizes.len());
        let failure = self.bench_evaluator(program, evaluator, &mut measurements).err();

        if let Some(failure) = &failure {
          log::warn!("{}", skipped(&program.name, &evaluator.name, failure));
        }

        EvaluatorRun {
          evaluator: evaluator.name.clone(),
          measurements,
          failure,
        }
      })
      .collect()
  }

  fn bench_evaluator(
    &mut self,
    program: &ProgramSpec,
    evaluator: &EvaluatorSpec,
    measurements: &mut Vec<Measurement>,
  ) -> Result<(), Failure> {
    let id = format!("{}/{}", program.name, evaluator.name);
    let layout = self.layout;

    let dir = program.source_dir(&layout.root);
    let file = evaluator.source_file(&dir);
    if !file.is_file() {
      return Err(Failure::MissingSource(file));
    }

    let vars = Vars {
      program: &program.name,
      file: &file,
      dir: &dir,
      bin: &layout.bin,
      n: None,
    };

    log::info!("[{id}] building...");
    evaluator
      .pre_build_commands(&vars)
      .and_then(|commands| run::run_all(&mut self.shell, &commands))
      .map_err(Failure::Build)?;

    for &n in &program.input_sizes {
      let seconds = evaluator
        .run_command(&vars, n)
        .and_then(|command| self.time(&id, &command))
        .map_err(|cause| Failure::Execution { n, cause })?;

      log::info!("[{id}] n = {n}: {seconds:.6}s");
      measurements.push(Measurement {
        evaluator: evaluator.name.clone(),
        program: program.name.clone(),
        input_size: n,
        seconds,
      });
    }

    Ok(())
  }

  /// Executes `command` `runs + 1` times and averages all but the first.
  fn time(&mut self, id: &str, command: &str) -> Result<f64> {
    let runs = self.registry.runs.get();
    let timeout = self.registry.timeout();

    let mut timings = Timings::with_capacity(runs + 1);
    for i in 0..=runs {
      let start = Instant::now();
      self.shell.run(command, timeout).with_context(|| format!("{command:?}"))?;
      let elapsed = start.elapsed();

      log::debug!("[{id}] time {i}: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
      timings.push(elapsed);
    }

    timings.average().context("no timed runs")
  }
}

/// Diagnostic for an evaluator abandoned on a program.
fn skipped(program: &str, evaluator: &str, failure: &Failure) -> String {
  format!("[{program}/{evaluator}] {failure}, skipping...")
}

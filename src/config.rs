use std::{
  collections::BTreeSet,
  fs,
  num::{NonZeroU64, NonZeroUsize},
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Timed executions per input size in the built-in presets.
pub const RUNS: NonZeroUsize = match NonZeroUsize::new(3) {
  Some(runs) => runs,
  None => panic!("RUNS must be non-zero"),
};

/// A benchmark program, living in `<root>/<name>/main<ext>` for each
/// evaluator extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSpec {
  pub name: String,
  /// Arguments the program is run with, one CSV row each.
  pub input_sizes: Vec<u64>,
}

/// How to build and invoke a program under one toolchain.
///
/// Commands are templates, see [`render`] for the placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorSpec {
  pub name: String,
  #[serde(default)]
  pub pre_build: Vec<String>,
  pub run: String,
  pub extension: String,
}

/// Built-in registries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
  /// QuickSort under HVM and GHC.
  Default,
  /// Every known program and evaluator.
  Full,
}

/// Everything the benchmark loop needs to know about what to run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Registry {
  /// Timed executions per input size, after the warm-up one.
  pub runs: NonZeroUsize,
  /// Kills a timed execution after this many seconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_secs: Option<NonZeroU64>,
  pub programs: Vec<ProgramSpec>,
  pub evaluators: Vec<EvaluatorSpec>,
}

/// Values substituted into command templates.
#[derive(Clone, Copy, Debug)]
pub struct Vars<'a> {
  pub program: &'a str,
  pub file: &'a Path,
  pub dir: &'a Path,
  pub bin: &'a Path,
  /// Only set when rendering a run command.
  pub n: Option<u64>,
}

impl Vars<'_> {
  fn lookup(&self, key: &str) -> Result<String> {
    Ok(match key {
      "program" => self.program.to_string(),
      "file" => self.file.display().to_string(),
      "dir" => self.dir.display().to_string(),
      "bin" => self.bin.display().to_string(),
      "n" => self.n.context("`{n}` is only available in run commands")?.to_string(),
      other => anyhow::bail!("unknown placeholder `{{{other}}}`"),
    })
  }
}

/// Substitutes `{program}`, `{file}`, `{dir}`, `{bin}` and `{n}` in
/// `template`. `{{` and `}}` produce literal braces.
pub fn render(template: &str, vars: &Vars) -> Result<String> {
  let mut out = String::with_capacity(template.len());
  let mut chars = template.chars();

  while let Some(c) = chars.next() {
    let rest = chars.as_str();

    match c {
      '{' if rest.starts_with('{') => {
        out.push('{');
        chars = rest[1..].chars();
      }
      '{' => {
        let end = rest
          .find('}')
          .with_context(|| format!("unterminated placeholder in {template:?}"))?;

        out.push_str(&vars.lookup(&rest[..end]).with_context(|| format!("in {template:?}"))?);
        chars = rest[end + 1..].chars();
      }
      '}' if rest.starts_with('}') => {
        out.push('}');
        chars = rest[1..].chars();
      }
      '}' => anyhow::bail!("unmatched `}}` in {template:?}"),
      c => out.push(c),
    }
  }

  Ok(out)
}

impl ProgramSpec {
  pub fn new(name: &str, input_sizes: impl IntoIterator<Item = u64>) -> Self {
    Self {
      name: name.to_string(),
      input_sizes: input_sizes.into_iter().collect(),
    }
  }

  pub fn source_dir(&self, root: &Path) -> PathBuf {
    root.join(&self.name)
  }
}

impl EvaluatorSpec {
  pub fn new(name: &str, pre_build: &[&str], run: &str, extension: &str) -> Self {
    Self {
      name: name.to_string(),
      pre_build: pre_build.iter().map(ToString::to_string).collect(),
      run: run.to_string(),
      extension: extension.to_string(),
    }
  }

  pub fn source_file(&self, source_dir: &Path) -> PathBuf {
    source_dir.join(format!("main{}", self.extension))
  }

  /// Renders the pre-build commands. `vars.n` must be unset.
  pub fn pre_build_commands(&self, vars: &Vars) -> Result<Vec<String>> {
    let vars = Vars { n: None, ..*vars };

    self.pre_build.iter().map(|template| render(template, &vars)).collect()
  }

  pub fn run_command(&self, vars: &Vars, n: u64) -> Result<String> {
    render(&self.run, &Vars { n: Some(n), ..*vars })
  }
}

impl Registry {
  pub fn preset(preset: Preset) -> Self {
    let mut programs = vec![ProgramSpec::new("QuickSort", 0..65)];
    let mut evaluators = vec![
      EvaluatorSpec::new(
        "HVM",
        &["hvm compile {file}", "clang -O2 -lpthread {dir}/main.c -o {bin}/hvm"],
        "{bin}/hvm {n}",
        ".hvm",
      ),
      EvaluatorSpec::new("GHC", &["ghc -O2 {file} -o {bin}/ghc"], "{bin}/ghc {n}", ".hs"),
    ];

    if preset == Preset::Full {
      programs.extend([
        ProgramSpec::new("TreeSum", 0..33),
        ProgramSpec::new("Composition", 0..33),
        ProgramSpec::new("LambdaArithmetic", 0..65),
        ProgramSpec::new("ListFold", 0..65),
      ]);
      evaluators.extend([
        EvaluatorSpec::new("HvmInterpreter", &[], "hvm run {file} {n}", ".hvm"),
        EvaluatorSpec::new("RUST", &["rustc -O {file} -o {bin}/rust"], "{bin}/rust {n}", ".rs"),
        EvaluatorSpec::new("JS", &[], "node {file} {n}", ".js"),
      ]);
    }

    Self {
      runs: RUNS,
      timeout_secs: None,
      programs,
      evaluators,
    }
  }

  /// Reads a JSON registry from `path`.
  pub fn load(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
    let registry: Self = serde_json::from_str(&text).with_context(|| format!("parse {path:?}"))?;

    registry.validate().with_context(|| format!("invalid registry {path:?}"))?;

    Ok(registry)
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_secs.map(|secs| Duration::from_secs(secs.get()))
  }

  pub fn validate(&self) -> Result<()> {
    if self.programs.is_empty() {
      anyhow::bail!("no programs configured");
    }
    if self.evaluators.is_empty() {
      anyhow::bail!("no evaluators configured");
    }

    let mut names = BTreeSet::new();
    for program in &self.programs {
      if program.name.is_empty() {
        anyhow::bail!("program with an empty name");
      }
      if !names.insert(&program.name) {
        anyhow::bail!("duplicate program {:?}", program.name);
      }
      if program.input_sizes.is_empty() {
        anyhow::bail!("program {:?} has no input sizes", program.name);
      }

      let mut sizes = BTreeSet::new();
      if let Some(n) = program.input_sizes.iter().find(|n| !sizes.insert(**n)) {
        anyhow::bail!("program {:?} lists input size {n} twice", program.name);
      }
    }

    let mut names = BTreeSet::new();
    for evaluator in &self.evaluators {
      if evaluator.name.is_empty() {
        anyhow::bail!("evaluator with an empty name");
      }
      if !names.insert(&evaluator.name) {
        anyhow::bail!("duplicate evaluator {:?}", evaluator.name);
      }
      if !evaluator.extension.starts_with('.') {
        anyhow::bail!(
          "evaluator {:?} extension {:?} must start with '.'",
          evaluator.name,
          evaluator.extension
        );
      }
    }

    Ok(())
  }

  /// Keeps only the named programs and evaluators, in registry order. An empty
  /// list keeps everything.
  pub fn select(&mut self, programs: &[String], evaluators: &[String]) -> Result<()> {
    for name in programs {
      if !self.programs.iter().any(|p| &p.name == name) {
        anyhow::bail!("unknown program {name:?}");
      }
    }
    for name in evaluators {
      if !self.evaluators.iter().any(|e| &e.name == name) {
        anyhow::bail!("unknown evaluator {name:?}");
      }
    }

    if !programs.is_empty() {
      self.programs.retain(|p| programs.contains(&p.name));
    }
    if !evaluators.is_empty() {
      self.evaluators.retain(|e| evaluators.contains(&e.name));
    }

    Ok(())
  }
}

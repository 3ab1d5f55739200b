use std::{
  collections::BTreeMap,
  fmt::Write as _,
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::{
  config::{EvaluatorSpec, ProgramSpec},
  stats::Measurement,
};

/// A program's measurements pivoted into rows of input sizes and one column
/// per evaluator.
#[derive(Debug, PartialEq)]
pub struct ResultTable {
  pub program: String,
  pub input_sizes: Vec<u64>,
  /// Evaluator name and one cell per input size, `None` being a gap.
  pub columns: Vec<(String, Vec<Option<f64>>)>,
}

impl ResultTable {
  /// Pivots `measurements`, which may arrive in any order. Each (evaluator,
  /// input size) pair may be measured at most once, and only for evaluators
  /// and sizes configured for `program`.
  pub fn pivot<'a, I>(program: &ProgramSpec, evaluators: &[EvaluatorSpec], measurements: I) -> Result<Self>
  where
    I: IntoIterator<Item = &'a Measurement>,
  {
    let rows: BTreeMap<u64, usize> = program.input_sizes.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut columns: Vec<(String, Vec<Option<f64>>)> = evaluators
      .iter()
      .map(|e| (e.name.clone(), vec![None; program.input_sizes.len()]))
      .collect();

    for m in measurements {
      if m.program != program.name {
        anyhow::bail!("measurement of {:?} in the table of {:?}", m.program, program.name);
      }

      let (_, cells) = columns
        .iter_mut()
        .find(|(name, _)| *name == m.evaluator)
        .with_context(|| format!("unknown evaluator {:?}", m.evaluator))?;
      let row = *rows
        .get(&m.input_size)
        .with_context(|| format!("input size {} is not configured for {:?}", m.input_size, program.name))?;

      if cells[row].replace(m.seconds).is_some() {
        anyhow::bail!("{} measured input size {} twice", m.evaluator, m.input_size);
      }
    }

    Ok(Self {
      program: program.name.clone(),
      input_sizes: program.input_sizes.clone(),
      columns,
    })
  }

  pub fn evaluators(&self) -> impl Iterator<Item = &str> {
    self.columns.iter().map(|(name, _)| name.as_str())
  }

  /// Cells of row `row`, in column order.
  pub fn row(&self, row: usize) -> impl Iterator<Item = Option<f64>> + '_ {
    self.columns.iter().map(move |(_, cells)| cells[row])
  }

  pub fn to_csv(&self) -> Result<String> {
    let mut csv = String::new();

    writeln!(csv, "{}", std::iter::once("X").chain(self.evaluators()).collect::<Vec<_>>().join(","))?;

    for (i, n) in self.input_sizes.iter().enumerate() {
      let cells = self.row(i).map(|cell| cell.map(|s| s.to_string()).unwrap_or_default());

      writeln!(csv, "{}", std::iter::once(n.to_string()).chain(cells).collect::<Vec<_>>().join(","))?;
    }

    Ok(csv)
  }

  /// Writes `<dir>/<program>.csv`, replacing any previous results.
  pub fn write(&self, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {dir:?}"))?;

    let path = dir.join(format!("{}.csv", self.program));
    fs::write(&path, self.to_csv()?).with_context(|| format!("write {path:?}"))?;

    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn measurement(evaluator: &str, input_size: u64, seconds: f64) -> Measurement {
    Measurement {
      evaluator: evaluator.to_string(),
      program: "QuickSort".to_string(),
      input_size,
      seconds,
    }
  }

  fn evaluators() -> Vec<EvaluatorSpec> {
    vec![
      EvaluatorSpec::new("HVM", &[], "hvm {n}", ".hvm"),
      EvaluatorSpec::new("GHC", &[], "ghc {n}", ".hs"),
    ]
  }

  #[test]
  fn csv_has_header_and_gaps() {
    let program = ProgramSpec::new("QuickSort", [0, 1, 2]);
    let measurements = [
      measurement("GHC", 2, 0.5),
      measurement("HVM", 0, 0.25),
      measurement("GHC", 0, 1.5),
      measurement("GHC", 1, 0.125),
    ];

    let table = ResultTable::pivot(&program, &evaluators(), &measurements).unwrap();

    assert_eq!(table.to_csv().unwrap(), "X,HVM,GHC\n0,0.25,1.5\n1,,0.125\n2,,0.5\n");
  }

  #[test]
  fn failed_evaluator_is_blank_not_zero() {
    let program = ProgramSpec::new("QuickSort", 0..65);
    let measurements: Vec<_> = (0..65).map(|n| measurement("GHC", n, 0.01)).collect();

    let table = ResultTable::pivot(&program, &evaluators(), &measurements).unwrap();
    let csv = table.to_csv().unwrap();
    let lines: Vec<_> = csv.lines().collect();

    assert_eq!(lines.len(), 66);
    assert_eq!(lines[0], "X,HVM,GHC");
    for line in &lines[1..] {
      let cells: Vec<_> = line.split(',').collect();
      assert_eq!(cells.len(), 3);
      assert_eq!(cells[1], "");
      assert_eq!(cells[2], "0.01");
    }
  }

  #[test]
  fn rejects_broken_preconditions() {
    let program = ProgramSpec::new("QuickSort", [0, 1]);

    let duplicate = [measurement("HVM", 0, 1.0), measurement("HVM", 0, 2.0)];
    assert!(ResultTable::pivot(&program, &evaluators(), &duplicate).is_err());

    let unknown_size = [measurement("HVM", 7, 1.0)];
    assert!(ResultTable::pivot(&program, &evaluators(), &unknown_size).is_err());

    let unknown_evaluator = [measurement("JS", 0, 1.0)];
    assert!(ResultTable::pivot(&program, &evaluators(), &unknown_evaluator).is_err());

    let mut other_program = measurement("HVM", 0, 1.0);
    other_program.program = "TreeSum".to_string();
    assert!(ResultTable::pivot(&program, &evaluators(), [&other_program]).is_err());
  }

  #[test]
  fn write_overwrites_previous_results() {
    let dir = TempDir::new().unwrap();
    let results = dir.path().join("_results_");
    let program = ProgramSpec::new("QuickSort", [0]);

    let first = ResultTable::pivot(&program, &evaluators(), &[measurement("HVM", 0, 3.0)]).unwrap();
    let path = first.write(&results).unwrap();
    assert_eq!(path, results.join("QuickSort.csv"));

    let second = ResultTable::pivot(&program, &evaluators(), &[measurement("GHC", 0, 4.0)]).unwrap();
    second.write(&results).unwrap();

    assert_eq!(fs::read_to_string(path).unwrap(), "X,HVM,GHC\n0,,4\n");
  }
}

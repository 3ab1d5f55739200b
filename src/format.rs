use std::fmt::Write;

use anyhow::Result;

use crate::table::ResultTable;

const COLUMN_WIDTH: usize = 14;
const COLUMN_PADDING: &str = "  ";

fn format_header<'a, I: IntoIterator<Item = &'a str>>(evaluators: I) -> String {
  let header = std::iter::once("n")
    .chain(evaluators)
    .map(|col| format!("{col:<COLUMN_WIDTH$}"))
    .collect::<Vec<_>>()
    .join(COLUMN_PADDING);

  format!("{header}\n{}", "=".repeat(header.len()))
}

fn format_row(n: u64, cells: impl Iterator<Item = Option<f64>>) -> String {
  std::iter::once(format!("{n:<COLUMN_WIDTH$}"))
    .chain(cells.map(|cell| match cell {
      Some(seconds) => format!("{:>COLUMN_WIDTH$}", format!("{seconds:.3}s")),
      None => format!("{:>COLUMN_WIDTH$}", "-"),
    }))
    .collect::<Vec<_>>()
    .join(COLUMN_PADDING)
}

/// Renders `table` as a fixed-width console summary.
pub fn format(table: &ResultTable) -> Result<String> {
  let mut out = String::new();

  writeln!(out, "{}", table.program)?;
  writeln!(out, "{}", "=".repeat(table.program.len()))?;
  writeln!(out)?;

  writeln!(out, "{}", format_header(table.evaluators()))?;
  for (i, n) in table.input_sizes.iter().enumerate() {
    writeln!(out, "{}", format_row(*n, table.row(i)).trim_end())?;
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gaps_are_dashes() {
    let table = ResultTable {
      program: "QuickSort".to_string(),
      input_sizes: vec![0, 1],
      columns: vec![
        ("HVM".to_string(), vec![Some(0.1234), None]),
        ("GHC".to_string(), vec![Some(2.0), Some(3.5)]),
      ],
    };

    let out = format(&table).unwrap();
    let lines: Vec<_> = out.lines().collect();

    assert_eq!(lines[0], "QuickSort");
    assert!(lines[3].starts_with("n "));
    assert!(lines[3].contains("HVM") && lines[3].contains("GHC"));
    assert!(lines[5].contains("0.123s") && lines[5].contains("2.000s"));
    assert!(lines[6].contains('-') && lines[6].ends_with("3.500s"));
  }
}

use std::{process::Command, time::Duration};

use anyhow::{Context, Result};

use crate::ext::CommandExt;

/// Executes shell command lines on behalf of the benchmark loop.
pub trait Shell {
  /// Runs `command` to completion, blocking the harness. Fails on spawn
  /// failure, non-zero exit, or when `timeout` elapses first.
  fn run(&mut self, command: &str, timeout: Option<Duration>) -> Result<()>;
}

impl<S: Shell + ?Sized> Shell for &mut S {
  fn run(&mut self, command: &str, timeout: Option<Duration>) -> Result<()> {
    (**self).run(command, timeout)
  }
}

/// Runs commands through `sh -c`, letting the child's output pass through.
#[derive(Debug, Default)]
pub struct System;

impl Shell for System {
  fn run(&mut self, command: &str, timeout: Option<Duration>) -> Result<()> {
    log::trace!("$ {command}");

    if Command::shell(command).check_success_timeout(timeout)?.is_none() {
      anyhow::bail!("timed out after {:?}", timeout.unwrap_or_default());
    }

    Ok(())
  }
}

/// Runs `commands` in order without a timeout, stopping at the first failure.
pub fn run_all<S: Shell + ?Sized>(shell: &mut S, commands: &[String]) -> Result<()> {
  for command in commands {
    shell.run(command, None).with_context(|| format!("{command:?}"))?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn run_all_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first");
    let last = dir.path().join("last");

    let commands = vec![
      format!("touch {}", first.display()),
      "false".to_string(),
      format!("touch {}", last.display()),
    ];

    let err = run_all(&mut System, &commands).unwrap_err();

    assert!(format!("{err:#}").contains("\"false\""), "{err:#}");
    assert!(first.exists());
    assert!(!last.exists());
  }

  #[test]
  fn missing_binary_is_an_error() {
    assert!(System.run("definitely-not-a-real-binary-4a1f", None).is_err());
  }

  #[test]
  fn timeout_is_an_error() {
    let err = System.run("sleep 5", Some(Duration::from_millis(50))).unwrap_err();

    assert!(err.to_string().contains("timed out"), "{err}");
  }
}

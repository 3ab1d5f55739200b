use std::{
  os::unix::process::CommandExt as UnixCommandExt,
  process::{Child, Command, ExitStatus},
  time::Duration,
};

use anyhow::{Context, Result};
use nix::{
  sys::signal::{killpg, Signal},
  unistd::Pid,
};
use wait_timeout::ChildExt as WaitExt;

#[extend::ext]
pub impl ExitStatus {
  fn check_success(&self) -> Result<()> {
    if !self.success() {
      anyhow::bail!("exited with non-zero status {self}");
    }

    Ok(())
  }
}

#[extend::ext]
pub impl Child {
  /// Waits for the child to exit. With a `timeout`, a child still running
  /// after it elapses is killed along with its process group and reaped, and
  /// `Ok(None)` is returned. The child must lead its own process group.
  fn wait_deadline(&mut self, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
      return self.wait().context("wait").map(Some);
    };

    let Some(status) = self.wait_timeout(timeout).context("wait")? else {
      let group = Pid::from_raw(i32::try_from(self.id()).context("pid")?);
      killpg(group, Signal::SIGKILL).context("kill process group after timeout")?;
      self.wait().context("reap after timeout")?;

      return Ok(None);
    };

    Ok(Some(status))
  }
}

#[extend::ext]
pub impl Command {
  /// A `sh -c <line>` command, inheriting stdio from the harness. The shell
  /// leads a fresh process group so its descendants can be killed with it.
  fn shell(line: &str) -> Command {
    let mut sh = Command::new("sh");
    sh.arg("-c").arg(line).process_group(0);

    sh
  }

  /// Runs the command to completion, returning an error on non-zero exit, or
  /// `Ok(None)` on timeout.
  fn check_success_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<()>> {
    let mut child = self.spawn().context("spawn")?;

    let Some(status) = child.wait_deadline(timeout)? else {
      return Ok(None);
    };

    status.check_success()?;

    Ok(Some(()))
  }
}

#[cfg(test)]
mod tests {
  use std::{thread, time::Instant};

  use tempfile::TempDir;

  use super::*;

  #[test]
  fn shell_reports_exit_status() {
    assert!(Command::shell("true").check_success_timeout(None).unwrap().is_some());

    let err = Command::shell("exit 3").check_success_timeout(None).unwrap_err();
    assert!(err.to_string().contains("non-zero"), "{err}");
  }

  #[test]
  fn timeout_kills_child() {
    let start = Instant::now();
    let status = Command::shell("sleep 5")
      .check_success_timeout(Some(Duration::from_millis(100)))
      .unwrap();

    assert!(status.is_none());
    assert!(start.elapsed() < Duration::from_secs(4));
  }

  #[test]
  fn timeout_kills_descendants() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("survived");

    let line = format!("(sleep 1; touch {}); true", marker.display());
    let status = Command::shell(&line)
      .check_success_timeout(Some(Duration::from_millis(100)))
      .unwrap();
    assert!(status.is_none());

    thread::sleep(Duration::from_millis(1500));
    assert!(!marker.exists(), "a descendant outlived the timeout");
  }
}

//! Shell commands backing the command-driven adapters.

use std::process::Output;
use std::time::Duration;

/// Run `command` through the platform shell, killing it after `timeout`.
/// Exit status is left for the caller to interpret.
pub(crate) async fn run_shell(command: &str, timeout: Duration) -> Result<Output, String> {
  #[cfg(unix)]
  let mut cmd = {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
  };

  #[cfg(windows)]
  let mut cmd = {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
  };

  cmd.kill_on_drop(true);

  match tokio::time::timeout(timeout, cmd.output()).await {
    Ok(Ok(output)) => Ok(output),
    Ok(Err(e)) => Err(format!("failed to run '{command}': {e}")),
    Err(_) => Err(format!(
      "'{command}' timed out after {}s",
      timeout.as_secs()
    )),
  }
}

/// First line of stdout, trimmed and lowercased
pub(crate) fn first_line(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout)
    .lines()
    .next()
    .unwrap_or_default()
    .trim()
    .to_lowercase()
}

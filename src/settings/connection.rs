//! Connection-control port and the external-command adapter.

use super::error::ConnectionError;
use super::shell::{first_line, run_shell};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

/// State of the VPN connection as reported by the VPN client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
  #[default]
  Disconnected,
  Connecting,
  Connected,
  Disconnecting,
  Reconnecting,
  /// The VPN client could not be queried
  Unknown,
}

impl ConnectionStatus {
  /// Anything but `Disconnected` may have a tunnel built from the active
  /// settings. An unknown status counts as live.
  pub fn is_live(&self) -> bool {
    !matches!(self, ConnectionStatus::Disconnected)
  }
}

impl fmt::Display for ConnectionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      ConnectionStatus::Disconnected => "disconnected",
      ConnectionStatus::Connecting => "connecting",
      ConnectionStatus::Connected => "connected",
      ConnectionStatus::Disconnecting => "disconnecting",
      ConnectionStatus::Reconnecting => "reconnecting",
      ConnectionStatus::Unknown => "unknown",
    };
    f.write_str(label)
  }
}

impl FromStr for ConnectionStatus {
  type Err = ConnectionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "disconnected" | "down" => Ok(ConnectionStatus::Disconnected),
      "connecting" => Ok(ConnectionStatus::Connecting),
      "connected" | "up" => Ok(ConnectionStatus::Connected),
      "disconnecting" => Ok(ConnectionStatus::Disconnecting),
      "reconnecting" => Ok(ConnectionStatus::Reconnecting),
      "unknown" => Ok(ConnectionStatus::Unknown),
      other => Err(ConnectionError::Status(format!(
        "unrecognized status '{other}'"
      ))),
    }
  }
}

/// Control over the running VPN connection
#[async_trait]
pub trait ConnectionControl: Send + Sync {
  /// Current connection status
  fn status(&self) -> ConnectionStatus;

  /// Tear down the connection and bring it back up with the active settings
  async fn reconnect(&self) -> Result<(), ConnectionError>;
}

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const RECONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection control backed by shell commands.
///
/// The status command must print one of the status words (`connected`,
/// `disconnected`, ...) on stdout. The reconnect command signals failure
/// through a non-zero exit code. Status is cached; call [`refresh`] to
/// re-run the status command. Until a refresh succeeds the status is
/// [`ConnectionStatus::Unknown`].
///
/// [`refresh`]: CommandConnectionControl::refresh
pub struct CommandConnectionControl {
  status_command: Option<String>,
  reconnect_command: Option<String>,
  cached_status: Mutex<ConnectionStatus>,
}

impl CommandConnectionControl {
  pub fn new(status_command: Option<String>, reconnect_command: Option<String>) -> Self {
    Self {
      status_command,
      reconnect_command,
      cached_status: Mutex::new(ConnectionStatus::Unknown),
    }
  }

  /// Commands from `VPNPREFS_STATUS_CMD` and `VPNPREFS_RECONNECT_CMD`
  pub fn from_env() -> Self {
    let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
    Self::new(read("VPNPREFS_STATUS_CMD"), read("VPNPREFS_RECONNECT_CMD"))
  }

  /// Re-run the status command and cache its answer.
  /// Without a status command the connection is reported as disconnected.
  /// A failed query caches [`ConnectionStatus::Unknown`].
  pub async fn refresh(&self) -> Result<ConnectionStatus, ConnectionError> {
    let result = self.query_status().await;
    let status = *result.as_ref().unwrap_or(&ConnectionStatus::Unknown);

    *self.cached_status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    log::debug!("Connection status: {status}");
    result
  }

  async fn query_status(&self) -> Result<ConnectionStatus, ConnectionError> {
    let Some(command) = &self.status_command else {
      return Ok(ConnectionStatus::Disconnected);
    };

    let output = run_shell(command, STATUS_TIMEOUT)
      .await
      .map_err(ConnectionError::Command)?;
    if !output.status.success() {
      return Err(ConnectionError::Status(format!(
        "status command exited with {}",
        output.status
      )));
    }
    first_line(&output).parse::<ConnectionStatus>()
  }
}

#[async_trait]
impl ConnectionControl for CommandConnectionControl {
  fn status(&self) -> ConnectionStatus {
    *self.cached_status.lock().unwrap_or_else(|e| e.into_inner())
  }

  async fn reconnect(&self) -> Result<(), ConnectionError> {
    let Some(command) = &self.reconnect_command else {
      return Err(ConnectionError::Reconnect(
        "no reconnect command configured".to_string(),
      ));
    };

    log::info!("Reconnecting VPN");
    let output = run_shell(command, RECONNECT_TIMEOUT)
      .await
      .map_err(ConnectionError::Command)?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ConnectionError::Reconnect(format!(
        "reconnect command exited with {}: {}",
        output.status,
        stderr.trim()
      )));
    }

    if let Err(e) = self.refresh().await {
      log::warn!("Failed to refresh status after reconnect: {e}");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_parsing() {
    assert_eq!(
      "Connected\n".parse::<ConnectionStatus>(),
      Ok(ConnectionStatus::Connected)
    );
    assert_eq!("down".parse::<ConnectionStatus>(), Ok(ConnectionStatus::Disconnected));
    assert!("sideways".parse::<ConnectionStatus>().is_err());
  }

  #[test]
  fn test_is_live() {
    assert!(!ConnectionStatus::Disconnected.is_live());
    assert!(ConnectionStatus::Connected.is_live());
    assert!(ConnectionStatus::Connecting.is_live());
    assert!(ConnectionStatus::Reconnecting.is_live());
    assert!(ConnectionStatus::Unknown.is_live());
  }

  #[tokio::test]
  async fn test_without_commands() {
    let control = CommandConnectionControl::new(None, None);
    assert_eq!(control.refresh().await, Ok(ConnectionStatus::Disconnected));
    assert_eq!(control.status(), ConnectionStatus::Disconnected);
    assert!(matches!(
      control.reconnect().await,
      Err(ConnectionError::Reconnect(_))
    ));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_status_command() {
    let control = CommandConnectionControl::new(Some("echo connected".to_string()), None);
    assert_eq!(control.status(), ConnectionStatus::Unknown);
    assert_eq!(control.refresh().await, Ok(ConnectionStatus::Connected));
    assert_eq!(control.status(), ConnectionStatus::Connected);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_failing_reconnect_command() {
    let control = CommandConnectionControl::new(
      Some("echo connected".to_string()),
      Some("echo boom >&2; exit 3".to_string()),
    );

    let result = control.reconnect().await;
    match result {
      Err(ConnectionError::Reconnect(message)) => assert!(message.contains("boom")),
      other => panic!("Expected reconnect failure, got {other:?}"),
    }
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_successful_reconnect_refreshes_status() {
    let control = CommandConnectionControl::new(
      Some("echo connected".to_string()),
      Some("true".to_string()),
    );

    control.reconnect().await.expect("Reconnect should succeed");
    assert_eq!(control.status(), ConnectionStatus::Connected);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_failed_status_command_is_unknown() {
    let failing = CommandConnectionControl::new(Some("exit 1".to_string()), Some("true".to_string()));
    assert!(matches!(
      failing.refresh().await,
      Err(ConnectionError::Status(_))
    ));
    assert_eq!(failing.status(), ConnectionStatus::Unknown);
    assert!(failing.status().is_live());

    let garbled = CommandConnectionControl::new(Some("echo sideways".to_string()), None);
    assert!(garbled.refresh().await.is_err());
    assert_eq!(garbled.status(), ConnectionStatus::Unknown);
  }
}

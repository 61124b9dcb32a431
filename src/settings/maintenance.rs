//! Maintenance actions offered next to the settings: debug-log submission,
//! content-blocker control and a DNS diagnostic.

use super::error::MaintenanceError;
use super::shell::{first_line, run_shell};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host resolved by the DNS diagnostic. Blocked resolvers answer with nothing
/// or a sinkhole address.
pub const PROBE_HOST: &str = "google-analytics.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLog {
  pub identifier: String,
  pub content: String,
}

/// Uploads the VPN client's debug log.
/// `Ok(None)` means the client had no log to hand over.
#[async_trait]
pub trait LogSubmitter: Send + Sync {
  async fn submit_log(&self) -> Result<Option<DebugLog>, MaintenanceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum DebugLogReport {
  Submitted { identifier: String },
  Empty,
  Failed { reason: String },
}

impl DebugLogReport {
  pub fn message(&self) -> String {
    match self {
      DebugLogReport::Submitted { identifier } => {
        format!("Debug log submitted. Reference this ID when contacting support: {identifier}")
      }
      DebugLogReport::Empty => "The debug log is empty, there is nothing to submit.".to_string(),
      DebugLogReport::Failed { reason } => format!("Could not submit the debug log: {reason}"),
    }
  }
}

pub async fn submit_debug_log(submitter: &dyn LogSubmitter) -> DebugLogReport {
  match submitter.submit_log().await {
    Ok(Some(log)) if log.content.trim().is_empty() => DebugLogReport::Empty,
    Ok(Some(log)) => {
      log::info!("Submitted debug log {}", log.identifier);
      DebugLogReport::Submitted {
        identifier: log.identifier,
      }
    }
    Ok(None) => DebugLogReport::Failed {
      reason: "no log available".to_string(),
    },
    Err(e) => {
      log::error!("Debug log submission failed: {e}");
      DebugLogReport::Failed {
        reason: e.to_string(),
      }
    }
  }
}

/// Submits a local log file by filing a copy under a reports directory
pub struct FileLogSubmitter {
  source: PathBuf,
  reports_dir: PathBuf,
}

impl FileLogSubmitter {
  pub fn new(source: impl Into<PathBuf>, reports_dir: impl Into<PathBuf>) -> Self {
    Self {
      source: source.into(),
      reports_dir: reports_dir.into(),
    }
  }

  pub fn reports_dir(&self) -> &Path {
    &self.reports_dir
  }
}

#[async_trait]
impl LogSubmitter for FileLogSubmitter {
  async fn submit_log(&self) -> Result<Option<DebugLog>, MaintenanceError> {
    if !self.source.exists() {
      return Ok(None);
    }

    let content = tokio::fs::read_to_string(&self.source)
      .await
      .map_err(|e| MaintenanceError::LogSubmission(format!("read {}: {e}", self.source.display())))?;

    let identifier = format!("debug-{}", Utc::now().format("%Y%m%d-%H%M%S%3f"));
    if !content.trim().is_empty() {
      tokio::fs::create_dir_all(&self.reports_dir)
        .await
        .map_err(|e| MaintenanceError::LogSubmission(e.to_string()))?;
      let target = self.reports_dir.join(format!("{identifier}.log"));
      tokio::fs::write(&target, &content)
        .await
        .map_err(|e| MaintenanceError::LogSubmission(format!("write {}: {e}", target.display())))?;
    }

    Ok(Some(DebugLog {
      identifier,
      content,
    }))
  }
}

/// System content blocker (ad/tracker filter list)
#[async_trait]
pub trait ContentBlocker: Send + Sync {
  async fn is_enabled(&self) -> Result<bool, MaintenanceError>;

  async fn reload_rules(&self) -> Result<(), MaintenanceError>;
}

/// Blocker state for display; unknown counts as disabled
pub async fn content_blocker_state(blocker: &dyn ContentBlocker) -> bool {
  match blocker.is_enabled().await {
    Ok(enabled) => enabled,
    Err(e) => {
      log::warn!("Could not read content blocker state: {e}");
      false
    }
  }
}

/// Reload the blocker's rules. Failures are logged and reported as `false`.
pub async fn refresh_content_blocker_rules(blocker: &dyn ContentBlocker) -> bool {
  match blocker.reload_rules().await {
    Ok(()) => {
      log::info!("Content blocker rules reloaded");
      true
    }
    Err(e) => {
      log::error!("Could not reload content blocker: {e}");
      false
    }
  }
}

const BLOCKER_TIMEOUT: Duration = Duration::from_secs(30);

/// Content blocker driven by shell commands.
///
/// The state command prints `enabled` or `disabled` (also `on`/`off`,
/// `true`/`false`). Without a state command the blocker is reported as
/// disabled; without a reload command reloading fails.
pub struct CommandContentBlocker {
  state_command: Option<String>,
  reload_command: Option<String>,
}

impl CommandContentBlocker {
  pub fn new(state_command: Option<String>, reload_command: Option<String>) -> Self {
    Self {
      state_command,
      reload_command,
    }
  }

  /// Commands from `VPNPREFS_BLOCKER_STATE_CMD` and `VPNPREFS_BLOCKER_RELOAD_CMD`
  pub fn from_env() -> Self {
    let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
    Self::new(
      read("VPNPREFS_BLOCKER_STATE_CMD"),
      read("VPNPREFS_BLOCKER_RELOAD_CMD"),
    )
  }
}

#[async_trait]
impl ContentBlocker for CommandContentBlocker {
  async fn is_enabled(&self) -> Result<bool, MaintenanceError> {
    let Some(command) = &self.state_command else {
      return Ok(false);
    };

    let output = run_shell(command, BLOCKER_TIMEOUT)
      .await
      .map_err(MaintenanceError::ContentBlocker)?;
    if !output.status.success() {
      return Err(MaintenanceError::ContentBlocker(format!(
        "state command exited with {}",
        output.status
      )));
    }

    match first_line(&output).as_str() {
      "enabled" | "on" | "true" => Ok(true),
      "disabled" | "off" | "false" => Ok(false),
      other => Err(MaintenanceError::ContentBlocker(format!(
        "unrecognized state '{other}'"
      ))),
    }
  }

  async fn reload_rules(&self) -> Result<(), MaintenanceError> {
    let Some(command) = &self.reload_command else {
      return Err(MaintenanceError::ContentBlocker(
        "no reload command configured".to_string(),
      ));
    };

    let output = run_shell(command, BLOCKER_TIMEOUT)
      .await
      .map_err(MaintenanceError::ContentBlocker)?;
    if output.status.success() {
      Ok(())
    } else {
      let stderr = String::from_utf8_lossy(&output.stderr);
      Err(MaintenanceError::ContentBlocker(format!(
        "reload command exited with {}: {}",
        output.status,
        stderr.trim()
      )))
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsReport {
  pub host: String,
  pub addresses: Vec<IpAddr>,
}

impl DnsReport {
  pub fn resolved(&self) -> bool {
    !self.addresses.is_empty()
  }

  /// Comma-separated addresses, or "Can't resolve"
  pub fn summary(&self) -> String {
    if self.addresses.is_empty() {
      "Can't resolve".to_string()
    } else {
      self
        .addresses
        .iter()
        .map(IpAddr::to_string)
        .collect::<Vec<_>>()
        .join(",")
    }
  }
}

/// Resolve `host` through the system resolver. Lookup errors yield an empty report.
pub async fn resolve_host(host: &str) -> DnsReport {
  let mut addresses: Vec<IpAddr> = Vec::new();

  match tokio::net::lookup_host((host, 0)).await {
    Ok(resolved) => {
      for addr in resolved {
        let ip = addr.ip();
        if !addresses.contains(&ip) {
          addresses.push(ip);
        }
      }
    }
    Err(e) => log::warn!("Failed to resolve {host}: {e}"),
  }

  log::debug!("Resolved {host} to {addresses:?}");
  DnsReport {
    host: host.to_string(),
    addresses,
  }
}

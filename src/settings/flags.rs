//! Feature flags deciding which optional settings are offered.

use super::config::VpnType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Provider of feature availability. Used for visibility and normalization,
/// never for correctness of a commit.
pub trait FeatureFlags: Send + Sync {
  fn enables_protocol_selection(&self) -> bool;

  fn enables_encryption_settings(&self) -> bool;

  fn enables_remote_port_setting(&self) -> bool;

  /// Whether MACE can be toggled for the given protocol
  fn enables_mace(&self, vpn_type: VpnType) -> bool;

  fn enables_reset_settings(&self) -> bool;

  fn enables_development_settings(&self) -> bool;
}

/// Static flag set, loadable from `flags.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
  #[serde(default = "default_true")]
  pub protocol_selection: bool,
  #[serde(default)]
  pub encryption_settings: bool,
  #[serde(default)]
  pub remote_port_setting: bool,
  #[serde(default)]
  pub mace: bool,
  #[serde(default = "default_true")]
  pub reset_settings: bool,
  #[serde(default)]
  pub development_settings: bool,
}

fn default_true() -> bool {
  true
}

impl Default for Flags {
  fn default() -> Self {
    Self {
      protocol_selection: true,
      encryption_settings: false,
      remote_port_setting: false,
      mace: false,
      reset_settings: true,
      development_settings: false,
    }
  }
}

impl Flags {
  /// Every optional setting enabled
  pub fn all() -> Self {
    Self {
      protocol_selection: true,
      encryption_settings: true,
      remote_port_setting: true,
      mace: true,
      reset_settings: true,
      development_settings: true,
    }
  }

  /// Load flags from the default location
  pub fn load() -> Self {
    Self::load_from(&crate::app_dirs::flags_file())
  }

  /// Load flags from a file; missing or unreadable files yield defaults
  pub fn load_from(path: &Path) -> Self {
    if !path.exists() {
      return Self::default();
    }

    match fs::read_to_string(path) {
      Ok(content) => match serde_json::from_str::<Flags>(&content) {
        Ok(flags) => flags,
        Err(e) => {
          log::warn!("Failed to parse flags file, using defaults: {e}");
          Self::default()
        }
      },
      Err(e) => {
        log::warn!("Failed to read flags file {}: {e}", path.display());
        Self::default()
      }
    }
  }
}

impl FeatureFlags for Flags {
  fn enables_protocol_selection(&self) -> bool {
    self.protocol_selection
  }

  fn enables_encryption_settings(&self) -> bool {
    self.encryption_settings
  }

  fn enables_remote_port_setting(&self) -> bool {
    self.remote_port_setting
  }

  fn enables_mace(&self, vpn_type: VpnType) -> bool {
    // Only offered for IPSec
    self.mace && vpn_type == VpnType::IpSec
  }

  fn enables_reset_settings(&self) -> bool {
    self.reset_settings
  }

  fn enables_development_settings(&self) -> bool {
    self.development_settings
  }
}

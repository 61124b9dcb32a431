//! Classification of a draft into the connection action it requires.

use super::config::Configuration;
use super::connection::ConnectionStatus;
use super::flags::FeatureFlags;
use serde::{Deserialize, Serialize};

/// What applying a draft does to a running connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PendingAction {
  #[default]
  None,
  OptionalReconnect,
  MandatoryReconnect,
}

/// Field groups that differ between two configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Changes {
  pub vpn_type: bool,
  pub socket_protocol: bool,
  pub preferred_port: bool,
  pub encryption: bool,
  pub persistent_connection: bool,
  pub mace: bool,
  pub preferred_server: bool,
}

impl Changes {
  /// Theme is ignored: it is never part of a pending commit
  pub fn between(active: &Configuration, draft: &Configuration) -> Self {
    Self {
      vpn_type: active.vpn_type != draft.vpn_type,
      socket_protocol: active.socket_protocol != draft.socket_protocol,
      preferred_port: active.preferred_port != draft.preferred_port,
      encryption: active.tunnel != draft.tunnel,
      persistent_connection: active.is_persistent_connection != draft.is_persistent_connection,
      mace: active.mace_enabled != draft.mace_enabled,
      preferred_server: active.preferred_server != draft.preferred_server,
    }
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// A parameter the VPN is built from changed, whether or not it is in use
  pub fn affects_connection(&self) -> bool {
    self.vpn_type || self.socket_protocol || self.preferred_port || self.encryption
  }

  /// A parameter of the tunnel running with `active` changed.
  /// Port, socket and encryption only matter while the tunnel protocol is active.
  pub fn affects_running_tunnel(&self, active: &Configuration) -> bool {
    self.vpn_type
      || (active.uses_tunnel() && (self.socket_protocol || self.preferred_port || self.encryption))
  }

  /// Settings that take effect without a reconnect
  pub fn affects_behavior(&self) -> bool {
    self.persistent_connection || self.mace
  }
}

/// Clear MACE when the feature is unavailable for the draft's protocol and
/// development settings are off. Runs before classification and before commit.
pub fn normalize(draft: &Configuration, flags: &dyn FeatureFlags) -> Configuration {
  let mut normalized = draft.clone();
  if normalized.mace_enabled
    && !flags.enables_mace(normalized.vpn_type)
    && !flags.enables_development_settings()
  {
    log::info!(
      "MACE not available for {}, clearing it",
      normalized.vpn_type
    );
    normalized.mace_enabled = false;
  }
  normalized
}

/// Action needed to apply `draft` over `active` given the connection status.
///
/// Precedence: a change to a parameter of the running tunnel requires a
/// reconnect; otherwise behavioural changes suggest one; nothing is needed
/// while disconnected.
pub fn classify(
  active: &Configuration,
  draft: &Configuration,
  status: ConnectionStatus,
) -> PendingAction {
  let changes = Changes::between(active, draft);
  if changes.is_empty() || !status.is_live() {
    return PendingAction::None;
  }

  if changes.affects_running_tunnel(active) {
    PendingAction::MandatoryReconnect
  } else if changes.affects_behavior() {
    PendingAction::OptionalReconnect
  } else {
    PendingAction::None
  }
}

/// Normalize, then classify
pub fn pending_action(
  active: &Configuration,
  draft: &Configuration,
  status: ConnectionStatus,
  flags: &dyn FeatureFlags,
) -> PendingAction {
  classify(active, &normalize(draft, flags), status)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::config::{Cipher, Digest, Handshake, ThemeCode, VpnType};
  use crate::settings::flags::Flags;

  const ALL_STATUSES: [ConnectionStatus; 6] = [
    ConnectionStatus::Disconnected,
    ConnectionStatus::Connecting,
    ConnectionStatus::Connected,
    ConnectionStatus::Disconnecting,
    ConnectionStatus::Reconnecting,
    ConnectionStatus::Unknown,
  ];

  fn tunnel_config() -> Configuration {
    Configuration {
      vpn_type: VpnType::Tunnel,
      ..Configuration::default()
    }
  }

  #[test]
  fn test_identical_configs_need_nothing() {
    let configs = [Configuration::default(), tunnel_config()];
    for config in &configs {
      for status in ALL_STATUSES {
        assert_eq!(
          classify(config, &config.clone(), status),
          PendingAction::None,
          "Equal configs must classify as None for {status}"
        );
      }
    }
  }

  #[test]
  fn test_connection_changes_while_connected_are_mandatory() {
    let active = tunnel_config();
    let edits: Vec<Box<dyn Fn(&mut Configuration)>> = vec![
      Box::new(|c| c.vpn_type = VpnType::IpSec),
      Box::new(|c| c.preferred_port = Some(1194)),
      Box::new(|c| c.tunnel.cipher = Cipher::Aes256Cbc),
      Box::new(|c| c.tunnel.digest = Digest::Sha256),
      Box::new(|c| c.tunnel.handshake = Handshake::Ecc256r1),
    ];

    for edit in edits {
      let mut draft = active.clone();
      edit(&mut draft);
      assert_eq!(
        classify(&active, &draft, ConnectionStatus::Connected),
        PendingAction::MandatoryReconnect,
        "Draft {draft:?} should require a reconnect"
      );
    }
  }

  #[test]
  fn test_protocol_switch_from_ipsec_is_mandatory() {
    let active = Configuration::default();
    let draft = tunnel_config();
    assert_eq!(
      classify(&active, &draft, ConnectionStatus::Connected),
      PendingAction::MandatoryReconnect
    );
  }

  #[test]
  fn test_behavior_changes_while_connected_are_optional() {
    let active = Configuration::default();

    let mut persistent = active.clone();
    persistent.is_persistent_connection = !active.is_persistent_connection;
    assert_eq!(
      classify(&active, &persistent, ConnectionStatus::Connected),
      PendingAction::OptionalReconnect
    );

    let mut mace = active.clone();
    mace.mace_enabled = true;
    assert_eq!(
      classify(&active, &mace, ConnectionStatus::Connected),
      PendingAction::OptionalReconnect
    );
  }

  #[test]
  fn test_anything_while_disconnected_needs_nothing() {
    let active = tunnel_config();
    let mut draft = active.clone();
    draft.vpn_type = VpnType::IpSec;
    draft.preferred_port = Some(53);
    draft.is_persistent_connection = false;

    assert_eq!(
      classify(&active, &draft, ConnectionStatus::Disconnected),
      PendingAction::None
    );
  }

  #[test]
  fn test_mandatory_wins_over_optional() {
    let active = Configuration::default();
    let mut draft = tunnel_config();
    draft.is_persistent_connection = false;

    assert_eq!(
      classify(&active, &draft, ConnectionStatus::Connected),
      PendingAction::MandatoryReconnect
    );
  }

  #[test]
  fn test_unused_tunnel_parameters_are_inert_under_ipsec() {
    let active = Configuration::default();
    let mut draft = active.clone();
    draft.tunnel.cipher = Cipher::Aes256Cbc;
    draft.preferred_port = Some(8080);

    let changes = Changes::between(&active, &draft);
    assert!(changes.affects_connection());
    assert!(!changes.affects_running_tunnel(&active));
    assert_eq!(
      classify(&active, &draft, ConnectionStatus::Connected),
      PendingAction::None
    );
  }

  #[test]
  fn test_ui_only_changes_need_nothing() {
    let active = Configuration::default();
    let draft = Configuration {
      theme: ThemeCode::Dark,
      preferred_server: Some("nl-amsterdam".to_string()),
      ..active.clone()
    };

    assert_eq!(
      classify(&active, &draft, ConnectionStatus::Connected),
      PendingAction::None
    );
  }

  #[test]
  fn test_normalize_clears_unavailable_mace() {
    let draft = Configuration {
      mace_enabled: true,
      ..Configuration::default()
    };

    assert!(!normalize(&draft, &Flags::default()).mace_enabled);

    let mace_flags = Flags {
      mace: true,
      ..Flags::default()
    };
    assert!(normalize(&draft, &mace_flags).mace_enabled);

    let dev_flags = Flags {
      development_settings: true,
      ..Flags::default()
    };
    assert!(normalize(&draft, &dev_flags).mace_enabled);
  }

  #[test]
  fn test_normalization_runs_before_classification() {
    let active = Configuration::default();
    let draft = Configuration {
      mace_enabled: true,
      ..active.clone()
    };

    assert_eq!(
      pending_action(&active, &draft, ConnectionStatus::Connected, &Flags::default()),
      PendingAction::None,
      "A MACE toggle that normalization clears must not prompt"
    );
  }
}

//! Configuration types for VPN and application preferences.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a setting value cannot be parsed from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseSettingError {
  pub kind: &'static str,
  pub value: String,
}

impl ParseSettingError {
  fn new(kind: &'static str, value: &str) -> Self {
    Self {
      kind,
      value: value.to_string(),
    }
  }
}

/// Implements `Display`, `FromStr` and an `ALL` listing for a settings enum.
/// The first string is the stable key (used in storage and on the command
/// line), the second is the label shown to users.
macro_rules! setting_enum {
  ($name:ident, $kind:literal, { $($variant:ident => ($key:literal, $label:literal)),+ $(,)? }) => {
    impl $name {
      pub const ALL: &'static [$name] = &[$($name::$variant),+];

      pub fn key(&self) -> &'static str {
        match self {
          $($name::$variant => $key),+
        }
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
          $($name::$variant => f.write_str($label)),+
        }
      }
    }

    impl FromStr for $name {
      type Err = ParseSettingError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        $(
          if normalized == $key {
            return Ok($name::$variant);
          }
        )+
        Err(ParseSettingError::new($kind, s))
      }
    }
  };
}

/// VPN protocol used to establish the tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VpnType {
  #[default]
  #[serde(rename = "ipsec")]
  IpSec,
  Tunnel,
}

setting_enum!(VpnType, "VPN protocol", {
  IpSec => ("ipsec", "IPSec"),
  Tunnel => ("tunnel", "OpenVPN"),
});

/// Transport used by the tunnel protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocketProtocol {
  #[default]
  Udp,
  Tcp,
}

setting_enum!(SocketProtocol, "socket protocol", {
  Udp => ("udp", "UDP"),
  Tcp => ("tcp", "TCP"),
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cipher {
  #[default]
  #[serde(rename = "aes-128-cbc")]
  Aes128Cbc,
  #[serde(rename = "aes-256-cbc")]
  Aes256Cbc,
}

setting_enum!(Cipher, "cipher", {
  Aes128Cbc => ("aes-128-cbc", "AES-128-CBC"),
  Aes256Cbc => ("aes-256-cbc", "AES-256-CBC"),
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Digest {
  #[default]
  Sha1,
  Sha256,
}

setting_enum!(Digest, "digest", {
  Sha1 => ("sha1", "SHA1"),
  Sha256 => ("sha256", "SHA256"),
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handshake {
  #[default]
  Rsa2048,
  Rsa3072,
  Rsa4096,
  Ecc256r1,
  Ecc521r1,
}

setting_enum!(Handshake, "handshake", {
  Rsa2048 => ("rsa2048", "RSA-2048"),
  Rsa3072 => ("rsa3072", "RSA-3072"),
  Rsa4096 => ("rsa4096", "RSA-4096"),
  Ecc256r1 => ("ecc256r1", "ECC-256r1"),
  Ecc521r1 => ("ecc521r1", "ECC-521r1"),
});

/// UI theme. Applied immediately, never part of a pending commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeCode {
  #[default]
  Light,
  Dark,
}

setting_enum!(ThemeCode, "theme", {
  Light => ("light", "Light"),
  Dark => ("dark", "Dark"),
});

/// Encryption parameters of the tunnel protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TunnelSettings {
  #[serde(default)]
  pub cipher: Cipher,
  #[serde(default)]
  pub digest: Digest,
  #[serde(default)]
  pub handshake: Handshake,
}

/// User-controllable VPN and application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
  #[serde(default)]
  pub vpn_type: VpnType,
  #[serde(default)]
  pub socket_protocol: SocketProtocol,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub preferred_port: Option<u16>, // None means automatic
  #[serde(default)]
  pub tunnel: TunnelSettings,
  #[serde(default = "default_persistent_connection")]
  pub is_persistent_connection: bool,
  #[serde(default)]
  pub mace_enabled: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub preferred_server: Option<String>,
  #[serde(default)]
  pub theme: ThemeCode,
}

fn default_persistent_connection() -> bool {
  true
}

impl Default for Configuration {
  fn default() -> Self {
    Self {
      vpn_type: VpnType::default(),
      socket_protocol: SocketProtocol::default(),
      preferred_port: None,
      tunnel: TunnelSettings::default(),
      is_persistent_connection: default_persistent_connection(),
      mace_enabled: false,
      preferred_server: None,
      theme: ThemeCode::default(),
    }
  }
}

impl Configuration {
  /// Defaults for every setting except the preferred server
  pub fn reset(&mut self) {
    let preferred_server = self.preferred_server.take();
    *self = Self {
      preferred_server,
      ..Self::default()
    };
  }

  pub fn uses_tunnel(&self) -> bool {
    self.vpn_type == VpnType::Tunnel
  }

  /// Port shown to users, "Automatic" when unset
  pub fn port_description(&self) -> String {
    match self.preferred_port {
      Some(port) => port.to_string(),
      None => "Automatic".to_string(),
    }
  }
}

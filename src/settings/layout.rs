//! Which settings sections and rows are shown for a draft.

use super::config::{Cipher, Configuration, Digest, Handshake, SocketProtocol, ThemeCode, VpnType};
use super::flags::FeatureFlags;
use serde::Serialize;
use std::fmt;

/// Ports offered for the tunnel protocol when the server list is unknown
pub const DEFAULT_TUNNEL_PORTS: &[u16] = &[8080, 853, 123, 53, 1194, 1197, 1198, 9201];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
  Connection,
  Encryption,
  ApplicationSettings,
  ContentBlocker,
  ApplicationInformation,
  Reset,
  Development,
}

impl Section {
  pub fn title(&self) -> &'static str {
    match self {
      Section::Connection => "Connection",
      Section::Encryption => "Encryption",
      Section::ApplicationSettings => "Application settings",
      Section::ContentBlocker => "Content blocker",
      Section::ApplicationInformation => "Application information",
      Section::Reset => "Reset",
      Section::Development => "Development",
    }
  }
}

/// A row and the value it displays. `selectable` rows open an option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "row", rename_all = "kebab-case")]
pub enum Row {
  VpnProtocol { current: VpnType, selectable: bool },
  SocketProtocol { current: SocketProtocol },
  RemotePort { port: Option<u16>, selectable: bool },
  Cipher { current: Cipher, selectable: bool },
  Digest { current: Digest, selectable: bool },
  Handshake { current: Handshake, selectable: bool },
  AutomaticReconnection { enabled: bool },
  DarkTheme { enabled: bool },
  Mace { enabled: bool },
  ContentBlockerState { enabled: bool },
  ContentBlockerRefreshRules,
  SendDebugLog,
  ResetSettings,
  ResolveProbeDomain,
}

impl Row {
  pub fn title(&self) -> &'static str {
    match self {
      Row::VpnProtocol { .. } => "Protocol selection",
      Row::SocketProtocol { .. } => "Socket",
      Row::RemotePort { .. } => "Remote port",
      Row::Cipher { .. } => "Data encryption",
      Row::Digest { .. } => "Data authentication",
      Row::Handshake { .. } => "Handshake",
      Row::AutomaticReconnection { .. } => "VPN kill switch",
      Row::DarkTheme { .. } => "Dark theme",
      Row::Mace { .. } => "MACE",
      Row::ContentBlockerState { .. } => "Content blocker state",
      Row::ContentBlockerRefreshRules => "Refresh block list",
      Row::SendDebugLog => "Send debug log to support",
      Row::ResetSettings => "Reset settings to default",
      Row::ResolveProbeDomain => "Resolve google-analytics.com",
    }
  }

  /// Value shown next to the title, if any
  pub fn detail(&self) -> Option<String> {
    match self {
      Row::VpnProtocol { current, .. } => Some(current.to_string()),
      Row::SocketProtocol { current } => Some(current.to_string()),
      Row::RemotePort { port, .. } => Some(port_label(*port)),
      Row::Cipher { current, .. } => Some(current.to_string()),
      Row::Digest { current, .. } => Some(current.to_string()),
      Row::Handshake { current, .. } => Some(current.to_string()),
      Row::AutomaticReconnection { enabled }
      | Row::DarkTheme { enabled }
      | Row::Mace { enabled }
      | Row::ContentBlockerState { enabled } => Some(on_off(*enabled).to_string()),
      Row::ContentBlockerRefreshRules
      | Row::SendDebugLog
      | Row::ResetSettings
      | Row::ResolveProbeDomain => None,
    }
  }
}

impl Row {
  /// Choices offered by a selectable row, as keys accepted on input
  pub fn options(&self) -> Vec<String> {
    match self {
      Row::VpnProtocol {
        selectable: true, ..
      } => keys(protocol_options(), VpnType::key),
      Row::RemotePort {
        selectable: true, ..
      } => port_options(DEFAULT_TUNNEL_PORTS)
        .iter()
        .map(u16::to_string)
        .collect(),
      Row::Cipher {
        selectable: true, ..
      } => keys(cipher_options(), Cipher::key),
      Row::Digest {
        selectable: true, ..
      } => keys(digest_options(), Digest::key),
      Row::Handshake {
        selectable: true, ..
      } => keys(handshake_options(), Handshake::key),
      _ => Vec::new(),
    }
  }
}

fn keys<T>(values: &[T], key: fn(&T) -> &'static str) -> Vec<String> {
  values.iter().map(|v| key(v).to_string()).collect()
}

impl fmt::Display for Row {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.detail() {
      Some(detail) => write!(f, "{}: {detail}", self.title()),
      None => f.write_str(self.title()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Footnote {
  PersistentDisabled,
  Mace,
  ContentBlocker,
}

impl Footnote {
  pub fn text(&self) -> &'static str {
    match self {
      Footnote::PersistentDisabled => {
        "The VPN will not reconnect automatically and traffic may leave the tunnel when the connection drops."
      }
      Footnote::Mace => "MACE blocks ads, trackers and malware domains while connected.",
      Footnote::ContentBlocker => {
        "Enable the content blocker in the browser's settings to block ads and trackers."
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionLayout {
  pub section: Section,
  pub rows: Vec<Row>,
  pub footnotes: Vec<Footnote>,
}

/// Visible sections for the draft under the current flags.
///
/// Rows show draft values except the theme, which is always the active one
/// (the draft mirrors it).
pub fn build_layout(
  draft: &Configuration,
  flags: &dyn FeatureFlags,
  content_blocker_enabled: bool,
) -> Vec<SectionLayout> {
  let mace_offered = flags.enables_mace(draft.vpn_type);
  let mut sections = Vec::new();

  if flags.enables_protocol_selection() {
    let mut rows = vec![Row::VpnProtocol {
      current: draft.vpn_type,
      selectable: true,
    }];
    if draft.uses_tunnel() {
      rows.push(Row::SocketProtocol {
        current: draft.socket_protocol,
      });
      rows.push(Row::RemotePort {
        port: draft.preferred_port,
        selectable: flags.enables_remote_port_setting(),
      });
    }
    sections.push(section(Section::Connection, rows, Vec::new()));

    if draft.vpn_type != VpnType::IpSec {
      let selectable = flags.enables_encryption_settings();
      sections.push(section(
        Section::Encryption,
        vec![
          Row::Cipher {
            current: draft.tunnel.cipher,
            selectable,
          },
          Row::Digest {
            current: draft.tunnel.digest,
            selectable,
          },
          Row::Handshake {
            current: draft.tunnel.handshake,
            selectable,
          },
        ],
        Vec::new(),
      ));
    }
  }

  let mut app_rows = vec![
    Row::AutomaticReconnection {
      enabled: draft.is_persistent_connection,
    },
    Row::DarkTheme {
      enabled: draft.theme == ThemeCode::Dark,
    },
  ];
  let mut app_notes = Vec::new();
  if !draft.is_persistent_connection {
    app_notes.push(Footnote::PersistentDisabled);
  }
  if mace_offered {
    app_rows.push(Row::Mace {
      enabled: draft.mace_enabled,
    });
    app_notes.push(Footnote::Mace);
  }
  sections.push(section(Section::ApplicationSettings, app_rows, app_notes));

  // MACE replaces the content blocker
  if !mace_offered {
    sections.push(section(
      Section::ContentBlocker,
      vec![
        Row::ContentBlockerState {
          enabled: content_blocker_enabled,
        },
        Row::ContentBlockerRefreshRules,
      ],
      vec![Footnote::ContentBlocker],
    ));
  }

  if draft.uses_tunnel() {
    sections.push(section(
      Section::ApplicationInformation,
      vec![Row::SendDebugLog],
      Vec::new(),
    ));
  }

  if flags.enables_reset_settings() {
    sections.push(section(Section::Reset, vec![Row::ResetSettings], Vec::new()));
  }

  if flags.enables_development_settings() {
    sections.push(section(
      Section::Development,
      vec![
        Row::Mace {
          enabled: draft.mace_enabled,
        },
        Row::ResolveProbeDomain,
      ],
      Vec::new(),
    ));
  }

  sections
}

fn section(section: Section, rows: Vec<Row>, footnotes: Vec<Footnote>) -> SectionLayout {
  SectionLayout {
    section,
    rows,
    footnotes,
  }
}

/// Port choices with automatic (`0`) first
pub fn port_options(available: &[u16]) -> Vec<u16> {
  let mut options = vec![0];
  for port in available {
    if *port > 0 && !options.contains(port) {
      options.push(*port);
    }
  }
  options
}

pub fn port_label(port: Option<u16>) -> String {
  match port {
    Some(port) if port > 0 => port.to_string(),
    _ => "Automatic".to_string(),
  }
}

pub fn protocol_options() -> &'static [VpnType] {
  VpnType::ALL
}

pub fn cipher_options() -> &'static [Cipher] {
  Cipher::ALL
}

pub fn digest_options() -> &'static [Digest] {
  Digest::ALL
}

pub fn handshake_options() -> &'static [Handshake] {
  Handshake::ALL
}

fn on_off(enabled: bool) -> &'static str {
  if enabled {
    "on"
  } else {
    "off"
  }
}

//! VPN preference engine.
//!
//! This module provides:
//! - The configuration model and its durable JSON storage
//! - A preference store with a single draft edit session
//! - Classification of a draft into the reconnect it requires
//! - A commit coordinator that confirms, persists and reconnects
//! - The settings layout and maintenance actions shown next to it

mod classifier;
mod config;
mod confirm;
mod connection;
mod coordinator;
mod error;
mod flags;
mod layout;
mod maintenance;
mod shell;
mod storage;
mod store;

pub use classifier::{classify, normalize, pending_action, Changes, PendingAction};
pub use config::{
  Cipher, Configuration, Digest, Handshake, ParseSettingError, SocketProtocol, ThemeCode,
  TunnelSettings, VpnType,
};
pub use confirm::{AutoConfirmation, Choice, ConfirmationSurface, Prompt, PromptKind};
pub use connection::{CommandConnectionControl, ConnectionControl, ConnectionStatus};
pub use coordinator::{CommitCoordinator, CommitOutcome, CommitPhase, OutcomeKind};
pub use error::{ConnectionError, MaintenanceError, SettingsError, StorageError};
pub use flags::{FeatureFlags, Flags};
pub use layout::{
  build_layout, cipher_options, digest_options, handshake_options, port_label, port_options,
  protocol_options, Footnote, Row, Section, SectionLayout, DEFAULT_TUNNEL_PORTS,
};
pub use maintenance::{
  content_blocker_state, refresh_content_blocker_rules, resolve_host, submit_debug_log,
  CommandContentBlocker, ContentBlocker, DebugLog, DebugLogReport, DnsReport, FileLogSubmitter, LogSubmitter, PROBE_HOST,
};
pub use storage::{ConfigStorage, JsonFileStorage, MemoryStorage};
pub use store::{DraftHandle, PreferenceStore};

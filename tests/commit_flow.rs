//! End-to-end commit flows against on-disk preferences.

mod common;

use common::{MockConnection, ScriptedConfirmation};
use std::sync::Arc;
use tempfile::TempDir;
use vpnprefs_lib::events::{self, BroadcastEmitter};
use vpnprefs_lib::settings::{
  Choice, Cipher, CommitCoordinator, CommitOutcome, ConfigStorage, Configuration,
  ConnectionError, ConnectionStatus, Flags, JsonFileStorage, MemoryStorage, PendingAction,
  PreferenceStore, PromptKind, SettingsError, ThemeCode, VpnType,
};

struct Setup {
  _temp_dir: TempDir,
  storage: Arc<JsonFileStorage>,
  store: Arc<PreferenceStore>,
  connection: Arc<MockConnection>,
  confirmation: Arc<ScriptedConfirmation>,
  coordinator: CommitCoordinator,
}

fn setup(initial: Configuration, status: ConnectionStatus, answers: Vec<Option<Choice>>) -> Setup {
  let temp_dir = TempDir::new().expect("Failed to create temp directory");
  let storage = Arc::new(JsonFileStorage::with_dir(temp_dir.path()));
  storage.save(&initial).expect("Should seed preferences");

  let store = Arc::new(PreferenceStore::open(storage.clone()).expect("Should open store"));
  let connection = Arc::new(MockConnection::new(status));
  let confirmation = Arc::new(ScriptedConfirmation::new(answers));
  let coordinator = CommitCoordinator::new(
    store.clone(),
    connection.clone(),
    confirmation.clone(),
    Arc::new(Flags::default()),
  );

  Setup {
    _temp_dir: temp_dir,
    storage,
    store,
    connection,
    confirmation,
    coordinator,
  }
}

fn tunnel() -> Configuration {
  Configuration {
    vpn_type: VpnType::Tunnel,
    ..Configuration::default()
  }
}

#[tokio::test]
async fn test_protocol_switch_while_disconnected_persists_without_prompt() {
  let s = setup(tunnel(), ConnectionStatus::Disconnected, vec![]);
  let draft = s.store.begin_edit().expect("Should open session");
  draft.set_vpn_type(VpnType::IpSec);

  let outcome = s.coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  assert_eq!(outcome, CommitOutcome::Applied);
  assert!(s.confirmation.prompts().is_empty());
  assert_eq!(s.connection.reconnects(), 0);
  assert_eq!(
    s.storage.load().expect("Should reload").vpn_type,
    VpnType::IpSec,
    "Change should be on disk"
  );
}

#[tokio::test]
async fn test_connected_port_change_cancelled_leaves_disk_untouched() {
  let s = setup(tunnel(), ConnectionStatus::Connected, vec![Some(Choice::Cancel)]);
  let draft = s.store.begin_edit().expect("Should open session");
  draft.set_preferred_port(1194);
  assert_eq!(
    s.coordinator.pending_action(&draft),
    PendingAction::MandatoryReconnect
  );

  let outcome = s.coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  assert_eq!(outcome, CommitOutcome::Cancelled);
  assert_eq!(s.storage.load().expect("Should reload"), tunnel());
  assert_eq!(draft.snapshot().preferred_port, None, "Draft should be reverted");

  let prompts = s.confirmation.prompts();
  assert_eq!(prompts.len(), 1);
  assert_eq!(prompts[0].kind, PromptKind::MustReconnect);
}

#[tokio::test]
async fn test_connected_port_change_confirmed_reconnects_after_save() {
  let s = setup(tunnel(), ConnectionStatus::Connected, vec![Some(Choice::ReconnectNow)]);
  let draft = s.store.begin_edit().expect("Should open session");
  draft.set_preferred_port(1194);

  let outcome = s.coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  assert_eq!(outcome, CommitOutcome::AppliedAndReconnected);
  assert_eq!(s.connection.reconnects(), 1);
  assert_eq!(s.storage.load().expect("Should reload").preferred_port, Some(1194));
}

#[tokio::test]
async fn test_reconnect_failure_is_reported_not_rolled_back() {
  let s = setup(tunnel(), ConnectionStatus::Connected, vec![Some(Choice::ReconnectNow)]);
  let error = ConnectionError::Reconnect("server unreachable".to_string());
  s.connection.fail_reconnects(error.clone());

  let draft = s.store.begin_edit().expect("Should open session");
  draft.set_cipher(Cipher::Aes256Cbc);

  let outcome = s.coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  assert_eq!(outcome, CommitOutcome::AppliedButReconnectFailed(error));
  assert_eq!(
    s.storage.load().expect("Should reload").tunnel.cipher,
    Cipher::Aes256Cbc
  );
  assert_eq!(s.connection.reconnects(), 1);
}

#[tokio::test]
async fn test_persistence_toggle_saved_before_optional_prompt() {
  let s = setup(Configuration::default(), ConnectionStatus::Connected, vec![None]);
  let draft = s.store.begin_edit().expect("Should open session");
  draft.set_persistent_connection(false);

  let outcome = s.coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  assert_eq!(outcome, CommitOutcome::Applied, "Dismissing the prompt keeps the save");
  assert!(!s.storage.load().expect("Should reload").is_persistent_connection);
  assert_eq!(s.connection.reconnects(), 0);
  assert_eq!(s.confirmation.prompts()[0].kind, PromptKind::ShouldReconnect);
}

#[tokio::test]
async fn test_status_is_read_at_commit_time() {
  let s = setup(tunnel(), ConnectionStatus::Disconnected, vec![Some(Choice::Cancel)]);
  let draft = s.store.begin_edit().expect("Should open session");
  draft.set_preferred_port(53);
  assert_eq!(s.coordinator.pending_action(&draft), PendingAction::None);

  s.connection.set_status(ConnectionStatus::Connecting);
  let outcome = s.coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  assert_eq!(outcome, CommitOutcome::Cancelled);
}

#[tokio::test]
async fn test_reset_keeps_server_and_restores_light_theme() {
  let initial = Configuration {
    vpn_type: VpnType::Tunnel,
    preferred_port: Some(8080),
    preferred_server: Some("de-frankfurt".to_string()),
    theme: ThemeCode::Dark,
    ..Configuration::default()
  };
  let s = setup(initial, ConnectionStatus::Disconnected, vec![]);

  let draft = s.store.begin_edit().expect("Should open session");
  assert!(draft.reset_to_defaults().expect("Reset should succeed"));
  assert_eq!(
    s.store.current_snapshot().theme,
    ThemeCode::Light,
    "Theme applies before the commit"
  );

  s.coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  let saved = s.storage.load().expect("Should reload");
  assert_eq!(saved.vpn_type, VpnType::IpSec);
  assert_eq!(saved.preferred_port, None);
  assert_eq!(saved.preferred_server.as_deref(), Some("de-frankfurt"));
  assert_eq!(saved.theme, ThemeCode::Light);
}

#[tokio::test]
async fn test_theme_change_does_not_enter_commit() {
  let s = setup(tunnel(), ConnectionStatus::Connected, vec![]);
  let draft = s.store.begin_edit().expect("Should open session");

  assert!(s.store.set_theme(ThemeCode::Dark).expect("Theme should apply"));
  assert!(!s.store.set_theme(ThemeCode::Dark).expect("Same theme is a no-op"));

  assert!(!draft.has_changes());
  assert_eq!(s.coordinator.pending_action(&draft), PendingAction::None);
  assert_eq!(s.storage.load().expect("Should reload").theme, ThemeCode::Dark);
}

#[tokio::test]
async fn test_failed_save_keeps_draft_for_retry() {
  let storage = Arc::new(MemoryStorage::with_configuration(tunnel()));
  let store = Arc::new(PreferenceStore::open(storage.clone()).expect("Should open store"));
  let connection = Arc::new(MockConnection::new(ConnectionStatus::Disconnected));
  let coordinator = CommitCoordinator::new(
    store.clone(),
    connection.clone(),
    Arc::new(ScriptedConfirmation::new(vec![])),
    Arc::new(Flags::default()),
  );

  let draft = store.begin_edit().expect("Should open session");
  draft.set_preferred_port(9201);
  storage.set_failure(Some("read-only volume"));

  let result = coordinator.commit_changes(&draft).await;
  assert!(matches!(result, Err(SettingsError::Storage(_))));
  assert_eq!(store.current_snapshot().preferred_port, None);

  storage.set_failure(None);
  let outcome = coordinator.commit_changes(&draft).await.expect("Retry should succeed");
  assert_eq!(outcome, CommitOutcome::Applied);
  assert_eq!(store.current_snapshot().preferred_port, Some(9201));
}

#[tokio::test]
async fn test_second_session_rejected_until_first_ends() {
  let s = setup(Configuration::default(), ConnectionStatus::Disconnected, vec![]);
  let draft = s.store.begin_edit().expect("Should open session");

  assert!(matches!(
    s.store.begin_edit(),
    Err(SettingsError::PreconditionViolation(_))
  ));

  draft.discard().expect("Should discard");
  assert!(s.store.begin_edit().is_ok());
}

#[tokio::test]
async fn test_outcome_event_reaches_subscribers() {
  let s = setup(tunnel(), ConnectionStatus::Connected, vec![Some(Choice::ReconnectNow)]);
  let (emitter, mut rx) = BroadcastEmitter::with_capacity(32);
  let coordinator = CommitCoordinator::new(
    s.store.clone(),
    s.connection.clone(),
    s.confirmation.clone(),
    Arc::new(Flags::default()),
  )
  .with_emitter(Arc::new(emitter));

  let draft = s.store.begin_edit().expect("Should open session");
  draft.set_vpn_type(VpnType::IpSec);
  coordinator.commit_changes(&draft).await.expect("Commit should succeed");

  let mut outcome = None;
  while let Ok(event) = rx.try_recv() {
    if event.event_type == events::SETTINGS_COMMITTED {
      outcome = Some(event.payload["outcome"].clone());
    }
  }
  assert_eq!(outcome, Some(serde_json::json!("applied-and-reconnected")));
}

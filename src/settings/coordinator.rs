//! Commit coordinator: turns a draft into an applied configuration,
//! prompting and reconnecting when the running connection requires it.

use super::classifier::{classify, normalize, PendingAction};
use super::confirm::{Choice, ConfirmationSurface, Prompt};
use super::connection::ConnectionControl;
use super::config::Configuration;
use super::error::{ConnectionError, SettingsError};
use super::flags::FeatureFlags;
use super::store::{DraftHandle, PreferenceStore};
use crate::events::{self, EventEmitter};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// How a commit ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
  Applied,
  AppliedAndReconnected,
  /// The configuration was saved but the reconnect did not go through
  AppliedButReconnectFailed(ConnectionError),
  Cancelled,
}

impl CommitOutcome {
  pub fn kind(&self) -> OutcomeKind {
    match self {
      CommitOutcome::Applied => OutcomeKind::Applied,
      CommitOutcome::AppliedAndReconnected => OutcomeKind::AppliedAndReconnected,
      CommitOutcome::AppliedButReconnectFailed(_) => OutcomeKind::AppliedButReconnectFailed,
      CommitOutcome::Cancelled => OutcomeKind::Cancelled,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
  Applied,
  AppliedAndReconnected,
  AppliedButReconnectFailed,
  Cancelled,
}

/// Progress of the commit in flight, or of the last one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPhase {
  #[default]
  Idle,
  Normalizing,
  DirectApply,
  AwaitingConfirmation,
  Persisting,
  Reconnecting,
  Finished(OutcomeKind),
}

#[derive(Debug, Serialize)]
struct CommittedPayload {
  outcome: OutcomeKind,
  error: Option<String>,
  configuration: Configuration,
}

pub struct CommitCoordinator {
  store: Arc<PreferenceStore>,
  connection: Arc<dyn ConnectionControl>,
  confirmation: Arc<dyn ConfirmationSurface>,
  flags: Arc<dyn FeatureFlags>,
  emitter: Arc<dyn EventEmitter>,
  in_flight: tokio::sync::Mutex<()>,
  phase: Mutex<CommitPhase>,
}

impl CommitCoordinator {
  pub fn new(
    store: Arc<PreferenceStore>,
    connection: Arc<dyn ConnectionControl>,
    confirmation: Arc<dyn ConfirmationSurface>,
    flags: Arc<dyn FeatureFlags>,
  ) -> Self {
    Self {
      store,
      connection,
      confirmation,
      flags,
      emitter: events::global_emitter(),
      in_flight: tokio::sync::Mutex::new(()),
      phase: Mutex::new(CommitPhase::Idle),
    }
  }

  /// Publish phases and outcomes through `emitter` instead of the global one
  pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
    self.emitter = emitter;
    self
  }

  pub fn store(&self) -> &Arc<PreferenceStore> {
    &self.store
  }

  /// What committing the draft right now would require
  pub fn pending_action(&self, draft: &DraftHandle) -> PendingAction {
    let normalized = normalize(&draft.snapshot(), self.flags.as_ref());
    classify(
      &self.store.current_snapshot(),
      &normalized,
      self.connection.status(),
    )
  }

  pub fn phase(&self) -> CommitPhase {
    *self.phase.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Apply the draft.
  ///
  /// Only one commit runs at a time; a call made while another is in flight
  /// fails with [`SettingsError::CommitInProgress`]. A declined mandatory
  /// reconnect reverts the draft and yields [`CommitOutcome::Cancelled`].
  /// The edit session stays open in every case; the caller ends it by
  /// dropping or discarding `draft`.
  /// Storage failures leave the active configuration and the draft as they
  /// were and no reconnect is attempted.
  pub async fn commit_changes(&self, draft: &DraftHandle) -> Result<CommitOutcome, SettingsError> {
    let _guard = self.in_flight.try_lock().map_err(|_| {
      log::warn!("Rejected commit: another commit is in progress");
      SettingsError::CommitInProgress
    })?;

    let result = self.run_commit(draft).await;
    match &result {
      Ok(outcome) => {
        self.set_phase(CommitPhase::Finished(outcome.kind()));
        self.emit_outcome(outcome);
      }
      Err(e) => {
        log::error!("Commit failed: {e}");
        self.set_phase(CommitPhase::Idle);
      }
    }
    result
  }

  async fn run_commit(&self, draft: &DraftHandle) -> Result<CommitOutcome, SettingsError> {
    self.set_phase(CommitPhase::Normalizing);
    let normalized = normalize(&draft.snapshot(), self.flags.as_ref());
    draft.replace(normalized.clone());

    let active = self.store.current_snapshot();
    let status = self.connection.status();
    let action = classify(&active, &normalized, status);
    log::info!("Committing preferences: action={action:?}, connection={status}");

    match action {
      PendingAction::None => {
        self.set_phase(CommitPhase::DirectApply);
        self.persist(&normalized)?;
        Ok(CommitOutcome::Applied)
      }
      PendingAction::MandatoryReconnect => {
        self.set_phase(CommitPhase::AwaitingConfirmation);
        match self.confirmation.present(Prompt::must_reconnect()).await {
          Some(Choice::ReconnectNow) => {
            self.persist(&normalized)?;
            Ok(self.reconnect().await)
          }
          choice => {
            log::info!("Reconnect declined ({choice:?}), reverting draft");
            draft.revert();
            Ok(CommitOutcome::Cancelled)
          }
        }
      }
      PendingAction::OptionalReconnect => {
        self.persist(&normalized)?;
        self.set_phase(CommitPhase::AwaitingConfirmation);
        match self.confirmation.present(Prompt::should_reconnect()).await {
          Some(Choice::ReconnectNow) => Ok(self.reconnect().await),
          choice => {
            log::info!("Reconnect postponed ({choice:?})");
            Ok(CommitOutcome::Applied)
          }
        }
      }
    }
  }

  fn persist(&self, config: &Configuration) -> Result<(), SettingsError> {
    self.set_phase(CommitPhase::Persisting);
    self.store.commit(config)
  }

  async fn reconnect(&self) -> CommitOutcome {
    self.set_phase(CommitPhase::Reconnecting);
    match self.connection.reconnect().await {
      Ok(()) => CommitOutcome::AppliedAndReconnected,
      Err(e) => {
        log::error!("Preferences saved but reconnect failed: {e}");
        CommitOutcome::AppliedButReconnectFailed(e)
      }
    }
  }

  fn set_phase(&self, phase: CommitPhase) {
    *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    log::debug!("Commit phase: {phase:?}");

    let payload = serde_json::json!({ "phase": phase });
    if let Err(e) = events::emit_to(self.emitter.as_ref(), events::COMMIT_PHASE, payload) {
      log::warn!("Failed to emit commit phase: {e}");
    }
  }

  fn emit_outcome(&self, outcome: &CommitOutcome) {
    let payload = CommittedPayload {
      outcome: outcome.kind(),
      error: match outcome {
        CommitOutcome::AppliedButReconnectFailed(e) => Some(e.to_string()),
        _ => None,
      },
      configuration: self.store.current_snapshot(),
    };

    if let Err(e) = events::emit_to(self.emitter.as_ref(), events::SETTINGS_COMMITTED, payload) {
      log::warn!("Failed to emit commit outcome: {e}");
    }
  }
}

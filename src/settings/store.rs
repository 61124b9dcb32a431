//! Preference store owning the active configuration and the draft session.

use super::config::{Cipher, Configuration, Digest, Handshake, ThemeCode, VpnType};
use super::error::SettingsError;
use super::storage::ConfigStorage;
use crate::events::{self, EventEmitter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Holder of the committed configuration.
///
/// Created once at startup from durable storage and shared through an `Arc`.
/// The active value only changes through [`PreferenceStore::commit`] and the
/// theme fast path [`PreferenceStore::set_theme`].
pub struct PreferenceStore {
  storage: Arc<dyn ConfigStorage>,
  active: RwLock<Configuration>,
  editing: AtomicBool,
  emitter: Arc<dyn EventEmitter>,
}

impl PreferenceStore {
  /// Load the active configuration from storage
  pub fn open(storage: Arc<dyn ConfigStorage>) -> Result<Self, SettingsError> {
    let active = storage.load()?;
    log::info!(
      "Loaded preferences: protocol={}, persistent={}, mace={}",
      active.vpn_type,
      active.is_persistent_connection,
      active.mace_enabled
    );

    Ok(Self {
      storage,
      active: RwLock::new(active),
      editing: AtomicBool::new(false),
      emitter: events::global_emitter(),
    })
  }

  /// Publish theme and reset events through `emitter` instead of the global one
  pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
    self.emitter = emitter;
    self
  }

  fn notify<S: serde::Serialize>(&self, event: &str, payload: S) {
    if let Err(e) = events::emit_to(self.emitter.as_ref(), event, payload) {
      log::warn!("Failed to emit {event}: {e}");
    }
  }

  /// Copy of the active configuration
  pub fn current_snapshot(&self) -> Configuration {
    self
      .active
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  /// Open the edit session. Only one session may exist at a time.
  pub fn begin_edit(self: &Arc<Self>) -> Result<DraftHandle, SettingsError> {
    if self
      .editing
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      return Err(SettingsError::PreconditionViolation(
        "an edit session is already open",
      ));
    }

    log::debug!("Edit session opened");
    Ok(DraftHandle {
      store: Arc::clone(self),
      draft: Mutex::new(self.current_snapshot()),
      closed: AtomicBool::new(false),
    })
  }

  pub fn is_editing(&self) -> bool {
    self.editing.load(Ordering::SeqCst)
  }

  /// Persist `draft` and make it the active configuration.
  ///
  /// Storage is written first; on failure the active configuration is left
  /// untouched. The theme is never taken from the draft.
  pub fn commit(&self, draft: &Configuration) -> Result<(), SettingsError> {
    if !self.is_editing() {
      return Err(SettingsError::PreconditionViolation(
        "commit requires an open edit session",
      ));
    }

    let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
    let next = Configuration {
      theme: active.theme,
      ..draft.clone()
    };

    if *active == next {
      log::debug!("Commit skipped, draft matches active preferences");
      return Ok(());
    }

    if let Err(e) = self.storage.save(&next) {
      log::error!("Failed to persist preferences: {e}");
      return Err(e.into());
    }

    *active = next;
    log::info!("Committed preferences");
    Ok(())
  }

  /// End the edit session without merging the draft
  pub fn discard(&self) -> Result<(), SettingsError> {
    if self.editing.swap(false, Ordering::SeqCst) {
      log::debug!("Edit session closed");
      Ok(())
    } else {
      Err(SettingsError::PreconditionViolation(
        "no edit session to discard",
      ))
    }
  }

  /// Apply a theme immediately, outside of any pending commit.
  /// Returns `false` when the theme was already active.
  pub fn set_theme(&self, code: ThemeCode) -> Result<bool, SettingsError> {
    let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
    if active.theme == code {
      return Ok(false);
    }

    let next = Configuration {
      theme: code,
      ..active.clone()
    };
    self.storage.save(&next)?;
    *active = next;
    drop(active);

    log::info!("Theme switched to {code}");
    self.notify(events::THEME_CHANGED, code);
    Ok(true)
  }
}

/// The draft of an open edit session.
///
/// Dropping the handle ends the session. Mutators return whether the draft
/// actually changed.
pub struct DraftHandle {
  store: Arc<PreferenceStore>,
  draft: Mutex<Configuration>,
  closed: AtomicBool,
}

impl DraftHandle {
  /// Current draft. The theme always mirrors the active configuration.
  pub fn snapshot(&self) -> Configuration {
    let draft = self.draft.lock().unwrap_or_else(|e| e.into_inner()).clone();
    Configuration {
      theme: self.store.current_snapshot().theme,
      ..draft
    }
  }

  pub fn active(&self) -> Configuration {
    self.store.current_snapshot()
  }

  pub fn store(&self) -> &Arc<PreferenceStore> {
    &self.store
  }

  pub fn has_changes(&self) -> bool {
    self.snapshot() != self.active()
  }

  /// Apply an arbitrary edit to the draft
  pub fn update<F>(&self, edit: F) -> bool
  where
    F: FnOnce(&mut Configuration),
  {
    let mut draft = self.draft.lock().unwrap_or_else(|e| e.into_inner());
    let before = draft.clone();
    edit(&mut draft);
    let changed = *draft != before;
    if changed {
      log::debug!("Draft updated: {:?}", *draft);
    }
    changed
  }

  pub fn set_vpn_type(&self, vpn_type: VpnType) -> bool {
    self.update(|c| c.vpn_type = vpn_type)
  }

  /// Port 0 selects automatic port choice
  pub fn set_preferred_port(&self, port: u16) -> bool {
    let port = (port > 0).then_some(port);
    self.update(|c| c.preferred_port = port)
  }

  pub fn set_cipher(&self, cipher: Cipher) -> bool {
    self.update(|c| c.tunnel.cipher = cipher)
  }

  pub fn set_digest(&self, digest: Digest) -> bool {
    self.update(|c| c.tunnel.digest = digest)
  }

  pub fn set_handshake(&self, handshake: Handshake) -> bool {
    self.update(|c| c.tunnel.handshake = handshake)
  }

  pub fn set_persistent_connection(&self, enabled: bool) -> bool {
    self.update(|c| c.is_persistent_connection = enabled)
  }

  pub fn set_mace_enabled(&self, enabled: bool) -> bool {
    self.update(|c| c.mace_enabled = enabled)
  }

  pub fn set_preferred_server(&self, server: Option<String>) -> bool {
    self.update(|c| c.preferred_server = server)
  }

  /// Replace the draft wholesale
  pub fn replace(&self, config: Configuration) -> bool {
    self.update(|c| *c = config)
  }

  /// Throw away draft edits, copying the active configuration back in
  pub fn revert(&self) {
    let active = self.store.current_snapshot();
    *self.draft.lock().unwrap_or_else(|e| e.into_inner()) = active;
    log::debug!("Draft reverted to active preferences");
  }

  /// Defaults for everything but the preferred server; the theme goes back
  /// to light right away
  pub fn reset_to_defaults(&self) -> Result<bool, SettingsError> {
    let changed = self.update(Configuration::reset);
    self.store.set_theme(ThemeCode::Light)?;
    self.store.notify(events::SETTINGS_RESET, ());
    Ok(changed)
  }

  /// End the session without committing
  pub fn discard(self) -> Result<(), SettingsError> {
    self.closed.store(true, Ordering::SeqCst);
    self.store.discard()
  }
}

impl Drop for DraftHandle {
  fn drop(&mut self) {
    if !self.closed.swap(true, Ordering::SeqCst) {
      let _ = self.store.discard();
    }
  }
}

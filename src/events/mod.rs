//! Settings events published to interested listeners (UI, logs).

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;

/// Emitted on every commit phase transition, payload `{"phase": ...}`
pub const COMMIT_PHASE: &str = "commit-phase";
/// Emitted when a commit finishes, payload `{"outcome", "error", "configuration"}`
pub const SETTINGS_COMMITTED: &str = "settings-committed";
/// Emitted when the theme changes, payload is the theme key
pub const THEME_CHANGED: &str = "theme-changed";
/// Emitted when preferences are reset to their defaults, no payload
pub const SETTINGS_RESET: &str = "settings-reset";

/// Sink for settings events.
///
/// Payloads are already serialized so the trait stays dyn-compatible;
/// publishers go through [`emit_to`].
pub trait EventEmitter: Send + Sync {
  fn emit_value(&self, event: &str, payload: serde_json::Value) -> Result<(), String>;
}

/// One published event
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsEvent {
  pub event_type: String,
  pub payload: serde_json::Value,
}

/// Fans events out to every subscribed receiver
#[derive(Clone)]
pub struct BroadcastEmitter {
  tx: broadcast::Sender<SettingsEvent>,
}

impl BroadcastEmitter {
  pub fn new(tx: broadcast::Sender<SettingsEvent>) -> Self {
    Self { tx }
  }

  /// Emitter together with its first receiver
  pub fn with_capacity(capacity: usize) -> (Self, broadcast::Receiver<SettingsEvent>) {
    let (tx, rx) = broadcast::channel(capacity);
    (Self { tx }, rx)
  }

  pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
    self.tx.subscribe()
  }
}

impl EventEmitter for BroadcastEmitter {
  fn emit_value(&self, event: &str, payload: serde_json::Value) -> Result<(), String> {
    // No subscribers is not an error
    let _ = self.tx.send(SettingsEvent {
      event_type: event.to_string(),
      payload,
    });
    Ok(())
  }
}

#[derive(Clone, Default)]
pub struct NoopEmitter;

impl EventEmitter for NoopEmitter {
  fn emit_value(&self, _event: &str, _payload: serde_json::Value) -> Result<(), String> {
    Ok(())
  }
}

static GLOBAL_EMITTER: OnceLock<Arc<dyn EventEmitter>> = OnceLock::new();

/// Install the process-wide emitter. Fails if one is already installed.
pub fn set_global_emitter(emitter: Arc<dyn EventEmitter>) -> Result<(), String> {
  GLOBAL_EMITTER
    .set(emitter)
    .map_err(|_| "Global emitter already set".to_string())
}

/// The process-wide emitter, or a no-op one when none was installed
pub fn global_emitter() -> Arc<dyn EventEmitter> {
  GLOBAL_EMITTER
    .get()
    .cloned()
    .unwrap_or_else(|| Arc::new(NoopEmitter))
}

/// Serialize `payload` and publish it on `emitter`
pub fn emit_to<S: Serialize>(
  emitter: &dyn EventEmitter,
  event: &str,
  payload: S,
) -> Result<(), String> {
  let value = serde_json::to_value(payload).map_err(|e| e.to_string())?;
  emitter.emit_value(event, value)
}

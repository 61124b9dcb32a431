//! Durable storage for the committed configuration.

use super::config::Configuration;
use super::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage format version for migration support
const STORAGE_VERSION: u32 = 1;

/// Backend that owns the on-disk (or in-memory) shape of the configuration
pub trait ConfigStorage: Send + Sync {
  /// Load the persisted configuration, falling back to defaults when none exists
  fn load(&self) -> Result<Configuration, StorageError>;

  /// Persist the configuration. Must not leave a partially written value behind.
  fn save(&self, config: &Configuration) -> Result<(), StorageError>;
}

/// Persisted preferences container
#[derive(Debug, Serialize, Deserialize)]
struct StoredPreferences {
  version: u32,
  saved_at: DateTime<Utc>,
  configuration: Configuration,
}

/// JSON file storage with atomic replace
pub struct JsonFileStorage {
  path: PathBuf,
}

impl Default for JsonFileStorage {
  fn default() -> Self {
    Self::new()
  }
}

impl JsonFileStorage {
  /// Storage at the default preferences location
  pub fn new() -> Self {
    Self {
      path: crate::app_dirs::preferences_file(),
    }
  }

  /// Storage inside a custom directory
  pub fn with_dir(dir: &Path) -> Self {
    Self {
      path: dir.join("preferences.json"),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl ConfigStorage for JsonFileStorage {
  fn load(&self) -> Result<Configuration, StorageError> {
    if !self.path.exists() {
      log::debug!(
        "No preferences at {}, using defaults",
        self.path.display()
      );
      return Ok(Configuration::default());
    }

    let content = fs::read_to_string(&self.path)?;

    match serde_json::from_str::<StoredPreferences>(&content) {
      Ok(stored) => {
        if stored.version != STORAGE_VERSION {
          log::warn!(
            "Preferences file version {} differs from {}, reading anyway",
            stored.version,
            STORAGE_VERSION
          );
        }
        Ok(stored.configuration)
      }
      Err(e) => {
        log::warn!("Failed to parse preferences file, using defaults: {e}");
        Ok(Configuration::default())
      }
    }
  }

  fn save(&self, config: &Configuration) -> Result<(), StorageError> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }

    let stored = StoredPreferences {
      version: STORAGE_VERSION,
      saved_at: Utc::now(),
      configuration: config.clone(),
    };
    let content =
      serde_json::to_string_pretty(&stored).map_err(|e| StorageError::Serialize(e.to_string()))?;

    // Write atomically using a temp file
    let temp_file = self.path.with_extension("tmp");
    fs::write(&temp_file, content)?;
    if let Err(e) = fs::rename(&temp_file, &self.path) {
      let _ = fs::remove_file(&temp_file);
      return Err(e.into());
    }

    log::debug!("Saved preferences to {}", self.path.display());
    Ok(())
  }
}

/// In-memory storage, optionally failing every save
#[derive(Default)]
pub struct MemoryStorage {
  value: Mutex<Option<Configuration>>,
  fail_saves: Mutex<Option<String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_configuration(config: Configuration) -> Self {
    Self {
      value: Mutex::new(Some(config)),
      fail_saves: Mutex::new(None),
    }
  }

  /// Make subsequent saves fail with the given reason, or succeed again with `None`
  pub fn set_failure(&self, reason: Option<&str>) {
    *self
      .fail_saves
      .lock()
      .unwrap_or_else(|e| e.into_inner()) = reason.map(str::to_string);
  }

  /// Last successfully saved value
  pub fn stored(&self) -> Option<Configuration> {
    self
      .value
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }
}

impl ConfigStorage for MemoryStorage {
  fn load(&self) -> Result<Configuration, StorageError> {
    Ok(self.stored().unwrap_or_default())
  }

  fn save(&self, config: &Configuration) -> Result<(), StorageError> {
    if let Some(reason) = self
      .fail_saves
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
    {
      return Err(StorageError::Unavailable(reason));
    }

    *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(config.clone());
    Ok(())
  }
}

//! Error types for the settings engine.

use thiserror::Error;

/// Errors surfaced by the preference store and the commit coordinator
#[derive(Error, Debug)]
pub enum SettingsError {
  #[error("Precondition violated: {0}")]
  PreconditionViolation(&'static str),
  #[error("Storage error: {0}")]
  Storage(#[from] StorageError),
  #[error("A commit is already in progress")]
  CommitInProgress,
}

/// Durable configuration storage failures
#[derive(Error, Debug)]
pub enum StorageError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Failed to serialize configuration: {0}")]
  Serialize(String),
  #[error("Storage unavailable: {0}")]
  Unavailable(String),
}

/// Failures reported by the connection-control collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
  #[error("Failed to read connection status: {0}")]
  Status(String),
  #[error("Reconnect failed: {0}")]
  Reconnect(String),
  #[error("Connection command failed: {0}")]
  Command(String),
}

/// Failures from maintenance actions (debug log, content blocker)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceError {
  #[error("Content blocker error: {0}")]
  ContentBlocker(String),
  #[error("Debug log submission failed: {0}")]
  LogSubmission(String),
}

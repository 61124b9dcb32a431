//! User-confirmation port used before disrupting a running connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A choice offered by a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Choice {
  ReconnectNow,
  Cancel,
  Later,
}

impl fmt::Display for Choice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Choice::ReconnectNow => f.write_str("Reconnect"),
      Choice::Cancel => f.write_str("Cancel"),
      Choice::Later => f.write_str("Later"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptKind {
  /// Blocks the commit until the user decides
  MustReconnect,
  /// Shown after the settings were already saved
  ShouldReconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
  pub kind: PromptKind,
  pub title: String,
  pub message: String,
  pub choices: Vec<Choice>,
}

impl Prompt {
  pub fn must_reconnect() -> Self {
    Self {
      kind: PromptKind::MustReconnect,
      title: "Settings".to_string(),
      message: "The VPN must reconnect for some changes to take effect.".to_string(),
      choices: vec![Choice::ReconnectNow, Choice::Cancel],
    }
  }

  pub fn should_reconnect() -> Self {
    Self {
      kind: PromptKind::ShouldReconnect,
      title: "Settings".to_string(),
      message: "Your settings were saved. Reconnect the VPN now to apply them to the current session?"
        .to_string(),
      choices: vec![Choice::ReconnectNow, Choice::Later],
    }
  }

  pub fn offers(&self, choice: Choice) -> bool {
    self.choices.contains(&choice)
  }
}

/// Surface that shows a prompt and waits for the user.
/// `None` means the prompt was dismissed without a choice.
#[async_trait]
pub trait ConfirmationSurface: Send + Sync {
  async fn present(&self, prompt: Prompt) -> Option<Choice>;
}

/// Non-interactive surface answering every prompt with a fixed choice.
/// Prompts that don't offer the choice are treated as dismissed.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirmation {
  choice: Choice,
}

impl AutoConfirmation {
  pub fn new(choice: Choice) -> Self {
    Self { choice }
  }
}

#[async_trait]
impl ConfirmationSurface for AutoConfirmation {
  async fn present(&self, prompt: Prompt) -> Option<Choice> {
    if prompt.offers(self.choice) {
      log::debug!("Auto-answering '{}' with {}", prompt.message, self.choice);
      Some(self.choice)
    } else {
      None
    }
  }
}

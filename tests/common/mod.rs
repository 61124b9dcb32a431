#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use vpnprefs_lib::settings::{
  Choice, ConfirmationSurface, ConnectionControl, ConnectionError, ConnectionStatus, Prompt,
};

/// Connection double with a settable status and a reconnect counter
pub struct MockConnection {
  status: Mutex<ConnectionStatus>,
  reconnects: AtomicUsize,
  failure: Mutex<Option<ConnectionError>>,
}

impl MockConnection {
  pub fn new(status: ConnectionStatus) -> Self {
    Self {
      status: Mutex::new(status),
      reconnects: AtomicUsize::new(0),
      failure: Mutex::new(None),
    }
  }

  pub fn set_status(&self, status: ConnectionStatus) {
    *self.status.lock().unwrap() = status;
  }

  pub fn fail_reconnects(&self, error: ConnectionError) {
    *self.failure.lock().unwrap() = Some(error);
  }

  pub fn reconnects(&self) -> usize {
    self.reconnects.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ConnectionControl for MockConnection {
  fn status(&self) -> ConnectionStatus {
    *self.status.lock().unwrap()
  }

  async fn reconnect(&self) -> Result<(), ConnectionError> {
    self.reconnects.fetch_add(1, Ordering::SeqCst);
    match self.failure.lock().unwrap().clone() {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

/// Confirmation double answering from a queue; an exhausted queue dismisses
pub struct ScriptedConfirmation {
  answers: Mutex<Vec<Option<Choice>>>,
  prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedConfirmation {
  pub fn new(answers: Vec<Option<Choice>>) -> Self {
    Self {
      answers: Mutex::new(answers),
      prompts: Mutex::new(Vec::new()),
    }
  }

  pub fn prompts(&self) -> Vec<Prompt> {
    self.prompts.lock().unwrap().clone()
  }
}

#[async_trait]
impl ConfirmationSurface for ScriptedConfirmation {
  async fn present(&self, prompt: Prompt) -> Option<Choice> {
    self.prompts.lock().unwrap().push(prompt);
    let mut answers = self.answers.lock().unwrap();
    if answers.is_empty() {
      None
    } else {
      answers.remove(0)
    }
  }
}

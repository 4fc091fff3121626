use thiserror::Error;

/// Errors that can occur within the `returning_threads` pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Work item '{name}' panicked: {message}")]
  WorkPanicked { name: String, message: String },

  #[error("Thread '{name}' was already started")]
  AlreadyStarted { name: String },

  #[error("Thread '{name}' was joined before it was started")]
  NotStarted { name: String },

  #[error("Failed to spawn OS thread for '{name}': {reason}")]
  SpawnFailed { name: String, reason: String },

  #[error("Result channel for '{name}' closed before a result was sent")]
  ResultChannelError { name: String },

  #[error("'{name}' crashed too many times, aborting after {attempts} attempts")]
  RetriesExhausted { name: String, attempts: u32 },
}

impl PoolError {
  /// Returns the name of the work item this error refers to.
  pub fn name(&self) -> &str {
    match self {
      PoolError::WorkPanicked { name, .. }
      | PoolError::AlreadyStarted { name }
      | PoolError::NotStarted { name }
      | PoolError::SpawnFailed { name, .. }
      | PoolError::ResultChannelError { name }
      | PoolError::RetriesExhausted { name, .. } => name,
    }
  }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic payload".to_string()
  }
}

use std::any::Any;
use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error type used for opaque underlying causes reported by
/// collaborators (listener registries, stores, job factories).
pub type BoxedError = Box<dyn StdError + Send + Sync + 'static>;

/// Declared failure raised by a job's `execute` operation.
///
/// A `JobFailure` is data, not control flow: the shell captures it, logs it,
/// and hands it to the trigger's completion logic. It carries a flag telling
/// the scheduler whether the job's triggers should be unscheduled.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct JobFailure {
  message: String,
  #[source]
  source: Option<BoxedError>,
  unschedule_triggers: bool,
}

impl JobFailure {
  /// Creates a failure with the given message and no underlying cause.
  /// The unschedule flag defaults to `false`.
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
      unschedule_triggers: false,
    }
  }

  /// Creates a failure wrapping an underlying error.
  pub fn with_source(message: impl Into<String>, source: impl Into<BoxedError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
      unschedule_triggers: false,
    }
  }

  /// Sets whether the scheduler should unschedule all of the job's triggers.
  pub fn unschedule_triggers(mut self, unschedule: bool) -> Self {
    self.unschedule_triggers = unschedule;
    self
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  /// Whether the scheduler should unschedule the job's triggers in response.
  pub fn should_unschedule_triggers(&self) -> bool {
    self.unschedule_triggers
  }

  /// Synthetic failure built from a panic in a job's `execute`.
  /// The unschedule flag is always `false` for synthesized failures.
  pub(crate) fn from_panic(panic_message: String) -> Self {
    Self::new(format!("job panicked: {panic_message}"))
  }
}

/// Failure reported by a job factory while building a job instance.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct InstantiationError {
  message: String,
  #[source]
  source: Option<BoxedError>,
}

impl InstantiationError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<BoxedError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub(crate) fn from_panic(panic_message: String) -> Self {
    Self::new(format!("job factory panicked: {panic_message}"))
  }
}

/// Failure raised by the external listener registry while fanning a
/// notification out to trigger, job, or scheduler listeners.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ListenerError {
  message: String,
  #[source]
  source: Option<BoxedError>,
}

impl ListenerError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<BoxedError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// Failure raised by the job store while recording an execution outcome.
/// Recoverable: the shell retries these with bounded backoff until shutdown.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct PersistenceError {
  message: String,
  #[source]
  source: Option<BoxedError>,
}

impl PersistenceError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<BoxedError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// Unexpected failure raised by a trigger's completion logic. Treated as an
/// internal scheduler defect rather than a reason to stop the firing.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TriggerError {
  message: String,
  #[source]
  source: Option<BoxedError>,
}

impl TriggerError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<BoxedError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// Errors surfaced by the shell's own API.
///
/// `Instantiation` is the only failure that escapes the shell at all: it
/// is fatal to the firing and returned from [`JobRunShell::initialize`].
/// `run` itself never fails once the shell is initialized.
///
/// [`JobRunShell::initialize`]: crate::JobRunShell::initialize
#[derive(Error, Debug)]
pub enum ShellError {
  #[error("failed to instantiate job '{job}'")]
  Instantiation {
    job: String,
    #[source]
    source: InstantiationError,
  },
  #[error("run() called before initialize()")]
  NotInitialized,
}

/// Best-effort extraction of a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

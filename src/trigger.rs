use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::context::ExecutionContext;
use crate::error::{JobFailure, TriggerError};

/// Identity of a trigger. Compared and hashed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerKey(String);

impl TriggerKey {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn name(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TriggerKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Enumerated outcome of a trigger reconciling a finished execution.
///
/// Drives the apply-instruction step of the run loop. `ReExecuteJob` is the
/// only variant that loops; every other variant ends the firing with a
/// store acknowledgement carrying the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompletionInstruction {
  /// Leave trigger and job state as they are.
  #[default]
  Noop,
  /// Run the same job instance again, immediately, on this worker.
  ReExecuteJob,
  /// Mark this trigger complete (it will not fire again).
  SetTriggerComplete,
  /// Mark every trigger of this job complete.
  SetAllJobTriggersComplete,
  /// Put this trigger into the error state.
  SetTriggerError,
  /// Put every trigger of this job into the error state.
  SetAllJobTriggersError,
}

/// Scheduling object owning the decision of what a completed execution means
/// and when (or whether) the trigger fires again.
///
/// Owned by the store; the shell holds a [`SharedTrigger`] reference for the
/// duration of one run. `execution_complete` is the authoritative operation:
/// given the execution outcome it returns a [`CompletionInstruction`] and
/// updates the trigger's next-fire-time as a side effect. An `Err` from it is
/// treated by the shell as a scheduler defect, not a reason to stop.
pub trait Trigger: Send {
  fn key(&self) -> &TriggerKey;

  fn execution_complete(
    &mut self,
    ctx: &ExecutionContext,
    job_error: Option<&JobFailure>,
  ) -> Result<CompletionInstruction, TriggerError>;

  /// The next time this trigger will fire, if any. `None` means the trigger
  /// is finalized and will never fire again.
  fn next_fire_time(&self) -> Option<DateTime<Utc>>;
}

/// Shared handle to a store-owned trigger. The mutex serializes the shell's
/// completion call against any cross-firing access the store performs.
pub type SharedTrigger = Arc<Mutex<dyn Trigger>>;

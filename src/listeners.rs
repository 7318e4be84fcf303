use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::{JobFailure, ListenerError};
use crate::trigger::{CompletionInstruction, TriggerKey};

/// External registry of trigger, job, and scheduler listeners.
///
/// The shell consumes this trait; actual fan-out semantics (listener
/// ordering, first-veto-wins short-circuiting) belong to the registry. The
/// shell only acts on the aggregate result of each notification.
///
/// Failure modes are defined per call site, not uniformly: a failure in
/// `notify_trigger_listeners_fired` or `notify_job_listeners_to_be_executed`
/// gates the firing, while failures in the later phases abort the current
/// step without undoing what already happened. See [`JobRunShell::run`].
///
/// [`JobRunShell::run`]: crate::JobRunShell::run
#[async_trait]
pub trait ListenerBus: Send + Sync {
  /// Asks trigger listeners whether the firing is vetoed. `Ok(true)` means
  /// some listener vetoed; the registry stops asking further listeners once
  /// one vetoes.
  async fn notify_trigger_listeners_fired(
    &self,
    ctx: &ExecutionContext,
  ) -> Result<bool, ListenerError>;

  /// Tells job listeners the firing was vetoed and the job will not run.
  async fn notify_job_listeners_was_vetoed(
    &self,
    ctx: &ExecutionContext,
  ) -> Result<(), ListenerError>;

  /// Tells job listeners execution is about to begin. This is the one phase
  /// where a listener failure prevents the job from running.
  async fn notify_job_listeners_to_be_executed(
    &self,
    ctx: &ExecutionContext,
  ) -> Result<(), ListenerError>;

  /// Tells job listeners execution finished, with the job error if any.
  async fn notify_job_listeners_was_executed(
    &self,
    ctx: &ExecutionContext,
    job_error: Option<&JobFailure>,
  ) -> Result<(), ListenerError>;

  /// Tells trigger listeners what the trigger decided the completed
  /// execution means.
  async fn notify_trigger_listeners_complete(
    &self,
    ctx: &ExecutionContext,
    instruction: CompletionInstruction,
  ) -> Result<(), ListenerError>;

  /// Tells scheduler listeners a trigger is finalized and will never fire
  /// again. Best effort; no failure channel.
  async fn notify_scheduler_listeners_finalized(&self, trigger_key: &TriggerKey);
}

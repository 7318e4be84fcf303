use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;

use crate::job::{JobDetail, JobFactory};
use crate::trigger::{CompletionInstruction, SharedTrigger};

/// The hosting scheduler as the shell sees it.
///
/// Read-mostly and shared across all concurrently running shells. The store
/// acknowledgement calls are the only ones the shell retries; everything
/// else is fire-and-forget reporting or plain state queries.
#[async_trait]
pub trait SchedulerFacade: Send + Sync {
  /// The factory used to build a fresh job instance for each firing.
  fn job_factory(&self) -> Arc<dyn JobFactory>;

  /// Reports an error condition to scheduler listeners: a human-readable
  /// message plus the underlying error. Best effort; no failure channel.
  async fn notify_scheduler_listeners_error(
    &self,
    message: &str,
    error: &(dyn StdError + Send + Sync + 'static),
  );

  /// Records against the store that the firing completed with the given
  /// instruction.
  async fn notify_job_store_job_complete(
    &self,
    trigger: &SharedTrigger,
    job_detail: &JobDetail,
    instruction: CompletionInstruction,
  ) -> Result<(), crate::error::PersistenceError>;

  /// Records against the store that the firing was vetoed before execution.
  async fn notify_job_store_job_vetoed(
    &self,
    trigger: &SharedTrigger,
    job_detail: &JobDetail,
    instruction: CompletionInstruction,
  ) -> Result<(), crate::error::PersistenceError>;

  /// Whether the scheduler is already shutting down. Checked by the retry
  /// loops alongside the shell's own shutdown token.
  fn is_shutting_down(&self) -> bool;
}

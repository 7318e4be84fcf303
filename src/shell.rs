use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::bundle::FiredTriggerBundle;
use crate::context::ExecutionContext;
use crate::error::{panic_message, InstantiationError, JobFailure, ShellError};
use crate::job::Job;
use crate::listeners::ListenerBus;
use crate::metrics::ShellMetrics;
use crate::scheduler::SchedulerFacade;
use crate::shutdown::ShutdownToken;
use crate::trigger::CompletionInstruction;

/// Default interval between attempts to record "job complete" against the
/// store after the first attempt fails.
pub const DEFAULT_COMPLETE_RETRY_INTERVAL: Duration = Duration::from_secs(15);

/// Default interval between attempts to record "job vetoed" against the
/// store after the first attempt fails.
pub const DEFAULT_VETOED_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Backoff intervals for the two store-acknowledgement retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
  pub complete_interval: Duration,
  pub vetoed_interval: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      complete_interval: DEFAULT_COMPLETE_RETRY_INTERVAL,
      vetoed_interval: DEFAULT_VETOED_RETRY_INTERVAL,
    }
  }
}

/// How a firing ended. Every exit from [`JobRunShell::run`] is one of these;
/// no early return is silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunOutcome {
  /// The firing ran to completion and the store acknowledged it.
  Completed,
  /// A trigger listener vetoed the firing before the job ran.
  Vetoed,
  /// A listener phase failed; the firing stopped with no store update.
  Aborted,
  /// The store could not be reached and shutdown was requested mid-retry;
  /// the firing ended without a successful acknowledgement.
  Abandoned,
}

/// Result of the beginning listener phase.
enum BeginPhase {
  Proceed,
  Abort,
  Vetoed,
}

/// The safe environment one fired trigger runs in.
///
/// A `JobRunShell` drives a single firing end to end: listener
/// notification, job execution, the trigger's completion decision, and the
/// store acknowledgement, catching every failure along the way. It is
/// expected to be run on a worker task owned by the hosting scheduler, one
/// shell per firing, with no internal parallelism.
///
/// Lifecycle: construct with the fired-trigger bundle, the listener bus,
/// and a [`ShutdownToken`]; call [`initialize`](Self::initialize) to build
/// the job instance; then [`run`](Self::run) exactly once. The shell never
/// lets a failure escape `run`; the only fallible surface is
/// `initialize`, where a job that cannot be instantiated is fatal to the
/// firing.
pub struct JobRunShell {
  listeners: Arc<dyn ListenerBus>,
  bundle: FiredTriggerBundle,
  shutdown: ShutdownToken,
  retry: RetryConfig,
  metrics: ShellMetrics,
  scheduler: Option<Arc<dyn SchedulerFacade>>,
  job: Option<Box<dyn Job>>,
  context: Option<ExecutionContext>,
}

impl JobRunShell {
  /// Creates a shell for one firing. The shutdown token is the handle the
  /// scheduler's shutdown path sets to make in-flight retry loops abandon
  /// their store acknowledgement.
  pub fn new(
    bundle: FiredTriggerBundle,
    listeners: Arc<dyn ListenerBus>,
    shutdown: ShutdownToken,
  ) -> Self {
    Self {
      listeners,
      bundle,
      shutdown,
      retry: RetryConfig::default(),
      metrics: ShellMetrics::new(),
      scheduler: None,
      job: None,
      context: None,
    }
  }

  /// Overrides the store-acknowledgement retry intervals.
  pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
    self.retry = retry;
    self
  }

  /// Shares the shell's metrics handles. Clones observe the same counters.
  pub fn metrics(&self) -> ShellMetrics {
    self.metrics.clone()
  }

  /// Diagnostic identity of this firing: `"jobName : triggerName"`.
  pub fn job_name(&self) -> String {
    format!(
      "{} : {}",
      self.bundle.job_detail().key(),
      self.bundle.trigger_key()
    )
  }

  /// Builds the job instance for this firing via the scheduler's job
  /// factory. Must be called before [`run`](Self::run).
  ///
  /// Any failure here (the factory's declared error or a panic inside it)
  /// is reported to scheduler listeners and returned. Initialization
  /// failure is fatal to the firing and is not retried.
  pub async fn initialize(&mut self, scheduler: Arc<dyn SchedulerFacade>) -> Result<(), ShellError> {
    let job_key = self.bundle.job_detail().key().clone();
    let factory = scheduler.job_factory();

    let built = panic::catch_unwind(AssertUnwindSafe(|| {
      factory.new_job(&self.bundle, scheduler.clone())
    }));
    let job = match built {
      Ok(Ok(job)) => job,
      Ok(Err(source)) => {
        scheduler
          .notify_scheduler_listeners_error(
            &format!("An error occurred instantiating job to be executed. job = '{job_key}'"),
            &source,
          )
          .await;
        return Err(ShellError::Instantiation {
          job: job_key.to_string(),
          source,
        });
      }
      Err(payload) => {
        let source = InstantiationError::from_panic(panic_message(payload.as_ref()));
        error!(job = %job_key, error = %source, "Job factory panicked.");
        scheduler
          .notify_scheduler_listeners_error(
            &format!("An error occurred instantiating job to be executed. job = '{job_key}'"),
            &source,
          )
          .await;
        return Err(ShellError::Instantiation {
          job: job_key.to_string(),
          source,
        });
      }
    };

    self.context = Some(ExecutionContext::new(&self.bundle, scheduler.clone()));
    self.job = Some(job);
    self.scheduler = Some(scheduler);
    Ok(())
  }

  /// Drives the firing end to end and reports how it ended.
  ///
  /// The loop repeats only when the trigger instructs
  /// [`CompletionInstruction::ReExecuteJob`]; every other path ends the
  /// firing after one pass. No failure escapes this method: listener
  /// errors, job failures, panics, trigger defects, and store errors are
  /// all caught, classified, and reflected in the returned [`RunOutcome`].
  ///
  /// Errors only if `initialize` has not run (or `run` already consumed the
  /// firing).
  pub async fn run(&mut self) -> Result<RunOutcome, ShellError> {
    let scheduler = self.scheduler.clone().ok_or(ShellError::NotInitialized)?;
    let mut job = self.job.take().ok_or(ShellError::NotInitialized)?;
    let mut ctx = self.context.take().ok_or(ShellError::NotInitialized)?;

    let outcome = self.drive(&scheduler, job.as_mut(), &mut ctx).await;

    let counter = match outcome {
      RunOutcome::Completed => &self.metrics.firings_completed,
      RunOutcome::Vetoed => &self.metrics.firings_vetoed,
      RunOutcome::Aborted => &self.metrics.firings_aborted,
      RunOutcome::Abandoned => &self.metrics.firings_abandoned,
    };
    counter.fetch_add(1, Ordering::Relaxed);

    info!(firing = %self.job_name(), outcome = ?outcome, "Firing finished.");
    Ok(outcome)
  }

  /// The main loop: steps 1-6, restarting only on an explicit re-execute.
  async fn drive(
    &self,
    scheduler: &Arc<dyn SchedulerFacade>,
    job: &mut dyn Job,
    ctx: &mut ExecutionContext,
  ) -> RunOutcome {
    let job_key = self.bundle.job_detail().key().clone();

    loop {
      // 1. Begin notification.
      match self.notify_listeners_beginning(scheduler, ctx).await {
        BeginPhase::Proceed => {}
        BeginPhase::Abort => return RunOutcome::Aborted,
        BeginPhase::Vetoed => {
          let instruction = self.trigger_execution_complete(scheduler, ctx, None).await;
          if let Err(err) = scheduler
            .notify_job_store_job_vetoed(
              self.bundle.trigger(),
              self.bundle.job_detail(),
              instruction,
            )
            .await
          {
            warn!(
              job = %job_key,
              error = %err,
              "Recording vetoed firing failed. Entering retry loop."
            );
            if !self.vetoed_retry_loop(scheduler, instruction).await {
              return RunOutcome::Abandoned;
            }
          }
          return RunOutcome::Vetoed;
        }
      }

      // 2. Execute, recording wall-clock timing regardless of outcome.
      let started_at = Utc::now();
      let started = Instant::now();
      debug!(job = %job_key, refire_count = ctx.refire_count(), "Calling execute on job.");
      let exec_result = AssertUnwindSafe(job.execute(ctx)).catch_unwind().await;
      let duration = started.elapsed();
      ctx.record_run(started_at, duration);
      self.metrics.execution_duration.record(duration);

      let job_error = match exec_result {
        Ok(Ok(())) => {
          self
            .metrics
            .executions_succeeded
            .fetch_add(1, Ordering::Relaxed);
          None
        }
        Ok(Err(failure)) => {
          // Declared failures are data for the trigger, not control flow.
          self.metrics.executions_failed.fetch_add(1, Ordering::Relaxed);
          info!(job = %job_key, error = %failure, "Job raised a declared failure.");
          Some(failure)
        }
        Err(payload) => {
          self
            .metrics
            .executions_panicked
            .fetch_add(1, Ordering::Relaxed);
          let failure = JobFailure::from_panic(panic_message(payload.as_ref()));
          error!(job = %job_key, error = %failure, "Job raised an unhandled failure.");
          scheduler
            .notify_scheduler_listeners_error(
              &format!("Job '{job_key}' raised an unhandled failure."),
              &failure,
            )
            .await;
          Some(failure)
        }
      };

      // 3. Completion notification. Trigger state only advances when this
      // succeeds.
      if !self
        .notify_job_listeners_complete(scheduler, ctx, job_error.as_ref())
        .await
      {
        return RunOutcome::Aborted;
      }

      // 4. Trigger completion decision.
      let instruction = self
        .trigger_execution_complete(scheduler, ctx, job_error.as_ref())
        .await;

      // 5. Trigger-complete notification, plus the finalized check.
      if !self
        .notify_trigger_listeners_complete(scheduler, ctx, instruction)
        .await
      {
        return RunOutcome::Aborted;
      }

      // 6. Apply the instruction.
      match instruction {
        CompletionInstruction::ReExecuteJob => {
          ctx.increment_refire_count();
          self.metrics.reexecutions.fetch_add(1, Ordering::Relaxed);
          continue;
        }
        CompletionInstruction::Noop
        | CompletionInstruction::SetTriggerComplete
        | CompletionInstruction::SetAllJobTriggersComplete
        | CompletionInstruction::SetTriggerError
        | CompletionInstruction::SetAllJobTriggersError => {
          if let Err(err) = scheduler
            .notify_job_store_job_complete(
              self.bundle.trigger(),
              self.bundle.job_detail(),
              instruction,
            )
            .await
          {
            scheduler
              .notify_scheduler_listeners_error(
                &format!(
                  "An error occurred while marking executed job complete. job = '{job_key}'"
                ),
                &err,
              )
              .await;
            if !self.complete_retry_loop(scheduler, instruction).await {
              return RunOutcome::Abandoned;
            }
          }
          return RunOutcome::Completed;
        }
      }
    }
  }

  /// Beginning phase: asks trigger listeners about a veto, then tells job
  /// listeners execution is about to begin. Both bus failures gate the
  /// firing; a failure notifying the veto itself is only reported.
  async fn notify_listeners_beginning(
    &self,
    scheduler: &Arc<dyn SchedulerFacade>,
    ctx: &ExecutionContext,
  ) -> BeginPhase {
    let trigger_key = self.bundle.trigger_key();
    let job_key = self.bundle.job_detail().key();

    let vetoed = match self.listeners.notify_trigger_listeners_fired(ctx).await {
      Ok(vetoed) => vetoed,
      Err(err) => {
        error!(trigger = %trigger_key, job = %job_key, error = %err, "Unable to notify trigger listeners of firing.");
        scheduler
          .notify_scheduler_listeners_error(
            &format!(
              "Unable to notify trigger listeners while firing trigger (trigger and job will NOT be fired). trigger = '{trigger_key}' job = '{job_key}'"
            ),
            &err,
          )
          .await;
        return BeginPhase::Abort;
      }
    };

    if vetoed {
      if let Err(err) = self.listeners.notify_job_listeners_was_vetoed(ctx).await {
        error!(trigger = %trigger_key, job = %job_key, error = %err, "Unable to notify job listeners of vetoed execution.");
        scheduler
          .notify_scheduler_listeners_error(
            &format!(
              "Unable to notify job listeners of vetoed execution. trigger = '{trigger_key}' job = '{job_key}'"
            ),
            &err,
          )
          .await;
      }
      return BeginPhase::Vetoed;
    }

    if let Err(err) = self.listeners.notify_job_listeners_to_be_executed(ctx).await {
      error!(trigger = %trigger_key, job = %job_key, error = %err, "Unable to notify job listeners of job to be executed.");
      scheduler
        .notify_scheduler_listeners_error(
          &format!(
            "Unable to notify job listeners of job to be executed (job will NOT be executed). trigger = '{trigger_key}' job = '{job_key}'"
          ),
          &err,
        )
        .await;
      return BeginPhase::Abort;
    }

    BeginPhase::Proceed
  }

  /// Completion phase: tells job listeners execution finished. A failure
  /// here means the trigger must not be updated.
  async fn notify_job_listeners_complete(
    &self,
    scheduler: &Arc<dyn SchedulerFacade>,
    ctx: &ExecutionContext,
    job_error: Option<&JobFailure>,
  ) -> bool {
    if let Err(err) = self
      .listeners
      .notify_job_listeners_was_executed(ctx, job_error)
      .await
    {
      let trigger_key = self.bundle.trigger_key();
      let job_key = self.bundle.job_detail().key();
      error!(trigger = %trigger_key, job = %job_key, error = %err, "Unable to notify job listeners of executed job.");
      scheduler
        .notify_scheduler_listeners_error(
          &format!(
            "Unable to notify job listeners of executed job (trigger state will NOT advance). trigger = '{trigger_key}' job = '{job_key}'"
          ),
          &err,
        )
        .await;
      return false;
    }
    true
  }

  /// Trigger-complete phase. On success, additionally emits the finalized
  /// notification when the trigger has no further fire time.
  async fn notify_trigger_listeners_complete(
    &self,
    scheduler: &Arc<dyn SchedulerFacade>,
    ctx: &ExecutionContext,
    instruction: CompletionInstruction,
  ) -> bool {
    let trigger_key = self.bundle.trigger_key();
    if let Err(err) = self
      .listeners
      .notify_trigger_listeners_complete(ctx, instruction)
      .await
    {
      let job_key = self.bundle.job_detail().key();
      error!(trigger = %trigger_key, job = %job_key, error = %err, "Unable to notify trigger listeners of completed firing.");
      scheduler
        .notify_scheduler_listeners_error(
          &format!(
            "Unable to notify trigger listeners of completed firing (trigger will NOT be finalized). trigger = '{trigger_key}' job = '{job_key}'"
          ),
          &err,
        )
        .await;
      return false;
    }

    let finalized = self.bundle.trigger().lock().next_fire_time().is_none();
    if finalized {
      self
        .listeners
        .notify_scheduler_listeners_finalized(trigger_key)
        .await;
    }
    true
  }

  /// Asks the trigger what the completed execution means. A failure in the
  /// trigger's own logic is a scheduler defect: it is reported and the
  /// instruction stays at its default no-op rather than crashing the shell.
  async fn trigger_execution_complete(
    &self,
    scheduler: &Arc<dyn SchedulerFacade>,
    ctx: &ExecutionContext,
    job_error: Option<&JobFailure>,
  ) -> CompletionInstruction {
    let decision = {
      let mut trigger = self.bundle.trigger().lock();
      trigger.execution_complete(ctx, job_error)
    };
    match decision {
      Ok(instruction) => instruction,
      Err(err) => {
        error!(trigger = %self.bundle.trigger_key(), error = %err, "Trigger completion logic failed.");
        scheduler
          .notify_scheduler_listeners_error(
            "Trigger completion logic raised an unhandled failure. This is a scheduler defect.",
            &err,
          )
          .await;
        CompletionInstruction::default()
      }
    }
  }

  /// Keeps attempting to record "job complete" until the store accepts it
  /// or shutdown is requested. Reports the error on the first attempt and
  /// every 4th thereafter, to avoid flooding scheduler listeners while the
  /// store is down. Returns `false` on abandonment.
  async fn complete_retry_loop(
    &self,
    scheduler: &Arc<dyn SchedulerFacade>,
    instruction: CompletionInstruction,
  ) -> bool {
    let job_key = self.bundle.job_detail().key();
    let mut attempt: u64 = 0;
    loop {
      if self.shutdown.is_requested() || scheduler.is_shutting_down() {
        warn!(job = %job_key, attempts = attempt, "Abandoning job-complete acknowledgement: shutdown requested.");
        return false;
      }
      self.backoff(self.retry.complete_interval).await;
      if self.shutdown.is_requested() || scheduler.is_shutting_down() {
        warn!(job = %job_key, attempts = attempt, "Abandoning job-complete acknowledgement: shutdown requested.");
        return false;
      }
      self
        .metrics
        .store_retry_attempts
        .fetch_add(1, Ordering::Relaxed);
      match scheduler
        .notify_job_store_job_complete(self.bundle.trigger(), self.bundle.job_detail(), instruction)
        .await
      {
        Ok(()) => {
          info!(job = %job_key, attempts = attempt + 1, "Job-complete acknowledgement succeeded after retry.");
          return true;
        }
        Err(err) => {
          if attempt % 4 == 0 {
            scheduler
              .notify_scheduler_listeners_error(
                &format!(
                  "An error occurred while marking executed job complete (will continue attempts). job = '{job_key}'"
                ),
                &err,
              )
              .await;
          } else {
            debug!(job = %job_key, attempt = attempt + 1, error = %err, "Job-complete acknowledgement still failing.");
          }
          attempt += 1;
        }
      }
    }
  }

  /// Keeps attempting to record "job vetoed" until the store accepts it or
  /// shutdown is requested. Unlike the completion loop, every failed
  /// attempt is reported. Returns `false` on abandonment.
  async fn vetoed_retry_loop(
    &self,
    scheduler: &Arc<dyn SchedulerFacade>,
    instruction: CompletionInstruction,
  ) -> bool {
    let job_key = self.bundle.job_detail().key();
    let mut attempt: u64 = 0;
    loop {
      if self.shutdown.is_requested() || scheduler.is_shutting_down() {
        warn!(job = %job_key, attempts = attempt, "Abandoning job-vetoed acknowledgement: shutdown requested.");
        return false;
      }
      self.backoff(self.retry.vetoed_interval).await;
      if self.shutdown.is_requested() || scheduler.is_shutting_down() {
        warn!(job = %job_key, attempts = attempt, "Abandoning job-vetoed acknowledgement: shutdown requested.");
        return false;
      }
      self
        .metrics
        .store_retry_attempts
        .fetch_add(1, Ordering::Relaxed);
      match scheduler
        .notify_job_store_job_vetoed(self.bundle.trigger(), self.bundle.job_detail(), instruction)
        .await
      {
        Ok(()) => {
          info!(job = %job_key, attempts = attempt + 1, "Job-vetoed acknowledgement succeeded after retry.");
          return true;
        }
        Err(err) => {
          scheduler
            .notify_scheduler_listeners_error(
              &format!("An error occurred while marking executed job vetoed. job = '{job_key}'"),
              &err,
            )
            .await;
          attempt += 1;
        }
      }
    }
  }

  /// One backoff sleep, cut short when shutdown is requested. A wake that
  /// turns out not to be an actual shutdown is swallowed by the caller
  /// re-checking the flag and trying again immediately; only the flag
  /// itself ends a retry loop.
  async fn backoff(&self, interval: Duration) {
    tokio::select! {
      _ = tokio::time::sleep(interval) => {}
      _ = self.shutdown.requested() => {}
    }
  }
}

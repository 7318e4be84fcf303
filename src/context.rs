use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::bundle::FiredTriggerBundle;
use crate::job::JobDetail;
use crate::scheduler::SchedulerFacade;
use crate::trigger::TriggerKey;

/// Wall-clock timing of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTiming {
  pub started_at: DateTime<Utc>,
  pub duration: Duration,
}

/// Mutable record describing one firing, passed to the job and to every
/// listener notification.
///
/// Created once per firing and mutated in place by the shell: the refire
/// count increases only when the trigger instructs a re-execute, and run
/// timing is recorded exactly once per execution attempt.
pub struct ExecutionContext {
  scheduler: Arc<dyn SchedulerFacade>,
  job_detail: JobDetail,
  trigger_key: TriggerKey,
  fire_instance_id: Uuid,
  fire_time: DateTime<Utc>,
  scheduled_fire_time: DateTime<Utc>,
  refire_count: u32,
  last_run: Option<RunTiming>,
}

impl ExecutionContext {
  pub(crate) fn new(bundle: &FiredTriggerBundle, scheduler: Arc<dyn SchedulerFacade>) -> Self {
    Self {
      scheduler,
      job_detail: bundle.job_detail().clone(),
      trigger_key: bundle.trigger_key().clone(),
      fire_instance_id: bundle.fire_instance_id(),
      fire_time: bundle.fire_time(),
      scheduled_fire_time: bundle.scheduled_fire_time(),
      refire_count: 0,
      last_run: None,
    }
  }

  /// Handle to the hosting scheduler, available to the running job.
  pub fn scheduler(&self) -> &Arc<dyn SchedulerFacade> {
    &self.scheduler
  }

  pub fn job_detail(&self) -> &JobDetail {
    &self.job_detail
  }

  pub fn trigger_key(&self) -> &TriggerKey {
    &self.trigger_key
  }

  pub fn fire_instance_id(&self) -> Uuid {
    self.fire_instance_id
  }

  pub fn fire_time(&self) -> DateTime<Utc> {
    self.fire_time
  }

  pub fn scheduled_fire_time(&self) -> DateTime<Utc> {
    self.scheduled_fire_time
  }

  /// Number of times this firing has been re-executed. Zero on the first
  /// attempt.
  pub fn refire_count(&self) -> u32 {
    self.refire_count
  }

  /// Timing of the most recent execution attempt, if one has run.
  pub fn last_run(&self) -> Option<RunTiming> {
    self.last_run
  }

  pub(crate) fn increment_refire_count(&mut self) {
    self.refire_count += 1;
  }

  pub(crate) fn record_run(&mut self, started_at: DateTime<Utc>, duration: Duration) {
    self.last_run = Some(RunTiming {
      started_at,
      duration,
    });
  }
}

impl fmt::Debug for ExecutionContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecutionContext")
      .field("job_detail", &self.job_detail)
      .field("trigger_key", &self.trigger_key)
      .field("fire_instance_id", &self.fire_instance_id)
      .field("fire_time", &self.fire_time)
      .field("scheduled_fire_time", &self.scheduled_fire_time)
      .field("refire_count", &self.refire_count)
      .field("last_run", &self.last_run)
      .finish()
  }
}

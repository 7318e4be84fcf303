use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::job::JobDetail;
use crate::trigger::{SharedTrigger, TriggerKey};

/// Immutable snapshot produced by the scheduler when a trigger fires.
///
/// Bundles everything the shell needs to run one firing: the job definition,
/// a shared handle to the trigger, and the firing's scheduling metadata.
/// Owned by the caller and read-only to the shell; dropped when the run
/// completes.
pub struct FiredTriggerBundle {
  job_detail: JobDetail,
  trigger: SharedTrigger,
  trigger_key: TriggerKey,
  fire_instance_id: Uuid,
  fire_time: DateTime<Utc>,
  scheduled_fire_time: DateTime<Utc>,
}

impl FiredTriggerBundle {
  /// Snapshots a firing. A fresh instance id is assigned so concurrent
  /// firings of the same trigger stay distinguishable in logs and listeners.
  pub fn new(
    job_detail: JobDetail,
    trigger: SharedTrigger,
    fire_time: DateTime<Utc>,
    scheduled_fire_time: DateTime<Utc>,
  ) -> Self {
    let trigger_key = trigger.lock().key().clone();
    Self {
      job_detail,
      trigger,
      trigger_key,
      fire_instance_id: Uuid::new_v4(),
      fire_time,
      scheduled_fire_time,
    }
  }

  pub fn job_detail(&self) -> &JobDetail {
    &self.job_detail
  }

  pub fn trigger(&self) -> &SharedTrigger {
    &self.trigger
  }

  pub fn trigger_key(&self) -> &TriggerKey {
    &self.trigger_key
  }

  pub fn fire_instance_id(&self) -> Uuid {
    self.fire_instance_id
  }

  /// Wall-clock time the scheduler actually fired the trigger.
  pub fn fire_time(&self) -> DateTime<Utc> {
    self.fire_time
  }

  /// Time the trigger was scheduled to fire.
  pub fn scheduled_fire_time(&self) -> DateTime<Utc> {
    self.scheduled_fire_time
  }
}

// Manual Debug: the trigger trait object is not Debug.
impl fmt::Debug for FiredTriggerBundle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FiredTriggerBundle")
      .field("job_detail", &self.job_detail)
      .field("trigger", &format_args!("<dyn Trigger>"))
      .field("trigger_key", &self.trigger_key)
      .field("fire_instance_id", &self.fire_instance_id)
      .field("fire_time", &self.fire_time)
      .field("scheduled_fire_time", &self.scheduled_fire_time)
      .finish()
  }
}

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bundle::FiredTriggerBundle;
use crate::context::ExecutionContext;
use crate::error::{InstantiationError, JobFailure};
use crate::scheduler::SchedulerFacade;

/// Identity of a job definition. Compared and hashed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobKey(String);

impl JobKey {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn name(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for JobKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Immutable description of the job behind a firing: its identity plus an
/// optional human-readable description. Owned by the caller; the shell only
/// reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobDetail {
  key: JobKey,
  description: Option<String>,
}

impl JobDetail {
  pub fn new(key: JobKey) -> Self {
    Self {
      key,
      description: None,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn key(&self) -> &JobKey {
    &self.key
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }
}

/// A single runnable unit of work.
///
/// Implementations are built fresh for every firing by a [`JobFactory`],
/// owned exclusively by the shell for the run's lifetime, and dropped when
/// the run ends. `execute` is invoked once per execution attempt; a
/// re-execute instruction from the trigger reuses the same instance.
///
/// Returning `Err` is the *declared* failure path and is handed to the
/// trigger's completion logic as data. Panics are caught by the shell and
/// converted into a synthetic [`JobFailure`].
#[async_trait]
pub trait Job: Send {
  async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), JobFailure>;
}

/// Builds a runnable [`Job`] instance from a fired-trigger bundle.
///
/// Consumed, not implemented, by this crate: the hosting scheduler supplies
/// the factory via [`SchedulerFacade::job_factory`]. Panics inside `new_job`
/// are caught at the call site and treated as instantiation failures.
pub trait JobFactory: Send + Sync {
  fn new_job(
    &self,
    bundle: &FiredTriggerBundle,
    scheduler: Arc<dyn SchedulerFacade>,
  ) -> Result<Box<dyn Job>, InstantiationError>;
}

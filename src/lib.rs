//! Fireshell: a safe execution shell for scheduler-fired jobs.
//!
//! Provides the environment one triggered unit of work runs in on behalf of
//! a hosting scheduler: it drives a single firing through listener
//! notification, job execution, the trigger's completion decision, and the
//! persistent-store acknowledgement, catching every failure along the way so
//! that no stage can corrupt another or crash the worker.
//!
//! Deciding *when* to fire, storing trigger/job definitions, and dispatching
//! workers are the hosting scheduler's business; this crate consumes them as
//! trait contracts.
//!
//! # Features
//!
//! - One [`JobRunShell`] per firing, run to exactly one explicit
//!   [`RunOutcome`]: completed, vetoed, aborted, or abandoned.
//! - Ordered listener phases (beginning / completion / trigger complete)
//!   with veto semantics and per-phase failure modes.
//! - Declared job failures ([`JobFailure`]) captured as data; panics in the
//!   job or the job factory contained at the call site and converted into
//!   the shell's own error kinds.
//! - Trigger-driven re-execute cycles reusing the same job instance.
//! - Bounded-backoff retry of the store acknowledgement ("job complete" /
//!   "job vetoed"), abandoned only when shutdown is requested, with
//!   rate-limited error reporting.
//! - Cooperative shutdown via a set-once [`ShutdownToken`].
//! - Built-in counters and an execution-duration histogram
//!   ([`ShellMetrics`]).
//!
//! # Usage
//!
//! ```no_run
//! use std::error::Error as StdError;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use chrono::{DateTime, Utc};
//! use parking_lot::Mutex;
//!
//! use fireshell::{
//!   CompletionInstruction, ExecutionContext, FiredTriggerBundle, InstantiationError, Job,
//!   JobDetail, JobFactory, JobFailure, JobKey, JobRunShell, ListenerBus, ListenerError,
//!   PersistenceError, SchedulerFacade, SharedTrigger, ShutdownToken, Trigger, TriggerError,
//!   TriggerKey,
//! };
//!
//! struct PrintJob;
//!
//! #[async_trait]
//! impl Job for PrintJob {
//!   async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), JobFailure> {
//!     println!("running {} (refire {})", ctx.job_detail().key(), ctx.refire_count());
//!     Ok(())
//!   }
//! }
//!
//! struct PrintJobFactory;
//!
//! impl JobFactory for PrintJobFactory {
//!   fn new_job(
//!     &self,
//!     _bundle: &FiredTriggerBundle,
//!     _scheduler: Arc<dyn SchedulerFacade>,
//!   ) -> Result<Box<dyn Job>, InstantiationError> {
//!     Ok(Box::new(PrintJob))
//!   }
//! }
//!
//! struct OneShotTrigger {
//!   key: TriggerKey,
//! }
//!
//! impl Trigger for OneShotTrigger {
//!   fn key(&self) -> &TriggerKey {
//!     &self.key
//!   }
//!
//!   fn execution_complete(
//!     &mut self,
//!     _ctx: &ExecutionContext,
//!     job_error: Option<&JobFailure>,
//!   ) -> Result<CompletionInstruction, TriggerError> {
//!     Ok(if job_error.is_some() {
//!       CompletionInstruction::SetTriggerError
//!     } else {
//!       CompletionInstruction::SetTriggerComplete
//!     })
//!   }
//!
//!   fn next_fire_time(&self) -> Option<DateTime<Utc>> {
//!     None
//!   }
//! }
//!
//! struct QuietBus;
//!
//! #[async_trait]
//! impl ListenerBus for QuietBus {
//!   async fn notify_trigger_listeners_fired(
//!     &self,
//!     _ctx: &ExecutionContext,
//!   ) -> Result<bool, ListenerError> {
//!     Ok(false)
//!   }
//!
//!   async fn notify_job_listeners_was_vetoed(
//!     &self,
//!     _ctx: &ExecutionContext,
//!   ) -> Result<(), ListenerError> {
//!     Ok(())
//!   }
//!
//!   async fn notify_job_listeners_to_be_executed(
//!     &self,
//!     _ctx: &ExecutionContext,
//!   ) -> Result<(), ListenerError> {
//!     Ok(())
//!   }
//!
//!   async fn notify_job_listeners_was_executed(
//!     &self,
//!     _ctx: &ExecutionContext,
//!     _job_error: Option<&JobFailure>,
//!   ) -> Result<(), ListenerError> {
//!     Ok(())
//!   }
//!
//!   async fn notify_trigger_listeners_complete(
//!     &self,
//!     _ctx: &ExecutionContext,
//!     _instruction: CompletionInstruction,
//!   ) -> Result<(), ListenerError> {
//!     Ok(())
//!   }
//!
//!   async fn notify_scheduler_listeners_finalized(&self, trigger_key: &TriggerKey) {
//!     println!("trigger {trigger_key} finalized");
//!   }
//! }
//!
//! struct InMemoryScheduler {
//!   factory: Arc<dyn JobFactory>,
//! }
//!
//! #[async_trait]
//! impl SchedulerFacade for InMemoryScheduler {
//!   fn job_factory(&self) -> Arc<dyn JobFactory> {
//!     self.factory.clone()
//!   }
//!
//!   async fn notify_scheduler_listeners_error(
//!     &self,
//!     message: &str,
//!     error: &(dyn StdError + Send + Sync + 'static),
//!   ) {
//!     eprintln!("{message}: {error}");
//!   }
//!
//!   async fn notify_job_store_job_complete(
//!     &self,
//!     _trigger: &SharedTrigger,
//!     _job_detail: &JobDetail,
//!     _instruction: CompletionInstruction,
//!   ) -> Result<(), PersistenceError> {
//!     Ok(())
//!   }
//!
//!   async fn notify_job_store_job_vetoed(
//!     &self,
//!     _trigger: &SharedTrigger,
//!     _job_detail: &JobDetail,
//!     _instruction: CompletionInstruction,
//!   ) -> Result<(), PersistenceError> {
//!     Ok(())
//!   }
//!
//!   fn is_shutting_down(&self) -> bool {
//!     false
//!   }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn StdError>> {
//!   let trigger: SharedTrigger = Arc::new(Mutex::new(OneShotTrigger {
//!     key: TriggerKey::new("nightly"),
//!   }));
//!   let detail = JobDetail::new(JobKey::new("report"));
//!   let now = Utc::now();
//!   let bundle = FiredTriggerBundle::new(detail, trigger, now, now);
//!
//!   let scheduler = Arc::new(InMemoryScheduler {
//!     factory: Arc::new(PrintJobFactory),
//!   });
//!   let shutdown = ShutdownToken::new();
//!
//!   let mut shell = JobRunShell::new(bundle, Arc::new(QuietBus), shutdown.clone());
//!   shell.initialize(scheduler).await?;
//!   let outcome = shell.run().await?;
//!   println!("firing ended: {outcome:?}");
//!   Ok(())
//! }
//! ```
//!
//! # Failure model
//!
//! Nothing escapes [`JobRunShell::run`] as an unhandled failure. The one
//! failure that escapes the shell at all is the fatal instantiation error
//! from [`JobRunShell::initialize`]. Scheduler listeners receive
//! a human-readable message plus the underlying error for every reportable
//! condition; store-retry reports are rate limited but never dropped
//! entirely.

pub mod bundle;
pub mod context;
pub mod error;
pub mod job;
pub mod listeners;
pub mod metrics;
pub mod scheduler;
pub mod shell;
pub mod shutdown;
pub mod trigger;

// --- Public Re-exports ---

pub use bundle::FiredTriggerBundle;
pub use context::{ExecutionContext, RunTiming};
pub use error::{
  BoxedError, InstantiationError, JobFailure, ListenerError, PersistenceError, ShellError,
  TriggerError,
};
pub use job::{Job, JobDetail, JobFactory, JobKey};
pub use listeners::ListenerBus;
pub use metrics::{DurationHistogram, MetricsSnapshot, ShellMetrics};
pub use scheduler::SchedulerFacade;
pub use shell::{
  JobRunShell, RetryConfig, RunOutcome, DEFAULT_COMPLETE_RETRY_INTERVAL,
  DEFAULT_VETOED_RETRY_INTERVAL,
};
pub use shutdown::ShutdownToken;
pub use trigger::{CompletionInstruction, SharedTrigger, Trigger, TriggerKey};

//! tests/common.rs
//! Shared test doubles for integration tests: a scripted trigger, a
//! recording listener bus, a stub scheduler facade, and a handful of jobs.

#![allow(dead_code)] // each test binary uses its own subset of the doubles

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use fireshell::{
  CompletionInstruction, ExecutionContext, FiredTriggerBundle, InstantiationError, Job, JobDetail,
  JobFactory, JobFailure, JobKey, ListenerBus, ListenerError, PersistenceError, SchedulerFacade,
  SharedTrigger, Trigger, TriggerError, TriggerKey,
};

// Initializes tracing subscriber for test output.
pub fn setup_tracing() {
  // Use try_init to avoid panic if called multiple times
  let _ = tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_test_writer()
    .try_init();
}

/// Builds a fired-trigger bundle for the given job name and trigger.
pub fn bundle_for(job: &str, trigger: SharedTrigger) -> FiredTriggerBundle {
  let now = Utc::now();
  FiredTriggerBundle::new(JobDetail::new(JobKey::new(job)), trigger, now, now)
}

// --- Trigger double ---

/// Observable state shared between a test and its [`ScriptedTrigger`].
#[derive(Default)]
pub struct TriggerProbe {
  pub completions: AtomicUsize,
  pub saw_job_error: AtomicBool,
  pub saw_unschedule_flag: AtomicBool,
}

/// Trigger whose completion decisions are scripted up front. Once the
/// script runs dry every further completion yields `Noop`.
pub struct ScriptedTrigger {
  key: TriggerKey,
  instructions: VecDeque<CompletionInstruction>,
  next_fire: Option<DateTime<Utc>>,
  fail_completion: bool,
  probe: Arc<TriggerProbe>,
}

impl ScriptedTrigger {
  pub fn new(name: &str) -> Self {
    Self {
      key: TriggerKey::new(name),
      instructions: VecDeque::new(),
      next_fire: None,
      fail_completion: false,
      probe: Arc::new(TriggerProbe::default()),
    }
  }

  pub fn with_instructions(
    mut self,
    instructions: impl IntoIterator<Item = CompletionInstruction>,
  ) -> Self {
    self.instructions = instructions.into_iter().collect();
    self
  }

  pub fn with_next_fire_time(mut self, next_fire: DateTime<Utc>) -> Self {
    self.next_fire = Some(next_fire);
    self
  }

  pub fn failing_completion(mut self) -> Self {
    self.fail_completion = true;
    self
  }

  pub fn probe(&self) -> Arc<TriggerProbe> {
    self.probe.clone()
  }

  pub fn into_shared(self) -> SharedTrigger {
    Arc::new(Mutex::new(self))
  }
}

impl Trigger for ScriptedTrigger {
  fn key(&self) -> &TriggerKey {
    &self.key
  }

  fn execution_complete(
    &mut self,
    _ctx: &ExecutionContext,
    job_error: Option<&JobFailure>,
  ) -> Result<CompletionInstruction, TriggerError> {
    self.probe.completions.fetch_add(1, Ordering::SeqCst);
    if let Some(failure) = job_error {
      self.probe.saw_job_error.store(true, Ordering::SeqCst);
      if failure.should_unschedule_triggers() {
        self.probe.saw_unschedule_flag.store(true, Ordering::SeqCst);
      }
    }
    if self.fail_completion {
      return Err(TriggerError::new("scripted trigger defect"));
    }
    Ok(
      self
        .instructions
        .pop_front()
        .unwrap_or(CompletionInstruction::Noop),
    )
  }

  fn next_fire_time(&self) -> Option<DateTime<Utc>> {
    self.next_fire
  }
}

// --- Listener bus double ---

/// Call counts and captured arguments for [`RecordingBus`].
#[derive(Default)]
pub struct BusLog {
  pub fired: AtomicUsize,
  pub was_vetoed: AtomicUsize,
  pub to_be_executed: AtomicUsize,
  pub was_executed: AtomicUsize,
  pub trigger_complete: AtomicUsize,
  pub finalized: AtomicUsize,
  pub last_job_error: Mutex<Option<String>>,
  pub last_unschedule_flag: AtomicBool,
  pub last_instruction: Mutex<Option<CompletionInstruction>>,
}

/// Listener bus that records every notification. Individual phases can be
/// configured to veto or fail.
#[derive(Default)]
pub struct RecordingBus {
  pub log: BusLog,
  veto: bool,
  fail_fired: bool,
  fail_was_vetoed: bool,
  fail_to_be_executed: bool,
  fail_was_executed: bool,
  fail_trigger_complete: bool,
}

impl RecordingBus {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn vetoing(mut self) -> Self {
    self.veto = true;
    self
  }

  pub fn failing_fired(mut self) -> Self {
    self.fail_fired = true;
    self
  }

  pub fn failing_was_vetoed(mut self) -> Self {
    self.fail_was_vetoed = true;
    self
  }

  pub fn failing_to_be_executed(mut self) -> Self {
    self.fail_to_be_executed = true;
    self
  }

  pub fn failing_was_executed(mut self) -> Self {
    self.fail_was_executed = true;
    self
  }

  pub fn failing_trigger_complete(mut self) -> Self {
    self.fail_trigger_complete = true;
    self
  }
}

#[async_trait]
impl ListenerBus for RecordingBus {
  async fn notify_trigger_listeners_fired(
    &self,
    _ctx: &ExecutionContext,
  ) -> Result<bool, ListenerError> {
    self.log.fired.fetch_add(1, Ordering::SeqCst);
    if self.fail_fired {
      return Err(ListenerError::new("fired notification failed"));
    }
    Ok(self.veto)
  }

  async fn notify_job_listeners_was_vetoed(
    &self,
    _ctx: &ExecutionContext,
  ) -> Result<(), ListenerError> {
    self.log.was_vetoed.fetch_add(1, Ordering::SeqCst);
    if self.fail_was_vetoed {
      return Err(ListenerError::new("was-vetoed notification failed"));
    }
    Ok(())
  }

  async fn notify_job_listeners_to_be_executed(
    &self,
    _ctx: &ExecutionContext,
  ) -> Result<(), ListenerError> {
    self.log.to_be_executed.fetch_add(1, Ordering::SeqCst);
    if self.fail_to_be_executed {
      return Err(ListenerError::new("to-be-executed notification failed"));
    }
    Ok(())
  }

  async fn notify_job_listeners_was_executed(
    &self,
    _ctx: &ExecutionContext,
    job_error: Option<&JobFailure>,
  ) -> Result<(), ListenerError> {
    self.log.was_executed.fetch_add(1, Ordering::SeqCst);
    if let Some(failure) = job_error {
      *self.log.last_job_error.lock() = Some(failure.message().to_string());
      self
        .log
        .last_unschedule_flag
        .store(failure.should_unschedule_triggers(), Ordering::SeqCst);
    }
    if self.fail_was_executed {
      return Err(ListenerError::new("was-executed notification failed"));
    }
    Ok(())
  }

  async fn notify_trigger_listeners_complete(
    &self,
    _ctx: &ExecutionContext,
    instruction: CompletionInstruction,
  ) -> Result<(), ListenerError> {
    self.log.trigger_complete.fetch_add(1, Ordering::SeqCst);
    *self.log.last_instruction.lock() = Some(instruction);
    if self.fail_trigger_complete {
      return Err(ListenerError::new("trigger-complete notification failed"));
    }
    Ok(())
  }

  async fn notify_scheduler_listeners_finalized(&self, _trigger_key: &TriggerKey) {
    self.log.finalized.fetch_add(1, Ordering::SeqCst);
  }
}

// --- Scheduler facade double ---

/// Scheduler facade whose store calls succeed or fail per a scripted
/// sequence (`true` = success). Once a script runs dry the corresponding
/// call falls back to its fails-forever flag.
pub struct StubScheduler {
  factory: Arc<dyn JobFactory>,
  pub complete_calls: AtomicUsize,
  pub vetoed_calls: AtomicUsize,
  pub reports: Mutex<Vec<String>>,
  pub last_complete_instruction: Mutex<Option<CompletionInstruction>>,
  complete_script: Mutex<VecDeque<bool>>,
  vetoed_script: Mutex<VecDeque<bool>>,
  complete_fails_forever: AtomicBool,
  vetoed_fails_forever: AtomicBool,
  shutting_down: AtomicBool,
}

impl StubScheduler {
  pub fn new(factory: Arc<dyn JobFactory>) -> Self {
    Self {
      factory,
      complete_calls: AtomicUsize::new(0),
      vetoed_calls: AtomicUsize::new(0),
      reports: Mutex::new(Vec::new()),
      last_complete_instruction: Mutex::new(None),
      complete_script: Mutex::new(VecDeque::new()),
      vetoed_script: Mutex::new(VecDeque::new()),
      complete_fails_forever: AtomicBool::new(false),
      vetoed_fails_forever: AtomicBool::new(false),
      shutting_down: AtomicBool::new(false),
    }
  }

  pub fn script_complete(&self, results: impl IntoIterator<Item = bool>) {
    self.complete_script.lock().extend(results);
  }

  pub fn script_vetoed(&self, results: impl IntoIterator<Item = bool>) {
    self.vetoed_script.lock().extend(results);
  }

  pub fn fail_complete_forever(&self) {
    self.complete_fails_forever.store(true, Ordering::SeqCst);
  }

  pub fn fail_vetoed_forever(&self) {
    self.vetoed_fails_forever.store(true, Ordering::SeqCst);
  }

  pub fn set_shutting_down(&self) {
    self.shutting_down.store(true, Ordering::SeqCst);
  }

  pub fn reports_matching(&self, needle: &str) -> usize {
    self
      .reports
      .lock()
      .iter()
      .filter(|report| report.contains(needle))
      .count()
  }
}

#[async_trait]
impl SchedulerFacade for StubScheduler {
  fn job_factory(&self) -> Arc<dyn JobFactory> {
    self.factory.clone()
  }

  async fn notify_scheduler_listeners_error(
    &self,
    message: &str,
    error: &(dyn std::error::Error + Send + Sync + 'static),
  ) {
    self.reports.lock().push(format!("{message}: {error}"));
  }

  async fn notify_job_store_job_complete(
    &self,
    _trigger: &SharedTrigger,
    _job_detail: &JobDetail,
    instruction: CompletionInstruction,
  ) -> Result<(), PersistenceError> {
    self.complete_calls.fetch_add(1, Ordering::SeqCst);
    *self.last_complete_instruction.lock() = Some(instruction);
    let ok = self
      .complete_script
      .lock()
      .pop_front()
      .unwrap_or(!self.complete_fails_forever.load(Ordering::SeqCst));
    if ok {
      Ok(())
    } else {
      Err(PersistenceError::new("job store unavailable"))
    }
  }

  async fn notify_job_store_job_vetoed(
    &self,
    _trigger: &SharedTrigger,
    _job_detail: &JobDetail,
    _instruction: CompletionInstruction,
  ) -> Result<(), PersistenceError> {
    self.vetoed_calls.fetch_add(1, Ordering::SeqCst);
    let ok = self
      .vetoed_script
      .lock()
      .pop_front()
      .unwrap_or(!self.vetoed_fails_forever.load(Ordering::SeqCst));
    if ok {
      Ok(())
    } else {
      Err(PersistenceError::new("job store unavailable"))
    }
  }

  fn is_shutting_down(&self) -> bool {
    self.shutting_down.load(Ordering::SeqCst)
  }
}

// --- Job doubles and factories ---

/// Job that counts its executions and succeeds.
pub struct CountingJob {
  runs: Arc<AtomicUsize>,
}

impl CountingJob {
  pub fn new(runs: Arc<AtomicUsize>) -> Self {
    Self { runs }
  }
}

#[async_trait]
impl Job for CountingJob {
  async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<(), JobFailure> {
    self.runs.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

/// Job that counts its executions and returns a declared failure.
pub struct FailingJob {
  runs: Arc<AtomicUsize>,
  unschedule: bool,
}

impl FailingJob {
  pub fn new(runs: Arc<AtomicUsize>, unschedule: bool) -> Self {
    Self { runs, unschedule }
  }
}

#[async_trait]
impl Job for FailingJob {
  async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<(), JobFailure> {
    self.runs.fetch_add(1, Ordering::SeqCst);
    Err(JobFailure::new("job reported failure").unschedule_triggers(self.unschedule))
  }
}

/// Job that panics mid-execution.
pub struct PanickingJob;

#[async_trait]
impl Job for PanickingJob {
  async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<(), JobFailure> {
    tokio::task::yield_now().await;
    panic!("job forced panic!");
  }
}

/// Job that records the refire count it observes on each attempt.
pub struct RefireRecordingJob {
  refires: Arc<Mutex<Vec<u32>>>,
}

impl RefireRecordingJob {
  pub fn new(refires: Arc<Mutex<Vec<u32>>>) -> Self {
    Self { refires }
  }
}

#[async_trait]
impl Job for RefireRecordingJob {
  async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), JobFailure> {
    self.refires.lock().push(ctx.refire_count());
    Ok(())
  }
}

/// Factory that counts instantiations and delegates to a closure.
pub struct TestFactory {
  pub instantiations: AtomicUsize,
  builder: Box<dyn Fn() -> Result<Box<dyn Job>, InstantiationError> + Send + Sync>,
}

impl TestFactory {
  pub fn new<F>(builder: F) -> Self
  where
    F: Fn() -> Result<Box<dyn Job>, InstantiationError> + Send + Sync + 'static,
  {
    Self {
      instantiations: AtomicUsize::new(0),
      builder: Box::new(builder),
    }
  }
}

impl JobFactory for TestFactory {
  fn new_job(
    &self,
    _bundle: &FiredTriggerBundle,
    _scheduler: Arc<dyn SchedulerFacade>,
  ) -> Result<Box<dyn Job>, InstantiationError> {
    self.instantiations.fetch_add(1, Ordering::SeqCst);
    (self.builder)()
  }
}

/// Factory that panics instead of building a job.
pub struct PanickingFactory;

impl JobFactory for PanickingFactory {
  fn new_job(
    &self,
    _bundle: &FiredTriggerBundle,
    _scheduler: Arc<dyn SchedulerFacade>,
  ) -> Result<Box<dyn Job>, InstantiationError> {
    panic!("factory exploded")
  }
}

/// Convenience: a factory producing [`CountingJob`]s sharing `runs`.
pub fn counting_factory(runs: Arc<AtomicUsize>) -> Arc<TestFactory> {
  Arc::new(TestFactory::new(move || {
    Ok(Box::new(CountingJob::new(runs.clone())))
  }))
}

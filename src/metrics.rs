use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Concurrent histogram storing observation count and sum of microseconds.
/// Enough for mean-latency tracking; `Relaxed` ordering is fine since the
/// two cells do not need to be consistent with each other.
#[derive(Debug, Default)]
pub struct DurationHistogram {
  count: AtomicUsize,
  sum_micros: AtomicUsize,
}

impl DurationHistogram {
  pub fn record(&self, duration: Duration) {
    self.count.fetch_add(1, Ordering::Relaxed);
    self.sum_micros.fetch_add(
      duration.as_micros().try_into().unwrap_or(usize::MAX),
      Ordering::Relaxed,
    );
  }

  pub fn count(&self) -> usize {
    self.count.load(Ordering::Relaxed)
  }

  pub fn sum_micros(&self) -> usize {
    self.sum_micros.load(Ordering::Relaxed)
  }
}

/// Counters tracking what happened across the firings a shell (or a set of
/// shells sharing the struct) has run.
///
/// Cloning clones the `Arc`s, so clones observe the same underlying values.
#[derive(Debug, Clone)]
pub struct ShellMetrics {
  /// Firings that ended with a successful store acknowledgement.
  pub firings_completed: Arc<AtomicUsize>,
  /// Firings vetoed by a trigger listener before execution.
  pub firings_vetoed: Arc<AtomicUsize>,
  /// Firings ended early by a listener-phase failure, with no store update.
  pub firings_aborted: Arc<AtomicUsize>,
  /// Firings whose store acknowledgement was abandoned due to shutdown.
  pub firings_abandoned: Arc<AtomicUsize>,
  /// Execution attempts that returned normally.
  pub executions_succeeded: Arc<AtomicUsize>,
  /// Execution attempts that returned a declared job failure.
  pub executions_failed: Arc<AtomicUsize>,
  /// Execution attempts that panicked.
  pub executions_panicked: Arc<AtomicUsize>,
  /// Re-execute cycles requested by triggers.
  pub reexecutions: Arc<AtomicUsize>,
  /// Individual store acknowledgement retries across both retry loops.
  pub store_retry_attempts: Arc<AtomicUsize>,
  /// Duration of job execution attempts.
  pub execution_duration: Arc<DurationHistogram>,
}

impl Default for ShellMetrics {
  fn default() -> Self {
    Self::new()
  }
}

impl ShellMetrics {
  pub fn new() -> Self {
    Self {
      firings_completed: Default::default(),
      firings_vetoed: Default::default(),
      firings_aborted: Default::default(),
      firings_abandoned: Default::default(),
      executions_succeeded: Default::default(),
      executions_failed: Default::default(),
      executions_panicked: Default::default(),
      reexecutions: Default::default(),
      store_retry_attempts: Default::default(),
      execution_duration: Arc::new(DurationHistogram::default()),
    }
  }

  /// Point-in-time copy of all counters.
  pub fn snapshot(&self) -> MetricsSnapshot {
    let order = Ordering::Relaxed;
    MetricsSnapshot {
      firings_completed: self.firings_completed.load(order),
      firings_vetoed: self.firings_vetoed.load(order),
      firings_aborted: self.firings_aborted.load(order),
      firings_abandoned: self.firings_abandoned.load(order),
      executions_succeeded: self.executions_succeeded.load(order),
      executions_failed: self.executions_failed.load(order),
      executions_panicked: self.executions_panicked.load(order),
      reexecutions: self.reexecutions.load(order),
      store_retry_attempts: self.store_retry_attempts.load(order),
      execution_duration_count: self.execution_duration.count(),
      execution_duration_sum_micros: self.execution_duration.sum_micros(),
    }
  }
}

/// Plain-data snapshot of [`ShellMetrics`], suitable for logging or export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
  pub firings_completed: usize,
  pub firings_vetoed: usize,
  pub firings_aborted: usize,
  pub firings_abandoned: usize,
  pub executions_succeeded: usize,
  pub executions_failed: usize,
  pub executions_panicked: usize,
  pub reexecutions: usize,
  pub store_retry_attempts: usize,
  pub execution_duration_count: usize,
  pub execution_duration_sum_micros: usize,
}

impl MetricsSnapshot {
  /// Mean execution duration, if any attempt has been recorded.
  pub fn mean_execution_duration(&self) -> Option<Duration> {
    if self.execution_duration_count == 0 {
      None
    } else {
      let mean = self.execution_duration_sum_micros as f64 / self.execution_duration_count as f64;
      Some(Duration::from_micros(mean as u64))
    }
  }
}

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Cooperative cancellation handle observed by the shell's retry loops.
///
/// The token is a monotonic flag: [`request`](ShutdownToken::request) moves
/// it from unset to set exactly once (idempotent thereafter) and there is no
/// way to unset it. The write side is typically driven by the scheduler's
/// shutdown path; the read side is the firing's worker task. A plain atomic
/// store/load is sufficient since the flag only ever transitions false→true.
///
/// Cloning shares the underlying flag.
#[derive(Clone, Default)]
pub struct ShutdownToken {
  inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
  requested: AtomicBool,
  notify: Notify,
}

impl ShutdownToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the flag and wakes every waiter. Safe to call from any thread,
  /// any number of times.
  pub fn request(&self) {
    if !self.inner.requested.swap(true, Ordering::SeqCst) {
      self.inner.notify.notify_waiters();
    }
  }

  pub fn is_requested(&self) -> bool {
    self.inner.requested.load(Ordering::SeqCst)
  }

  /// Resolves once shutdown has been requested. Returns immediately if the
  /// flag is already set.
  pub async fn requested(&self) {
    loop {
      if self.is_requested() {
        return;
      }
      let notified = self.inner.notify.notified();
      // Re-check between registering the waiter and awaiting it, so a
      // request() racing with us cannot be missed.
      if self.is_requested() {
        return;
      }
      notified.await;
    }
  }
}

impl fmt::Debug for ShutdownToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShutdownToken")
      .field("requested", &self.is_requested())
      .finish()
  }
}

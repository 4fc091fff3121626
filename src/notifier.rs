use crate::error::PoolError;
use crate::task::ThreadName;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, trace};

// --- Public Event Structs for Handlers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadCompletionStatus {
  Success,
  Panicked,
}

impl<R> From<&Result<R, PoolError>> for ThreadCompletionStatus {
  fn from(result: &Result<R, PoolError>) -> Self {
    match result {
      Ok(_) => ThreadCompletionStatus::Success,
      Err(_) => ThreadCompletionStatus::Panicked,
    }
  }
}

/// Describes one finished work item, passed to every completion handler.
#[derive(Debug, Clone)]
pub struct ThreadCompletionInfo {
  pub pool_name: Arc<String>,
  pub name: ThreadName,
  pub status: ThreadCompletionStatus,
  /// Time spent running the callable, excluding any wait for a concurrency slot.
  pub elapsed: Duration,
  pub completion_time: SystemTime,
}

type CompletionHandler = Arc<dyn Fn(ThreadCompletionInfo) + Send + Sync + 'static>;

/// Fans completion events out to registered handlers.
///
/// Handlers run synchronously on the worker thread that finished, before its
/// result is handed to the joiner. A handler registered after a work item
/// completed does not see that completion.
pub(crate) struct CompletionNotifier {
  pool_name: Arc<String>,
  handlers: RwLock<Vec<CompletionHandler>>,
}

impl fmt::Debug for CompletionNotifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompletionNotifier")
      .field("pool_name", &self.pool_name)
      .field("handler_count", &self.handler_count())
      .finish()
  }
}

impl CompletionNotifier {
  pub(crate) fn new(pool_name: Arc<String>) -> Self {
    Self {
      pool_name,
      handlers: RwLock::new(Vec::new()),
    }
  }

  pub(crate) fn add_handler(&self, handler: impl Fn(ThreadCompletionInfo) + Send + Sync + 'static) {
    let mut handlers_guard = self.handlers.write();
    handlers_guard.push(Arc::new(handler));
    debug!(pool_name = %*self.pool_name, "Notifier: Added new completion handler. Total handlers: {}", handlers_guard.len());
  }

  pub(crate) fn handler_count(&self) -> usize {
    self.handlers.read().len()
  }

  pub(crate) fn notify(&self, name: &str, status: ThreadCompletionStatus, elapsed: Duration) {
    // Snapshot so a handler may register further handlers without deadlocking.
    let handlers: Vec<CompletionHandler> = self.handlers.read().clone();
    if handlers.is_empty() {
      trace!(thread = %name, "No completion handlers registered, dropping notification.");
      return;
    }

    let info = ThreadCompletionInfo {
      pool_name: self.pool_name.clone(),
      name: name.to_string(),
      status,
      elapsed,
      completion_time: SystemTime::now(),
    };

    trace!(thread = %name, "Dispatching notification to {} handlers.", handlers.len());
    for handler in handlers {
      let info_for_handler = info.clone();
      let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(info_for_handler)));
      if result.is_err() {
        error!(pool_name = %*self.pool_name, thread = %name, "A completion handler panicked during execution.");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn status_follows_outcome() {
    let ok: Result<u8, PoolError> = Ok(1);
    let failed: Result<u8, PoolError> = Err(PoolError::WorkPanicked {
      name: "a".to_string(),
      message: "boom".to_string(),
    });
    assert_eq!(ThreadCompletionStatus::from(&ok), ThreadCompletionStatus::Success);
    assert_eq!(ThreadCompletionStatus::from(&failed), ThreadCompletionStatus::Panicked);
  }

  #[test]
  fn panicking_handler_does_not_stop_others() {
    let notifier = CompletionNotifier::new(Arc::new("p".to_string()));
    let calls = Arc::new(AtomicUsize::new(0));

    notifier.add_handler(|_| panic!("handler failure"));
    let calls_clone = calls.clone();
    notifier.add_handler(move |info| {
      assert_eq!(info.name, "job");
      assert_eq!(*info.pool_name, "p");
      calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    notifier.notify("job", ThreadCompletionStatus::Success, Duration::from_millis(5));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.handler_count(), 2);
  }
}

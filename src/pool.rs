use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::handle::{ThreadContext, ThreadHandle};
use crate::notifier::ThreadCompletionInfo;
use crate::task::{ThreadName, WorkItem};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, trace, warn};

/// Outcome of every work item in a pool, keyed by name.
pub type ThreadResults<R> = HashMap<ThreadName, Result<R, PoolError>>;

/// A named collection of work items, each run on its own OS thread, whose
/// return values are collected by name once all of them have finished.
///
/// ```rust
/// use returning_threads::{ThreadPool, WorkItem};
///
/// let pool = ThreadPool::new([
///     WorkItem::new("a", || 1),
///     WorkItem::with_args("b", |x: i32| x * 2, 5),
/// ]);
/// let results = pool.start_and_join().unwrap();
/// assert_eq!(results["a"], Ok(1));
/// assert_eq!(results["b"], Ok(10));
/// ```
pub struct ThreadPool<R: Send + 'static> {
  context: Arc<ThreadContext>,
  threads: Vec<ThreadHandle<R>>,
}

impl<R: Send + 'static> fmt::Debug for ThreadPool<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadPool")
      .field("name", &self.context.pool_name)
      .field("threads", &self.threads)
      .field("completion_handlers", &self.context.notifier.handler_count())
      .finish()
  }
}

impl<R: Send + 'static> ThreadPool<R> {
  /// Builds a pool with default configuration (unbounded concurrency).
  pub fn new(items: impl IntoIterator<Item = WorkItem<R>>) -> Self {
    Self::with_config(items, PoolConfig::default())
  }

  /// Builds a pool. Items keep their order; when a name repeats, the later
  /// item replaces the earlier one in the earlier one's position.
  pub fn with_config(items: impl IntoIterator<Item = WorkItem<R>>, config: PoolConfig) -> Self {
    let context = ThreadContext::new(config);
    let mut threads: Vec<ThreadHandle<R>> = Vec::new();
    let mut positions: HashMap<ThreadName, usize> = HashMap::new();

    for item in items {
      let handle = ThreadHandle::from_context(item, context.clone());
      match positions.get(handle.name()) {
        Some(&index) => {
          debug!(pool_name = %*context.pool_name, thread = %handle.name(), "Duplicate work item name, replacing the earlier item.");
          threads[index] = handle;
        }
        None => {
          positions.insert(handle.name().to_string(), threads.len());
          threads.push(handle);
        }
      }
    }

    debug!(
      pool_name = %*context.pool_name,
      threads = threads.len(),
      max_concurrency = ?context.config.max_concurrency,
      "Thread pool created."
    );
    Self { context, threads }
  }

  pub fn name(&self) -> &str {
    &self.context.pool_name
  }

  pub fn config(&self) -> &PoolConfig {
    &self.context.config
  }

  pub fn len(&self) -> usize {
    self.threads.len()
  }

  pub fn is_empty(&self) -> bool {
    self.threads.is_empty()
  }

  /// Names of the work items in start/join order.
  pub fn names(&self) -> Vec<&str> {
    self.threads.iter().map(ThreadHandle::name).collect()
  }

  /// Number of work items currently executing their callable.
  pub fn active_count(&self) -> usize {
    self.context.active.len()
  }

  /// Names of the work items currently executing their callable, in no particular order.
  pub fn active_names(&self) -> Vec<ThreadName> {
    self.context.active.iter().map(|entry| entry.value().clone()).collect()
  }

  /// Registers a handler called on the worker thread each time a work item
  /// finishes, before its result reaches `join`.
  pub fn on_completion(&self, handler: impl Fn(ThreadCompletionInfo) + Send + Sync + 'static) {
    self.context.notifier.add_handler(handler);
  }

  /// Launches every work item that has not been started yet on its own
  /// thread, in stored order, without waiting for any of them to finish.
  ///
  /// After a `SpawnFailed`, calling `start` again launches only the items
  /// that were never reached; the failed item reports its error on join.
  ///
  /// # Errors
  /// Returns `PoolError::AlreadyStarted` (naming the first item) when every
  /// item was already started, or the first `PoolError::SpawnFailed`.
  pub fn start(&mut self) -> Result<(), PoolError> {
    let pending = self.threads.iter().filter(|handle| !handle.is_started()).count();
    if pending == 0 {
      if let Some(first) = self.threads.first() {
        warn!(pool_name = %*self.context.pool_name, "Start requested on a pool whose threads were all started.");
        return Err(PoolError::AlreadyStarted { name: first.name().to_string() });
      }
    }

    info!(pool_name = %*self.context.pool_name, threads = pending, "Starting threads.");
    for handle in self.threads.iter_mut().filter(|handle| !handle.is_started()) {
      handle.start()?;
    }
    trace!(pool_name = %*self.context.pool_name, "All threads launched.");
    Ok(())
  }

  /// Waits for every work item, joining them sequentially in stored order,
  /// and returns each outcome by name.
  ///
  /// Must not be called from within an async runtime; use [`ThreadPool::join_async`] there.
  pub fn join(self) -> ThreadResults<R> {
    let pool_name = self.context.pool_name.clone();
    let mut results = HashMap::with_capacity(self.threads.len());
    for handle in self.threads {
      let name = handle.name().to_string();
      results.insert(name, handle.into_outcome());
    }
    Self::log_joined(&pool_name, &results);
    results
  }

  /// Async variant of [`ThreadPool::join`].
  pub async fn join_async(self) -> ThreadResults<R> {
    let pool_name = self.context.pool_name.clone();
    let names: Vec<ThreadName> = self.threads.iter().map(|h| h.name().to_string()).collect();
    let outcomes = join_all(self.threads.into_iter().map(ThreadHandle::into_outcome_async)).await;
    let results: ThreadResults<R> = names.into_iter().zip(outcomes).collect();
    Self::log_joined(&pool_name, &results);
    results
  }

  /// Starts every work item and waits for all of them.
  pub fn start_and_join(mut self) -> Result<ThreadResults<R>, PoolError> {
    self.start()?;
    Ok(self.join())
  }

  /// Async variant of [`ThreadPool::start_and_join`].
  pub async fn start_and_join_async(mut self) -> Result<ThreadResults<R>, PoolError> {
    self.start()?;
    Ok(self.join_async().await)
  }

  fn log_joined(pool_name: &str, results: &ThreadResults<R>) {
    let failed = results.values().filter(|outcome| outcome.is_err()).count();
    info!(pool_name = %pool_name, threads = results.len(), failed, "All threads joined.");
  }
}

impl<R: Send + 'static> FromIterator<WorkItem<R>> for ThreadPool<R> {
  fn from_iter<I: IntoIterator<Item = WorkItem<R>>>(iter: I) -> Self {
    Self::new(iter)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn start_launches_only_items_not_yet_started() {
    let mut pool = ThreadPool::new([WorkItem::new("early", || 1), WorkItem::new("late", || 2)]);
    pool.threads[0].start().unwrap();
    assert!(!pool.threads[1].is_started());

    pool.start().unwrap();
    assert!(pool.threads.iter().all(ThreadHandle::is_started));

    let results = pool.join();
    assert_eq!(results["early"], Ok(1));
    assert_eq!(results["late"], Ok(2));
  }

  #[test]
  fn start_after_full_start_is_rejected() {
    let mut pool = ThreadPool::new([WorkItem::new("only", || ())]);
    pool.start().unwrap();
    assert_eq!(pool.start(), Err(PoolError::AlreadyStarted { name: "only".to_string() }));
    assert_eq!(pool.join()["only"], Ok(()));
  }
}

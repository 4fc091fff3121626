use crate::config::PoolConfig;
use crate::error::{panic_message, PoolError};
use crate::gate::ConcurrencyGate;
use crate::notifier::{CompletionNotifier, ThreadCompletionStatus};
use crate::task::{TaskToExecute, ThreadName, WorkItem};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, error, info_span, trace, warn};

lazy_static::lazy_static! {
  static ref NEXT_THREAD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// State shared by every handle of one pool (or owned by a standalone handle).
pub(crate) struct ThreadContext {
  pub(crate) config: PoolConfig,
  pub(crate) pool_name: Arc<String>,
  pub(crate) gate: Option<Arc<ConcurrencyGate>>,
  pub(crate) notifier: CompletionNotifier,
  /// Work items currently executing their callable, keyed by thread id.
  pub(crate) active: DashMap<u64, ThreadName>,
}

impl ThreadContext {
  pub(crate) fn new(config: PoolConfig) -> Arc<Self> {
    let pool_name = Arc::new(config.name.clone());
    Arc::new(Self {
      gate: config.max_concurrency.map(|limit| Arc::new(ConcurrencyGate::new(limit))),
      notifier: CompletionNotifier::new(pool_name.clone()),
      active: DashMap::new(),
      pool_name,
      config,
    })
  }
}

enum HandleState<R: Send + 'static> {
  Pending(TaskToExecute<R>),
  Running {
    thread: JoinHandle<()>,
    result_rx: oneshot::Receiver<Result<R, PoolError>>,
  },
  Finished(Result<R, PoolError>),
  /// Transient placeholder while the state is being moved.
  Vacant,
}

impl<R: Send + 'static> HandleState<R> {
  fn label(&self) -> &'static str {
    match self {
      HandleState::Pending(_) => "pending",
      HandleState::Running { .. } => "running",
      HandleState::Finished(Ok(_)) => "finished",
      HandleState::Finished(Err(_)) => "failed",
      HandleState::Vacant => "vacant",
    }
  }
}

/// A handle to one work item running on its own OS thread.
///
/// The handle is started at most once and may be joined any number of times;
/// the first join blocks until the thread finishes and caches the outcome,
/// later joins return the cached outcome immediately.
pub struct ThreadHandle<R: Send + 'static> {
  thread_id: u64,
  name: ThreadName,
  context: Arc<ThreadContext>,
  state: HandleState<R>,
}

impl<R: Send + 'static> fmt::Debug for ThreadHandle<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadHandle")
      .field("thread_id", &self.thread_id)
      .field("name", &self.name)
      .field("pool_name", &self.context.pool_name)
      .field("state", &self.state.label())
      .finish()
  }
}

impl<R: Send + 'static> ThreadHandle<R> {
  /// Creates a standalone, not yet started handle with default configuration.
  pub fn new(item: WorkItem<R>) -> Self {
    Self::with_config(item, &PoolConfig::default())
  }

  /// Creates a standalone, not yet started handle using the config's name,
  /// stack size and thread name prefix. A concurrency bound only has meaning
  /// across a pool, so it is ignored here.
  pub fn with_config(item: WorkItem<R>, config: &PoolConfig) -> Self {
    Self::from_context(item, ThreadContext::new(config.clone().unbounded()))
  }

  pub(crate) fn from_context(item: WorkItem<R>, context: Arc<ThreadContext>) -> Self {
    Self {
      thread_id: NEXT_THREAD_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
      name: item.name,
      context,
      state: HandleState::Pending(item.task),
    }
  }

  /// Creates a handle and starts it immediately.
  pub fn spawn(item: WorkItem<R>) -> Result<Self, PoolError> {
    let mut handle = Self::new(item);
    handle.start()?;
    Ok(handle)
  }

  /// Runs a work item on its own thread. When `threaded` is false this waits
  /// for the value; otherwise the thread is left running detached and `None`
  /// is returned straight away.
  pub fn run(item: WorkItem<R>, threaded: bool) -> Result<Option<R>, PoolError> {
    let handle = Self::spawn(item)?;
    if threaded {
      trace!(thread = %handle.name, "Detaching threaded work item.");
      return Ok(None);
    }
    handle.into_outcome().map(Some)
  }

  /// Returns the unique ID of this handle.
  pub fn id(&self) -> u64 {
    self.thread_id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_started(&self) -> bool {
    !matches!(self.state, HandleState::Pending(_))
  }

  /// Returns true once the callable has returned or panicked.
  pub fn is_finished(&self) -> bool {
    match &self.state {
      HandleState::Running { thread, .. } => thread.is_finished(),
      HandleState::Finished(_) => true,
      HandleState::Pending(_) | HandleState::Vacant => false,
    }
  }

  /// Spawns the OS thread running the work item and returns without waiting.
  ///
  /// # Errors
  /// Returns `PoolError::AlreadyStarted` if called a second time.
  /// Returns `PoolError::SpawnFailed` if the OS refused the thread; the
  /// handle then reports the same error on join.
  pub fn start(&mut self) -> Result<(), PoolError> {
    let task = match std::mem::replace(&mut self.state, HandleState::Vacant) {
      HandleState::Pending(task) => task,
      other => {
        self.state = other;
        warn!(pool_name = %*self.context.pool_name, thread = %self.name, "Start requested on a handle that was already started.");
        return Err(PoolError::AlreadyStarted { name: self.name.clone() });
      }
    };

    let (result_tx, result_rx) = oneshot::channel::<Result<R, PoolError>>();
    let mut builder = thread::Builder::new().name(self.context.config.os_thread_name(&self.name));
    if let Some(stack_size) = self.context.config.stack_size {
      builder = builder.stack_size(stack_size);
    }

    let context = self.context.clone();
    let thread_id = self.thread_id;
    let name = self.name.clone();
    match builder.spawn(move || Self::run_work_item(context, thread_id, name, task, result_tx)) {
      Ok(thread) => {
        debug!(pool_name = %*self.context.pool_name, thread = %self.name, %thread_id, "Thread started.");
        self.state = HandleState::Running { thread, result_rx };
        Ok(())
      }
      Err(io_error) => {
        error!(pool_name = %*self.context.pool_name, thread = %self.name, "Failed to spawn thread: {}", io_error);
        let spawn_error = PoolError::SpawnFailed {
          name: self.name.clone(),
          reason: io_error.to_string(),
        };
        self.state = HandleState::Finished(Err(spawn_error.clone()));
        Err(spawn_error)
      }
    }
  }

  /// Blocks until the thread finishes and returns its value.
  ///
  /// Must not be called from within an async runtime; use [`ThreadHandle::join_async`] there.
  ///
  /// # Errors
  /// Returns `PoolError::NotStarted` if the handle was never started.
  /// Returns `PoolError::WorkPanicked` if the callable panicked.
  pub fn join(&mut self) -> Result<&R, PoolError> {
    self.wait_blocking();
    self.cached_outcome()
  }

  /// Awaits the thread's completion and returns its value. Cancel-safe: if the
  /// returned future is dropped, the handle can still be joined later.
  pub async fn join_async(&mut self) -> Result<&R, PoolError> {
    self.wait_async().await;
    self.cached_outcome()
  }

  /// Joins if needed and hands over the owned outcome.
  pub fn into_outcome(mut self) -> Result<R, PoolError> {
    self.wait_blocking();
    self.take_outcome()
  }

  /// Async variant of [`ThreadHandle::into_outcome`].
  pub async fn into_outcome_async(mut self) -> Result<R, PoolError> {
    self.wait_async().await;
    self.take_outcome()
  }

  fn wait_blocking(&mut self) {
    match std::mem::replace(&mut self.state, HandleState::Vacant) {
      HandleState::Running { thread, result_rx } => {
        trace!(thread = %self.name, "Joining thread.");
        let outcome = result_rx
          .blocking_recv()
          .unwrap_or_else(|_| Err(self.channel_closed()));
        if thread.join().is_err() {
          // The callable is guarded by catch_unwind, so only bookkeeping could panic here.
          warn!(thread = %self.name, "Thread terminated abnormally after producing its result.");
        }
        self.state = HandleState::Finished(outcome);
      }
      other => self.state = other,
    }
  }

  async fn wait_async(&mut self) {
    if let HandleState::Running { result_rx, .. } = &mut self.state {
      trace!(thread = %self.name, "Awaiting thread result.");
      let outcome = result_rx.await.unwrap_or_else(|_| Err(self.channel_closed()));
      // The OS thread is past sending its result; dropping the JoinHandle detaches it.
      self.state = HandleState::Finished(outcome);
    }
  }

  fn cached_outcome(&self) -> Result<&R, PoolError> {
    match &self.state {
      HandleState::Finished(Ok(value)) => Ok(value),
      HandleState::Finished(Err(e)) => Err(e.clone()),
      HandleState::Pending(_) => Err(PoolError::NotStarted { name: self.name.clone() }),
      HandleState::Running { .. } | HandleState::Vacant => Err(self.channel_closed()),
    }
  }

  fn take_outcome(&mut self) -> Result<R, PoolError> {
    match std::mem::replace(&mut self.state, HandleState::Vacant) {
      HandleState::Finished(outcome) => outcome,
      HandleState::Pending(_) => Err(PoolError::NotStarted { name: self.name.clone() }),
      HandleState::Running { .. } | HandleState::Vacant => Err(self.channel_closed()),
    }
  }

  fn channel_closed(&self) -> PoolError {
    PoolError::ResultChannelError { name: self.name.clone() }
  }

  fn run_work_item(
    context: Arc<ThreadContext>,
    thread_id: u64,
    name: ThreadName,
    task: TaskToExecute<R>,
    result_tx: oneshot::Sender<Result<R, PoolError>>,
  ) {
    let span = info_span!("work_item", pool_name = %*context.pool_name, thread = %name, %thread_id);
    let _entered = span.enter();

    let permit = context.gate.as_ref().map(|gate| {
      trace!("Waiting for a concurrency slot.");
      gate.acquire()
    });

    context.active.insert(thread_id, name.clone());
    let started_at = Instant::now();
    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(task)) {
      Ok(value) => {
        trace!("Work item returned.");
        Ok(value)
      }
      Err(payload) => {
        let message = panic_message(&*payload);
        error!(%message, "Work item panicked during execution.");
        Err(PoolError::WorkPanicked {
          name: name.clone(),
          message,
        })
      }
    };
    let elapsed = started_at.elapsed();
    context.active.remove(&thread_id);
    drop(permit);

    context
      .notifier
      .notify(&name, ThreadCompletionStatus::from(&outcome), elapsed);

    if result_tx.send(outcome).is_err() {
      warn!("Result receiver was dropped. Work item outcome was lost.");
    }
  }
}

//! Configuration for thread pools and standalone handles.

/// Configuration options for a [`ThreadPool`](crate::ThreadPool).
///
/// # Example
///
/// ```rust
/// use returning_threads::PoolConfig;
///
/// let config = PoolConfig::new("ingest")
///     .max_concurrency(4)
///     .stack_size(512 * 1024)
///     .thread_name_prefix("ingest-worker");
/// assert_eq!(config.get_max_concurrency(), Some(4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
  /// Name of the pool, used in log fields and completion events.
  pub(crate) name: String,

  /// Upper bound on concurrently executing work items. `None` means unbounded.
  pub(crate) max_concurrency: Option<usize>,

  /// Stack size for spawned threads. `None` uses the platform default.
  pub(crate) stack_size: Option<usize>,

  /// Prefix for OS thread names; the work item's name is appended.
  pub(crate) thread_name_prefix: Option<String>,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      name: "thread_pool".to_string(),
      max_concurrency: None,
      stack_size: None,
      thread_name_prefix: None,
    }
  }
}

impl PoolConfig {
  /// Creates a configuration with the given pool name and default settings.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  /// Sets the pool name.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Bounds how many work items may execute at once. Values below 1 are treated as 1.
  ///
  /// Every work item still gets its own thread on `start`; excess threads wait
  /// for a free slot before running their callable.
  pub fn max_concurrency(mut self, limit: usize) -> Self {
    self.max_concurrency = Some(limit.max(1));
    self
  }

  /// Removes any concurrency bound (the default).
  pub fn unbounded(mut self) -> Self {
    self.max_concurrency = None;
    self
  }

  /// Sets the stack size, in bytes, of spawned threads.
  pub fn stack_size(mut self, bytes: usize) -> Self {
    self.stack_size = Some(bytes);
    self
  }

  /// Sets a prefix for OS thread names.
  pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.thread_name_prefix = Some(prefix.into());
    self
  }

  pub fn get_name(&self) -> &str {
    &self.name
  }

  pub fn get_max_concurrency(&self) -> Option<usize> {
    self.max_concurrency
  }

  pub fn get_stack_size(&self) -> Option<usize> {
    self.stack_size
  }

  /// The OS thread name used for a work item. Interior NUL bytes, which the
  /// OS cannot carry in a thread name, are replaced with `?`.
  pub(crate) fn os_thread_name(&self, item_name: &str) -> String {
    let full_name = match &self.thread_name_prefix {
      Some(prefix) => format!("{}-{}", prefix, item_name),
      None => item_name.to_string(),
    };
    full_name.replace('\0', "?")
  }
}

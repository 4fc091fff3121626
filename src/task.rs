use std::fmt;

/// The identifying name of a work item, unique within a pool.
pub type ThreadName = String;

/// The type of callable a thread executes once its arguments are bound.
/// It must be `Send` and `'static`, and produce a result of type `R`.
pub type TaskToExecute<R> = Box<dyn FnOnce() -> R + Send + 'static>;

/// A named unit of work with its arguments already bound.
pub struct WorkItem<R: Send + 'static> {
  pub(crate) name: ThreadName,
  pub(crate) task: TaskToExecute<R>,
}

impl<R: Send + 'static> WorkItem<R> {
  /// A work item whose callable takes no arguments.
  pub fn new<F>(name: impl Into<ThreadName>, f: F) -> Self
  where
    F: FnOnce() -> R + Send + 'static,
  {
    Self {
      name: name.into(),
      task: Box::new(f),
    }
  }

  /// A work item whose callable receives `args` when it runs.
  ///
  /// Use a tuple for several positional arguments: `with_args("sum", |(a, b)| a + b, (1, 2))`.
  pub fn with_args<F, A>(name: impl Into<ThreadName>, f: F, args: A) -> Self
  where
    F: FnOnce(A) -> R + Send + 'static,
    A: Send + 'static,
  {
    Self {
      name: name.into(),
      task: Box::new(move || f(args)),
    }
  }

  /// Like [`WorkItem::with_args`], but `None` means "no arguments" and the
  /// callable receives `A::default()` (for tuples, the empty tuple of defaults).
  pub fn with_optional_args<F, A>(name: impl Into<ThreadName>, f: F, args: Option<A>) -> Self
  where
    F: FnOnce(A) -> R + Send + 'static,
    A: Default + Send + 'static,
  {
    Self::with_args(name, f, args.unwrap_or_default())
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl<R: Send + 'static> fmt::Debug for WorkItem<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkItem").field("name", &self.name).finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bound_arguments_reach_the_callable() {
    let item = WorkItem::with_args("double", |x: i32| x * 2, 5);
    assert_eq!(item.name(), "double");
    assert_eq!((item.task)(), 10);
  }

  #[test]
  fn missing_arguments_fall_back_to_default() {
    let item = WorkItem::with_optional_args("count", |v: Vec<u8>| v.len(), None);
    assert_eq!((item.task)(), 0);

    let item = WorkItem::with_optional_args("count", |v: Vec<u8>| v.len(), Some(vec![1, 2, 3]));
    assert_eq!((item.task)(), 3);
  }
}

//! A returning thread pool: named work items run concurrently on their own
//! OS threads and their return values are collected by name.

mod config;
pub mod decorators;
mod error;
mod gate;
mod handle;
mod notifier;
mod pool;
mod task;

pub use config::PoolConfig;
pub use decorators::{restart_on_crash, status, RestartPolicy};
pub use error::PoolError;
pub use handle::ThreadHandle;
pub use notifier::{ThreadCompletionInfo, ThreadCompletionStatus};
pub use pool::{ThreadPool, ThreadResults};
pub use task::{TaskToExecute, ThreadName, WorkItem};

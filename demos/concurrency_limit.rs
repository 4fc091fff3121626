use returning_threads::{PoolConfig, ThreadPool, WorkItem};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::info;

fn long_task_fn(id: usize) -> String {
  info!("Task {} starting (concurrency test - should take 1s)", id);
  sleep(Duration::from_secs(1));
  let result = format!("Task {} finished", id);
  info!("{}", result);
  result
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Concurrency Limit Example (Limit: 2) ---");

  let concurrency_limit = 2;
  let num_tasks = 5;
  info!(
    "Starting {} tasks, each takes 1 sec. With concurrency {}, this should take ~{} secs.",
    num_tasks,
    concurrency_limit,
    (num_tasks as f32 / concurrency_limit as f32).ceil()
  );

  let items = (0..num_tasks).map(|i| WorkItem::with_args(format!("task_{}", i), long_task_fn, i));
  let pool = ThreadPool::with_config(
    items,
    PoolConfig::new("concurrency_pool").max_concurrency(concurrency_limit),
  );

  let started_at = Instant::now();
  let results = pool.start_and_join().expect("Failed to start threads");

  let mut names: Vec<_> = results.keys().cloned().collect();
  names.sort();
  for name in names {
    match &results[&name] {
      Ok(result) => info!("{} main: Received result: {}", name, result),
      Err(e) => info!("{} main: Received error: {:?}", name, e),
    }
  }
  info!("All tasks processed in {:?}.", started_at.elapsed());
  info!("--- Concurrency Limit Example End ---");
}

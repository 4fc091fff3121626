use returning_threads::{PoolConfig, ThreadPool, WorkItem};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::info;

fn fetch_report(id: u32, delay_ms: u64) -> String {
  info!("Report {} starting (takes {} ms)", id, delay_ms);
  sleep(Duration::from_millis(delay_ms));
  format!("report {} ready", id)
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Basic Usage Example ---");

  let mut pool = ThreadPool::with_config(
    [
      WorkItem::with_args("daily", |(id, ms)| fetch_report(id, ms), (1, 300)),
      WorkItem::with_args("weekly", |(id, ms)| fetch_report(id, ms), (2, 100)),
      WorkItem::new("summary", || "summary ready".to_string()),
    ],
    PoolConfig::new("basic_pool"),
  );

  let started_at = Instant::now();
  pool.start().expect("Failed to start threads");
  info!("{} threads started: {:?}", pool.len(), pool.names());

  let results = pool.join();
  info!("All threads joined after {:?} (bounded by the slowest).", started_at.elapsed());

  for (name, outcome) in &results {
    match outcome {
      Ok(value) => info!("{}: {}", name, value),
      Err(e) => info!("{}: failed with {}", name, e),
    }
  }
  info!("--- Basic Usage Example End ---");
}

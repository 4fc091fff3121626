use returning_threads::{PoolError, ThreadPool, WorkItem};
use std::thread::sleep;
use std::time::Duration;
use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let pool = ThreadPool::new([
    WorkItem::new("panicking", || -> String {
      info!("Panicking Task: Starting...");
      sleep(Duration::from_millis(100));
      info!("Panicking Task: About to panic!");
      panic!("This task is designed to panic!");
    }),
    WorkItem::new("healthy", || "healthy task result".to_string()),
  ]);

  let results = pool.start_and_join().expect("Failed to start threads");

  match &results["panicking"] {
    Ok(result) => info!("Task completed with UNEXPECTED result: {}", result),
    Err(PoolError::WorkPanicked { message, .. }) => {
      info!("Task correctly resulted in PoolError::WorkPanicked ({}).", message);
    }
    Err(e) => info!("Task resulted in unexpected error: {:?}", e),
  }
  info!("Healthy task: {:?}", results["healthy"]);
  info!("--- Task Panic Example End ---");
}

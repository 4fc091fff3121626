use returning_threads::{
  PoolConfig, ThreadCompletionInfo, ThreadCompletionStatus, ThreadHandle, ThreadPool, WorkItem,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

// Helper to initialize tracing for tests
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new("info,returning_threads=trace"));
    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .finish()
      .try_init()
      .ok();
  });
}

fn recording_handler(
  pool: &ThreadPool<u32>,
) -> Arc<Mutex<Vec<ThreadCompletionInfo>>> {
  let received = Arc::new(Mutex::new(Vec::new()));
  let received_clone = received.clone();
  pool.on_completion(move |info| {
    tracing::info!(thread = %info.name, status = ?info.status, "Completion handler received event.");
    received_clone.lock().unwrap().push(info);
  });
  received
}

#[test]
fn test_handler_sees_every_completion_before_join_returns() {
  setup_tracing_for_test();
  let pool = ThreadPool::with_config(
    [
      WorkItem::new("one", || 1u32),
      WorkItem::new("two", || 2u32),
      WorkItem::new("boom", || -> u32 { panic!("failure in boom") }),
    ],
    PoolConfig::new("notify_pool"),
  );
  let received = recording_handler(&pool);

  let results = pool.start_and_join().unwrap();
  assert_eq!(results.len(), 3);

  let events = received.lock().unwrap();
  assert_eq!(events.len(), 3);
  for event in events.iter() {
    assert_eq!(*event.pool_name, "notify_pool");
    let expected_status = if event.name == "boom" {
      ThreadCompletionStatus::Panicked
    } else {
      ThreadCompletionStatus::Success
    };
    assert_eq!(event.status, expected_status, "unexpected status for {}", event.name);
  }
}

#[test]
fn test_elapsed_covers_the_callable() {
  setup_tracing_for_test();
  let pool = ThreadPool::new([WorkItem::new("sleepy", || {
    sleep(Duration::from_millis(80));
    7u32
  })]);
  let received = recording_handler(&pool);

  pool.start_and_join().unwrap();
  let events = received.lock().unwrap();
  assert_eq!(events.len(), 1);
  assert!(events[0].elapsed >= Duration::from_millis(80));
}

#[test]
fn test_multiple_handlers_and_panicking_handler() {
  setup_tracing_for_test();
  let pool = ThreadPool::new((0..4u32).map(|i| WorkItem::new(format!("item_{}", i), move || i)));
  let count_a = Arc::new(AtomicUsize::new(0));
  let count_b = Arc::new(AtomicUsize::new(0));

  let a = count_a.clone();
  pool.on_completion(move |_| {
    a.fetch_add(1, Ordering::SeqCst);
  });
  pool.on_completion(|info| {
    if info.name == "item_2" {
      panic!("handler refuses item_2");
    }
  });
  let b = count_b.clone();
  pool.on_completion(move |_| {
    b.fetch_add(1, Ordering::SeqCst);
  });

  let results = pool.start_and_join().unwrap();
  assert_eq!(results["item_2"], Ok(2));
  assert_eq!(count_a.load(Ordering::SeqCst), 4);
  assert_eq!(count_b.load(Ordering::SeqCst), 4);
}

#[test]
fn test_standalone_handle_has_no_handlers() {
  setup_tracing_for_test();
  let mut handle = ThreadHandle::spawn(WorkItem::new("lonely", || 3u32)).unwrap();
  assert_eq!(handle.join(), Ok(&3));
  assert_eq!(handle.name(), "lonely");
}

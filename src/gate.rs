use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// A blocking counting gate bounding how many work items execute at once.
pub(crate) struct ConcurrencyGate {
  limit: usize,
  running: Mutex<usize>,
  slot_freed: Condvar,
}

impl fmt::Debug for ConcurrencyGate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConcurrencyGate")
      .field("limit", &self.limit)
      .field("running", &*self.running.lock())
      .finish()
  }
}

impl ConcurrencyGate {
  pub(crate) fn new(limit: usize) -> Self {
    Self {
      limit: limit.max(1),
      running: Mutex::new(0),
      slot_freed: Condvar::new(),
    }
  }

  /// Blocks the calling thread until a slot is free, then occupies it.
  /// The slot is released when the returned permit is dropped.
  pub(crate) fn acquire(self: &Arc<Self>) -> GatePermit {
    let mut running = self.running.lock();
    while *running >= self.limit {
      self.slot_freed.wait(&mut running);
    }
    *running += 1;
    GatePermit { gate: self.clone() }
  }

  fn release(&self) {
    let mut running = self.running.lock();
    *running -= 1;
    self.slot_freed.notify_one();
  }

  #[cfg(test)]
  pub(crate) fn running(&self) -> usize {
    *self.running.lock()
  }
}

/// Holds one slot of a [`ConcurrencyGate`]. Dropping it frees the slot,
/// including when the work item unwinds.
#[derive(Debug)]
pub(crate) struct GatePermit {
  gate: Arc<ConcurrencyGate>,
}

impl Drop for GatePermit {
  fn drop(&mut self) {
    self.gate.release();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::thread;
  use std::time::Duration;

  #[test]
  fn permit_release_frees_slot() {
    let gate = Arc::new(ConcurrencyGate::new(1));
    let permit = gate.acquire();
    assert_eq!(gate.running(), 1);
    drop(permit);
    assert_eq!(gate.running(), 0);
    let _again = gate.acquire();
    assert_eq!(gate.running(), 1);
  }

  #[test]
  fn zero_limit_is_clamped() {
    let gate = Arc::new(ConcurrencyGate::new(0));
    let _permit = gate.acquire();
    assert_eq!(gate.running(), 1);
  }

  #[test]
  fn never_exceeds_limit() {
    let gate = Arc::new(ConcurrencyGate::new(2));
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..8)
      .map(|_| {
        let gate = gate.clone();
        let current = current.clone();
        let peak = peak.clone();
        thread::spawn(move || {
          let _permit = gate.acquire();
          let now = current.fetch_add(1, Ordering::SeqCst) + 1;
          peak.fetch_max(now, Ordering::SeqCst);
          thread::sleep(Duration::from_millis(20));
          current.fetch_sub(1, Ordering::SeqCst);
        })
      })
      .collect();

    for worker in workers {
      worker.join().unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(gate.running(), 0);
  }
}

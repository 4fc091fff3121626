//! Wrappers that add logging and crash recovery to a unit of work.
//!
//! Both return plain closures, so the wrapped work can be handed straight to
//! [`WorkItem::new`](crate::WorkItem::new).

use crate::error::{panic_message, PoolError};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

/// Wraps `f` so that its start, its success (with elapsed seconds) and its
/// failure are logged. The result is returned unchanged.
pub fn status<F, T, E>(name: impl Into<String>, f: F) -> impl FnOnce() -> Result<T, E>
where
  F: FnOnce() -> Result<T, E>,
  E: fmt::Display,
{
  let name = name.into();
  move || {
    info!(task = %name, "'{}' started..", name);
    let started_at = Instant::now();
    let result = f();
    let took_secs = (started_at.elapsed().as_secs_f64() * 100.0).round() / 100.0;
    match &result {
      Ok(_) => info!(task = %name, took_secs, "'{}' executed successfully.", name),
      Err(e) => error!(task = %name, took_secs, "'{}' failed to execute. (details: {})", name, e),
    }
    result
  }
}

/// How [`restart_on_crash`] reacts to a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
  pub(crate) notify_crash: bool,
  pub(crate) retries: Option<u32>,
  pub(crate) delay: Option<Duration>,
}

impl Default for RestartPolicy {
  fn default() -> Self {
    Self {
      notify_crash: true,
      retries: None,
      delay: None,
    }
  }
}

impl RestartPolicy {
  /// Restart forever, logging each crash.
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether to log a warning for every crash.
  pub fn notify_crash(mut self, notify: bool) -> Self {
    self.notify_crash = notify;
    self
  }

  /// Give up after this many crashes.
  pub fn retries(mut self, retries: u32) -> Self {
    self.retries = Some(retries);
    self
  }

  /// Restart forever (the default).
  pub fn forever(mut self) -> Self {
    self.retries = None;
    self
  }

  /// Sleep this long before each restart.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }
}

/// Wraps `f` so that an `Err` return or a panic restarts it.
///
/// Every call of the returned closure runs `f` until it succeeds, returning
/// the value. With a retry budget, the closure gives up once `f` has crashed
/// that many times and returns `PoolError::RetriesExhausted`.
pub fn restart_on_crash<F, T, E>(
  name: impl Into<String>,
  mut f: F,
  policy: RestartPolicy,
) -> impl FnMut() -> Result<T, PoolError>
where
  F: FnMut() -> Result<T, E>,
  E: fmt::Display,
{
  let name = name.into();
  move || {
    let mut crashes: u32 = 0;
    loop {
      let details = match std::panic::catch_unwind(AssertUnwindSafe(&mut f)) {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(&*payload),
      };
      crashes += 1;

      if policy.notify_crash {
        warn!(task = %name, attempt = crashes, "'{}' crashed! restarting... (details: {})", name, details);
      }

      if let Some(max_tries) = policy.retries {
        if crashes >= max_tries {
          error!(task = %name, "'{}' crashed too many times! aborting... (max tries: {})", name, max_tries);
          return Err(PoolError::RetriesExhausted {
            name: name.clone(),
            attempts: crashes,
          });
        }
      }

      if let Some(delay) = policy.delay {
        std::thread::sleep(delay);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_passes_results_through() {
    let ok = status("fine", || Ok::<_, String>(7));
    assert_eq!(ok(), Ok(7));

    let failed = status("broken", || Err::<u8, _>("no connection".to_string()));
    assert_eq!(failed(), Err("no connection".to_string()));
  }

  #[test]
  fn restart_returns_first_success() {
    let mut calls = 0;
    let mut job = restart_on_crash(
      "flaky",
      || {
        calls += 1;
        if calls < 3 {
          Err(format!("attempt {} failed", calls))
        } else {
          Ok(calls)
        }
      },
      RestartPolicy::new().notify_crash(false),
    );
    assert_eq!(job(), Ok(3));
  }

  #[test]
  fn restart_gives_up_after_budget() {
    let mut calls = 0u32;
    let mut job = restart_on_crash(
      "doomed",
      || {
        calls += 1;
        Err::<(), _>("always")
      },
      RestartPolicy::new().retries(4),
    );
    assert_eq!(
      job(),
      Err(PoolError::RetriesExhausted {
        name: "doomed".to_string(),
        attempts: 4,
      })
    );
    drop(job);
    assert_eq!(calls, 4);
  }

  #[test]
  fn restart_recovers_from_panics() {
    let mut calls = 0;
    let mut job = restart_on_crash(
      "panicky",
      || {
        calls += 1;
        if calls == 1 {
          panic!("first run explodes");
        }
        Ok::<_, String>("recovered")
      },
      RestartPolicy::new().retries(3).delay(Duration::from_millis(1)),
    );
    assert_eq!(job(), Ok("recovered"));
  }

  #[test]
  fn zero_retries_aborts_on_first_crash() {
    let mut job = restart_on_crash("strict", || Err::<(), _>("nope"), RestartPolicy::new().retries(0));
    assert_eq!(
      job(),
      Err(PoolError::RetriesExhausted {
        name: "strict".to_string(),
        attempts: 1,
      })
    );
  }
}

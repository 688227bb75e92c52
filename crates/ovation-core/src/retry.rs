//! Bounded, jittered retry.
//!
//! The one retry implementation in the system. Id allocation, the
//! post-sign-in session probe, and transport-retried registry lookups all go
//! through [`RetryPolicy::run`] instead of hand-rolled sleep loops, so every
//! eventually-consistent read-after-write has the same shape: max attempts,
//! a fixed backoff, random jitter, and a terminal error when the budget is
//! spent.

use std::time::Duration;

use rand_core::{OsRng, RngCore as _};
use thiserror::Error;

// ─── Attempt classification ──────────────────────────────────────────────────

/// How a single attempt ended, as classified by the caller.
#[derive(Debug)]
pub enum Attempt<T, E> {
  /// Terminal success; the value is returned as-is.
  Done(T),
  /// Worth another attempt: a collision, or a read that is not yet
  /// consistent.
  Again,
  /// Terminal failure; retrying cannot help.
  Fail(E),
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RetryError<E> {
  /// The attempt budget ran out without a terminal outcome.
  #[error("retries exhausted after {attempts} attempts")]
  Exhausted { attempts: u32 },

  /// An attempt classified itself as unretryable.
  #[error("{0}")]
  Terminal(E),
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// A bounded retry schedule. Attempts are separated by `base_delay` plus a
/// jitter drawn uniformly from `[0, max_jitter]` to desynchronize colliding
/// callers, so `max_attempts * base_delay` bounds the total window.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay:   Duration,
  pub max_jitter:   Duration,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
    Self { max_attempts: max_attempts.max(1), base_delay, max_jitter }
  }

  /// Run `attempt` (passed the 1-based attempt number) until it returns a
  /// terminal outcome or the budget is exhausted. No delay follows the final
  /// attempt.
  pub async fn run<T, E, F>(&self, mut attempt: F) -> Result<T, RetryError<E>>
  where
    F: AsyncFnMut(u32) -> Attempt<T, E>,
  {
    for n in 1..=self.max_attempts {
      match attempt(n).await {
        Attempt::Done(value) => return Ok(value),
        Attempt::Fail(error) => return Err(RetryError::Terminal(error)),
        Attempt::Again if n == self.max_attempts => break,
        Attempt::Again => tokio::time::sleep(self.delay()).await,
      }
    }
    Err(RetryError::Exhausted { attempts: self.max_attempts })
  }

  fn delay(&self) -> Duration {
    let jitter_ms = self.max_jitter.as_millis() as u64;
    let jitter = if jitter_ms == 0 {
      Duration::ZERO
    } else {
      Duration::from_millis(u64::from(OsRng.next_u32()) % (jitter_ms + 1))
    };
    self.base_delay + jitter
  }
}

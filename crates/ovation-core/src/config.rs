//! Engine configuration.
//!
//! Every field has a default, so a bare `EngineConfig::default()` (or an
//! empty `[engine]` table in the server's config file) yields the documented
//! behavior.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Total window for the post-sign-in session probe, after which the
  /// resolver forces sign-out instead of leaving the caller stuck.
  pub probe_window_ms: u64,
  /// Spacing between session probe attempts.
  pub probe_interval_ms: u64,

  /// Attempt budget for member-id allocation under collision.
  pub allocator_attempts: u32,
  /// Upper bound of the random delay between colliding allocation attempts.
  pub allocator_jitter_ms: u64,

  /// Backoff before the single retry of an errored registry lookup.
  pub lookup_retry_backoff_ms: u64,

  /// How long a locally initiated sign-out suppresses the provider's echoed
  /// signed-out event.
  pub signout_echo_ttl_ms: u64,

  /// Points added to an artist's tally per accepted vote.
  pub vote_weight: i64,
  /// Upper bound on the free-text support message, in characters.
  pub message_max_chars: usize,
  /// UTC offset of the contest's calendar day (+9 = JST).
  pub day_utc_offset_hours: i32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      probe_window_ms:         5_000,
      probe_interval_ms:       250,
      allocator_attempts:      5,
      allocator_jitter_ms:     50,
      lookup_retry_backoff_ms: 200,
      signout_echo_ttl_ms:     3_000,
      vote_weight:             10,
      message_max_chars:       500,
      day_utc_offset_hours:    9,
    }
  }
}

impl EngineConfig {
  /// Schedule for the post-sign-in session probe: evenly spaced attempts
  /// covering [`probe_window_ms`](Self::probe_window_ms), no jitter.
  pub fn probe_policy(&self) -> RetryPolicy {
    let interval = self.probe_interval_ms.max(1);
    let attempts = (self.probe_window_ms / interval).max(1) as u32;
    RetryPolicy::new(attempts, Duration::from_millis(interval), Duration::ZERO)
  }

  /// Schedule for id allocation under collision: jittered to desynchronize
  /// concurrent registrants.
  pub fn allocation_policy(&self) -> RetryPolicy {
    RetryPolicy::new(
      self.allocator_attempts,
      Duration::ZERO,
      Duration::from_millis(self.allocator_jitter_ms),
    )
  }

  /// Schedule for transport-errored registry lookups: the original call plus
  /// exactly one retry after a short backoff.
  pub fn lookup_policy(&self) -> RetryPolicy {
    RetryPolicy::new(
      2,
      Duration::from_millis(self.lookup_retry_backoff_ms),
      Duration::ZERO,
    )
  }

  pub fn signout_echo_ttl(&self) -> Duration {
    Duration::from_millis(self.signout_echo_ttl_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_documented_behavior() {
    let config = EngineConfig::default();
    assert_eq!(config.vote_weight, 10);
    assert_eq!(config.allocator_attempts, 5);
    assert_eq!(config.day_utc_offset_hours, 9);

    let probe = config.probe_policy();
    assert_eq!(probe.max_attempts, 20);
    assert_eq!(probe.base_delay, Duration::from_millis(250));
  }

  #[test]
  fn probe_policy_survives_zero_interval() {
    let config = EngineConfig { probe_interval_ms: 0, ..Default::default() };
    assert!(config.probe_policy().max_attempts >= 1);
  }
}

//! Retry policy for wire requests.
//!
//! Every RTW request is re-issued from scratch when it does not complete
//! within its attempt window; the budget is bounded and exhausting it is a
//! terminal failure for that request. The policy is configurable, with
//! defaults matching the server's observed pacing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum number of attempts per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
/// Default per-attempt completion timeout in milliseconds.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 2_500;

/// Bounded retry policy applied to every wire request.
///
/// Each attempt gets the full timeout window; an attempt that fails early
/// waits out the remainder of its window before the next one is issued, so
/// attempts are paced at a fixed interval rather than an exponential one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of fully re-issued attempts (default: 6).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Completion timeout per attempt in ms (default: 2500).
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_attempt_timeout_ms() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
        }
    }
}

impl RetryPolicy {
    /// The per-attempt timeout as a [`Duration`].
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

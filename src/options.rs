use std::num::NonZeroU32;
use std::time::Duration;

use crate::FetchError;

/// Upper bound on the number of attempts of one logical request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaxAttempts {
    /// At most this many attempts, the first one included.
    Limited(NonZeroU32),
    /// Retry until an attempt succeeds.
    Unbounded,
}

impl MaxAttempts {
    /// Sentinel accepted by [`MaxAttempts::try_from`] for unbounded retry.
    pub const UNBOUNDED_SENTINEL: i64 = -1;

    /// Builds a finite limit. `0` is clamped to a single attempt; use
    /// [`MaxAttempts::try_from`] to reject it instead.
    pub fn limited(attempts: u32) -> Self {
        Self::Limited(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN))
    }

    /// Whether another attempt may follow after `attempts_done` failed ones.
    pub fn allows_retry_after(&self, attempts_done: u32) -> bool {
        match self {
            Self::Limited(limit) => attempts_done < limit.get(),
            Self::Unbounded => true,
        }
    }
}

/// Parses the numeric form used in configuration: `-1` is unbounded,
/// positive values are limits. Unlike [`MaxAttempts::limited`], `0` is an
/// error here since it usually means a misconfigured value.
impl TryFrom<i64> for MaxAttempts {
    type Error = FetchError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == Self::UNBOUNDED_SENTINEL {
            return Ok(Self::Unbounded);
        }
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self::Limited)
            .ok_or_else(|| {
                FetchError::Config(format!(
                    "max attempts must be a positive integer or -1 for unbounded, got {value}"
                ))
            })
    }
}

/// Configures per-attempt timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryOptions {
    /// Per-attempt timeout in milliseconds.
    pub attempt_timeout_ms: u64,
    /// Maximum number of attempts, the first one included.
    pub max_attempts: MaxAttempts,
    /// Base retry backoff in milliseconds (linear strategy).
    pub base_backoff_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 8_000,
            max_attempts: MaxAttempts::limited(5),
            base_backoff_ms: 500,
        }
    }
}

impl RetryOptions {
    /// Default timeout and backoff, retrying until success.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: MaxAttempts::Unbounded,
            ..Self::default()
        }
    }

    /// Sets the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: MaxAttempts) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the per-attempt timeout. Must be non-zero, see [`RetryOptions::validate`].
    pub fn with_attempt_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.attempt_timeout_ms = timeout_ms;
        self
    }

    /// Sets the base of the linear backoff.
    pub fn with_base_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.base_backoff_ms = backoff_ms;
        self
    }

    /// Checks values the retry loop cannot run with.
    ///
    /// A zero attempt timeout fails every attempt immediately, so it is
    /// rejected with [`FetchError::Config`].
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.attempt_timeout_ms == 0 {
            return Err(FetchError::Config(
                "attempt timeout must be greater than 0 ms".to_owned(),
            ));
        }
        Ok(())
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Base backoff as a [`Duration`].
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}

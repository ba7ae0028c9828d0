use std::time::Duration;

/// Failure of a single attempt. Recovered by the retry loop until the
/// attempt limit is reached.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// The attempt did not settle within the per-attempt timeout and was aborted.
    #[error("attempt timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
    /// Network or request execution error from `reqwest`.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },
}

impl AttemptError {
    /// Returns the HTTP status for [`AttemptError::Status`] failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the attempt hit the per-attempt or the transport timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Network(err) => err.is_timeout(),
            Self::Status { .. } => false,
        }
    }

    /// Whether repeating the attempt cannot succeed. Builder errors mean the
    /// request itself is malformed, so retrying would loop forever in
    /// unbounded mode.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Network(err) => err.is_builder(),
            Self::Timeout(_) | Self::Status { .. } => false,
        }
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Every allowed attempt failed; carries the last attempt's failure.
    #[error("request failed after {attempts} attempt(s): {last}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        last: AttemptError,
    },
    /// An attempt failed in a way retrying cannot fix; no further attempts
    /// were made.
    #[error("request cannot be sent (attempt {attempts}): {last}")]
    NotRetryable {
        /// Attempt that failed.
        attempts: u32,
        #[source]
        last: AttemptError,
    },
    /// URL could not be parsed or built. Raised before any attempt is made.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Response body was not the expected JSON.
    #[error("decode error: {0}")]
    Decode(String),
    /// Invalid or missing configuration value.
    #[error("config error: {0}")]
    Config(String),
}

impl FetchError {
    /// Returns the last attempt failure when the retry loop gave up.
    pub fn last_attempt(&self) -> Option<&AttemptError> {
        match self {
            Self::RetryExhausted { last, .. } | Self::NotRetryable { last, .. } => Some(last),
            _ => None,
        }
    }
}

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, Url};
use tokio::time::{sleep, timeout};

use crate::{
    relay::parse_http_url, request::send_once, AttemptError, FetchError, RequestOptions, Result,
    RetryOptions,
};

/// Delay inserted after the `attempt`-th failure (1-based): `base * attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1))
}

/// Runs `attempt_fn` until it succeeds or the attempt limit is reached.
///
/// Each attempt is bounded by [`RetryOptions::attempt_timeout`]; a timed out
/// attempt is dropped (aborting whatever it had in flight) and counted as a
/// failure. After the `k`-th failure the loop sleeps
/// [`backoff_delay`]`(base, k)` before starting attempt `k + 1`.
///
/// With [`MaxAttempts::Unbounded`](crate::MaxAttempts::Unbounded) the loop
/// only returns on success or on a failure for which
/// [`AttemptError::is_terminal`] holds. Invalid options are rejected before
/// the first attempt, see [`RetryOptions::validate`].
pub async fn retry_with_backoff<T, F, Fut>(options: &RetryOptions, mut attempt_fn: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    options.validate()?;
    let attempt_timeout = options.attempt_timeout();
    let mut attempt = 1u32;
    loop {
        let outcome = match timeout(attempt_timeout, attempt_fn(attempt)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AttemptError::Timeout(attempt_timeout)),
        };

        match outcome {
            Ok(value) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, "request succeeded after {} attempt(s)", attempt);
                return Ok(value);
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempt, error = %err, "attempt failed");

                if err.is_terminal() {
                    #[cfg(feature = "tracing")]
                    tracing::error!(attempt, "request cannot be sent, not retrying");
                    return Err(FetchError::NotRetryable {
                        attempts: attempt,
                        last: err,
                    });
                }

                if !options.max_attempts.allows_retry_after(attempt) {
                    #[cfg(feature = "tracing")]
                    tracing::error!(attempts = attempt, "max attempts reached, giving up");
                    return Err(FetchError::RetryExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = backoff_delay(options.base_backoff(), attempt);

                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, "retrying in {} ms", delay.as_millis());

                sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

/// Fetches `url` with per-attempt timeout and linear backoff retry.
///
/// Non-2xx responses are failures and are retried like network errors. The
/// URL is validated before the first attempt: a malformed URL or a scheme
/// other than `http`/`https` fails with [`FetchError::InvalidUrl`] even in
/// unbounded mode.
pub async fn fetch_with_retry(
    http: &reqwest::Client,
    url: &str,
    request: &RequestOptions,
    options: &RetryOptions,
) -> Result<Response> {
    let url = parse_http_url(url)?;
    fetch_url_with_retry(http, &url, request, options).await
}

pub(crate) async fn fetch_url_with_retry(
    http: &reqwest::Client,
    url: &Url,
    request: &RequestOptions,
    options: &RetryOptions,
) -> Result<Response> {
    retry_with_backoff(options, move |_attempt| {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt = _attempt,
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            "fetching"
        );
        send_once(http, url, request)
    })
    .await
}

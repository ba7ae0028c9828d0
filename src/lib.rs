//! `relayfetch` is an async HTTP fetch client for upstream APIs reached
//! through a proxy relay.
//!
//! Every request goes through one retry loop:
//! - each attempt is bounded by a timeout (8 s by default)
//! - non-2xx responses, network errors and timeouts are retried alike
//! - the delay after the `k`-th failure is `base_backoff * k`
//! - the attempt limit is finite ([`MaxAttempts::Limited`]) or
//!   [`MaxAttempts::Unbounded`]
//!
//! Entry points:
//! - [`fetch_with_retry`] for a bare `reqwest::Client`
//! - [`RelayFetchClient::get_json`] for relayed upstream endpoints
//! - [`retry_with_backoff`] for any other fallible async operation

mod client;
mod error;
mod options;
mod relay;
mod request;
mod retry;

pub use client::RelayFetchClient;
pub use error::{AttemptError, FetchError};
pub use options::{MaxAttempts, RetryOptions};
pub use relay::{ProxyRelay, RelayConfig};
pub use request::RequestOptions;
pub use retry::{backoff_delay, fetch_with_retry, retry_with_backoff};

pub type Result<T> = std::result::Result<T, FetchError>;

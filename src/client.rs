use std::fmt;

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

use crate::{
    retry::{fetch_url_with_retry, fetch_with_retry},
    FetchError, MaxAttempts, RelayConfig, RequestOptions, Result, RetryOptions,
};

pub(crate) const ENV_MAX_ATTEMPTS: &str = "RELAYFETCH_MAX_ATTEMPTS";
pub(crate) const ENV_TIMEOUT_MS: &str = "RELAYFETCH_TIMEOUT_MS";
pub(crate) const ENV_BACKOFF_MS: &str = "RELAYFETCH_BACKOFF_MS";

#[derive(Clone)]
/// HTTP client issuing retried requests against a relayed upstream API.
pub struct RelayFetchClient {
    http: reqwest::Client,
    config: RelayConfig,
    options: RetryOptions,
}

impl fmt::Debug for RelayFetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayFetchClient")
            .field("config", &self.config)
            .field("options", &self.options)
            .finish()
    }
}

impl RelayFetchClient {
    /// Creates a client with default retry options.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            options: RetryOptions::default(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads the variables documented on [`RelayConfig::from_env`], plus:
    /// - `RELAYFETCH_MAX_ATTEMPTS` — attempt limit, `-1` for unbounded
    /// - `RELAYFETCH_TIMEOUT_MS` — per-attempt timeout
    /// - `RELAYFETCH_BACKOFF_MS` — base backoff
    ///
    /// Unset variables keep the [`RetryOptions`] defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use relayfetch::RelayFetchClient;
    ///
    /// let client = RelayFetchClient::from_env().expect("missing RELAYFETCH_* env vars");
    /// ```
    pub fn from_env() -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();
        let config = RelayConfig::from_lookup(lookup)?;
        let options = retry_options_from_lookup(lookup)?;
        Ok(Self::new(config).with_options(options))
    }

    /// Applies retry options such as attempt limit, timeout and backoff.
    pub fn with_options(mut self, opts: RetryOptions) -> Self {
        self.options = opts;
        self
    }

    /// Uses a preconfigured `reqwest` client (proxies, TLS, default headers).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Relay and upstream configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Default retry options for requests made by this client.
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Builds the URL for `path` on the upstream API, relayed if configured.
    pub fn endpoint_url<I, K, V>(&self, path: &str, query: I) -> Result<Url>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.config.endpoint_url(path, query)
    }

    /// Fetches an already built URL using the client's retry options.
    pub async fn fetch_with_retry(&self, url: &str, request: &RequestOptions) -> Result<Response> {
        fetch_with_retry(&self.http, url, request, &self.options).await
    }

    /// Fetches an already built URL with per-call retry options.
    pub async fn fetch_with_options(
        &self,
        url: &str,
        request: &RequestOptions,
        options: &RetryOptions,
    ) -> Result<Response> {
        fetch_with_retry(&self.http, url, request, options).await
    }

    /// Sends a `GET` to `path` on the upstream API with retry.
    pub async fn get<I, K, V>(&self, path: &str, query: I) -> Result<Response>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = self.endpoint_url(path, query)?;
        fetch_url_with_retry(&self.http, &url, &RequestOptions::default(), &self.options).await
    }

    /// Sends a `GET` to `path` and decodes the JSON body.
    ///
    /// Decoding happens once the retry loop has returned a successful
    /// response; a malformed body is not retried.
    pub async fn get_json<T, I, K, V>(&self, path: &str, query: I) -> Result<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let response = self.get(path, query).await?;
        decode_json(response).await
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|err| FetchError::Decode(format!("could not read response body: {err}")))?;
    serde_json::from_str::<T>(&body)
        .map_err(|err| FetchError::Decode(format!("invalid response JSON: {err}; body: {body}")))
}

fn retry_options_from_lookup<F>(lookup: F) -> Result<RetryOptions>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| -> Result<Option<i64>> {
        match lookup(name).filter(|value| !value.trim().is_empty()) {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|err| FetchError::Config(format!("{name} must be an integer: {err}"))),
            None => Ok(None),
        }
    };
    let millis = |name: &str, value: i64| -> Result<u64> {
        u64::try_from(value)
            .map_err(|_| FetchError::Config(format!("{name} must not be negative, got {value}")))
    };

    let mut options = RetryOptions::default();
    if let Some(value) = read(ENV_MAX_ATTEMPTS)? {
        options.max_attempts = MaxAttempts::try_from(value)?;
    }
    if let Some(value) = read(ENV_TIMEOUT_MS)? {
        options.attempt_timeout_ms = millis(ENV_TIMEOUT_MS, value)?;
        if options.attempt_timeout_ms == 0 {
            return Err(FetchError::Config(format!("{ENV_TIMEOUT_MS} must be greater than 0")));
        }
    }
    if let Some(value) = read(ENV_BACKOFF_MS)? {
        options.base_backoff_ms = millis(ENV_BACKOFF_MS, value)?;
    }
    Ok(options)
}

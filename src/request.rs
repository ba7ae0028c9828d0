use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, Url};

use crate::AttemptError;

/// Request options passed through to every attempt unchanged.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// HTTP method; `GET` when unset.
    pub method: Option<Method>,
    pub headers: HeaderMap,
    /// Raw request body. Cloned into each attempt.
    pub body: Option<Vec<u8>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Performs a single attempt. Non-2xx statuses are returned as
/// [`AttemptError::Status`] with the body read for diagnostics.
pub(crate) async fn send_once(
    http: &reqwest::Client,
    url: &Url,
    request: &RequestOptions,
) -> Result<Response, AttemptError> {
    let method = request.method.clone().unwrap_or(Method::GET);
    let mut builder = http
        .request(method, url.clone())
        .headers(request.headers.clone());
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder.send().await.map_err(AttemptError::Network)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AttemptError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

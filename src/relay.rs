//! Proxy relay and upstream endpoint configuration.
//!
//! Browsers reach cross-origin APIs through a relay that re-issues the
//! request server-side. The relay takes the full upstream URL in a single
//! query parameter, e.g. `https://relay.example/?u=<encoded upstream url>`.

use std::fmt;

use reqwest::Url;

use crate::{FetchError, Result};

/// Default name of the relay query parameter carrying the upstream URL.
pub(crate) const DEFAULT_PROXY_PARAM: &str = "u";
/// Default name of the upstream API key query parameter.
pub(crate) const DEFAULT_API_KEY_PARAM: &str = "apikey";

pub(crate) const ENV_API_BASE_URL: &str = "RELAYFETCH_API_BASE_URL";
pub(crate) const ENV_PROXY_URL: &str = "RELAYFETCH_PROXY_URL";
pub(crate) const ENV_API_KEY: &str = "RELAYFETCH_API_KEY";

/// Parses `value` and rejects schemes `reqwest` cannot send.
pub(crate) fn parse_http_url(value: &str) -> Result<Url> {
    let url =
        Url::parse(value.trim()).map_err(|err| FetchError::InvalidUrl(format!("{value}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!(
            "{value}: unsupported scheme '{other}', expected http or https"
        ))),
    }
}

/// A relay endpoint that forwards the URL given in one query parameter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProxyRelay {
    base_url: Url,
    param: String,
}

impl ProxyRelay {
    /// Relay at `base_url` taking the upstream URL in the `u` parameter.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            param: DEFAULT_PROXY_PARAM.to_owned(),
        }
    }

    /// Parses a relay URL.
    ///
    /// Accepts both a plain base (`https://relay.example/`) and the prefix
    /// form ending in an empty parameter (`https://relay.example/?u=`), in
    /// which case that trailing parameter names the upstream URL slot.
    pub fn parse(value: &str) -> Result<Self> {
        let mut base_url = parse_http_url(value)?;
        let mut pairs: Vec<(String, String)> = base_url.query_pairs().into_owned().collect();

        let param = match pairs.last() {
            Some((name, slot)) if slot.is_empty() && !name.is_empty() => {
                let name = name.clone();
                pairs.pop();
                name
            }
            _ => DEFAULT_PROXY_PARAM.to_owned(),
        };

        base_url.set_query(None);
        if !pairs.is_empty() {
            base_url.query_pairs_mut().extend_pairs(&pairs);
        }
        Ok(Self { base_url, param })
    }

    /// Overrides the query parameter carrying the upstream URL.
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    /// Relay URL without the upstream slot.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Query parameter carrying the upstream URL.
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Returns the relay URL that forwards to `target`.
    ///
    /// Example: `https://relay.example/?u=https%3A%2F%2Fapi.example%2Fsearch%3Fq%3Da`
    pub fn wrap(&self, target: &Url) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair(&self.param, target.as_str());
        url
    }
}

/// Where requests go: upstream API base, optional relay, optional API key.
#[derive(Clone)]
pub struct RelayConfig {
    api_base_url: Url,
    proxy: Option<ProxyRelay>,
    api_key: Option<String>,
    api_key_param: String,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("proxy", &self.proxy)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_param", &self.api_key_param)
            .finish()
    }
}

impl RelayConfig {
    /// Creates a config for `api_base_url` with no relay and no API key.
    pub fn new(api_base_url: &str) -> Result<Self> {
        let mut api_base_url = parse_http_url(api_base_url)?;
        if api_base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(format!(
                "{api_base_url} cannot be used as a base url"
            )));
        }
        // Without a trailing slash `Url::join` would replace the last segment.
        if !api_base_url.path().ends_with('/') {
            let path = format!("{}/", api_base_url.path());
            api_base_url.set_path(&path);
        }
        Ok(Self {
            api_base_url,
            proxy: None,
            api_key: None,
            api_key_param: DEFAULT_API_KEY_PARAM.to_owned(),
        })
    }

    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `RELAYFETCH_API_BASE_URL` — upstream API base (required)
    /// - `RELAYFETCH_PROXY_URL` — relay URL, plain or `?u=` prefix form (optional)
    /// - `RELAYFETCH_API_KEY` — value sent as the `apikey` query parameter (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = lookup(ENV_API_BASE_URL)
            .ok_or_else(|| FetchError::Config(format!("missing {ENV_API_BASE_URL} environment variable")))?;
        if base.trim().is_empty() {
            return Err(FetchError::Config(format!("{ENV_API_BASE_URL} is set but empty")));
        }

        let mut config = Self::new(&base)?;
        if let Some(proxy) = lookup(ENV_PROXY_URL).filter(|value| !value.trim().is_empty()) {
            config = config.with_proxy(ProxyRelay::parse(&proxy)?);
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|value| !value.trim().is_empty()) {
            config = config.with_api_key(key.trim());
        }
        Ok(config)
    }

    /// Routes every request through `proxy`.
    pub fn with_proxy(mut self, proxy: ProxyRelay) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sends `api_key` as a query parameter on every upstream URL.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the query parameter name used for the API key.
    pub fn with_api_key_param(mut self, param: impl Into<String>) -> Self {
        self.api_key_param = param.into();
        self
    }

    /// Upstream base URL, always ending in `/`.
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    /// Configured relay, if any.
    pub fn proxy(&self) -> Option<&ProxyRelay> {
        self.proxy.as_ref()
    }

    /// Builds the upstream URL for `path` with `query` appended, without
    /// relay wrapping.
    ///
    /// `path` must stay under the configured base: absolute URLs and `..`
    /// segments leaving the base path are rejected.
    pub fn upstream_url<I, K, V>(&self, path: &str, query: I) -> Result<Url>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self
            .api_base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| FetchError::InvalidUrl(format!("{path}: {err}")))?;
        if url.origin() != self.api_base_url.origin()
            || !url.path().starts_with(self.api_base_url.path())
        {
            return Err(FetchError::InvalidUrl(format!(
                "{path}: resolves outside of {}",
                self.api_base_url
            )));
        }

        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        if let Some(key) = &self.api_key {
            pairs.push((self.api_key_param.clone(), key.clone()));
        }
        pairs.extend(
            query
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_owned(), value.as_ref().to_owned())),
        );

        url.set_query(None);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(&pairs);
        }
        Ok(url)
    }

    /// Builds the URL to actually request: the upstream URL, wrapped through
    /// the relay when one is configured.
    pub fn endpoint_url<I, K, V>(&self, path: &str, query: I) -> Result<Url>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let upstream = self.upstream_url(path, query)?;
        Ok(match &self.proxy {
            Some(proxy) => proxy.wrap(&upstream),
            None => upstream,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use reqwest::Url;

    use super::{ProxyRelay, RelayConfig, ENV_API_BASE_URL, ENV_API_KEY, ENV_PROXY_URL};
    use crate::FetchError;

    const NO_QUERY: [(&str, &str); 0] = [];

    #[test]
    fn proxy_parse_accepts_prefix_form() {
        let proxy = ProxyRelay::parse("https://relay.example/?u=").unwrap();
        assert_eq!(proxy.param(), "u");
        assert_eq!(proxy.base_url().as_str(), "https://relay.example/");
    }

    #[test]
    fn proxy_parse_keeps_other_relay_params() {
        let proxy = ProxyRelay::parse("https://relay.example/fetch?mode=raw&target=").unwrap();
        assert_eq!(proxy.param(), "target");
        assert_eq!(proxy.base_url().query(), Some("mode=raw"));
    }

    #[test]
    fn proxy_parse_plain_base_uses_default_param() {
        let proxy = ProxyRelay::parse("https://relay.example/").unwrap();
        assert_eq!(proxy.param(), "u");
        assert_eq!(proxy.base_url().query(), None);
    }

    #[test]
    fn wrap_encodes_the_whole_target_into_one_param() {
        let proxy = ProxyRelay::parse("https://relay.example/?u=").unwrap();
        let target = Url::parse("https://api.example/search?query=a b&apikey=k").unwrap();
        let wrapped = proxy.wrap(&target);

        let forwarded: Vec<(String, String)> = wrapped.query_pairs().into_owned().collect();
        assert_eq!(forwarded, vec![("u".to_owned(), target.to_string())]);
        assert!(!wrapped.query().unwrap().contains('&'));
    }

    #[test]
    fn upstream_url_joins_path_and_appends_key_then_query() {
        let config = RelayConfig::new("https://api.example/api")
            .unwrap()
            .with_api_key("secret");
        let url = config
            .upstream_url("/search/songs", [("query", "daft punk")])
            .unwrap();

        assert_eq!(url.path(), "/api/search/songs");
        assert_eq!(url.query(), Some("apikey=secret&query=daft+punk"));
    }

    #[test]
    fn endpoint_url_without_proxy_is_upstream() {
        let config = RelayConfig::new("https://api.example/").unwrap();
        let url = config.endpoint_url("download", [("url", "x")]).unwrap();
        assert_eq!(url.as_str(), "https://api.example/download?url=x");
    }

    #[test]
    fn endpoint_url_with_proxy_wraps_upstream() {
        let config = RelayConfig::new("https://api.example/")
            .unwrap()
            .with_proxy(ProxyRelay::parse("https://relay.example/?u=").unwrap());
        let url = config.endpoint_url("download", NO_QUERY).unwrap();

        assert_eq!(url.host_str(), Some("relay.example"));
        let (name, value) = url.query_pairs().next().unwrap();
        assert_eq!(name, "u");
        assert_eq!(value, "https://api.example/download");
    }

    #[test]
    fn relative_base_is_rejected() {
        assert!(matches!(
            RelayConfig::new("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(matches!(
            RelayConfig::new("ftp://api.example/"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            ProxyRelay::parse("file:///tmp/relay?u="),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn absolute_path_cannot_replace_configured_host() {
        let config = RelayConfig::new("https://api.example/api")
            .unwrap()
            .with_api_key("secret");
        let err = config
            .upstream_url("https://attacker.example/collect", [("query", "x")])
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn dot_dot_cannot_escape_base_path() {
        let config = RelayConfig::new("https://api.example/api/v1").unwrap();
        for path in ["../admin", "search/../../admin", "/../other"] {
            assert!(
                matches!(
                    config.upstream_url(path, NO_QUERY),
                    Err(FetchError::InvalidUrl(_))
                ),
                "{path} must be rejected"
            );
        }
        let inside = config.upstream_url("search/../tracks", NO_QUERY).unwrap();
        assert_eq!(inside.path(), "/api/v1/tracks");
    }

    #[test]
    fn scheme_relative_path_cannot_switch_host() {
        let config = RelayConfig::new("https://api.example/").unwrap();
        let url = config.upstream_url("//attacker.example/x", NO_QUERY).unwrap();
        assert_eq!(url.host_str(), Some("api.example"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = RelayConfig::new("https://api.example/")
            .unwrap()
            .with_api_key("secret-key");
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn lookup_requires_base_url() {
        let vars: HashMap<&str, String> = HashMap::new();
        let err = RelayConfig::from_lookup(|name| vars.get(name).cloned()).unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));

        let vars = HashMap::from([(ENV_API_BASE_URL, "  ".to_owned())]);
        let err = RelayConfig::from_lookup(|name| vars.get(name).cloned()).unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[test]
    fn lookup_reads_optional_proxy_and_key() {
        let vars = HashMap::from([
            (ENV_API_BASE_URL, "https://api.example/".to_owned()),
            (ENV_PROXY_URL, "https://relay.example/?u=".to_owned()),
            (ENV_API_KEY, " k1 ".to_owned()),
        ]);
        let config = RelayConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();

        assert_eq!(config.proxy().map(ProxyRelay::param), Some("u"));
        let upstream = config.upstream_url("s", NO_QUERY).unwrap();
        assert_eq!(upstream.query(), Some("apikey=k1"));
    }
}

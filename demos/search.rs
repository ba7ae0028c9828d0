//! Relayed catalogue search and download-link lookup with unbounded retry.
//!
//! ```text
//! RELAYFETCH_API_BASE_URL=https://api.example/api \
//! RELAYFETCH_PROXY_URL='https://relay.example/?u=' \
//! RUST_LOG=relayfetch=debug \
//! cargo run --example search -- search search/tracks "daft punk"
//!
//! cargo run --example search -- download download/track https://tracks.example/1
//! ```
//!
//! Upstream paths and response shapes differ between catalogue APIs, so the
//! endpoint path is passed in and the JSON is printed as-is.

use relayfetch::{MaxAttempts, RelayFetchClient, RetryOptions};
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage: search <search|download> <endpoint-path> <query or track url>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relayfetch=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let path = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let value = args.collect::<Vec<_>>().join(" ");

    let param = match command.as_str() {
        "search" => "query",
        "download" => "url",
        other => anyhow::bail!("unknown command '{other}'; {USAGE}"),
    };
    if value.trim().is_empty() {
        anyhow::bail!("please enter a {param} value; {USAGE}");
    }

    let client = RelayFetchClient::from_env()?;
    let options = RetryOptions {
        max_attempts: MaxAttempts::Unbounded,
        ..client.options().clone()
    };
    let client = client.with_options(options);

    let body: serde_json::Value = client.get_json(&path, [(param, value.trim())]).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(())
}

use anyhow::{Context, Result};
use reqwest::Method;
use std::sync::Arc;

use viridem_auth::auth::CredentialResolver;
use viridem_auth::cache::TokenCache;
use viridem_auth::config::{Command, Config, LogFormat};
use viridem_auth::http_client::{self, ViridemHttpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    init_logging(&config);

    tracing::debug!(
        "Credential type: {}, cache config: {:?}",
        config.credential_type,
        config.cache_config()
    );

    // Composition root: one cache and one HTTP client for the whole process
    let cache = Arc::new(TokenCache::with_config(config.cache_config()));
    cache.register_cache_config(config.credential_type.clone(), config.cache_overrides);
    cache.start_cleanup();

    let client =
        http_client::build_client(config.http_connect_timeout, config.http_request_timeout)?;
    let resolver = Arc::new(
        CredentialResolver::new(cache.clone(), client.clone())
            .with_credential_type(config.credential_type.clone()),
    );

    let result = run(&config, &resolver, client).await;

    cache.shutdown();
    result
}

async fn run(
    config: &Config,
    resolver: &Arc<CredentialResolver>,
    client: reqwest::Client,
) -> Result<()> {
    let credentials = &config.credentials;

    match &config.command {
        Command::Header => {
            let header = resolver
                .resolve_authorization_header(credentials)
                .await
                .context("Failed to resolve Authorization header")?;
            println!("{}", header);
        }

        Command::Test => {
            resolver
                .test_connection(credentials)
                .await
                .context("Connection test failed")?;
            println!("Connection successful");
        }

        Command::Request { path } => {
            let http = ViridemHttpClient::new(client, resolver.clone());
            let response = http
                .request(credentials, Method::GET, path)
                .await
                .with_context(|| format!("Request to {} failed", path))?;
            let body = response.text().await.context("Failed to read response body")?;
            println!("{}", body);
        }

        Command::Stats => {
            if let Err(e) = resolver.resolve_authorization_header(credentials).await {
                tracing::warn!("Resolution failed: {}", e);
            }
            let stats = resolver.cache().stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Initialize logging with the configured level and format
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    // Logs go to stderr so stdout carries only command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

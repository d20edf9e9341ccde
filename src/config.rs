use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::auth::{CredentialRecord, DEFAULT_CREDENTIAL_TYPE};
use crate::cache::{CacheConfig, CacheConfigOverrides};

/// Viridem Auth - resolve Authorization headers for the Viridem API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Viridem API base URL
    #[arg(short = 'b', long, env = "VIRIDEM_BASE_URL")]
    pub base_url: Option<String>,

    /// Account username
    #[arg(short = 'u', long, env = "VIRIDEM_USERNAME")]
    pub username: Option<String>,

    /// Account password
    #[arg(short = 'p', long, env = "VIRIDEM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// OAuth2 client ID
    #[arg(long, env = "VIRIDEM_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "VIRIDEM_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Credential type used for cache keys and tuning
    #[arg(long, env = "VIRIDEM_CREDENTIAL_TYPE", default_value = DEFAULT_CREDENTIAL_TYPE)]
    pub credential_type: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub http_connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the resolved Authorization header value
    Header,

    /// Check the OAuth2 password grant without falling back
    Test,

    /// GET an API path with resolved credentials and print the body
    Request {
        /// Path relative to the base URL, e.g. /api/v1/viridem/versions
        path: String,
    },

    /// Resolve once, then print token cache statistics as JSON
    Stats,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub credentials: CredentialRecord,
    pub credential_type: String,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Token cache
    pub cache_overrides: CacheConfigOverrides,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,

    pub command: Command,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Self::from_args(CliArgs::parse()))
    }

    /// Build config from parsed arguments; cache tuning comes from the environment
    pub fn from_args(args: CliArgs) -> Self {
        Config {
            credentials: CredentialRecord {
                base_url: args.base_url,
                username: args.username,
                password: args.password,
                client_id: args.client_id,
                client_secret: args.client_secret,
            },
            credential_type: args.credential_type,

            http_connect_timeout: args.http_connect_timeout,
            http_request_timeout: args.http_timeout,

            cache_overrides: CacheConfigOverrides {
                expiry_buffer_millis: env_parse("TOKEN_EXPIRY_BUFFER_MS"),
                default_basic_auth_expiry_millis: env_parse("BASIC_AUTH_EXPIRY_MS"),
                minimum_cache_duration_millis: env_parse("MIN_CACHE_DURATION_MS"),
                cleanup_interval_millis: env_parse("CACHE_CLEANUP_INTERVAL_MS"),
            },

            log_level: args.log_level,
            log_format: parse_log_format(&args.log_format),

            command: args.command,
        }
    }

    /// Effective default cache tuning
    pub fn cache_config(&self) -> CacheConfig {
        self.cache_overrides.merge_over(CacheConfig::default())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http_connect_timeout == 0 || self.http_request_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }

        let cache = self.cache_config();
        if cache.cleanup_interval_millis == 0 {
            anyhow::bail!("CACHE_CLEANUP_INTERVAL_MS must be greater than zero");
        }
        if cache.expiry_buffer_millis < 0
            || cache.default_basic_auth_expiry_millis < 0
            || cache.minimum_cache_duration_millis < 0
        {
            anyhow::bail!("Token cache durations must not be negative");
        }

        Ok(())
    }
}

/// Parse an optional numeric environment variable
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

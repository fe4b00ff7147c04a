//! Configuration management for the telemetry data source.
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/telemetry-datasource/config.toml`)
//! 3. User-specified configuration file (`--config`)
//! 4. Environment variables (`TELEMETRY_API__URL`, `TELEMETRY_QUERY__MAX_CONCURRENCY`, ...)
//! 5. Command-line arguments
//!
//! `TELEMETRY_API_URL` and `TELEMETRY_API_TOKEN` are accepted as short forms of
//! `TELEMETRY_API__URL` and `TELEMETRY_API__TOKEN`, and take precedence over
//! them. The API token is best passed through the environment.

use std::path::{Path, PathBuf};

use clap::Args;
use config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::Deserialize;

use crate::client::ApiVersion;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const DEFAULT_CONFIG_PATH: &str = "/etc/telemetry-datasource/config.toml";
const ENV_PREFIX: &str = "TELEMETRY";

/// Single-underscore variables and the settings they set.
const ENV_ALIASES: [(&str, &str); 2] = [
    ("TELEMETRY_API_URL", "api.url"),
    ("TELEMETRY_API_TOKEN", "api.token"),
];

/// Command-line overrides for the settings.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Telemetry API base URL
    #[arg(long, env = "TELEMETRY_API_URL")]
    pub api_url: Option<String>,

    /// Telemetry API token
    #[arg(long, env = "TELEMETRY_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Telemetry API version
    #[arg(long, value_enum)]
    pub api_version: Option<ApiVersion>,

    /// Upstream request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of sub-queries fetched at once
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiConfig,
    pub query: QueryConfig,
}

/// Upstream API connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    #[serde(default)]
    pub token: String,
    pub version: ApiVersion,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on a buffered response body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_max_concurrency() -> usize {
    8
}

impl Settings {
    /// Loads configuration from all available sources.
    pub fn new(args: &ConfigArgs) -> Result<Self, ConfigError> {
        Self::load(args, None)
    }

    /// `env` replaces the process environment when given.
    fn load(args: &ConfigArgs, env: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if Path::new(DEFAULT_CONFIG_PATH).is_file() {
            builder = builder.add_source(File::from(PathBuf::from(DEFAULT_CONFIG_PATH)));
        }

        if let Some(ref path) = args.config {
            builder = builder.add_source(File::from(path.clone()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env.clone()),
        );

        for (var, key) in ENV_ALIASES {
            let value = match &env {
                Some(env) => env.get(var).cloned(),
                None => std::env::var(var).ok(),
            };
            if let Some(value) = value {
                builder = builder.set_override(key, value)?;
            }
        }

        if let Some(ref url) = args.api_url {
            builder = builder.set_override("api.url", url.as_str())?;
        }
        if let Some(ref token) = args.api_token {
            builder = builder.set_override("api.token", token.as_str())?;
        }
        if let Some(version) = args.api_version {
            builder = builder.set_override("api.version", version.as_str())?;
        }
        if let Some(timeout) = args.timeout {
            builder = builder.set_override("api.timeout_secs", timeout)?;
        }
        if let Some(max_concurrency) = args.max_concurrency {
            builder = builder.set_override("query.max_concurrency", max_concurrency as u64)?;
        }

        builder.build()?.try_deserialize()
    }
}

//! Layered configuration.
//!
//! Sources, later ones win:
//!
//! 1. built-in defaults
//! 2. `actor-bench.toml` in the working directory, or the file given with
//!    `--config`
//! 3. `ACTOR_BENCH__*` environment variables, e.g. `ACTOR_BENCH__REPETITIONS=3`
//!
//! The API token additionally falls back to `APIFY_API_TOKEN`.

use actor_bench_adapters::apify::{RetryPolicy, DEFAULT_BASE_URL};
use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "actor-bench.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "ACTOR_BENCH";

/// Environment variable holding the platform API token.
pub const TOKEN_ENV: &str = "APIFY_API_TOKEN";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Effective benchmark settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    /// Platform API base URL.
    pub api_base_url: String,
    /// Platform API token.
    pub api_token: Option<String>,
    /// Memory ceiling of every run.
    pub memory_mbytes: u32,
    /// Valid runs collected per actor.
    pub repetitions: usize,
    /// Maximum runs started per actor, unbounded when absent.
    pub max_attempts: Option<u32>,
    /// Benchmark schema version stored in the metadata.
    pub benchmark_version: String,
    /// Skip runs that were migrated while running.
    pub reject_migrated_runs: bool,
    /// Runs measured at once.
    pub fetch_concurrency: usize,
    /// Log output format.
    pub log_format: LogFormat,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Retries of a throttled or failed HTTP request.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds, doubled for every further one.
    pub retry_base_delay_ms: u64,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            memory_mbytes: 8192,
            repetitions: 5,
            max_attempts: None,
            benchmark_version: "1".to_string(),
            reject_migrated_runs: false,
            fetch_concurrency: 1,
            log_format: LogFormat::Text,
            request_timeout_secs: 120,
            max_retries: 5,
            retry_base_delay_ms: 500,
        }
    }
}

impl BenchSettings {
    /// Load settings from the configuration file and environment.
    ///
    /// An explicit `path` must exist, the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Self = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to load configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        Ok(settings.with_token_fallback(std::env::var(TOKEN_ENV).ok()))
    }

    /// Use `token` when no token was configured.
    pub fn with_token_fallback(mut self, token: Option<String>) -> Self {
        if self.api_token.as_deref().map_or(true, str::is_empty) {
            self.api_token = token.filter(|t| !t.is_empty());
        }
        self
    }

    /// The API token, or an error explaining how to set it.
    pub fn require_token(&self) -> Result<&str> {
        self.api_token
            .as_deref()
            .with_context(|| format!("no API token configured, set {TOKEN_ENV} or {ENV_PREFIX}__API_TOKEN"))
    }

    /// Backoff applied to platform requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    /// Token suitable for display.
    pub fn redacted_token(&self) -> String {
        match self.api_token.as_deref() {
            Some(token) if token.chars().count() > 4 => {
                let tail: String = token.chars().skip(token.chars().count() - 4).collect();
                format!("****{tail}")
            }
            Some(_) => "****".to_string(),
            None => "not set".to_string(),
        }
    }
}

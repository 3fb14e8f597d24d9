//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use std::env;
use std::ops::Range;
use std::str::FromStr;
use std::time::Duration;

use concord_core::Intents;

/// Main client configuration
#[derive(Clone)]
pub struct ClientConfig {
    pub app: AppSettings,
    /// Bot token, sent with Identify/Resume and as the REST `Authorization` header
    pub token: String,
    pub intents: Intents,
    pub gateway: GatewayConfig,
    pub backoff: BackoffConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    /// Maximum user callbacks running at once across all shards
    pub dispatch_concurrency: usize,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("app", &self.app)
            .field("token", &"[redacted]")
            .field("intents", &self.intents)
            .field("gateway", &self.gateway)
            .field("backoff", &self.backoff)
            .field("http", &self.http)
            .field("cache", &self.cache)
            .field("dispatch_concurrency", &self.dispatch_concurrency)
            .finish()
    }
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            _ => Err(()),
        }
    }
}

/// Gateway and sharding configuration
///
/// `None` values are filled from `GET /gateway/bot` at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: Option<String>,
    pub shard_count: Option<u32>,
    /// Subset of shards run by this process
    pub shard_ids: Option<Range<u32>>,
    pub max_concurrency: Option<u32>,
    pub identify_spacing_ms: u64,
    pub identify_jitter_ms: u64,
    pub hello_timeout_ms: u64,
    pub large_threshold: u32,
    pub guild_ready_timeout_ms: u64,
}

impl GatewayConfig {
    #[must_use]
    pub fn identify_spacing(&self) -> Duration {
        Duration::from_millis(self.identify_spacing_ms)
    }

    #[must_use]
    pub fn identify_jitter(&self) -> Duration {
        Duration::from_millis(self.identify_jitter_ms)
    }

    #[must_use]
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_millis(self.hello_timeout_ms)
    }

    #[must_use]
    pub fn guild_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.guild_ready_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            shard_count: None,
            shard_ids: None,
            max_concurrency: None,
            identify_spacing_ms: default_identify_spacing_ms(),
            identify_jitter_ms: 0,
            hello_timeout_ms: default_hello_timeout_ms(),
            large_threshold: default_large_threshold(),
            guild_ready_timeout_ms: default_guild_ready_timeout_ms(),
        }
    }
}

/// Reconnect and restart policy
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    /// Transport retries before a link gives up
    pub max_reconnect_attempts: u32,
    /// Supervisor restarts of one shard before the client fails
    pub max_shard_restarts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            max_ms: default_backoff_max_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_shard_restarts: default_max_shard_restarts(),
        }
    }
}

/// REST client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub api_base_url: String,
    /// Retry ceiling shared by 429 and 5xx responses
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            max_retries: default_http_max_retries(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Message cache capacity; 0 disables message caching
    pub max_messages: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

// Default value functions
fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_identify_spacing_ms() -> u64 {
    5000
}

fn default_hello_timeout_ms() -> u64 {
    20_000
}

fn default_large_threshold() -> u32 {
    250
}

fn default_guild_ready_timeout_ms() -> u64 {
    2000
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_max_shard_restarts() -> u32 {
    5
}

fn default_http_max_retries() -> u32 {
    3
}

fn default_http_timeout_ms() -> u64 {
    15_000
}

fn default_max_messages() -> usize {
    1000
}

fn default_dispatch_concurrency() -> usize {
    16
}

/// Parse an optional variable, reporting malformed values instead of
/// silently falling back
fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        _ => Ok(None),
    }
}

/// Parse `start..end` (or a single index `n`, meaning `n..n+1`)
fn parse_range(name: &'static str, raw: &str) -> Result<Range<u32>, ConfigError> {
    let invalid = || ConfigError::InvalidValue(name, raw.to_string());
    let range = match raw.trim().split_once("..") {
        Some((start, end)) => {
            let start: u32 = start.trim().parse().map_err(|_| invalid())?;
            let end: u32 = end.trim().parse().map_err(|_| invalid())?;
            start..end
        }
        None => {
            let single: u32 = raw.trim().parse().map_err(|_| invalid())?;
            single..single + 1
        }
    };
    if range.is_empty() {
        return Err(invalid());
    }
    Ok(range)
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                env: Environment::default(),
            },
            token: token.into(),
            intents: Intents::default(),
            gateway: GatewayConfig::default(),
            backoff: BackoffConfig::default(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            dispatch_concurrency: default_dispatch_concurrency(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `DISCORD_TOKEN` is missing or a variable is malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("DISCORD_TOKEN"))?;

        let intents = match lookup("DISCORD_INTENTS") {
            Some(raw) => raw
                .parse::<Intents>()
                .map_err(|e| ConfigError::InvalidValue("DISCORD_INTENTS", e.to_string()))?,
            None => Intents::default(),
        };

        let env = match lookup("APP_ENV") {
            Some(raw) => raw
                .parse::<Environment>()
                .map_err(|()| ConfigError::InvalidValue("APP_ENV", raw))?,
            None => Environment::default(),
        };

        let shard_ids = lookup("SHARD_IDS")
            .map(|raw| parse_range("SHARD_IDS", &raw))
            .transpose()?;

        let shard_count: Option<u32> = parse_var(&lookup, "SHARD_COUNT")?;
        if let (Some(count), Some(ids)) = (shard_count, &shard_ids) {
            if ids.end > count {
                return Err(ConfigError::InvalidValue(
                    "SHARD_IDS",
                    format!("{}..{} exceeds SHARD_COUNT {count}", ids.start, ids.end),
                ));
            }
        }

        Ok(Self {
            app: AppSettings { env },
            token,
            intents,
            gateway: GatewayConfig {
                url: lookup("GATEWAY_URL"),
                shard_count,
                shard_ids,
                max_concurrency: parse_var(&lookup, "MAX_CONCURRENCY")?,
                identify_spacing_ms: parse_var(&lookup, "IDENTIFY_SPACING_MS")?
                    .unwrap_or_else(default_identify_spacing_ms),
                identify_jitter_ms: parse_var(&lookup, "IDENTIFY_JITTER_MS")?.unwrap_or(0),
                hello_timeout_ms: parse_var(&lookup, "HELLO_TIMEOUT_MS")?
                    .unwrap_or_else(default_hello_timeout_ms),
                large_threshold: parse_var(&lookup, "LARGE_THRESHOLD")?
                    .unwrap_or_else(default_large_threshold),
                guild_ready_timeout_ms: parse_var(&lookup, "GUILD_READY_TIMEOUT_MS")?
                    .unwrap_or_else(default_guild_ready_timeout_ms),
            },
            backoff: BackoffConfig {
                base_ms: parse_var(&lookup, "BACKOFF_BASE_MS")?
                    .unwrap_or_else(default_backoff_base_ms),
                max_ms: parse_var(&lookup, "BACKOFF_MAX_MS")?
                    .unwrap_or_else(default_backoff_max_ms),
                max_reconnect_attempts: parse_var(&lookup, "MAX_RECONNECT_ATTEMPTS")?
                    .unwrap_or_else(default_max_reconnect_attempts),
                max_shard_restarts: parse_var(&lookup, "MAX_SHARD_RESTARTS")?
                    .unwrap_or_else(default_max_shard_restarts),
            },
            http: HttpConfig {
                api_base_url: lookup("API_BASE_URL").unwrap_or_else(default_api_base_url),
                max_retries: parse_var(&lookup, "HTTP_MAX_RETRIES")?
                    .unwrap_or_else(default_http_max_retries),
                timeout_ms: parse_var(&lookup, "HTTP_TIMEOUT_MS")?
                    .unwrap_or_else(default_http_timeout_ms),
            },
            cache: CacheConfig {
                max_messages: parse_var(&lookup, "MAX_MESSAGES")?
                    .unwrap_or_else(default_max_messages),
            },
            dispatch_concurrency: parse_var(&lookup, "DISPATCH_CONCURRENCY")?
                .unwrap_or_else(default_dispatch_concurrency),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

use serde::{Deserialize, Serialize};

use crate::error::{Result, RewardgateError};

/// Main configuration for the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub key_directory: KeyDirectoryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Where and how to fetch the ad network's rotating verification keys
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyDirectoryConfig {
    /// Fixed URL the network publishes its verifier keys at
    #[serde(default = "default_key_directory_url")]
    pub url: String,
    /// Bound on a single key fetch; expiry counts as a fetch failure
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Snapshot lifetime, kept well inside the network's stated 24h key
    /// rotation window
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            key_directory: KeyDirectoryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for KeyDirectoryConfig {
    fn default() -> Self {
        Self {
            url: default_key_directory_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cache_ttl_hours: default_cache_ttl_hours(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_key_directory_url() -> String {
    "https://www.gstatic.com/admob/reward/verifier-keys.json".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_hours() -> u64 {
    20
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for [`Config`]
///
/// # Example
///
/// ```rust
/// use rewardgate::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .from_env()
///     .with_port(9000)
///     .build()
///     .unwrap();
/// assert_eq!(config.server.port, 9000);
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Apply overrides from `REWARDGATE_*` environment variables.
    ///
    /// Unset or unparseable variables leave the current value untouched.
    pub fn from_env(mut self) -> Self {
        if let Ok(host) = std::env::var("REWARDGATE_HOST") {
            self.config.server.host = host;
        }
        if let Ok(port) = std::env::var("REWARDGATE_PORT") {
            if let Ok(port) = port.parse() {
                self.config.server.port = port;
            }
        }
        if let Ok(level) = std::env::var("REWARDGATE_LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Ok(json) = std::env::var("REWARDGATE_LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Ok(url) = std::env::var("REWARDGATE_KEY_DIRECTORY_URL") {
            self.config.key_directory.url = url;
        }
        if let Ok(timeout) = std::env::var("REWARDGATE_KEY_FETCH_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.config.key_directory.fetch_timeout_secs = timeout;
            }
        }
        if let Ok(ttl) = std::env::var("REWARDGATE_KEY_CACHE_TTL_HOURS") {
            if let Ok(ttl) = ttl.parse() {
                self.config.key_directory.cache_ttl_hours = ttl;
            }
        }
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    pub fn with_key_directory_url(mut self, url: impl Into<String>) -> Self {
        self.config.key_directory.url = url.into();
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.key_directory.fetch_timeout_secs = secs;
        self
    }

    pub fn with_cache_ttl_hours(mut self, hours: u64) -> Self {
        self.config.key_directory.cache_ttl_hours = hours;
        self
    }

    pub fn build(self) -> Result<Config> {
        let key_directory = &self.config.key_directory;
        if !key_directory.url.starts_with("http://") && !key_directory.url.starts_with("https://") {
            return Err(RewardgateError::internal(format!(
                "key directory URL must be http(s), got '{}'",
                key_directory.url
            )));
        }
        if key_directory.fetch_timeout_secs == 0 {
            return Err(RewardgateError::internal(
                "key fetch timeout must be at least 1 second",
            ));
        }
        if key_directory.cache_ttl_hours == 0 {
            return Err(RewardgateError::internal(
                "key cache TTL must be at least 1 hour",
            ));
        }
        Ok(self.config)
    }
}

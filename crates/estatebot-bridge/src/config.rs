//! Bridge configuration loading from file and environment variables.

use estatebot_voice::BridgeConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level process configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Voice pipeline settings: credentials, engines, retry and pacing.
    #[serde(flatten)]
    pub bridge: BridgeConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "estatebot_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_db_path() -> String {
    "estatebot.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl DatabaseConfig {
    pub fn runtime_settings(&self) -> estatebot_db::DbRuntimeSettings {
        estatebot_db::DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET` override `livekit.*`
/// - `DEEPGRAM_API_KEY` overrides `deepgram.api_key`
/// - `ENGINE_URL` overrides `engine.url`
/// - `ESTATEBOT_DB_PATH` overrides `database.path`
/// - `ESTATEBOT_LOG_LEVEL` overrides `logging.level`
/// - `ESTATEBOT_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like `load_config`, with an injectable variable source.
pub fn load_config_with<F>(path: Option<&str>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    let bridge = &mut config.bridge;
    if let Some(url) = lookup("LIVEKIT_URL") {
        bridge.livekit.url = url;
    }
    if let Some(key) = lookup("LIVEKIT_API_KEY") {
        bridge.livekit.api_key = key;
    }
    if let Some(secret) = lookup("LIVEKIT_API_SECRET") {
        bridge.livekit.api_secret = secret;
    }
    if let Some(key) = lookup("DEEPGRAM_API_KEY") {
        bridge.deepgram.api_key = key;
    }
    if let Some(url) = lookup("ENGINE_URL") {
        bridge.engine.url = url;
    }
    if let Some(db_path) = lookup("ESTATEBOT_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("ESTATEBOT_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("ESTATEBOT_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

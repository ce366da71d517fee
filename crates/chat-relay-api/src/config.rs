//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use chat_relay_core::EventLogConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Legacy environment variable holding the event log file name
pub const LOG_FILE_NAME_VAR: &str = "LOG_FILE_NAME";

/// Legacy environment variable holding the listen port (`:8080` or `8080`)
pub const SERVER_PORT_VAR: &str = "SERVER_PORT";

/// Legacy environment variable holding the Telegram bot token
pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Event log settings
    pub event_log: EventLogConfig,

    /// Message persistence settings
    pub storage: StorageConfig,

    /// Outbound Telegram API settings
    pub telegram: TelegramConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check every section for values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        if self.event_log.buffer_size == 0 {
            return Err(ConfigError::Invalid {
                message: "event_log.buffer_size must be greater than zero".to_string(),
            });
        }

        if self.event_log.workers == Some(0) {
            return Err(ConfigError::Invalid {
                message: "event_log.workers must be greater than zero".to_string(),
            });
        }

        let file_name = self.event_log.file_name.trim();
        if file_name.is_empty() {
            return Err(ConfigError::Missing {
                key: "event_log.file_name".to_string(),
            });
        }
        if file_name.contains('/') || file_name.contains('\\') || file_name == ".." {
            return Err(ConfigError::Invalid {
                message: format!(
                    "event_log.file_name must be a plain file name, got '{}'",
                    self.event_log.file_name
                ),
            });
        }

        if let StorageConfig::Filesystem { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Missing {
                    key: "storage.path".to_string(),
                });
            }
        }

        let base_url = self.telegram.api_base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "telegram.api_base_url must be an http(s) URL, got '{}'",
                    base_url
                ),
            });
        }

        Ok(())
    }

    /// Apply the environment variables used by earlier deployments
    ///
    /// `lookup` resolves a variable name to its value; empty values are
    /// ignored.
    pub fn apply_legacy_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value_of = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(file_name) = value_of(LOG_FILE_NAME_VAR) {
            self.event_log.file_name = file_name.trim().to_string();
        }

        if let Some(port) = value_of(SERVER_PORT_VAR) {
            self.server.port = parse_legacy_port(&port)?;
        }

        if let Some(token) = value_of(BOT_TOKEN_VAR) {
            self.telegram.bot_token = Some(token.trim().to_string());
        }

        Ok(())
    }
}

/// Parse a port given as `8080` or `:8080`
pub fn parse_legacy_port(value: &str) -> Result<u16, ConfigError> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix(':').unwrap_or(trimmed);

    digits
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidLegacyValue {
            key: SERVER_PORT_VAR.to_string(),
            value: value.to_string(),
        })
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds, also bounding the event log drain
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl ServerConfig {
    /// `host:port` string to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 5,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Where received messages are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process memory; contents are lost on restart
    Memory,

    /// JSON Lines file under `path`
    Filesystem { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("data/messages"),
        }
    }
}

/// Telegram Bot API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Base URL of the Bot API
    pub api_base_url: String,

    /// Bot token; replies fail with a recorded event when absent
    pub bot_token: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_string(),
            bot_token: None,
            request_timeout_seconds: 10,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base_url", &self.api_base_url)
            .field(
                "bot_token",
                &self.bot_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

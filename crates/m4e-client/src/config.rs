//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/m4e/config.toml` by default.
//!
//! The session cookie value supports an environment reference:
//! - `env::VAR_NAME`: read from the environment
//! - plain text: used as-is

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use m4e_comm::{ConnectionConfig, DEFAULT_RESOURCE_PATH, SessionCredentials, keepalive_interval_from_minutes};
use m4e_core::STATUS_UPDATE_PERIOD_MINUTES;
use m4e_docs::{CacheConfig, DEFAULT_EXPIRATION_DAYS};

/// Configuration for the m4e client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Server connection settings.
    pub server: ServerSettings,

    /// Session cookie from a prior sign-in.
    pub session: SessionSettings,

    /// Document cache settings.
    pub cache: CacheSettings,
}

/// Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// HTTP(S) URL of the server.
    pub url: String,

    /// Path of the WebSocket resource.
    pub resource_path: String,

    /// Send keepalive pings.
    pub ping_enabled: bool,

    /// Keepalive period in minutes; 0 disables it.
    pub keepalive_minutes: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            resource_path: DEFAULT_RESOURCE_PATH.to_string(),
            ping_enabled: true,
            keepalive_minutes: STATUS_UPDATE_PERIOD_MINUTES,
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Cookie name.
    pub cookie_name: String,

    /// Cookie value (supports the `env::` prefix).
    pub cookie_value: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "JSESSIONID".to_string(),
            cookie_value: None,
        }
    }
}

/// Document cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache directory; the platform data directory when unset.
    pub directory: Option<PathBuf>,

    /// Records unused for this many days are purged.
    pub expiration_days: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: None,
            expiration_days: DEFAULT_EXPIRATION_DAYS,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        m4e_core::app_config_dir().join("config.toml")
    }

    /// Connection settings for the real-time connection.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.server.url)
            .with_resource_path(&self.server.resource_path)
            .with_ping_enabled(self.server.ping_enabled)
            .with_keepalive_interval(keepalive_interval_from_minutes(
                self.server.keepalive_minutes,
            ))
    }

    /// Session cookie, if one is configured.
    pub fn credentials(&self) -> Result<Option<SessionCredentials>, String> {
        let Some(raw) = self.session.cookie_value.as_deref() else {
            return Ok(None);
        };
        let value = resolve(raw).map_err(|e| format!("failed to resolve cookie_value: {}", e))?;
        Ok(Some(SessionCredentials::new(&self.session.cookie_name, value)))
    }

    /// Document cache settings.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            directory: self.cache.directory.clone(),
            expiration_days: self.cache.expiration_days,
        }
    }
}

/// Resolves a value that may reference an environment variable.
pub fn resolve(value: &str) -> Result<String, String> {
    match value.strip_prefix("env::") {
        Some(var) => {
            std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
        }
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert!(!config.debug);
        assert_eq!(config.server.url, "http://localhost:8080");
        assert_eq!(config.server.resource_path, "/ws");
        assert_eq!(config.session.cookie_name, "JSESSIONID");
        assert_eq!(config.cache.expiration_days, 30);
        assert!(config.credentials().unwrap().is_none());
    }

    #[test]
    fn full_file() {
        let toml_content = r#"
debug = true

[server]
url = "https://m4e.example.org"
resource_path = "/socket"
ping_enabled = false
keepalive_minutes = 5

[session]
cookie_name = "SID"
cookie_value = "abc123"

[cache]
directory = "/tmp/m4e-cache"
expiration_days = 7
"#;
        let config: ClientConfig = toml::from_str(toml_content).unwrap();
        assert!(config.debug);

        let connection = config.connection_config();
        assert_eq!(connection.server_url, "https://m4e.example.org");
        assert_eq!(connection.resource_path, "/socket");
        assert!(!connection.ping_enabled);
        assert_eq!(connection.keepalive_interval, Duration::from_secs(60));

        let creds = config.credentials().unwrap().unwrap();
        assert_eq!(creds.cookie_header(), "SID=abc123");

        let cache = config.cache_config();
        assert_eq!(cache.directory, Some(PathBuf::from("/tmp/m4e-cache")));
        assert_eq!(cache.expiration_days, 7);
    }

    #[test]
    fn cookie_from_environment() {
        unsafe {
            std::env::set_var("_M4E_TEST_COOKIE", "from-env");
        }
        let config: ClientConfig =
            toml::from_str("[session]\ncookie_value = \"env::_M4E_TEST_COOKIE\"\n").unwrap();
        let creds = config.credentials().unwrap().unwrap();
        assert_eq!(creds.cookie_header(), "JSESSIONID=from-env");
        unsafe {
            std::env::remove_var("_M4E_TEST_COOKIE");
        }
    }

    #[test]
    fn missing_environment_variable_errors() {
        let config: ClientConfig =
            toml::from_str("[session]\ncookie_value = \"env::_M4E_TEST_UNSET_COOKIE\"\n").unwrap();
        let err = config.credentials().unwrap_err();
        assert!(err.contains("_M4E_TEST_UNSET_COOKIE"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nurl = \"http://10.0.0.1:9000\"\n").unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.server.url, "http://10.0.0.1:9000");
        assert!(config.server.ping_enabled);
    }

    #[test]
    fn load_from_bad_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = 3").unwrap();
        assert!(ClientConfig::load_from(&path).unwrap_err().contains("parse"));
        assert!(ClientConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn dump_round_trips() {
        let config = ClientConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.server.url, config.server.url);
    }
}

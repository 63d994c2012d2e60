//! Connection configuration.

use std::time::Duration;

use url::Url;

use crate::error::{CommError, CommResult};

/// Resource path of the WebSocket endpoint on the server.
pub const DEFAULT_RESOURCE_PATH: &str = "/ws";

/// Upper bound for the keepalive interval.
pub const MAX_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// HTTP(S) URL of the server, as used for REST calls.
    pub server_url: String,

    /// Path of the WebSocket resource, appended to the server URL.
    pub resource_path: String,

    /// Whether keepalive pings are sent.
    pub ping_enabled: bool,

    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            resource_path: DEFAULT_RESOURCE_PATH.to_string(),
            ping_enabled: true,
            keepalive_interval: keepalive_interval_from_minutes(
                m4e_core::STATUS_UPDATE_PERIOD_MINUTES,
            ),
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration for the given server URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Builder: set the WebSocket resource path.
    pub fn with_resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = path.into();
        self
    }

    /// Builder: enable or disable keepalive pings.
    pub fn with_ping_enabled(mut self, enabled: bool) -> Self {
        self.ping_enabled = enabled;
        self
    }

    /// Builder: set the keepalive interval, capped at [`MAX_KEEPALIVE_INTERVAL`].
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.min(MAX_KEEPALIVE_INTERVAL);
        self
    }

    /// Returns true if the keepalive timer should run.
    pub fn keepalive_active(&self) -> bool {
        self.ping_enabled && !self.keepalive_interval.is_zero()
    }

    /// Returns the WebSocket endpoint for the configured server.
    pub fn endpoint(&self) -> CommResult<Url> {
        ws_url(&self.server_url, &self.resource_path)
    }
}

/// Converts the configured period in minutes to the keepalive interval.
///
/// The result never exceeds [`MAX_KEEPALIVE_INTERVAL`]. Zero minutes yields a
/// zero interval, which disables the keepalive.
pub fn keepalive_interval_from_minutes(minutes: u64) -> Duration {
    Duration::from_millis(minutes.saturating_mul(60 * 1000)).min(MAX_KEEPALIVE_INTERVAL)
}

/// Derives the WebSocket endpoint from the server's HTTP(S) URL.
///
/// A URL without scheme is taken as `http://`. `http` maps to `ws` and
/// `https` to `wss`; `ws`/`wss` pass through. The resource path is appended
/// to any path the server URL already has.
pub fn ws_url(server_url: &str, resource_path: &str) -> CommResult<Url> {
    let trimmed = server_url.trim();
    if trimmed.is_empty() {
        return Err(CommError::invalid_url(server_url, "empty URL"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| CommError::invalid_url(server_url, e))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CommError::invalid_url(
                server_url,
                format!("unsupported scheme {other}"),
            ));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| CommError::invalid_url(server_url, "cannot switch scheme"))?;

    let base = url.path().trim_end_matches('/').to_string();
    let resource = resource_path.trim_start_matches('/');
    url.set_path(&format!("{base}/{resource}"));
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.resource_path, "/ws");
        assert!(config.ping_enabled);
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));
        assert!(config.keepalive_active());
    }

    #[test]
    fn custom_config() {
        let config = ConnectionConfig::new("https://m4e.example.org")
            .with_resource_path("/socket")
            .with_ping_enabled(false)
            .with_keepalive_interval(Duration::from_secs(600));

        assert_eq!(config.resource_path, "/socket");
        assert!(!config.ping_enabled);
        assert_eq!(config.keepalive_interval, MAX_KEEPALIVE_INTERVAL);
        assert!(!config.keepalive_active());
    }

    #[test]
    fn keepalive_minutes_are_capped() {
        assert_eq!(keepalive_interval_from_minutes(0), Duration::ZERO);
        assert_eq!(keepalive_interval_from_minutes(1), Duration::from_millis(60_000));
        assert_eq!(keepalive_interval_from_minutes(5), Duration::from_millis(60_000));
        assert_eq!(keepalive_interval_from_minutes(u64::MAX), MAX_KEEPALIVE_INTERVAL);
    }

    #[test]
    fn zero_interval_disables_keepalive() {
        let config = ConnectionConfig::default().with_keepalive_interval(Duration::ZERO);
        assert!(!config.keepalive_active());
    }

    #[test]
    fn ws_url_from_http() {
        let url = ws_url("http://localhost:8080", "/ws").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/ws");
    }

    #[test]
    fn ws_url_from_https_with_path() {
        let url = ws_url("https://example.org/m4e/", "/ws").unwrap();
        assert_eq!(url.as_str(), "wss://example.org/m4e/ws");
    }

    #[test]
    fn ws_url_without_scheme() {
        let url = ws_url("localhost:8080", "ws").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/ws");
    }

    #[test]
    fn ws_url_passthrough() {
        let url = ws_url("wss://example.org", "/ws").unwrap();
        assert_eq!(url.as_str(), "wss://example.org/ws");
    }

    #[test]
    fn ws_url_rejects_bad_input() {
        assert!(matches!(
            ws_url("", "/ws"),
            Err(CommError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ws_url("ftp://example.org", "/ws"),
            Err(CommError::InvalidUrl { .. })
        ));
    }
}

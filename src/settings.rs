//! Connection settings
//!
//! Deserializable configuration for the connection hub. Every field has a
//! default, so a partial or entirely absent configuration section still loads;
//! the same struct can also be populated from environment variables. Settings
//! are immutable once a hub has been built from them.

use crate::keyspace::Keyspace;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while validating connection settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// An entry in the host list was not of the form `host:port`.
    #[error("invalid endpoint '{0}': expected host:port")]
    InvalidEndpoint(String),

    /// The port component of an endpoint was not a number in range.
    #[error("invalid port in endpoint '{0}'")]
    InvalidPort(String),

    /// The proxy mode string matched no known mode.
    #[error("unknown proxy mode '{0}' (expected none, twemproxy or envoyproxy)")]
    UnknownProxyMode(String),

    /// The host list contained no usable endpoints.
    #[error("no endpoints configured")]
    NoEndpoints,
}

/// Proxy sitting between this client and the Redis deployment.
///
/// Carried for the host application's benefit: when a proxy is configured,
/// admin commands (which proxies do not forward) are refused locally instead
/// of failing opaquely on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Direct connection, no proxy.
    #[default]
    None,
    /// Twemproxy (nutcracker).
    Twemproxy,
    /// Envoy redis proxy.
    Envoyproxy,
}

impl FromStr for ProxyMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "twemproxy" => Ok(Self::Twemproxy),
            "envoyproxy" => Ok(Self::Envoyproxy),
            other => Err(SettingsError::UnknownProxyMode(other.to_string())),
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Twemproxy => write!(f, "twemproxy"),
            Self::Envoyproxy => write!(f, "envoyproxy"),
        }
    }
}

/// A single `host:port` pair from the configured host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    fn parse(raw: &str) -> Result<Self, SettingsError> {
        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| SettingsError::InvalidEndpoint(raw.to_string()))?;
        if host.is_empty() {
            return Err(SettingsError::InvalidEndpoint(raw.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| SettingsError::InvalidPort(raw.to_string()))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn default_hosts() -> String {
    "127.0.0.1:6379".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_response_timeout_secs() -> u64 {
    3
}

/// Connection settings for [`ConnectionHub`](crate::ConnectionHub).
///
/// Mirrors a named configuration section: a comma-separated `host:port` list,
/// credentials, timeouts, the default database index and a handful of flags.
/// `client_name` doubles as the key prefix applied by every facade.
///
/// # Example
///
/// ```rust
/// use typed_redis_cache::ConnectionSettings;
///
/// let settings = ConnectionSettings::default()
///     .with_hosts("10.0.0.5:6379")
///     .with_client_name("orders");
/// assert_eq!(settings.keyspace().merge("42"), "orders:42");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    /// Comma-separated `host:port` list. First endpoint that accepts a
    /// connection wins; the rest are fallbacks.
    #[serde(default = "default_hosts")]
    pub hosts: String,

    /// Password sent on connect. `None` or empty means no AUTH.
    #[serde(default)]
    pub password: Option<String>,

    /// Client name, also used as the key prefix for every facade.
    #[serde(default)]
    pub client_name: Option<String>,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-command response timeout in seconds.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,

    /// Default logical database index.
    #[serde(default)]
    pub database: i64,

    /// Whether admin commands (FLUSHDB) may be issued through the hub.
    #[serde(default)]
    pub allow_admin: bool,

    /// When true, a failed initial connection is fatal. When false, the
    /// connection manager keeps retrying with backoff instead.
    #[serde(default)]
    pub abort_on_connect_fail: bool,

    /// Proxy in front of the deployment, if any.
    #[serde(default)]
    pub proxy: ProxyMode,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            password: None,
            client_name: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            response_timeout_secs: default_response_timeout_secs(),
            database: 0,
            allow_admin: false,
            abort_on_connect_fail: false,
            proxy: ProxyMode::None,
        }
    }
}

impl ConnectionSettings {
    /// Load settings from environment variables.
    ///
    /// Recognized variables: `REDIS_HOSTS`, `REDIS_PASSWORD`,
    /// `REDIS_CLIENT_NAME`, `REDIS_CONNECT_TIMEOUT_MS`,
    /// `REDIS_RESPONSE_TIMEOUT_SECS`, `REDIS_DATABASE`, `REDIS_ALLOW_ADMIN`,
    /// `REDIS_ABORT_ON_CONNECT_FAIL`, `REDIS_PROXY`. Unset or unparseable
    /// variables fall back to the field default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hosts: std::env::var("REDIS_HOSTS").unwrap_or(defaults.hosts),
            password: std::env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
            client_name: std::env::var("REDIS_CLIENT_NAME").ok().filter(|n| !n.is_empty()),
            connect_timeout_ms: std::env::var("REDIS_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.connect_timeout_ms),
            response_timeout_secs: std::env::var("REDIS_RESPONSE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.response_timeout_secs),
            database: std::env::var("REDIS_DATABASE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database),
            allow_admin: std::env::var("REDIS_ALLOW_ADMIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.allow_admin),
            abort_on_connect_fail: std::env::var("REDIS_ABORT_ON_CONNECT_FAIL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.abort_on_connect_fail),
            proxy: std::env::var("REDIS_PROXY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.proxy),
        }
    }

    /// Replace the host list.
    #[must_use]
    pub fn with_hosts(mut self, hosts: impl Into<String>) -> Self {
        self.hosts = hosts.into();
        self
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the client name (and thereby the key prefix).
    #[must_use]
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Set the default database index.
    #[must_use]
    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    /// Allow admin commands through the hub.
    #[must_use]
    pub fn with_allow_admin(mut self, allow: bool) -> Self {
        self.allow_admin = allow;
        self
    }

    /// Make a failed initial connection fatal.
    #[must_use]
    pub fn with_abort_on_connect_fail(mut self, abort: bool) -> Self {
        self.abort_on_connect_fail = abort;
        self
    }

    /// Set the proxy mode.
    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyMode) -> Self {
        self.proxy = proxy;
        self
    }

    /// Parse the host list into endpoints, preserving declaration order.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if any entry is malformed or the list is
    /// empty.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, SettingsError> {
        let endpoints = self
            .hosts
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Endpoint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if endpoints.is_empty() {
            return Err(SettingsError::NoEndpoints);
        }
        Ok(endpoints)
    }

    /// The keyspace derived from `client_name`.
    #[must_use]
    pub fn keyspace(&self) -> Keyspace {
        match &self.client_name {
            Some(name) => Keyspace::new(name.clone()),
            None => Keyspace::none(),
        }
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Response timeout as a [`Duration`].
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Connection URL for one endpoint and a database index.
    ///
    /// Includes the password when one is set; never log this directly, use
    /// [`ConnectionSettings::display_target`] instead.
    #[must_use]
    pub fn connection_url(&self, endpoint: &Endpoint, database: i64) -> String {
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => {
                format!("redis://:{password}@{endpoint}/{database}")
            }
            _ => format!("redis://{endpoint}/{database}"),
        }
    }

    /// Password-free form of the connection target, safe for logs.
    #[must_use]
    pub fn display_target(&self, endpoint: &Endpoint, database: i64) -> String {
        format!("redis://{endpoint}/{database}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.hosts, "127.0.0.1:6379");
        assert_eq!(settings.password, None);
        assert_eq!(settings.client_name, None);
        assert_eq!(settings.connect_timeout_ms, 3000);
        assert_eq!(settings.response_timeout_secs, 3);
        assert_eq!(settings.database, 0);
        assert!(!settings.allow_admin);
        assert!(!settings.abort_on_connect_fail);
        assert_eq!(settings.proxy, ProxyMode::None);
    }

    #[test]
    fn test_partial_section_loads_with_defaults() {
        let settings: ConnectionSettings =
            serde_json::from_str(r#"{"hosts": "10.0.0.1:6380", "database": 2}"#).unwrap();
        assert_eq!(settings.hosts, "10.0.0.1:6380");
        assert_eq!(settings.database, 2);
        assert_eq!(settings.connect_timeout_ms, 3000);
        assert_eq!(settings.proxy, ProxyMode::None);

        let empty: ConnectionSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.hosts, "127.0.0.1:6379");
    }

    #[test]
    fn test_endpoint_list_parsing() {
        let settings =
            ConnectionSettings::default().with_hosts("10.0.0.1:6379, 10.0.0.2:6380 ,10.0.0.3:7000");
        let endpoints = settings.endpoints().unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].host, "10.0.0.1");
        assert_eq!(endpoints[1].port, 6380);
        assert_eq!(endpoints[2].to_string(), "10.0.0.3:7000");
    }

    #[test]
    fn test_endpoint_parse_errors() {
        let missing_port = ConnectionSettings::default().with_hosts("localhost");
        assert_eq!(
            missing_port.endpoints(),
            Err(SettingsError::InvalidEndpoint("localhost".to_string()))
        );

        let bad_port = ConnectionSettings::default().with_hosts("localhost:notaport");
        assert_eq!(
            bad_port.endpoints(),
            Err(SettingsError::InvalidPort("localhost:notaport".to_string()))
        );

        let empty = ConnectionSettings::default().with_hosts(" , ");
        assert_eq!(empty.endpoints(), Err(SettingsError::NoEndpoints));
    }

    #[test]
    fn test_proxy_mode_parsing() {
        assert_eq!("none".parse::<ProxyMode>().unwrap(), ProxyMode::None);
        assert_eq!("".parse::<ProxyMode>().unwrap(), ProxyMode::None);
        assert_eq!(
            "Twemproxy".parse::<ProxyMode>().unwrap(),
            ProxyMode::Twemproxy
        );
        assert_eq!(
            "envoyproxy".parse::<ProxyMode>().unwrap(),
            ProxyMode::Envoyproxy
        );
        assert!(matches!(
            "haproxy".parse::<ProxyMode>(),
            Err(SettingsError::UnknownProxyMode(_))
        ));
    }

    #[test]
    fn test_keyspace_from_client_name() {
        let named = ConnectionSettings::default().with_client_name("svc");
        assert_eq!(named.keyspace().merge("k"), "svc:k");

        let unnamed = ConnectionSettings::default();
        assert_eq!(unnamed.keyspace().merge("k"), "k");
    }

    #[test]
    fn test_connection_url_shapes() {
        let endpoint = Endpoint {
            host: "10.0.0.1".to_string(),
            port: 6379,
        };

        let plain = ConnectionSettings::default();
        assert_eq!(plain.connection_url(&endpoint, 0), "redis://10.0.0.1:6379/0");

        let authed = ConnectionSettings::default().with_password("hunter2");
        assert_eq!(
            authed.connection_url(&endpoint, 3),
            "redis://:hunter2@10.0.0.1:6379/3"
        );
        // Logged form never carries the password
        assert_eq!(
            authed.display_target(&endpoint, 3),
            "redis://10.0.0.1:6379/3"
        );
    }
}

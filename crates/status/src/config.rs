//! Client configuration
//!
//! The server address, tag filter and notification toggle come from the
//! dashboard page URL (`?server=...&filter=...&notifications=true`), with an
//! optional TOML file and `CANARYWATCH_*` environment variables layered
//! underneath. Later layers win: defaults, file, environment, page query.

#![warn(missing_docs)]

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::connection::RECONNECT_INTERVAL;
use crate::registry::TagFilter;
use crate::watchdog::STALE_TIMEOUT_MARGIN;

/// Port the probe server's WebSocket feed listens on by default
pub const DEFAULT_SERVER_PORT: u16 = 8099;

/// Page URL assumed when none is given
pub const DEFAULT_PAGE_URL: &str = "http://localhost/";

const ENV_PREFIX: &str = "CANARYWATCH_";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Config file is not valid TOML for a layer
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Page or server URL does not parse
    #[error("Invalid URL {0:?}: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    /// Server URL is not `ws` or `wss`
    #[error("Unsupported server scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),

    /// Tag filter is not a valid regular expression
    #[error("Invalid tag filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    /// Named interval must be at least one second
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// One configuration layer; unset fields leave lower layers alone
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigLayer {
    /// Server address override (`ws://` or `wss://`)
    pub server: Option<String>,
    /// Tag filter regular expression
    pub filter: Option<String>,
    /// Request notification permission at startup
    pub notifications: Option<bool>,
    /// Seconds between reconnect attempts
    pub reconnect_interval_s: Option<u64>,
    /// Seconds added to two probe intervals before a target is stale
    pub stale_margin_s: Option<u64>,
}

impl ConfigLayer {
    /// Parse a TOML layer
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML layer from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Build a layer from `CANARYWATCH_*` variables
    pub fn from_env_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match name {
                "SERVER" => layer.server = Some(value.to_string()),
                "FILTER" => layer.filter = Some(value.to_string()),
                "NOTIFICATIONS" => layer.notifications = parse_bool(value),
                "RECONNECT_INTERVAL_S" => layer.reconnect_interval_s = value.parse().ok(),
                "STALE_MARGIN_S" => layer.stale_margin_s = value.parse().ok(),
                _ => {}
            }
        }
        layer
    }

    /// Build a layer from the process environment
    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars())
    }

    /// Build a layer from a page URL's query string
    ///
    /// `notifications` only counts when it is exactly `true`; empty values are
    /// treated as absent.
    pub fn from_query(page: &Url) -> Self {
        let mut layer = Self::default();
        for (key, value) in page.query_pairs() {
            match key.as_ref() {
                "server" if !value.is_empty() => layer.server = Some(value.into_owned()),
                "filter" if !value.is_empty() => layer.filter = Some(value.into_owned()),
                "notifications" => layer.notifications = Some(value == "true"),
                _ => {}
            }
        }
        layer
    }

    fn merge(&mut self, other: &ConfigLayer) {
        if other.server.is_some() {
            self.server = other.server.clone();
        }
        if other.filter.is_some() {
            self.filter = other.filter.clone();
        }
        if other.notifications.is_some() {
            self.notifications = other.notifications;
        }
        if other.reconnect_interval_s.is_some() {
            self.reconnect_interval_s = other.reconnect_interval_s;
        }
        if other.stale_margin_s.is_some() {
            self.stale_margin_s = other.stale_margin_s;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

/// Resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket address of the probe server
    pub server_address: Url,
    /// Tag filter for snapshot targets
    pub filter: TagFilter,
    /// Request notification permission at startup
    pub notifications: bool,
    /// Delay between reconnect attempts
    pub reconnect_interval: Duration,
    /// Margin added to two probe intervals before a target is stale
    pub stale_margin: Duration,
}

impl ClientConfig {
    /// Configuration for a page URL with no other layers
    pub fn from_page_url(page: &Url) -> Result<Self, ConfigError> {
        Self::resolve(page, &[ConfigLayer::from_query(page)])
    }

    /// Resolve layers, lowest precedence first, against defaults derived
    /// from `page`
    pub fn resolve(page: &Url, layers: &[ConfigLayer]) -> Result<Self, ConfigError> {
        let mut merged = ConfigLayer::default();
        for layer in layers {
            merged.merge(layer);
        }

        let server_address = match merged.server.as_deref() {
            Some(server) => parse_server_address(server)?,
            None => default_server_address(page)?,
        };
        let filter = match merged.filter.as_deref() {
            Some(pattern) => TagFilter::new(pattern)?,
            None => TagFilter::match_all(),
        };

        if merged.reconnect_interval_s == Some(0) {
            return Err(ConfigError::ZeroInterval("reconnect_interval_s"));
        }

        Ok(Self {
            server_address,
            filter,
            notifications: merged.notifications.unwrap_or(false),
            reconnect_interval: merged
                .reconnect_interval_s
                .map(Duration::from_secs)
                .unwrap_or(RECONNECT_INTERVAL),
            stale_margin: merged
                .stale_margin_s
                .map(Duration::from_secs)
                .unwrap_or(STALE_TIMEOUT_MARGIN),
        })
    }
}

/// Parse a page URL
pub fn parse_page_url(page: &str) -> Result<Url, ConfigError> {
    Url::parse(page).map_err(|e| ConfigError::InvalidUrl(page.to_string(), e))
}

/// `wss://<page host>:8099` for https pages, `ws://<page host>:8099` otherwise
pub fn default_server_address(page: &Url) -> Result<Url, ConfigError> {
    let scheme = if page.scheme() == "https" { "wss" } else { "ws" };
    let host = page.host_str().unwrap_or("localhost");
    let address = format!("{}://{}:{}", scheme, host, DEFAULT_SERVER_PORT);
    Url::parse(&address).map_err(|e| ConfigError::InvalidUrl(address, e))
}

fn parse_server_address(server: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(server).map_err(|e| ConfigError::InvalidUrl(server.to_string(), e))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

//! Configuration for the Prometheus exporter.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use xray_common::config::{ConfigFormat, LoggingConfig};

/// Upstream endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11111/debug/vars";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] xray_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to resolve listen address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Scrape endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream XRay settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP scrape endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (default: "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (default: 9099).
    #[serde(default = "default_port", deserialize_with = "port_from_number_or_string")]
    pub port: u16,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9099
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl ServerConfig {
    /// Resolve `host:port` to a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let display = format!("{}:{}", self.host, self.port);
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| ConfigError::Resolve {
                addr: display.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ConfigError::Resolve {
                addr: display,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
            })
    }
}

/// Ports may be written as `9099` or `"9099"`.
fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {text}"))),
    }
}

/// Upstream XRay endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// URL of the XRay `/debug/vars` page.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a YAML (or `.json5`) file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = xray_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to the built-in defaults.
    ///
    /// The error that caused the fallback is handed back so it can be logged
    /// once tracing is up.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<ConfigError>) {
        match Self::load_from_file(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = xray_common::parse_config(content, ConfigFormat::Yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.host must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must not be 0".to_string(),
            ));
        }

        // An unresolvable host must fail here so the caller can fall back
        self.server.listen_addr()?;

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        let url = reqwest::Url::parse(&self.metrics.endpoint).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid metrics endpoint {}: {}",
                self.metrics.endpoint, e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "Metrics endpoint must be http or https, got {}",
                url.scheme()
            )));
        }

        Ok(())
    }
}

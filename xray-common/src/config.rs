use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    ///
    /// Matching is case-insensitive, and the names `WARNING`, `CRITICAL`
    /// and `FATAL` are accepted as aliases.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// The configured level as a `tracing` filter directive.
    ///
    /// Unknown levels fall back to `info`.
    pub fn filter_directive(&self) -> &'static str {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" | "warning" => "warn",
            "error" | "critical" | "fatal" => "error",
            "off" => "off",
            _ => "info",
        }
    }
}

/// Configuration file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json5,
}

impl ConfigFormat {
    /// Pick the syntax from a file extension. Anything that is not
    /// `.json`/`.json5` is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json5") || ext.eq_ignore_ascii_case("json") => {
                ConfigFormat::Json5
            }
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Load a configuration file, YAML or JSON5 depending on its extension.
pub fn load_config<T: for<'de> Deserialize<'de> + Default>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content, ConfigFormat::from_path(path)).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Parse a configuration from a string.
///
/// An empty (or whitespace-only) document yields `T::default()`.
pub fn parse_config<T: for<'de> Deserialize<'de> + Default>(
    content: &str,
    format: ConfigFormat,
) -> Result<T> {
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    match format {
        ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
        ConfigFormat::Json5 => json5::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e))),
    }
}

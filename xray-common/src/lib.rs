//! XRay exporter common library
//!
//! This crate provides shared types and utilities for the XRay exporter:
//!
//! - [`status`] - The upstream status document model (`StatusDocument`, `Field`)
//! - [`config`] - Configuration loading (YAML and JSON5) and logging settings
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod status;

// Re-export commonly used types at the crate root
pub use config::{ConfigFormat, LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use status::{Field, FieldError, StatusDocument};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// # Example
///
/// ```ignore
/// use xray_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "INFO".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}

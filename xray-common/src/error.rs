use thiserror::Error;

/// Common error type for the XRay exporter components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid status document: {0}")]
    Document(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

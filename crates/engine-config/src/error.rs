use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading settings or session data.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path} as JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An environment variable held a value of the wrong shape.
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    /// A malformed line in an env file.
    #[error("Invalid env file: {0}")]
    EnvFile(String),

    /// Settings loaded fine but break an invariant.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

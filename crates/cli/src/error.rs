use connectors::error::{ConnectorError, DbError};
use engine_config::error::ConfigError;
use engine_core::CacheError;
use model::execution::connection::DescriptorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid connection URL: {0}")]
    Url(#[from] DescriptorError),

    #[error("{0}")]
    Connector(#[from] ConnectorError),

    #[error("Query failed: {}", .0.message())]
    Db(#[from] DbError),

    #[error("{}", .0.message())]
    Cache(#[from] CacheError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("No query given and none stored in the session")]
    MissingQuery,

    #[error("No connection data: set the connection environment variables or pass --url")]
    MissingConnection,

    #[error("Fetching rows failed: {0}")]
    Fetch(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

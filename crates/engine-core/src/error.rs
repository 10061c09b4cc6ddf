use connectors::error::{ConnectorError, DbError};
use engine_config::error::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No async runtime available to drive fetches")]
    NoRuntime,

    #[error(transparent)]
    Settings(#[from] ConfigError),

    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectorError),

    #[error("Query validation failed: {0}")]
    Validation(#[source] DbError),

    #[error("Failed to fetch block {block}: {source}")]
    Fetch {
        block: usize,
        #[source]
        source: DbError,
    },

    #[error("Failed to fetch dataset: {0}")]
    Dataset(#[source] DbError),
}

impl CacheError {
    /// The query never produced a grid.
    pub fn is_validation(&self) -> bool {
        matches!(self, CacheError::Validation(_) | CacheError::Connection(_))
    }

    /// Data was requested after validation; earlier rows may be visible.
    pub fn is_fetch(&self) -> bool {
        matches!(self, CacheError::Fetch { .. } | CacheError::Dataset(_))
    }

    /// Message suitable for showing in place of the grid.
    pub fn message(&self) -> String {
        match self {
            CacheError::Validation(err)
            | CacheError::Fetch { source: err, .. }
            | CacheError::Dataset(err) => err.message(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let validation = CacheError::Validation(DbError::Validation("syntax error".into()));
        assert!(validation.is_validation());
        assert!(!validation.is_fetch());
        assert_eq!(validation.message(), "syntax error");

        let fetch = CacheError::Fetch {
            block: 3,
            source: DbError::Query("timeout".into()),
        };
        assert!(fetch.is_fetch());
        assert_eq!(fetch.to_string(), "Failed to fetch block 3: timeout");
    }
}

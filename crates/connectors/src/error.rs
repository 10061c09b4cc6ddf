use model::execution::connection::DescriptorError;
use thiserror::Error;

/// Errors happening while a connection is being established.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The descriptor names a protocol no driver handles.
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// The descriptor is missing something the driver needs.
    #[error("Invalid connection data: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid connection URL: {0}")]
    Descriptor(#[from] DescriptorError),

    /// PostgreSQL driver failed to connect.
    #[error("PostgreSQL connection failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver failed to connect.
    #[error("MySQL connection failed: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),
}

/// Errors coming back from a query or validation call.
#[derive(Debug, Error)]
pub enum DbError {
    /// The remote validator rejected the SQL text.
    #[error("{0}")]
    Validation(String),

    /// The remote service failed while executing the query.
    #[error("{0}")]
    Query(String),

    /// A returned value could not be converted.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver error.
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbError {
    /// The message a user should see, without driver prefixes.
    pub fn message(&self) -> String {
        match self {
            DbError::Validation(msg) | DbError::Query(msg) => msg.clone(),
            DbError::Postgres(err) => pg_message(err),
            other => other.to_string(),
        }
    }
}

/// Prefers the server-side message of a PostgreSQL error.
pub(crate) fn pg_message(err: &tokio_postgres::Error) -> String {
    err.as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| err.to_string())
}

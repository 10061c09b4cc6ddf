use crate::{
    error::{ConnectorError, DbError},
    sql::base::requests::{QueryOptions, QueryResult},
};
use async_trait::async_trait;
use model::{execution::connection::ConnectionDescriptor, records::field::FieldMetadata};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseKind {
    MySql,
    Postgres,
    Other(String),
}

/// An open session against the remote query service.
///
/// Treated as a stateless request/response surface: one query per call, no
/// transactional state carried between calls.
#[async_trait]
pub trait QueryConnection: Send + Sync {
    /// Asks the server to check `sql` and describe the fields it would return.
    async fn validate_query(&self, sql: &str) -> Result<Vec<FieldMetadata>, DbError>;

    /// Runs `sql`, applying `options.offset`/`options.limit` to the returned rows.
    async fn query(&self, sql: &str, options: QueryOptions) -> Result<QueryResult, DbError>;

    /// Round-trips a trivial statement.
    async fn ping(&self) -> Result<(), DbError>;

    fn kind(&self) -> DatabaseKind;
}

/// Opens sessions from connection data.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        session_id: Option<&str>,
    ) -> Result<Arc<dyn QueryConnection>, ConnectorError>;
}

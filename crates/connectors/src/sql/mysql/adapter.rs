use crate::{
    error::{ConnectorError, DbError},
    sql::base::{
        adapter::{DatabaseKind, QueryConnection},
        requests::{QueryOptions, QueryResult, QueryTiming, window_position},
        row::DbRow,
    },
};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use model::{execution::connection::ConnectionDescriptor, records::field::FieldMetadata};
use mysql_async::{Column, Opts, OptsBuilder, Pool, Row, prelude::*};
use std::time::Instant;
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 3306;

#[derive(Clone)]
pub struct MySqlConnection {
    pool: Pool,
}

impl MySqlConnection {
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        session_id: Option<&str>,
    ) -> Result<Self, ConnectorError> {
        let opts = opts_from_descriptor(descriptor)?;
        if session_id.is_some() {
            debug!("MySQL sessions are credential based; ignoring session id");
        }

        let pool = Pool::new(opts);
        // Fail fast on bad credentials instead of at the first query.
        let conn = pool.get_conn().await?;
        drop(conn);

        info!(connection = %descriptor, "Connected to MySQL");
        Ok(MySqlConnection { pool })
    }

    fn fields(columns: &[Column]) -> Vec<FieldMetadata> {
        columns
            .iter()
            .map(|col| FieldMetadata::new(col.name_str(), format!("{:?}", col.column_type())))
            .collect()
    }
}

pub(crate) fn opts_from_descriptor(descriptor: &ConnectionDescriptor) -> Result<Opts, ConnectorError> {
    if descriptor.host.is_empty() {
        return Err(ConnectorError::InvalidDescriptor(
            "host is required".to_string(),
        ));
    }

    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let builder = OptsBuilder::default()
        .ip_or_hostname(descriptor.host.clone())
        .tcp_port(descriptor.port.unwrap_or(DEFAULT_PORT))
        .user(non_empty(&descriptor.user))
        .pass(non_empty(&descriptor.password))
        .db_name(non_empty(&descriptor.database));

    Ok(Opts::from(builder))
}

#[async_trait]
impl QueryConnection for MySqlConnection {
    async fn validate_query(&self, sql: &str) -> Result<Vec<FieldMetadata>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let statement = conn
            .prep(sql)
            .await
            .map_err(|e| DbError::Validation(e.to_string()))?;
        let fields = Self::fields(statement.columns());
        conn.close(statement).await?;
        Ok(fields)
    }

    async fn query(&self, sql: &str, options: QueryOptions) -> Result<QueryResult, DbError> {
        let started = Instant::now();
        let mut conn = self.pool.get_conn().await?;
        let mut result = conn
            .query_iter(sql)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        let fields = result
            .columns()
            .map(|columns| Self::fields(&columns))
            .unwrap_or_default();

        let mut rows = Vec::new();
        if options.limit != Some(0)
            && let Some(mut stream) = result.stream::<Row>().await?
        {
            let mut position = 0;
            while let Some(row) = stream.try_next().await? {
                let (keep, stop) = window_position(&options, position);
                if keep {
                    rows.push(DbRow::MySqlRow(&row).to_row_data());
                }
                if stop {
                    break;
                }
                position += 1;
            }
        }
        result.drop_result().await?;

        debug!(rows = rows.len(), "MySQL query returned");

        Ok(QueryResult {
            fields,
            rows,
            timing: options.return_timing.then(|| QueryTiming {
                execution: started.elapsed(),
            }),
        })
    }

    async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        let val: Option<i32> = conn.query_first("SELECT 1").await?;
        match val {
            Some(1) => Ok(()),
            other => Err(DbError::Unknown(format!(
                "MySQL ping returned unexpected result: {other:?}"
            ))),
        }
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opts_from_descriptor() {
        let descriptor = ConnectionDescriptor {
            protocol: "mysql".into(),
            host: "localhost".into(),
            port: None,
            database: "sakila".into(),
            user: "root".into(),
            password: String::new(),
        };
        let opts = opts_from_descriptor(&descriptor).unwrap();
        assert_eq!(opts.tcp_port(), DEFAULT_PORT);
        assert_eq!(opts.user(), Some("root"));
        assert_eq!(opts.pass(), None);
        assert_eq!(opts.db_name(), Some("sakila"));
    }
}

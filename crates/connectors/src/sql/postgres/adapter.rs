use crate::{
    error::{ConnectorError, DbError, pg_message},
    sql::{
        base::{
            adapter::{DatabaseKind, QueryConnection},
            requests::{QueryOptions, QueryResult, QueryTiming, window_position},
            row::DbRow,
        },
        postgres::utils::{config_from_descriptor, connect_client},
    },
};
use async_trait::async_trait;
use futures_util::{TryStreamExt, pin_mut};
use model::{execution::connection::ConnectionDescriptor, records::field::FieldMetadata};
use std::{sync::Arc, time::Instant};
use tokio_postgres::{Client, Statement};
use tracing::{debug, info};

#[derive(Clone)]
pub struct PgConnection {
    client: Arc<Client>,
}

impl PgConnection {
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        session_id: Option<&str>,
    ) -> Result<Self, ConnectorError> {
        let config = config_from_descriptor(descriptor, session_id)?;
        let client = connect_client(config).await?;
        info!(connection = %descriptor, "Connected to PostgreSQL");
        Ok(PgConnection {
            client: Arc::new(client),
        })
    }

    async fn prepare(&self, sql: &str) -> Result<Statement, DbError> {
        self.client
            .prepare(sql)
            .await
            .map_err(|e| DbError::Validation(pg_message(&e)))
    }

    fn fields(statement: &Statement) -> Vec<FieldMetadata> {
        statement
            .columns()
            .iter()
            .map(|col| FieldMetadata::new(col.name(), col.type_().name()))
            .collect()
    }
}

#[async_trait]
impl QueryConnection for PgConnection {
    async fn validate_query(&self, sql: &str) -> Result<Vec<FieldMetadata>, DbError> {
        let statement = self.prepare(sql).await?;
        Ok(Self::fields(&statement))
    }

    async fn query(&self, sql: &str, options: QueryOptions) -> Result<QueryResult, DbError> {
        let started = Instant::now();
        let statement = self.prepare(sql).await?;
        let fields = Self::fields(&statement);

        let mut rows = Vec::new();
        if options.limit != Some(0) {
            let stream = self
                .client
                .query_raw(&statement, std::iter::empty::<String>())
                .await
                .map_err(|e| DbError::Query(pg_message(&e)))?;
            pin_mut!(stream);

            let mut position = 0;
            while let Some(row) = stream
                .try_next()
                .await
                .map_err(|e| DbError::Query(pg_message(&e)))?
            {
                let (keep, stop) = window_position(&options, position);
                if keep {
                    rows.push(DbRow::PostgresRow(&row).to_row_data());
                }
                if stop {
                    break;
                }
                position += 1;
            }
        }

        debug!(rows = rows.len(), "PostgreSQL query returned");

        Ok(QueryResult {
            fields,
            rows,
            timing: options.return_timing.then(|| QueryTiming {
                execution: started.elapsed(),
            }),
        })
    }

    async fn ping(&self) -> Result<(), DbError> {
        let row = self.client.query_one("SELECT 1", &[]).await?;
        let val: i32 = row.try_get(0)?;
        if val != 1 {
            return Err(DbError::Unknown(format!(
                "PostgreSQL ping returned unexpected result: {val}"
            )));
        }
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }
}

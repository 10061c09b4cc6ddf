//! In-memory stand-in for a remote query service.
//!
//! Serves an `id`/`label` table of a fixed number of rows, honours a trailing
//! `LIMIT n [OFFSET m]` in the SQL text as well as fetch options, records
//! every call, and can be told to fail or to hold queries until released.

use async_trait::async_trait;
use connectors::{
    error::{ConnectorError, DbError},
    sql::base::{
        adapter::{Connector, DatabaseKind, QueryConnection},
        requests::{QueryOptions, QueryResult},
    },
};
use model::{
    core::value::Value,
    execution::connection::ConnectionDescriptor,
    records::{field::FieldMetadata, row::RowData},
};
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedQuery {
    pub sql: String,
    pub options: QueryOptions,
}

#[derive(Default)]
struct Script {
    connect_error: Option<String>,
    validation_error: Option<String>,
    failing_offsets: HashSet<usize>,
}

struct Backend {
    row_count: usize,
    fields: Vec<FieldMetadata>,
    script: Mutex<Script>,
    gate: Option<Semaphore>,
    connects: AtomicUsize,
    validations: AtomicUsize,
    sessions: Mutex<Vec<Option<String>>>,
    queries: Mutex<Vec<IssuedQuery>>,
}

/// Handle to a scripted backend; cloning shares the backend.
#[derive(Clone)]
pub struct ScriptedConnector {
    backend: Arc<Backend>,
}

impl ScriptedConnector {
    pub fn new(row_count: usize) -> Self {
        Self::build(row_count, None)
    }

    /// Every query waits for a permit granted through [`ScriptedConnector::release`].
    pub fn gated(row_count: usize) -> Self {
        Self::build(row_count, Some(Semaphore::new(0)))
    }

    fn build(row_count: usize, gate: Option<Semaphore>) -> Self {
        ScriptedConnector {
            backend: Arc::new(Backend {
                row_count,
                fields: vec![
                    FieldMetadata::new("id", "int8"),
                    FieldMetadata::new("label", "text"),
                ],
                script: Mutex::new(Script::default()),
                gate,
                connects: AtomicUsize::new(0),
                validations: AtomicUsize::new(0),
                sessions: Mutex::new(Vec::new()),
                queries: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.backend.gate {
            gate.add_permits(permits);
        }
    }

    pub fn fail_connect(&self, message: &str) {
        self.backend.script.lock().unwrap().connect_error = Some(message.to_string());
    }

    pub fn fail_validation(&self, message: &str) {
        self.backend.script.lock().unwrap().validation_error = Some(message.to_string());
    }

    pub fn fail_offset(&self, offset: usize) {
        self.backend.script.lock().unwrap().failing_offsets.insert(offset);
    }

    pub fn heal(&self) {
        *self.backend.script.lock().unwrap() = Script::default();
    }

    pub fn connects(&self) -> usize {
        self.backend.connects.load(Ordering::SeqCst)
    }

    pub fn validations(&self) -> usize {
        self.backend.validations.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<Option<String>> {
        self.backend.sessions.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<IssuedQuery> {
        self.backend.queries.lock().unwrap().clone()
    }

    pub fn query_texts(&self) -> Vec<String> {
        self.queries().into_iter().map(|q| q.sql).collect()
    }

    pub fn query_count(&self) -> usize {
        self.backend.queries.lock().unwrap().len()
    }

    /// Number of network calls of any kind.
    pub fn calls(&self) -> usize {
        self.connects() + self.validations() + self.query_count()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        _descriptor: &ConnectionDescriptor,
        session_id: Option<&str>,
    ) -> Result<Arc<dyn QueryConnection>, ConnectorError> {
        self.backend.connects.fetch_add(1, Ordering::SeqCst);
        self.backend
            .sessions
            .lock()
            .unwrap()
            .push(session_id.map(str::to_string));

        if let Some(message) = self.backend.script.lock().unwrap().connect_error.clone() {
            return Err(ConnectorError::InvalidDescriptor(message));
        }

        Ok(Arc::new(ScriptedConnection {
            backend: Arc::clone(&self.backend),
        }))
    }
}

struct ScriptedConnection {
    backend: Arc<Backend>,
}

#[async_trait]
impl QueryConnection for ScriptedConnection {
    async fn validate_query(&self, _sql: &str) -> Result<Vec<FieldMetadata>, DbError> {
        self.backend.validations.fetch_add(1, Ordering::SeqCst);
        match self.backend.script.lock().unwrap().validation_error.clone() {
            Some(message) => Err(DbError::Validation(message)),
            None => Ok(self.backend.fields.clone()),
        }
    }

    async fn query(&self, sql: &str, options: QueryOptions) -> Result<QueryResult, DbError> {
        self.backend.queries.lock().unwrap().push(IssuedQuery {
            sql: sql.to_string(),
            options,
        });

        if let Some(gate) = &self.backend.gate {
            gate.acquire()
                .await
                .map_err(|e| DbError::Unknown(e.to_string()))?
                .forget();
        }

        let (offset, limit) = textual_window(sql);
        if self
            .backend
            .script
            .lock()
            .unwrap()
            .failing_offsets
            .contains(&offset)
        {
            return Err(DbError::Query(format!("scripted failure at offset {offset}")));
        }

        let end = limit.map_or(self.backend.row_count, |l| {
            (offset + l).min(self.backend.row_count)
        });
        let rows: Vec<RowData> = (offset.min(end)..end)
            .skip(options.offset.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|i| {
                RowData::from_pairs([
                    ("id", Value::Int(i as i64)),
                    ("label", Value::String(format!("row-{i}"))),
                ])
            })
            .collect();

        debug!(sql, rows = rows.len(), "Scripted query served");
        Ok(QueryResult::new(self.backend.fields.clone(), rows))
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Other("scripted".into())
    }
}

/// Offset and limit of a trailing `LIMIT n [OFFSET m]` clause.
fn textual_window(sql: &str) -> (usize, Option<usize>) {
    let upper = sql.to_uppercase();
    let number_after = |keyword: &str| {
        upper.rfind(keyword).and_then(|pos| {
            upper[pos + keyword.len()..]
                .trim_start()
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .and_then(|digits| digits.parse::<usize>().ok())
        })
    };

    (number_after(" OFFSET ").unwrap_or(0), number_after(" LIMIT "))
}

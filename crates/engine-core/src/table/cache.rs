//! Block-paged, lazily populated table model backing a virtualized grid.
//!
//! The grid pulls counts and cells synchronously; anything not yet in memory
//! reads as `None` while a background fetch is issued, and the grid learns
//! about arrivals through the change notifications from [`StreamingTableCache::subscribe`].

use crate::{
    error::CacheError,
    event_bus::EventBus,
    metrics::{CacheMetrics, MetricsSnapshot},
    table::{blocks::BlockStore, state::CacheState},
};
use connectors::sql::base::{
    adapter::{Connector, QueryConnection},
    requests::QueryOptions,
};
use engine_config::settings::CacheSettings;
use model::{
    core::value::Value,
    events::{CellRegion, ColumnRegion, ModelChange, RowRegion},
    execution::{connection::ConnectionDescriptor, query::QueryState},
    records::{field::FieldSchema, row::RowData},
};
use planner::{
    plan::QueryPlan,
    query::paging::{block_index, block_offset, block_query},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, info, warn};

/// Everything a fetch needs, captured when it is issued.
#[derive(Clone)]
struct FetchSource {
    epoch: u64,
    connection: Arc<dyn QueryConnection>,
    sql: String,
}

enum TableData {
    Empty,
    Streaming {
        store: BlockStore,
        source: FetchSource,
    },
    Bounded {
        /// `None` until the first load lands.
        rows: Option<Vec<RowData>>,
        limit: usize,
        source: FetchSource,
    },
}

struct TableState {
    binding: Option<QueryState>,
    epoch: u64,
    phase: CacheState,
    fields: FieldSchema,
    data: TableData,
    last_error: Option<String>,
}

impl TableState {
    fn new() -> Self {
        TableState {
            binding: None,
            epoch: 0,
            phase: CacheState::Empty,
            fields: FieldSchema::default(),
            data: TableData::Empty,
            last_error: None,
        }
    }

    /// Drops every trace of the previous binding and starts a new epoch.
    fn rebind(&mut self, binding: Option<QueryState>) -> u64 {
        self.epoch += 1;
        self.binding = binding;
        self.phase = CacheState::Empty;
        self.fields = FieldSchema::default();
        self.data = TableData::Empty;
        self.last_error = None;
        self.epoch
    }

    fn row_count(&self) -> usize {
        match &self.data {
            TableData::Empty => 0,
            TableData::Streaming { store, .. } => store.row_count(),
            TableData::Bounded { rows, .. } => rows.as_ref().map_or(0, Vec::len),
        }
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    settings: CacheSettings,
    runtime: Handle,
    bus: EventBus<ModelChange>,
    metrics: CacheMetrics,
    state: Mutex<TableState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_all(&self, changes: impl IntoIterator<Item = ModelChange>) {
        for change in changes {
            self.bus.publish(change);
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        let current = self.state().epoch == epoch;
        if !current {
            self.metrics.increment_stale();
            debug!(epoch, "Discarded work for superseded binding");
        }
        current
    }

    /// Connects, validates and performs the first fetch for `binding`.
    async fn populate(
        &self,
        epoch: u64,
        descriptor: &ConnectionDescriptor,
        binding: &QueryState,
    ) -> Result<(), CacheError> {
        let connection = self
            .connector
            .connect(descriptor, binding.session_id.as_deref())
            .await?;
        if !self.is_current(epoch) {
            return Ok(());
        }

        self.metrics.increment_validations();
        let fields = connection
            .validate_query(&binding.query)
            .await
            .map_err(CacheError::Validation)?;

        let plan = QueryPlan::for_query(
            &binding.query,
            self.settings.block_size,
            self.settings.bounded_limit,
        );
        let source = FetchSource {
            epoch,
            connection,
            sql: binding.query.clone(),
        };

        {
            let mut state = self.state();
            if state.epoch != epoch {
                self.metrics.increment_stale();
                debug!(epoch, "Validation finished for superseded binding");
                return Ok(());
            }

            state.fields = FieldSchema::from_metadata(&fields);
            match plan {
                QueryPlan::Streaming { block_size } => {
                    let mut store = BlockStore::new(block_size);
                    store.begin_fetch(0);
                    state.data = TableData::Streaming {
                        store,
                        source: source.clone(),
                    };
                    state.phase = CacheState::Streaming;
                }
                QueryPlan::Bounded { limit } => {
                    state.data = TableData::Bounded {
                        rows: None,
                        limit,
                        source: source.clone(),
                    };
                    state.phase = CacheState::Bounded;
                }
            }
        }

        info!(
            epoch,
            columns = fields.len(),
            streaming = plan.is_streaming(),
            "Query validated"
        );
        self.bus.publish(ModelChange::ModelReset);

        match plan {
            QueryPlan::Streaming { .. } => self.load_block(&source, 0).await.map(drop),
            QueryPlan::Bounded { limit } => self.load_dataset(&source, limit).await,
        }
    }

    /// Fetches block `index` and stores it. The caller has already marked the
    /// index pending.
    ///
    /// Returns the block to fetch next when the arrival only narrowed down
    /// where the table ends; that block is already marked pending.
    async fn load_block(
        &self,
        source: &FetchSource,
        index: usize,
    ) -> Result<Option<usize>, CacheError> {
        let sql = block_query(&source.sql, index, self.settings.block_size);
        self.metrics.increment_fetches();
        debug!(block = index, epoch = source.epoch, "Fetching block");

        let result = source.connection.query(&sql, QueryOptions::default()).await;

        let (change, follow_up) = {
            let mut guard = self.state();
            let state = &mut *guard;
            if state.epoch != source.epoch {
                self.metrics.increment_stale();
                debug!(block = index, epoch = source.epoch, "Discarded stale block");
                return Ok(None);
            }
            let TableData::Streaming { store, .. } = &mut state.data else {
                return Ok(None);
            };

            let result = match result {
                Ok(result) => result,
                Err(source_err) => {
                    store.abort_fetch(index);
                    self.metrics.increment_failures();
                    let err = CacheError::Fetch {
                        block: index,
                        source: source_err,
                    };
                    state.last_error = Some(err.to_string());
                    return Err(err);
                }
            };

            if state.fields.is_empty() {
                state.fields = FieldSchema::from_metadata(&result.fields);
            }

            let count = result.rows.len();
            self.metrics.increment_rows(count as u64);
            let arrival = store.complete(index, result.rows, state.fields.len());
            debug!(block = index, epoch = source.epoch, rows = count, "Block loaded");

            if let Some(total) = arrival.length_found {
                info!(block = index, rows = total, "Table length found");
                state.phase = CacheState::LengthKnown;
            }
            if let Some(next) = arrival.follow_up {
                debug!(block = index, next, "Table ends before block");
            }
            (arrival.change, arrival.follow_up)
        };

        self.publish_all(change);
        Ok(follow_up)
    }

    /// Fetches the whole capped result of a bounded query, replacing any
    /// previously held rows.
    async fn load_dataset(&self, source: &FetchSource, limit: usize) -> Result<(), CacheError> {
        self.metrics.increment_fetches();
        debug!(epoch = source.epoch, limit, "Fetching dataset");

        let options = QueryOptions::builder().limit(limit).build();
        let result = source.connection.query(&source.sql, options).await;

        let change = {
            let mut guard = self.state();
            let state = &mut *guard;
            if state.epoch != source.epoch {
                self.metrics.increment_stale();
                debug!(epoch = source.epoch, "Discarded stale dataset");
                return Ok(());
            }
            let TableData::Bounded { rows, .. } = &mut state.data else {
                return Ok(());
            };

            let result = match result {
                Ok(result) => result,
                Err(source_err) => {
                    self.metrics.increment_failures();
                    let err = CacheError::Dataset(source_err);
                    state.last_error = Some(err.to_string());
                    return Err(err);
                }
            };

            if state.fields.is_empty() {
                state.fields = FieldSchema::from_metadata(&result.fields);
            }

            let count = result.rows.len();
            self.metrics.increment_rows(count as u64);
            info!(epoch = source.epoch, rows = count, "Dataset loaded");

            match rows.replace(result.rows) {
                None => (count > 0).then(|| ModelChange::rows_inserted(0, count)),
                Some(previous) if previous.len() == count => {
                    (count > 0).then(|| ModelChange::cells_changed(0, count, state.fields.len()))
                }
                Some(_) => Some(ModelChange::ModelReset),
            }
        };

        self.publish_all(change);
        Ok(())
    }

    /// Returns to `Empty` after a failed update, unless superseded meanwhile.
    fn abandon(&self, epoch: u64) {
        {
            let mut state = self.state();
            if state.epoch != epoch {
                return;
            }
            state.rebind(None);
        }
        self.bus.publish(ModelChange::ModelReset);
    }
}

/// Lazily populated table model over one query binding.
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct StreamingTableCache {
    inner: Arc<Inner>,
}

impl StreamingTableCache {
    /// Creates an empty cache whose background fetches run on the current
    /// tokio runtime.
    pub fn new(connector: Arc<dyn Connector>, settings: CacheSettings) -> Result<Self, CacheError> {
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        Self::with_runtime(connector, settings, runtime)
    }

    pub fn with_runtime(
        connector: Arc<dyn Connector>,
        settings: CacheSettings,
        runtime: Handle,
    ) -> Result<Self, CacheError> {
        let settings = settings.validate()?;
        Ok(StreamingTableCache {
            inner: Arc::new(Inner {
                connector,
                settings,
                runtime,
                bus: EventBus::new(settings.notification_capacity),
                metrics: CacheMetrics::new(),
                state: Mutex::new(TableState::new()),
            }),
        })
    }

    /// Binds the cache to a new (connection, query, session) triple.
    ///
    /// An unchanged triple is a no-op. Otherwise all held rows are dropped and
    /// a reset is published at once; when the binding is runnable the query is
    /// then validated and its first block (or whole bounded dataset) fetched.
    /// Connection, validation and first-fetch failures are returned and leave
    /// the cache empty.
    pub async fn update(
        &self,
        connection: Option<ConnectionDescriptor>,
        query: impl Into<String>,
        session_id: Option<String>,
    ) -> Result<(), CacheError> {
        let binding = QueryState::new(connection, query, session_id);

        let epoch = {
            let mut state = self.inner.state();
            if state.binding.as_ref() == Some(&binding) {
                debug!("Binding unchanged");
                return Ok(());
            }
            let epoch = state.rebind(Some(binding.clone()));
            if binding.is_runnable() {
                state.phase = CacheState::Validating;
            }
            epoch
        };

        info!(epoch, runnable = binding.is_runnable(), "Model reset");
        self.inner.bus.publish(ModelChange::ModelReset);

        let Some(descriptor) = binding.connection.as_ref().filter(|_| binding.is_runnable())
        else {
            return Ok(());
        };

        if let Err(err) = self.inner.populate(epoch, descriptor, &binding).await {
            warn!(epoch, error = %err, "Update failed");
            self.inner.abandon(epoch);
            return Err(err);
        }
        Ok(())
    }

    /// Rebinds to `query`, keeping the current connection and session.
    pub async fn set_query(&self, query: impl Into<String>) -> Result<(), CacheError> {
        let (connection, session_id) = self
            .binding()
            .map(|b| (b.connection, b.session_id))
            .unwrap_or_default();
        self.update(connection, query, session_id).await
    }

    /// Rebinds to new connection data, keeping the current query.
    pub async fn set_connection_data(
        &self,
        connection: Option<ConnectionDescriptor>,
        session_id: Option<String>,
    ) -> Result<(), CacheError> {
        let query = self.query();
        self.update(connection, query, session_id).await
    }

    /// Re-runs the current binding. A loaded bounded dataset is reloaded in
    /// place; anything else is rebuilt from validation onwards.
    pub async fn refresh(&self) -> Result<(), CacheError> {
        let reload = {
            let state = self.inner.state();
            match &state.data {
                TableData::Bounded {
                    rows: Some(_),
                    limit,
                    source,
                } => Some((source.clone(), *limit)),
                _ => None,
            }
        };
        if let Some((source, limit)) = reload {
            return self.inner.load_dataset(&source, limit).await;
        }

        let binding = self.inner.state().binding.take();
        match binding {
            Some(binding) => {
                self.update(binding.connection, binding.query, binding.session_id)
                    .await
            }
            None => Ok(()),
        }
    }

    pub fn binding(&self) -> Option<QueryState> {
        self.inner.state().binding.clone()
    }

    pub fn query(&self) -> String {
        self.inner
            .state()
            .binding
            .as_ref()
            .map(|b| b.query.clone())
            .unwrap_or_default()
    }

    pub fn connection_data(&self) -> Option<ConnectionDescriptor> {
        self.inner
            .state()
            .binding
            .as_ref()
            .and_then(|b| b.connection.clone())
    }

    pub fn row_count(&self, region: RowRegion) -> usize {
        match region {
            RowRegion::ColumnHeader => 1,
            RowRegion::Body => self.inner.state().row_count(),
        }
    }

    pub fn column_count(&self, region: ColumnRegion) -> usize {
        match region {
            ColumnRegion::RowHeader => 1,
            ColumnRegion::Body => self.inner.state().fields.len(),
        }
    }

    pub fn fields(&self) -> FieldSchema {
        self.inner.state().fields.clone()
    }

    /// Value at (`row`, `column`) of `region`, or `None` while unavailable.
    ///
    /// Never waits. Reading a body cell slides the residency window to the
    /// row's block, and may issue fetches for that block and its neighbours.
    pub fn cell(&self, region: CellRegion, row: usize, column: usize) -> Option<Value> {
        match region {
            CellRegion::RowHeader => Some(Value::String((row + 1).to_string())),
            CellRegion::ColumnHeader => self
                .inner
                .state()
                .fields
                .name(column)
                .map(|name| Value::String(name.to_string())),
            CellRegion::CornerHeader => None,
            CellRegion::Body => self.body_cell(row, column),
        }
    }

    fn body_cell(&self, row: usize, column: usize) -> Option<Value> {
        let settings = &self.inner.settings;
        let mut changes = Vec::new();
        let mut fetches = Vec::new();

        let (value, source) = {
            let mut guard = self.inner.state();
            let state = &mut *guard;
            let field = state.fields.name(column)?.to_string();
            let columns = state.fields.len();

            match &mut state.data {
                TableData::Empty => return None,
                TableData::Bounded { rows, .. } => {
                    return rows
                        .as_ref()
                        .and_then(|rows| rows.get(row))
                        .map(|r| r.get_value(&field));
                }
                TableData::Streaming { store, source } => {
                    if store.known_row_count().is_some_and(|total| row >= total) {
                        return None;
                    }

                    let block_size = store.block_size();
                    let index = block_index(row, block_size);
                    let local = row - block_offset(index, block_size);

                    let evicted = store.evict_outside(index, columns);
                    if !evicted.is_empty() {
                        self.inner.metrics.increment_evictions(evicted.len() as u64);
                        debug!(block = index, evicted = evicted.len(), "Evicted blocks");
                    }
                    changes.extend(evicted);

                    let position = local as f64 / block_size as f64;
                    if position > settings.prefetch_ahead
                        && !store.is_resident(index + 1)
                        && store.begin_fetch(index + 1)
                    {
                        fetches.push(index + 1);
                    }
                    if index > 0
                        && position < settings.prefetch_behind
                        && !store.is_resident(index - 1)
                        && store.begin_fetch(index - 1)
                    {
                        fetches.push(index - 1);
                    }

                    let value = match store.get(index) {
                        Some(block) => block.get(local).map(|r| r.get_value(&field)),
                        None => {
                            if store.begin_fetch(index) {
                                fetches.push(index);
                            }
                            None
                        }
                    };
                    (value, source.clone())
                }
            }
        };

        self.inner.publish_all(changes);
        for index in fetches {
            self.spawn_block(source.clone(), index);
        }
        value
    }

    fn spawn_block(&self, source: FetchSource, index: usize) {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let mut next = Some(index);
            while let Some(index) = next {
                next = match inner.load_block(&source, index).await {
                    Ok(follow_up) => follow_up,
                    Err(err) => {
                        warn!(
                            block = index,
                            epoch = source.epoch,
                            error = %err,
                            "Background block fetch failed"
                        );
                        None
                    }
                };
            }
        });
    }

    pub fn state(&self) -> CacheState {
        self.inner.state().phase
    }

    /// Message of the most recent failure for the current binding.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state().last_error.clone()
    }

    /// Indices of blocks currently held in memory.
    pub fn resident_blocks(&self) -> Vec<usize> {
        match &self.inner.state().data {
            TableData::Streaming { store, .. } => store.resident().collect(),
            TableData::Bounded { rows: Some(_), .. } => vec![0],
            _ => Vec::new(),
        }
    }

    /// Change notifications for this cache. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::Receiver<Arc<ModelChange>> {
        self.inner.bus.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Unbinds and drops all subscribers; in-flight fetches are discarded on
    /// arrival.
    pub fn dispose(&self) {
        let epoch = self.inner.state().rebind(None);
        let subscribers = self.inner.bus.subscriber_count();
        self.inner.bus.clear();
        info!(epoch, subscribers, "Cache disposed");
    }
}

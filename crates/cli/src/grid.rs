use crate::error::CliError;
use engine_core::{CacheState, StreamingTableCache};
use model::{
    core::value::Value,
    events::{CellRegion, ColumnRegion, ModelChange, RowRegion},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const ERROR_POLL: Duration = Duration::from_millis(200);

/// Reads cells the way a virtualized grid does, without a screen: ask the
/// cache, and on a miss wait for the next change notification.
pub struct HeadlessGrid {
    cache: StreamingTableCache,
    changes: Receiver<Arc<ModelChange>>,
    cancel: CancellationToken,
}

impl HeadlessGrid {
    /// Must be built before the cache's first `update` so no notification is missed.
    pub fn new(cache: StreamingTableCache, cancel: CancellationToken) -> Self {
        let changes = cache.subscribe();
        Self {
            cache,
            changes,
            cancel,
        }
    }

    pub fn cache(&self) -> &StreamingTableCache {
        &self.cache
    }

    /// Rows `start..start + count`, stopping early at the end of the table.
    pub async fn read_rows(
        &mut self,
        start: usize,
        count: usize,
    ) -> Result<Vec<(usize, Vec<Value>)>, CliError> {
        let columns = self.cache.column_count(ColumnRegion::Body);
        let mut rows = Vec::with_capacity(count);

        for row in start..start.saturating_add(count) {
            let mut values = Vec::with_capacity(columns);
            for column in 0..columns {
                match self.read_cell(row, column).await? {
                    Some(value) => values.push(value),
                    None => return Ok(rows),
                }
            }
            rows.push((row, values));
        }

        Ok(rows)
    }

    async fn read_cell(&mut self, row: usize, column: usize) -> Result<Option<Value>, CliError> {
        loop {
            if let Some(value) = self.cache.cell(CellRegion::Body, row, column) {
                return Ok(Some(value));
            }
            if self.past_end(row) {
                return Ok(None);
            }

            tokio::select! {
                change = self.changes.recv() => match change {
                    Some(change) => debug!(?change, "Grid notified"),
                    None => return Ok(None),
                },
                _ = self.cancel.cancelled() => return Err(CliError::ShutdownRequested),
                _ = tokio::time::sleep(ERROR_POLL) => {
                    if let Some(message) = self.cache.last_error() {
                        return Err(CliError::Fetch(message));
                    }
                }
            }
        }
    }

    fn past_end(&self, row: usize) -> bool {
        match self.cache.state() {
            CacheState::LengthKnown | CacheState::Bounded => {
                row >= self.cache.row_count(RowRegion::Body)
            }
            CacheState::Empty => true,
            CacheState::Validating | CacheState::Streaming => false,
        }
    }
}

use engine_config::settings::CacheSettings;
use engine_core::{CacheState, StreamingTableCache};
use model::{
    core::value::Value,
    events::{CellRegion, ModelChange, RowRegion},
    execution::connection::ConnectionDescriptor,
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc::Receiver, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

pub fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor {
        protocol: "scripted".into(),
        host: "localhost".into(),
        ..Default::default()
    }
}

pub fn settings(block_size: usize) -> CacheSettings {
    CacheSettings::default().with_block_size(block_size)
}

/// Next notification, panicking if none arrives in time.
pub async fn next_change(rx: &mut Receiver<Arc<ModelChange>>) -> ModelChange {
    let change = timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a change notification")
        .expect("notification channel closed");
    (*change).clone()
}

/// Notifications already queued, without waiting.
pub fn drain(rx: &mut Receiver<Arc<ModelChange>>) -> Vec<ModelChange> {
    let mut changes = Vec::new();
    while let Ok(change) = rx.try_recv() {
        changes.push((*change).clone());
    }
    changes
}

/// Waits for `expected`, returning everything received up to and including it.
pub async fn wait_for(
    rx: &mut Receiver<Arc<ModelChange>>,
    expected: &ModelChange,
) -> Vec<ModelChange> {
    let mut seen = Vec::new();
    loop {
        let change = next_change(rx).await;
        let done = &change == expected;
        seen.push(change);
        if done {
            return seen;
        }
    }
}

/// Reads a body cell the way a grid does: ask, and on a miss wait for the
/// next notification and ask again. `None` once the row is past the known end.
pub async fn read_cell(
    cache: &StreamingTableCache,
    rx: &mut Receiver<Arc<ModelChange>>,
    row: usize,
    column: usize,
    seen: &mut Vec<ModelChange>,
) -> Option<Value> {
    loop {
        if let Some(value) = cache.cell(CellRegion::Body, row, column) {
            return Some(value);
        }
        let length_known = matches!(cache.state(), CacheState::LengthKnown | CacheState::Bounded);
        if length_known && row >= cache.row_count(RowRegion::Body) {
            return None;
        }
        seen.push(next_change(rx).await);
    }
}

/// Polls `condition` until it holds, panicking after a timeout.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

use serde::Serialize;
use std::fmt::Debug;

/// A trait for notifications that can be delivered to cache subscribers.
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns a unique identifier for this event type.
    fn event_type(&self) -> &'static str;
}

/// Row-addressable regions of a virtualized grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowRegion {
    Body,
    ColumnHeader,
}

/// Column-addressable regions of a virtualized grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnRegion {
    Body,
    RowHeader,
}

/// Cell-addressable regions of a virtualized grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellRegion {
    Body,
    RowHeader,
    ColumnHeader,
    CornerHeader,
}

/// Structural change notification consumed by the grid to re-layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModelChange {
    /// Everything changed; re-query counts and cells.
    ModelReset,

    /// `span` rows were appended at `index` in the body region.
    RowsInserted {
        region: RowRegion,
        index: usize,
        span: usize,
    },

    /// Cached renderings of the given body range are stale.
    #[serde(rename_all = "camelCase")]
    CellsChanged {
        region: CellRegion,
        row_index: usize,
        column_index: usize,
        row_span: usize,
        column_span: usize,
    },
}

impl ModelChange {
    pub fn rows_inserted(index: usize, span: usize) -> Self {
        ModelChange::RowsInserted {
            region: RowRegion::Body,
            index,
            span,
        }
    }

    pub fn cells_changed(row_index: usize, row_span: usize, column_span: usize) -> Self {
        ModelChange::CellsChanged {
            region: CellRegion::Body,
            row_index,
            column_index: 0,
            row_span,
            column_span,
        }
    }
}

impl Event for ModelChange {
    fn event_type(&self) -> &'static str {
        match self {
            ModelChange::ModelReset => "model-reset",
            ModelChange::RowsInserted { .. } => "rows-inserted",
            ModelChange::CellsChanged { .. } => "cells-changed",
        }
    }
}

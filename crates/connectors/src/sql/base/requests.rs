use model::records::{field::FieldMetadata, row::RowData};
use std::time::Duration;

/// Fetch options applied by the connection, never spliced into the SQL text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub return_timing: bool,
}

impl QueryOptions {
    pub fn builder() -> QueryOptionsBuilder {
        QueryOptionsBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct QueryOptionsBuilder {
    limit: Option<usize>,
    offset: Option<usize>,
    return_timing: bool,
}

impl QueryOptionsBuilder {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn return_timing(mut self, return_timing: bool) -> Self {
        self.return_timing = return_timing;
        self
    }

    pub fn build(self) -> QueryOptions {
        QueryOptions {
            limit: self.limit,
            offset: self.offset,
            return_timing: self.return_timing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTiming {
    pub execution: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub fields: Vec<FieldMetadata>,
    pub rows: Vec<RowData>,
    pub timing: Option<QueryTiming>,
}

impl QueryResult {
    pub fn new(fields: Vec<FieldMetadata>, rows: Vec<RowData>) -> Self {
        QueryResult {
            fields,
            rows,
            timing: None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Applies offset/limit to a row stream position: returns whether the row at
/// zero-based `position` is kept and whether reading can stop after it.
pub(crate) fn window_position(options: &QueryOptions, position: usize) -> (bool, bool) {
    let offset = options.offset.unwrap_or(0);
    if position < offset {
        return (false, false);
    }
    match options.limit {
        Some(limit) => {
            let kept = position - offset;
            (kept < limit, kept + 1 >= limit)
        }
        None => (true, false),
    }
}

use serde::Serialize;
use std::fmt;

/// Lifecycle of one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// No runnable query is bound.
    Empty,
    /// Connecting and asking the server to check the query.
    Validating,
    /// Paging blocks in as cells are read; length still open-ended.
    Streaming,
    /// Streaming, and a short page has fixed the table length.
    LengthKnown,
    /// One capped dataset held in memory.
    Bounded,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheState::Empty => "empty",
            CacheState::Validating => "validating",
            CacheState::Streaming => "streaming",
            CacheState::LengthKnown => "length_known",
            CacheState::Bounded => "bounded",
        };
        f.write_str(name)
    }
}

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a query's results are brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryPlan {
    /// Page through the result set in fixed-size blocks as the grid scrolls.
    Streaming { block_size: usize },

    /// Fetch once, capped at `limit` rows.
    Bounded { limit: usize },
}

impl QueryPlan {
    pub fn for_query(sql: &str, block_size: usize, bounded_limit: usize) -> Self {
        let plan = if should_stream(sql) {
            QueryPlan::Streaming { block_size }
        } else {
            QueryPlan::Bounded {
                limit: bounded_limit,
            }
        };
        debug!(?plan, "Planned query");
        plan
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, QueryPlan::Streaming { .. })
    }
}

/// A query may be paged across independent requests only when the server
/// guarantees a total order and the caller has not already bounded it.
///
/// Pure text inspection: `LIMIT` or `OFFSET` anywhere disables streaming,
/// otherwise an `ORDER BY` clause enables it.
pub fn should_stream(sql: &str) -> bool {
    let normalized = sql
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();

    if normalized.contains("LIMIT") || normalized.contains("OFFSET") {
        return false;
    }

    normalized.contains("ORDER BY")
}

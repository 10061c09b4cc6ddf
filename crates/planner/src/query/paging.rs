//! Textual augmentation of streamable queries into block-sized pages.

/// Zero-based block index containing `row`.
pub fn block_index(row: usize, block_size: usize) -> usize {
    row / block_size
}

/// First row covered by block `index`.
pub fn block_offset(index: usize, block_size: usize) -> usize {
    index * block_size
}

/// Appends `LIMIT {block_size} OFFSET {index * block_size}` to `sql`.
///
/// The base query must not carry its own LIMIT/OFFSET; the planner only
/// streams queries for which that holds.
pub fn block_query(sql: &str, index: usize, block_size: usize) -> String {
    let base = sql.trim_end().trim_end_matches(';').trim_end();
    format!(
        "{base} LIMIT {block_size} OFFSET {}",
        block_offset(index, block_size)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_query_appends_window() {
        assert_eq!(
            block_query("SELECT id FROM t ORDER BY id", 0, 50_000),
            "SELECT id FROM t ORDER BY id LIMIT 50000 OFFSET 0"
        );
        assert_eq!(
            block_query("SELECT id FROM t ORDER BY id", 2, 50_000),
            "SELECT id FROM t ORDER BY id LIMIT 50000 OFFSET 100000"
        );
    }

    #[test]
    fn test_block_query_strips_terminator() {
        assert_eq!(
            block_query("SELECT id FROM t ORDER BY id;\n", 1, 10),
            "SELECT id FROM t ORDER BY id LIMIT 10 OFFSET 10"
        );
    }

    #[test]
    fn test_block_addressing() {
        assert_eq!(block_index(0, 50_000), 0);
        assert_eq!(block_index(49_999, 50_000), 0);
        assert_eq!(block_index(50_000, 50_000), 1);
        assert_eq!(block_offset(3, 50_000), 150_000);
    }
}

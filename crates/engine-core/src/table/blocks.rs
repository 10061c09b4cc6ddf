use model::{events::ModelChange, records::row::RowData};
use std::collections::{BTreeMap, HashSet};

/// Resident row blocks of one streaming query, keyed by block index.
///
/// Pure bookkeeping: no I/O, no notifications sent. Mutators return the
/// notifications the caller must publish.
#[derive(Debug)]
pub struct BlockStore {
    block_size: usize,
    blocks: BTreeMap<usize, Vec<RowData>>,
    pending: HashSet<usize>,
    known_row_count: Option<usize>,
    last_block: Option<usize>,
    /// Largest block index ever loaded, with its length.
    high_water: Option<(usize, usize)>,
}

/// Outcome of storing a fetched block.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BlockArrival {
    pub change: Option<ModelChange>,
    /// Set when this block revealed the true table length.
    pub length_found: Option<usize>,
    /// Block to fetch next to pin down the length, already marked pending.
    pub follow_up: Option<usize>,
}

impl BlockStore {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            blocks: BTreeMap::new(),
            pending: HashSet::new(),
            known_row_count: None,
            last_block: None,
            high_water: None,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Exact length once the end was found, otherwise a lower bound that
    /// never shrinks.
    pub fn row_count(&self) -> usize {
        if let Some(known) = self.known_row_count {
            return known;
        }
        self.high_water
            .map(|(index, len)| index * self.block_size + len)
            .unwrap_or(0)
    }

    pub fn known_row_count(&self) -> Option<usize> {
        self.known_row_count
    }

    pub fn last_block(&self) -> Option<usize> {
        self.last_block
    }

    pub fn get(&self, index: usize) -> Option<&[RowData]> {
        self.blocks.get(&index).map(Vec::as_slice)
    }

    pub fn is_resident(&self, index: usize) -> bool {
        self.blocks.contains_key(&index)
    }

    pub fn resident(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.keys().copied()
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.pending.contains(&index)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Nothing past the last block is ever fetched.
    pub fn can_fetch(&self, index: usize) -> bool {
        self.last_block.is_none_or(|last| index <= last)
    }

    /// Marks `index` in flight. Returns false when it already is, or when it
    /// lies past the end of the table.
    pub fn begin_fetch(&mut self, index: usize) -> bool {
        if !self.can_fetch(index) {
            return false;
        }
        self.pending.insert(index)
    }

    /// Clears the in-flight mark after a failed fetch so a later access retries.
    pub fn abort_fetch(&mut self, index: usize) {
        self.pending.remove(&index);
    }

    /// Stores a fetched block and classifies it.
    ///
    /// Blocks at or below the high-water mark, or arriving once the length is
    /// known, re-fill territory the grid already has: they produce a
    /// cells-changed over the block's rows. Anything else extends the table
    /// and produces a rows-inserted from the previous row count to the new one.
    ///
    /// A non-empty short page fixes the length. So does a full block sitting
    /// right below an empty one. Blocks past the last fetchable block are
    /// dropped.
    pub fn complete(
        &mut self,
        index: usize,
        rows: Vec<RowData>,
        column_count: usize,
    ) -> BlockArrival {
        self.pending.remove(&index);
        if !self.can_fetch(index) {
            return BlockArrival::default();
        }
        if rows.is_empty() {
            return self.complete_empty(index);
        }

        let before = self.row_count();
        let offset = index * self.block_size;
        let len = rows.len();
        let overwrite = self.known_row_count.is_some()
            || self.high_water.is_some_and(|(high, _)| index <= high);

        self.blocks.insert(index, rows);

        match self.high_water {
            Some((high, high_len)) if index == high => {
                self.high_water = Some((high, high_len.max(len)));
            }
            Some((high, _)) if index < high => {}
            _ => self.high_water = Some((index, len)),
        }

        let mut length_found = None;
        let at_end = len < self.block_size || self.last_block == Some(index);
        if at_end && self.known_row_count.is_none() {
            let total = offset + len;
            self.fix_length(index, total);
            length_found = Some(total);
        }

        let change = if overwrite {
            Some(ModelChange::cells_changed(offset, len, column_count))
        } else {
            let after = self.row_count();
            (after > before).then(|| ModelChange::rows_inserted(before, after - before))
        };

        BlockArrival {
            change,
            length_found,
            follow_up: None,
        }
    }

    /// An empty page only proves the table ends at its offset when the block
    /// before it is known to be full. Otherwise it bounds the last block from
    /// above and asks for the block below.
    fn complete_empty(&mut self, index: usize) -> BlockArrival {
        if self.known_row_count.is_some() {
            return BlockArrival::default();
        }

        let Some(bound) = index.checked_sub(1) else {
            self.fix_length(0, 0);
            return BlockArrival {
                length_found: Some(0),
                ..BlockArrival::default()
            };
        };

        match self.high_water {
            Some((high, _)) if high == bound => {
                let total = index * self.block_size;
                self.fix_length(bound, total);
                BlockArrival {
                    length_found: Some(total),
                    ..BlockArrival::default()
                }
            }
            // Rows were seen past this block; the result changed under us.
            Some((high, _)) if high > bound => BlockArrival::default(),
            _ => {
                self.last_block = Some(self.last_block.map_or(bound, |last| last.min(bound)));
                self.pending.retain(|&i| i <= bound);
                BlockArrival {
                    follow_up: self.begin_fetch(bound).then_some(bound),
                    ..BlockArrival::default()
                }
            }
        }
    }

    fn fix_length(&mut self, last: usize, total: usize) {
        self.known_row_count = Some(total);
        self.last_block = Some(last);
        self.blocks.retain(|&i, _| i <= last);
        self.pending.retain(|&i| i <= last);
    }

    /// Evicts every resident block outside `{0, center-1, center, center+1}`.
    ///
    /// Each eviction invalidates exactly the extent the block was inserted with.
    pub fn evict_outside(&mut self, center: usize, column_count: usize) -> Vec<ModelChange> {
        let keep = |i: usize| i == 0 || i + 1 == center || i == center || i == center + 1;
        let doomed: Vec<usize> = self.blocks.keys().copied().filter(|&i| !keep(i)).collect();

        doomed
            .into_iter()
            .filter_map(|index| self.free(index, column_count))
            .collect()
    }

    fn free(&mut self, index: usize, column_count: usize) -> Option<ModelChange> {
        let block = self.blocks.remove(&index)?;
        Some(ModelChange::cells_changed(
            index * self.block_size,
            block.len(),
            column_count,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    fn rows(start: usize, count: usize) -> Vec<RowData> {
        (start..start + count)
            .map(|i| RowData::from_pairs([("id", Value::Int(i as i64))]))
            .collect()
    }

    #[test]
    fn test_pending_deduplicates() {
        let mut store = BlockStore::new(10);
        assert!(store.begin_fetch(0));
        assert!(!store.begin_fetch(0));
        assert_eq!(store.pending_count(), 1);
        store.abort_fetch(0);
        assert!(store.begin_fetch(0));
    }

    #[test]
    fn test_sequential_blocks_extend_then_fix_length() {
        let mut store = BlockStore::new(10);

        let first = store.complete(0, rows(0, 10), 1);
        assert_eq!(first.change, Some(ModelChange::rows_inserted(0, 10)));
        assert_eq!(store.row_count(), 10);

        let second = store.complete(1, rows(10, 10), 1);
        assert_eq!(second.change, Some(ModelChange::rows_inserted(10, 10)));
        assert_eq!(store.row_count(), 20);

        let last = store.complete(2, rows(20, 4), 1);
        assert_eq!(last.change, Some(ModelChange::rows_inserted(20, 4)));
        assert_eq!(last.length_found, Some(24));
        assert_eq!(store.row_count(), 24);
        assert!(!store.can_fetch(3));
        assert!(!store.begin_fetch(3));
    }

    #[test]
    fn test_refill_is_cells_changed() {
        let mut store = BlockStore::new(10);
        store.complete(0, rows(0, 10), 2);
        store.complete(1, rows(10, 10), 2);

        let refill = store.complete(0, rows(0, 10), 2);
        assert_eq!(refill.change, Some(ModelChange::cells_changed(0, 10, 2)));
        assert_eq!(store.row_count(), 20);
    }

    #[test]
    fn test_out_of_order_arrival_keeps_geometry() {
        let mut store = BlockStore::new(10);
        store.complete(0, rows(0, 10), 1);

        let ahead = store.complete(2, rows(20, 10), 1);
        assert_eq!(ahead.change, Some(ModelChange::rows_inserted(10, 20)));
        assert_eq!(store.row_count(), 30);

        let behind = store.complete(1, rows(10, 10), 1);
        assert_eq!(behind.change, Some(ModelChange::cells_changed(10, 10, 1)));
        assert_eq!(store.row_count(), 30);
    }

    #[test]
    fn test_eviction_keeps_window_and_reports_extent() {
        let mut store = BlockStore::new(10);
        for i in 0..5 {
            store.complete(i, rows(i * 10, 10), 3);
        }

        let evicted = store.evict_outside(4, 3);
        assert_eq!(
            evicted,
            vec![
                ModelChange::cells_changed(10, 10, 3),
                ModelChange::cells_changed(20, 10, 3),
            ]
        );
        assert_eq!(store.resident().collect::<Vec<_>>(), vec![0, 3, 4]);
        // Eviction never shrinks the estimate.
        assert_eq!(store.row_count(), 50);
    }

    #[test]
    fn test_empty_final_page() {
        let mut store = BlockStore::new(10);
        store.complete(0, rows(0, 10), 1);
        let empty = store.complete(1, Vec::new(), 1);
        assert_eq!(empty.change, None);
        assert_eq!(empty.length_found, Some(10));
        assert_eq!(empty.follow_up, None);
        assert_eq!(store.row_count(), 10);
        assert!(!store.can_fetch(1));
    }

    #[test]
    fn test_empty_page_after_jump_keeps_length_open() {
        let mut store = BlockStore::new(10);
        store.complete(0, rows(0, 10), 1);
        assert!(store.begin_fetch(3));
        assert!(store.begin_fetch(4));

        let empty = store.complete(3, Vec::new(), 1);
        assert_eq!(empty.change, None);
        assert_eq!(empty.length_found, None);
        assert_eq!(empty.follow_up, Some(2));
        assert!(store.is_pending(2));
        assert!(!store.can_fetch(3));
        assert_eq!(store.known_row_count(), None);
        assert_eq!(store.row_count(), 10);

        // The prefetch issued past the bound lands after it was set.
        assert_eq!(store.complete(4, rows(40, 10), 1), BlockArrival::default());

        let last = store.complete(2, rows(20, 5), 1);
        assert_eq!(last.change, Some(ModelChange::rows_inserted(10, 15)));
        assert_eq!(last.length_found, Some(25));
        assert_eq!(store.row_count(), 25);
    }

    #[test]
    fn test_full_block_at_bound_fixes_length() {
        let mut store = BlockStore::new(10);
        store.complete(0, rows(0, 10), 1);
        store.begin_fetch(3);
        store.complete(3, Vec::new(), 1);

        let full = store.complete(2, rows(20, 10), 1);
        assert_eq!(full.change, Some(ModelChange::rows_inserted(10, 20)));
        assert_eq!(full.length_found, Some(30));
        assert_eq!(store.last_block(), Some(2));
    }

    #[test]
    fn test_repeated_empty_pages_walk_back_to_the_end() {
        let mut store = BlockStore::new(10);
        store.complete(0, rows(0, 10), 1);
        store.begin_fetch(3);

        assert_eq!(store.complete(3, Vec::new(), 1).follow_up, Some(2));
        assert_eq!(store.complete(2, Vec::new(), 1).follow_up, Some(1));
        let end = store.complete(1, Vec::new(), 1);
        assert_eq!(end.follow_up, None);
        assert_eq!(end.length_found, Some(10));
        assert_eq!(store.row_count(), 10);
    }
}

//! Sorted unclustered index: companion `{values[], positions[]}` arrays
//! sorted by `values`, used by both `SortedUnclustered` columns and as the
//! scan path for `SortedClustered` columns (whose base data is itself the
//! sorted array).
//!
//! Grounded in `original_source/index.c`'s `UnclusteredIndex`/`sorted_insert`.

use super::sorted_primitives::{lower_bound, remove_at_and_decrement};

#[derive(Debug, Clone, Default)]
pub struct SortedIndex {
    pub values: Vec<i32>,
    pub positions: Vec<i32>,
}

impl SortedIndex {
    pub fn new() -> Self {
        SortedIndex::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `sorted_insert`: inserts `(val, pos)` in value order. When `clustered`
    /// is true (the owning table has a clustered index — see the open
    /// question resolved in DESIGN.md), every stored position at or after
    /// the insertion point is incremented by one, since the clustered insert
    /// has just shifted the base data under it.
    pub fn insert(&mut self, val: i32, pos: i32, clustered: bool) {
        let insert_pos = lower_bound(&self.values, val);
        self.values.insert(insert_pos, val);
        self.positions.insert(insert_pos, pos);

        if clustered {
            for p in self.positions[insert_pos + 1..].iter_mut() {
                *p += 1;
            }
        }
    }

    /// Removes the entry whose stored position equals `pos`, decrementing
    /// every surviving position `> pos` by one (`remove_at_and_decrement`).
    pub fn remove(&mut self, pos: i32) {
        remove_at_and_decrement(&mut self.values, &mut self.positions, pos);
    }

    /// Two binary searches on `values[]`, copying the corresponding
    /// `positions` slice — the SortedUnclustered select path (section 4.5).
    pub fn range(&self, lo: Option<i32>, hi: Option<i32>) -> Vec<i32> {
        let start = lo.map(|v| lower_bound(&self.values, v)).unwrap_or(0);
        let end = hi.map(|v| lower_bound(&self.values, v)).unwrap_or(self.values.len());
        if start >= end {
            return Vec::new();
        }
        self.positions[start..end].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_sorted_by_value() {
        let mut idx = SortedIndex::new();
        idx.insert(5, 0, false);
        idx.insert(2, 1, false);
        idx.insert(9, 2, false);
        assert_eq!(idx.values, vec![2, 5, 9]);
        assert_eq!(idx.positions, vec![1, 0, 2]);
    }

    #[test]
    fn clustered_insert_shifts_trailing_positions() {
        let mut idx = SortedIndex::new();
        idx.insert(10, 0, false);
        idx.insert(30, 1, false);
        // clustered insert of 20 at base position 1 pushes the base-array
        // entry for 30 to position 2.
        idx.insert(20, 1, true);
        assert_eq!(idx.values, vec![10, 20, 30]);
        assert_eq!(idx.positions, vec![0, 1, 2]);
    }

    #[test]
    fn range_is_inclusive_low_exclusive_high() {
        let mut idx = SortedIndex::new();
        for (i, v) in [5, 2, 9, 2, 7].into_iter().enumerate() {
            idx.insert(v, i as i32, false);
        }
        let mut got = idx.range(Some(2), Some(8));
        got.sort();
        assert_eq!(got, vec![0, 1, 3, 4]); // values 2,2,5,7 at their base positions
    }

    #[test]
    fn remove_decrements_trailing_positions() {
        let mut idx = SortedIndex::new();
        idx.insert(10, 0, false);
        idx.insert(20, 1, false);
        idx.insert(30, 2, false);
        idx.remove(1);
        assert_eq!(idx.values, vec![10, 30]);
        assert_eq!(idx.positions, vec![0, 1]);
    }
}

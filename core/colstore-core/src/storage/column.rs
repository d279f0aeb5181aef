//! A single dense integer column, its optional index, and the index-aware
//! `select` dispatch of section 4.5.
//!
//! Grounded in `original_source/cs165_api.h`'s `Column` struct and
//! `index.c`'s `index_value`.

use std::io::{self, Read, Write};

use super::bplus::BPlusTree;
use super::sorted_index::SortedIndex;
use super::sorted_primitives::lower_bound;
use crate::types::{IndexKind, INITIAL_COLUMN_CAPACITY};

#[derive(Debug, Clone)]
enum Index {
    None,
    Sorted(SortedIndex),
    BTree(BPlusTree),
}

/// A column: its base data plus whatever secondary structure indexes it.
///
/// `clustered` is not a property of this column alone — it is set on every
/// column of a table the moment any one of that table's columns gets a
/// clustered index (section 4.4), since from then on every column's row
/// order must track the clustering column's order.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: Vec<i32>,
    pub index_kind: IndexKind,
    index: Index,
    pub clustered: bool,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            data: Vec::with_capacity(INITIAL_COLUMN_CAPACITY),
            index_kind: IndexKind::None,
            index: Index::None,
            clustered: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `create idx`: builds the index payload from whatever data the column
    /// already holds. `SortedClustered` has no companion structure of its
    /// own — the base data, kept sorted by the table's insert path, *is*
    /// the index (mirrors the reference, which stores no separate
    /// `UnclusteredIndex` for the clustered-sorted case).
    pub fn create_index(&mut self, kind: IndexKind) {
        self.index_kind = kind;
        self.index = match kind {
            IndexKind::None | IndexKind::SortedClustered => Index::None,
            IndexKind::SortedUnclustered => {
                let mut idx = SortedIndex::new();
                for (pos, &v) in self.data.iter().enumerate() {
                    idx.insert(v, pos as i32, false);
                }
                Index::Sorted(idx)
            }
            IndexKind::BTreeClustered | IndexKind::BTreeUnclustered => {
                let mut tree = BPlusTree::new();
                for (pos, &v) in self.data.iter().enumerate() {
                    tree.insert(v, pos as i32, false);
                }
                Index::BTree(tree)
            }
        };
    }

    /// Inserts `val` at base-data position `pos`, then repairs whatever
    /// index this column carries. `col_size_before` is the column's
    /// `col_size` prior to this insert (== the table's row count); it is
    /// the same value `original_source/index.c`'s `index_value` compares
    /// `pos` against to recognise a trailing append.
    ///
    /// `dont_update` is the bulk-loader's escape hatch (`index_value`'s
    /// `dont_update` flag, set only when rows are freshly materialised in
    /// final order and no position in the index needs shifting).
    pub fn insert_at(&mut self, pos: usize, val: i32, col_size_before: usize, dont_update: bool) {
        self.data.insert(pos, val);

        // Resolves `index.c`'s switch-fallthrough: the C `index_value`
        // computes `update_vals` only in the `BTREE_UNCLUSTERED` case and
        // then falls through into the shared `BTREE_CLUSTERED` insert, so a
        // column reached directly as `BTREE_CLUSTERED` always inserts with
        // `update_vals == 0` while one reached via fallthrough carries
        // whatever `update_vals` the unclustered case computed. Expressed
        // here as two explicit arms with no shared fallthrough.
        match (&mut self.index, self.index_kind) {
            (Index::None, _) => {}
            (_, IndexKind::SortedClustered) => {}
            (Index::BTree(tree), IndexKind::BTreeClustered) => {
                tree.insert(val, pos as i32, false);
            }
            (Index::BTree(tree), IndexKind::BTreeUnclustered) => {
                let shift = !dont_update && self.clustered && pos != col_size_before;
                tree.insert(val, pos as i32, shift);
            }
            (Index::Sorted(idx), IndexKind::SortedUnclustered) => {
                idx.insert(val, pos as i32, self.clustered && !dont_update);
            }
            _ => unreachable!("index payload/kind mismatch"),
        }
    }

    /// Deletes the row at `pos`, repairing whatever index this column
    /// carries (section 4.5's `delete`).
    pub fn delete_at(&mut self, pos: usize) {
        let val = self.data.remove(pos);
        let pos_i32 = pos as i32;
        match (&mut self.index, self.index_kind) {
            (Index::Sorted(idx), IndexKind::SortedUnclustered) => idx.remove(pos_i32),
            (Index::BTree(tree), IndexKind::BTreeClustered | IndexKind::BTreeUnclustered) => {
                tree.remove(val, pos_i32)
            }
            _ => {}
        }
    }

    /// Index-aware range select (section 4.5): row positions `i` such that
    /// `lo <= data[i] < hi`, with `None` meaning unbounded on that side.
    pub fn select_range(&self, lo: Option<i32>, hi: Option<i32>) -> Vec<usize> {
        match (self.index_kind, &self.index) {
            (IndexKind::SortedUnclustered, Index::Sorted(idx)) => {
                idx.range(lo, hi).into_iter().map(|p| p as usize).collect()
            }
            (IndexKind::SortedClustered, _) => {
                let start = lo.map(|v| lower_bound(&self.data, v)).unwrap_or(0);
                let end = hi.map(|v| lower_bound(&self.data, v)).unwrap_or(self.data.len());
                contiguous(start, end)
            }
            (IndexKind::BTreeClustered, Index::BTree(tree)) => {
                let start = lo.map(|v| tree.find_pos(v, true) as usize).unwrap_or(0);
                let end = hi.map(|v| tree.find_pos(v, false) as usize).unwrap_or(self.data.len());
                contiguous(start, end)
            }
            (IndexKind::BTreeUnclustered, Index::BTree(tree)) => {
                // find_range is inclusive on both ends; translate the
                // select contract's exclusive `hi` to `hi - 1` (see
                // DESIGN.md).
                let adj_hi = hi.map(|h| h - 1);
                tree.find_range(lo, adj_hi).into_iter().map(|p| p as usize).collect()
            }
            _ => self.scan_predicate(lo, hi),
        }
    }

    /// The branch-free predicate scan used when a column carries no index.
    fn scan_predicate(&self, lo: Option<i32>, hi: Option<i32>) -> Vec<usize> {
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| lo.is_none_or(|l| l <= v) && hi.is_none_or(|h| v < h))
            .map(|(i, _)| i)
            .collect()
    }

    /// Writes this column's index payload (section 6's per-column dump
    /// record): nothing for `None`/`SortedClustered` (whose base data is
    /// already dumped and is itself the index), `values[]` then `positions[]`
    /// for `SortedUnclustered`, or a recursive pre-order B+ tree dump.
    pub(crate) fn dump_index(&self, w: &mut impl Write) -> io::Result<()> {
        match &self.index {
            Index::None => Ok(()),
            Index::Sorted(idx) => {
                for &v in &idx.values {
                    w.write_all(&v.to_le_bytes())?;
                }
                for &p in &idx.positions {
                    w.write_all(&p.to_le_bytes())?;
                }
                Ok(())
            }
            Index::BTree(tree) => tree.dump(w),
        }
    }

    /// Rebuilds this column's index payload from a dump written by
    /// [`Column::dump_index`]. `self.index_kind` and `self.data` must already
    /// be populated (persistence reads the column record and base data
    /// first, in that order — section 6).
    pub(crate) fn load_index(&mut self, r: &mut impl Read) -> io::Result<()> {
        self.index = match self.index_kind {
            IndexKind::None | IndexKind::SortedClustered => Index::None,
            IndexKind::SortedUnclustered => {
                let n = self.data.len();
                let mut idx = SortedIndex::new();
                idx.values = read_i32_vec(r, n)?;
                idx.positions = read_i32_vec(r, n)?;
                Index::Sorted(idx)
            }
            IndexKind::BTreeClustered | IndexKind::BTreeUnclustered => {
                Index::BTree(BPlusTree::load(r)?)
            }
        };
        Ok(())
    }

    /// Returns all `(value, position)` pairs the index currently believes
    /// in; used by invariant tests and persistence.
    #[cfg(test)]
    pub fn indexed_entries(&self) -> Option<Vec<(i32, i32)>> {
        match &self.index {
            Index::None => None,
            Index::Sorted(idx) => Some(
                idx.values.iter().copied().zip(idx.positions.iter().copied()).collect(),
            ),
            Index::BTree(tree) => Some(tree.iter_leaf_entries()),
        }
    }
}

fn contiguous(start: usize, end: usize) -> Vec<usize> {
    if start >= end {
        Vec::new()
    } else {
        (start..end).collect()
    }
}

/// Reads `n` little-endian `i32`s, the primitive shared by every
/// fixed-width array in the `dbdump.bin` layout.
pub(crate) fn read_i32_vec(r: &mut impl Read, n: usize) -> io::Result<Vec<i32>> {
    let mut out = Vec::with_capacity(n);
    let mut buf = [0u8; 4];
    for _ in 0..n {
        r.read_exact(&mut buf)?;
        out.push(i32::from_le_bytes(buf));
    }
    Ok(out)
}

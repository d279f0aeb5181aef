//! B+ tree index (section 4.2): ordered map from integer key to base-row
//! position, with range scan, shift-aware insert and position-repairing
//! remove.
//!
//! Grounded in `original_source/bplus.c`. The reference builds the tree out
//! of raw pointers with parent back-pointers and a doubly-linked leaf chain
//! — cycles that Rust's ownership model cannot express directly. Per the
//! design note in section 9, nodes live in an arena (`Vec<Node>`) and are
//! addressed by `NodeId` handles; parent/sibling fields are handle values,
//! not owning references, so the arena can simply be dropped to free a tree.

use std::io::{self, Read, Write};

use crate::types::{FANOUT, LEAF_SIZE};

/// Handle into the tree's node arena. `NodeId(usize::MAX)` plays the role of
/// a null pointer and is never a valid arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

const NULL: NodeId = NodeId(usize::MAX);

impl NodeId {
    fn is_null(self) -> bool {
        self.0 == usize::MAX
    }
}

#[derive(Debug, Clone)]
enum NodePayload {
    Internal {
        keys: Vec<i32>,
        children: Vec<NodeId>,
    },
    Leaf {
        keys: Vec<i32>,
        positions: Vec<i32>,
        prev: NodeId,
        next: NodeId,
    },
}

#[derive(Debug, Clone)]
struct Node {
    parent: NodeId,
    payload: NodePayload,
}

impl Node {
    fn new_leaf() -> Self {
        Node {
            parent: NULL,
            payload: NodePayload::Leaf {
                keys: Vec::new(),
                positions: Vec::new(),
                prev: NULL,
                next: NULL,
            },
        }
    }

    fn new_internal() -> Self {
        Node {
            parent: NULL,
            payload: NodePayload::Internal {
                keys: Vec::new(),
                children: Vec::new(),
            },
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self.payload, NodePayload::Leaf { .. })
    }
}

/// An arena-backed B+ tree. `root` is `None` for an empty tree.
#[derive(Debug, Clone, Default)]
pub struct BPlusTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl BPlusTree {
    pub fn new() -> Self {
        BPlusTree {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Descends internal nodes by `lower_bound` on keys to the leaf that
    /// would hold `val`.
    fn find_leaf(&self, val: i32) -> Option<NodeId> {
        let mut cur = self.root?;
        loop {
            match &self.node(cur).payload {
                NodePayload::Leaf { .. } => return Some(cur),
                NodePayload::Internal { keys, children } => {
                    let idx = child_index_for(keys, val);
                    cur = children[idx];
                }
            }
        }
    }

    /// `insert(root, val, pos, shift)`: inserts `(val, pos)`. When `shift` is
    /// true, every stored position `>= pos` across all leaves is
    /// incremented by one first (the clustered-unclustered-coexistence
    /// case), matching the reference's `update_all_positions`.
    pub fn insert(&mut self, val: i32, pos: i32, shift: bool) {
        if shift {
            self.shift_positions_from(pos);
        }

        let leaf = match self.find_leaf(val) {
            Some(l) => l,
            None => {
                let l = self.alloc(Node::new_leaf());
                self.root = Some(l);
                l
            }
        };

        self.insert_into_leaf(leaf, val, pos);

        if self.leaf_len(leaf) > LEAF_SIZE {
            self.split_leaf_and_insert(leaf);
        }
    }

    /// Increments every stored position `>= pos` by one, across every leaf,
    /// independent of key order (grounded in `update_all_positions`, which
    /// walks outward from an arbitrary leaf in both directions — walking the
    /// whole leaf chain from the head achieves the same result).
    fn shift_positions_from(&mut self, pos: i32) {
        let mut cur = self.leftmost_leaf();
        while let Some(id) = cur {
            let node = self.node_mut(id);
            if let NodePayload::Leaf { positions, next, .. } = &mut node.payload {
                for p in positions.iter_mut() {
                    if *p >= pos {
                        *p += 1;
                    }
                }
                cur = if next.is_null() { None } else { Some(*next) };
            } else {
                unreachable!()
            }
        }
    }

    fn leftmost_leaf(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        loop {
            match &self.node(cur).payload {
                NodePayload::Leaf { .. } => return Some(cur),
                NodePayload::Internal { children, .. } => cur = children[0],
            }
        }
    }

    fn leaf_len(&self, id: NodeId) -> usize {
        match &self.node(id).payload {
            NodePayload::Leaf { keys, .. } => keys.len(),
            _ => unreachable!(),
        }
    }

    /// Inserts `(val, pos)` into a leaf in sorted key order. When several
    /// entries share `val`, the new entry becomes the **rightmost**
    /// occurrence (tie-break documented in section 4.2).
    fn insert_into_leaf(&mut self, leaf: NodeId, val: i32, pos: i32) {
        let node = self.node_mut(leaf);
        if let NodePayload::Leaf { keys, positions, .. } = &mut node.payload {
            let idx = rightmost_insertion_index(keys, val);
            keys.insert(idx, val);
            positions.insert(idx, pos);
        }
    }

    fn split_leaf_and_insert(&mut self, leaf: NodeId) {
        let (right_keys, right_positions, split_key, old_next) = {
            let node = self.node_mut(leaf);
            let (keys, positions, next) = match &mut node.payload {
                NodePayload::Leaf { keys, positions, next, .. } => (keys, positions, *next),
                _ => unreachable!(),
            };
            let mid = LEAF_SIZE / 2;
            let right_keys = keys.split_off(mid);
            let right_positions = positions.split_off(mid);
            let split_key = right_keys[0];
            (right_keys, right_positions, split_key, next)
        };

        let mut right_node = Node::new_leaf();
        if let NodePayload::Leaf { keys, positions, prev, next } = &mut right_node.payload {
            *keys = right_keys;
            *positions = right_positions;
            *prev = leaf;
            *next = old_next;
        }
        let right = self.alloc(right_node);

        if let NodePayload::Leaf { next, .. } = &mut self.node_mut(leaf).payload {
            *next = right;
        }
        if !old_next.is_null() {
            if let NodePayload::Leaf { prev, .. } = &mut self.node_mut(old_next).payload {
                *prev = right;
            }
        }

        self.insert_into_parent(leaf, split_key, right);
    }

    fn insert_into_parent(&mut self, left: NodeId, key: i32, right: NodeId) {
        let parent = self.node(left).parent;
        if parent.is_null() {
            let mut root = Node::new_internal();
            if let NodePayload::Internal { keys, children } = &mut root.payload {
                keys.push(key);
                children.push(left);
                children.push(right);
            }
            let root_id = self.alloc(root);
            self.node_mut(left).parent = root_id;
            self.node_mut(right).parent = root_id;
            self.root = Some(root_id);
            return;
        }

        self.node_mut(right).parent = parent;
        let node = self.node_mut(parent);
        if let NodePayload::Internal { keys, children } = &mut node.payload {
            let idx = children.iter().position(|&c| c == left).expect("left child present");
            keys.insert(idx, key);
            children.insert(idx + 1, right);
        }

        if self.internal_key_count(parent) > FANOUT - 1 {
            self.split_node_and_insert(parent);
        }
    }

    fn internal_key_count(&self, id: NodeId) -> usize {
        match &self.node(id).payload {
            NodePayload::Internal { keys, .. } => keys.len(),
            _ => unreachable!(),
        }
    }

    fn split_node_and_insert(&mut self, id: NodeId) {
        let (mid_key, right_keys, right_children) = {
            let node = self.node_mut(id);
            let (keys, children) = match &mut node.payload {
                NodePayload::Internal { keys, children } => (keys, children),
                _ => unreachable!(),
            };
            let mid = keys.len() / 2;
            let mid_key = keys[mid];
            let right_keys = keys.split_off(mid + 1);
            keys.pop(); // drop the promoted middle key from the left node
            let right_children = children.split_off(mid + 1);
            (mid_key, right_keys, right_children)
        };

        let mut right_node = Node::new_internal();
        if let NodePayload::Internal { keys, children } = &mut right_node.payload {
            *keys = right_keys;
            *children = right_children.clone();
        }
        let right = self.alloc(right_node);
        for &child in &right_children {
            self.node_mut(child).parent = right;
        }

        self.insert_into_parent(id, mid_key, right);
    }

    /// `find_pos(root, val, want_min)`: the rank of the first entry with key
    /// `>= val` — i.e. how many stored entries are strictly less than
    /// `val`. Valid for a `BTreeClustered` column, where a leaf's stored
    /// position always equals that entry's sorted rank.
    ///
    /// Both ends of the executor's half-open `select` range reduce to this
    /// one computation: called with `lo` it is the inclusive lower bound;
    /// called with `hi` it is the exclusive upper bound (the reference's
    /// `execute_scan` looks like it treats `find_pos(..., 0)` as an
    /// *inclusive* `pos_max` — `num_results = pos_max - pos_min` rows are
    /// then written starting at `ret_indices[0]` through a loop that runs
    /// one iteration too many, but the subsequent `realloc` down to
    /// `num_results` entries silently drops that last write, so the net
    /// effect is the same exclusive bound as the `SORTED_UNCLUSTERED`
    /// branch's plain `binary_search`-based range. `want_min` is kept as a
    /// parameter purely to document the caller's intent at the call site;
    /// it does not change the computation.
    pub fn find_pos(&self, val: i32, _want_min: bool) -> i32 {
        if self.root.is_none() {
            return 0;
        }
        let mut cur = self.leftmost_leaf();
        let mut rank = 0i32;
        while let Some(id) = cur {
            let NodePayload::Leaf { keys, next, .. } = &self.node(id).payload else {
                unreachable!()
            };
            let idx = lower_bound_i32(keys, val);
            rank += idx as i32;
            if idx < keys.len() {
                return rank;
            }
            cur = if next.is_null() { None } else { Some(*next) };
        }
        rank
    }

    /// `find_range`: positions of all entries with `min <= key <= max`
    /// (either bound may be absent for an open range), walking the leaf
    /// chain from the leaf containing `min`.
    pub fn find_range(&self, min: Option<i32>, max: Option<i32>) -> Vec<i32> {
        let mut out = Vec::new();
        let mut leaf = match min {
            Some(m) => self.find_leaf(m),
            None => self.leftmost_leaf(),
        };
        while let Some(id) = leaf {
            let NodePayload::Leaf { keys, positions, next, .. } = &self.node(id).payload else {
                unreachable!()
            };
            for (i, &k) in keys.iter().enumerate() {
                if let Some(m) = min {
                    if k < m {
                        continue;
                    }
                }
                if let Some(m) = max {
                    if k > m {
                        return out;
                    }
                }
                out.push(positions[i]);
            }
            leaf = if next.is_null() { None } else { Some(*next) };
        }
        out
    }

    /// `remove(root, val, pos)`: deletes the one entry `(val, pos)`, then
    /// decrements by one every surviving stored position `>= pos`. No
    /// node-level rebalancing is performed (section 4.2).
    ///
    /// `find_leaf` descends by a *lower* bound on keys, so when `val` equals
    /// an internal separator (which is always the minimum key of its right
    /// subtree — see `split_leaf_and_insert`), descent undershoots into the
    /// left sibling of the leaf that actually holds `val`. The loop below
    /// must keep walking forward through the leaf chain in that case, not
    /// just when the current leaf's last key exactly equals `val` — the
    /// landed leaf's last key can be strictly less than `val` while `val`
    /// still lives one or more leaves further on. Mirrors
    /// `original_source/bplus.c`'s `bplus_remove`, which advances to
    /// `leaf->next` whenever its in-leaf search index runs off the end.
    pub fn remove(&mut self, val: i32, pos: i32) {
        let mut leaf = self.find_leaf(val);
        while let Some(id) = leaf {
            let removed = {
                let node = self.node_mut(id);
                let NodePayload::Leaf { keys, positions, next, .. } = &mut node.payload else {
                    unreachable!()
                };
                if let Some(i) = keys
                    .iter()
                    .zip(positions.iter())
                    .position(|(&k, &p)| k == val && p == pos)
                {
                    keys.remove(i);
                    positions.remove(i);
                    true
                } else {
                    false
                }
            };
            if removed {
                break;
            }
            let NodePayload::Leaf { keys, next, .. } = &self.node(id).payload else {
                unreachable!()
            };
            if keys.last().is_none_or(|&last| last > val) {
                break;
            }
            leaf = if next.is_null() { None } else { Some(*next) };
        }

        self.decrement_positions_from(pos);
    }

    fn decrement_positions_from(&mut self, pos: i32) {
        let mut cur = self.leftmost_leaf();
        while let Some(id) = cur {
            let node = self.node_mut(id);
            if let NodePayload::Leaf { positions, next, .. } = &mut node.payload {
                for p in positions.iter_mut() {
                    if *p >= pos {
                        *p -= 1;
                    }
                }
                cur = if next.is_null() { None } else { Some(*next) };
            } else {
                unreachable!()
            }
        }
    }

    /// Returns all `(key, position)` pairs across the leaf chain, in key
    /// order. Used by persistence and invariant tests.
    pub fn iter_leaf_entries(&self) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        let mut cur = self.leftmost_leaf();
        while let Some(id) = cur {
            let NodePayload::Leaf { keys, positions, next, .. } = &self.node(id).payload else {
                unreachable!()
            };
            for (k, p) in keys.iter().zip(positions.iter()) {
                out.push((*k, *p));
            }
            cur = if next.is_null() { None } else { Some(*next) };
        }
        out
    }

    /// Node-by-node pre-order dump (section 4.2's "Persistence"): parent and
    /// leaf sibling pointers are never written — they are reconstructed on
    /// load from tree shape and leaf-visit order, the arena equivalent of the
    /// reference's "parent/next/prev pointers nulled on write".
    pub fn dump(&self, w: &mut impl Write) -> io::Result<()> {
        match self.root {
            None => w.write_all(&[0u8]),
            Some(root) => {
                w.write_all(&[1u8])?;
                self.dump_node(root, w)
            }
        }
    }

    fn dump_node(&self, id: NodeId, w: &mut impl Write) -> io::Result<()> {
        match &self.node(id).payload {
            NodePayload::Leaf { keys, positions, .. } => {
                w.write_all(&[0u8])?;
                w.write_all(&(keys.len() as u32).to_le_bytes())?;
                for &k in keys {
                    w.write_all(&k.to_le_bytes())?;
                }
                for &p in positions {
                    w.write_all(&p.to_le_bytes())?;
                }
                Ok(())
            }
            NodePayload::Internal { keys, children } => {
                w.write_all(&[1u8])?;
                w.write_all(&(keys.len() as u32).to_le_bytes())?;
                for &k in keys {
                    w.write_all(&k.to_le_bytes())?;
                }
                for &child in children {
                    self.dump_node(child, w)?;
                }
                Ok(())
            }
        }
    }

    /// Reloads a tree dumped by [`BPlusTree::dump`]. Parent pointers are
    /// reattached during the same recursion that allocates each child; leaf
    /// siblings are stitched in a second pass over the leaves collected (in
    /// left-to-right order) during that recursion — exactly the two-pass
    /// scheme section 4.2 documents for the reference's node-by-node dump.
    pub fn load(r: &mut impl Read) -> io::Result<Self> {
        let mut tree = BPlusTree { nodes: Vec::new(), root: None };
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)?;
        if tag[0] == 0 {
            return Ok(tree);
        }

        let mut leaves = Vec::new();
        let root = tree.load_node(r, NULL, &mut leaves)?;
        tree.root = Some(root);

        for pair in leaves.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            if let NodePayload::Leaf { next, .. } = &mut tree.node_mut(left).payload {
                *next = right;
            }
            if let NodePayload::Leaf { prev, .. } = &mut tree.node_mut(right).payload {
                *prev = left;
            }
        }

        Ok(tree)
    }

    fn load_node(&mut self, r: &mut impl Read, parent: NodeId, leaves: &mut Vec<NodeId>) -> io::Result<NodeId> {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)?;
        let mut len_buf = [0u8; 4];
        r.read_exact(&mut len_buf)?;
        let num_keys = u32::from_le_bytes(len_buf) as usize;
        let mut keys = Vec::with_capacity(num_keys);
        let mut buf = [0u8; 4];
        for _ in 0..num_keys {
            r.read_exact(&mut buf)?;
            keys.push(i32::from_le_bytes(buf));
        }

        if tag[0] == 0 {
            let mut positions = Vec::with_capacity(num_keys);
            for _ in 0..num_keys {
                r.read_exact(&mut buf)?;
                positions.push(i32::from_le_bytes(buf));
            }
            let id = self.alloc(Node {
                parent,
                payload: NodePayload::Leaf { keys, positions, prev: NULL, next: NULL },
            });
            leaves.push(id);
            Ok(id)
        } else {
            let id = self.alloc(Node { parent, payload: NodePayload::Internal { keys: keys.clone(), children: Vec::new() } });
            let mut children = Vec::with_capacity(num_keys + 1);
            for _ in 0..=num_keys {
                children.push(self.load_node(r, id, leaves)?);
            }
            if let NodePayload::Internal { children: c, .. } = &mut self.node_mut(id).payload {
                *c = children;
            }
            Ok(id)
        }
    }

    /// Checks the local B+ tree invariants of section 8: every internal node
    /// has `num_vals + 1` children, every leaf's keys are sorted, and the
    /// leaf chain is sorted globally.
    #[cfg(any(test, feature = "invariant-checks"))]
    pub fn check_invariants(&self) -> bool {
        if let Some(root) = self.root {
            if !self.check_node(root) {
                return false;
            }
        }
        let entries = self.iter_leaf_entries();
        entries.windows(2).all(|w| w[0].0 <= w[1].0)
    }

    #[cfg(any(test, feature = "invariant-checks"))]
    fn check_node(&self, id: NodeId) -> bool {
        match &self.node(id).payload {
            NodePayload::Leaf { keys, .. } => keys.windows(2).all(|w| w[0] <= w[1]),
            NodePayload::Internal { keys, children } => {
                children.len() == keys.len() + 1 && children.iter().all(|&c| self.check_node(c))
            }
        }
    }
}

/// Index of the child to descend into for `val`: the same `lower_bound`
/// convention as [`lower_bound_i32`], clamped into `[0, children.len()-1]`.
fn child_index_for(keys: &[i32], val: i32) -> usize {
    let idx = lower_bound_i32(keys, val);
    idx.min(keys.len())
}

/// Insertion index placing a new `val` entry **after** all existing equal
/// entries (rightmost-occurrence tie-break, section 4.2).
fn rightmost_insertion_index(keys: &[i32], val: i32) -> usize {
    match keys.binary_search_by(|probe| {
        if *probe <= val {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    }) {
        Ok(idx) | Err(idx) => idx,
    }
}

/// `lower_bound` semantics (first index with `key >= val`) specialised for
/// sorted key slices without the caller-owned companion array.
fn lower_bound_i32(keys: &[i32], val: i32) -> usize {
    keys.partition_point(|&k| k < val)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(vals: &[i32]) -> BPlusTree {
        let mut t = BPlusTree::new();
        for (pos, &v) in vals.iter().enumerate() {
            t.insert(v, pos as i32, false);
        }
        t
    }

    #[test]
    fn insert_and_find_pos_basic() {
        // keys in rank order: 1,1,1,3,3,5 (three 1s, two 3s, one 5).
        let t = build(&[1, 1, 3, 3, 1, 5]);
        assert_eq!(t.find_pos(1, true), 0); // first entry >= 1
        assert_eq!(t.find_pos(5, true), 5); // first entry >= 5
        assert_eq!(t.find_pos(3, false), 3); // first entry >= 3 (exclusive bound for hi=3)
    }

    #[test]
    fn find_pos_scenario_1_bounds() {
        // end-to-end scenario 1: select(2, 8) over clustered data 2,2,5,7,9.
        let t = build(&[2, 2, 5, 7, 9]);
        let pos_min = t.find_pos(2, true);
        let pos_max = t.find_pos(8, false);
        assert_eq!(pos_min, 0);
        assert_eq!(pos_max, 4); // half-open [0, 4) -> rows 2,2,5,7
    }

    #[test]
    fn find_pos_exact_hi_excludes_matching_rows() {
        // selecting with hi exactly equal to an existing key must still
        // exclude rows equal to hi (lo <= v < hi).
        let t = build(&[2, 2, 5, 7, 9]);
        assert_eq!(t.find_pos(9, false), 4); // excludes the row valued 9
    }

    #[test]
    fn find_range_scenario_1() {
        // end-to-end scenario 1: rows 5,2,9,2,7 clustered on insert order
        // here are inserted in raw order (clustering is exercised by the
        // column layer; the tree itself just indexes whatever is given).
        let t = build(&[5, 2, 9, 2, 7]);
        let mut positions = t.find_range(Some(2), Some(7));
        positions.sort();
        let mut vals: Vec<i32> = positions
            .iter()
            .map(|&p| [5, 2, 9, 2, 7][p as usize])
            .collect();
        vals.sort();
        assert_eq!(vals, vec![2, 2, 5, 7]);
    }

    #[test]
    fn remove_repairs_positions_and_tree() {
        // end-to-end scenario 5: deleting a multi-position batch must
        // process positions in descending order so that each `remove` call
        // still sees the position it was given as valid (a later, smaller
        // position is never touched by an earlier, larger removal's
        // decrement pass).
        let mut t = build(&[1, 1, 3, 3, 1, 5]);
        t.remove(3, 3);
        t.remove(3, 2);

        assert_eq!(t.find_pos(3, true), 3); // no 3s remain; rank lands on the 5
        let mut ones = t.find_range(Some(1), Some(1));
        ones.sort();
        assert_eq!(ones, vec![0, 1, 2]);
        let fives = t.find_range(Some(5), Some(5));
        assert_eq!(fives, vec![3]);
    }

    #[test]
    fn remove_finds_entry_at_split_boundary_in_non_first_leaf() {
        // LEAF_SIZE ascending inserts all land in the tree's single
        // rightmost leaf, so the first split's separator key is
        // deterministically `LEAF_SIZE / 2` (the value at that index when
        // the leaf overflows by one) — which becomes the *minimum* key of
        // the second leaf. That is exactly the value `find_leaf`'s lower
        // bound descent undershoots on, landing `remove` one leaf too
        // early. Regression test for that undershoot.
        let boundary = (LEAF_SIZE / 2) as i32;
        let n = (LEAF_SIZE as i32) * 2;
        let mut t = BPlusTree::new();
        for v in 0..n {
            t.insert(v, v, false);
        }
        assert!(t.iter_leaf_entries().len() > LEAF_SIZE, "test requires at least one split to have occurred");

        t.remove(boundary, boundary);

        // gone system-wide, not just left behind in a skipped leaf
        assert!(t.find_range(Some(boundary), Some(boundary)).is_empty());
        assert_eq!(t.find_pos(boundary, true), boundary);

        for v in 0..boundary {
            assert_eq!(t.find_range(Some(v), Some(v)), vec![v]);
        }
        for v in (boundary + 1)..n {
            // every position at or after the deleted row shifts down by one
            assert_eq!(t.find_range(Some(v), Some(v)), vec![v - 1]);
        }

        assert!(t.check_invariants());
    }

    #[test]
    fn split_preserves_sorted_order() {
        let vals: Vec<i32> = (0..2000).rev().collect();
        let t = build(&vals);
        let entries = t.iter_leaf_entries();
        assert!(entries.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(entries.len(), 2000);
    }

    #[test]
    fn invariants_hold_after_bulk_insert() {
        let vals: Vec<i32> = (0..5000).map(|i| (i * 37) % 991).collect();
        let t = build(&vals);
        assert!(t.check_invariants());
    }

    #[test]
    fn dump_load_round_trips_leaf_chain_and_queries() {
        let vals: Vec<i32> = (0..3000).map(|i| (i * 17) % 541).collect();
        let t = build(&vals);

        let mut buf = Vec::new();
        t.dump(&mut buf).unwrap();
        let loaded = BPlusTree::load(&mut buf.as_slice()).unwrap();

        assert!(loaded.check_invariants());
        assert_eq!(loaded.iter_leaf_entries(), t.iter_leaf_entries());
        assert_eq!(loaded.find_pos(100, true), t.find_pos(100, true));
        let mut before = t.find_range(Some(50), Some(60));
        let mut after = loaded.find_range(Some(50), Some(60));
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn dump_load_round_trips_empty_tree() {
        let t = BPlusTree::new();
        let mut buf = Vec::new();
        t.dump(&mut buf).unwrap();
        let loaded = BPlusTree::load(&mut buf.as_slice()).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn shift_on_insert_when_requested() {
        let mut t = BPlusTree::new();
        t.insert(10, 0, false);
        t.insert(20, 1, false);
        // inserting at position 1 with shift=true bumps every stored
        // position >= 1 by one first.
        t.insert(15, 1, true);
        let mut entries = t.iter_leaf_entries();
        entries.sort();
        assert_eq!(entries, vec![(10, 0), (15, 1), (20, 2)]);
    }
}

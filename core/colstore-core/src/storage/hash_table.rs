//! Extendible hash table (section 4.3), used as the build-side structure for
//! Grace hash joins.
//!
//! Grounded in `original_source/hash_table.c`. Buckets may be shared by
//! multiple directory slots (`num_ptrs` tracks how many slots currently
//! point at a bucket); splitting either doubles the directory (when a
//! bucket is pointed to by exactly one slot) or redistributes its slots to a
//! freshly allocated sibling.

use crate::types::{BUCKET_SIZE, INITIAL_NUM_BITS};

#[derive(Debug, Clone)]
struct Bucket {
    keys: Vec<i32>,
    vals: Vec<i32>,
    /// Number of directory slots currently pointing at this bucket.
    num_ptrs: u32,
}

impl Bucket {
    fn new() -> Self {
        Bucket {
            keys: Vec::with_capacity(BUCKET_SIZE),
            vals: Vec::with_capacity(BUCKET_SIZE),
            num_ptrs: 1,
        }
    }

    fn is_full(&self) -> bool {
        self.keys.len() >= BUCKET_SIZE
    }
}

/// `hash_function`: sdbm-style accumulation over a key's bytes.
///
/// `original_source/hash_table.c` reinterprets the `int` key as a
/// NUL-terminated byte string and stops at the first zero byte, so it
/// silently skips mixing any bytes after an embedded zero — an artefact of
/// treating a 4-byte integer as a C string, not a deliberate design choice.
/// Per the spec's explicit license to substitute "any well-distributed
/// integer hash" (section 4.3), this folds all four little-endian bytes of
/// the key unconditionally through the same sdbm recurrence.
fn hash_function(key: i32) -> u64 {
    let mut hash: u64 = 0;
    for byte in key.to_le_bytes() {
        hash = (byte as u64).wrapping_add(hash << 6).wrapping_add(hash << 16).wrapping_sub(hash);
    }
    hash
}

fn bucket_num(hash_val: u64, num_bits: u32) -> usize {
    let mask = (1u64 << num_bits) - 1;
    (hash_val & mask) as usize
}

/// An extendible hash table mapping `i32` keys to `i32` values, permitting
/// duplicate keys.
pub struct ExtendibleHashTable {
    num_bits: u32,
    /// Directory of bucket indices; multiple slots may name the same bucket.
    directory: Vec<usize>,
    buckets: Vec<Bucket>,
}

impl ExtendibleHashTable {
    pub fn new() -> Self {
        let num_bits = INITIAL_NUM_BITS;
        let num_buckets = 1usize << num_bits;
        let buckets = (0..num_buckets).map(|_| Bucket::new()).collect();
        ExtendibleHashTable {
            num_bits,
            directory: (0..num_buckets).collect(),
            buckets,
        }
    }

    fn increase_num_bits(&mut self) {
        let old_num_slots = self.directory.len();
        self.num_bits += 1;
        let mut new_directory = Vec::with_capacity(old_num_slots * 2);
        new_directory.extend_from_slice(&self.directory);
        for &bucket_idx in &self.directory {
            new_directory.push(bucket_idx);
            self.buckets[bucket_idx].num_ptrs += 1;
        }
        self.directory = new_directory;
    }

    /// Splits the bucket currently at directory slot `slot`, doubling the
    /// directory first if the bucket is pointed to by only one slot.
    fn split_bucket(&mut self, slot: usize) {
        let bucket_idx = self.directory[slot];
        if self.buckets[bucket_idx].num_ptrs == 1 {
            self.increase_num_bits();
        }

        // Every directory slot currently pointing at `bucket_idx` gets a
        // fresh, empty bucket except the first, which keeps `bucket_idx`.
        let mut first = true;
        let mut fresh_indices = Vec::new();
        for slot_idx in 0..self.directory.len() {
            if self.directory[slot_idx] == bucket_idx {
                if first {
                    first = false;
                } else {
                    self.buckets.push(Bucket::new());
                    let new_idx = self.buckets.len() - 1;
                    self.directory[slot_idx] = new_idx;
                    fresh_indices.push(slot_idx);
                }
            }
        }

        let all_keys = std::mem::take(&mut self.buckets[bucket_idx].keys);
        let all_vals = std::mem::take(&mut self.buckets[bucket_idx].vals);
        self.buckets[bucket_idx].num_ptrs = 1;

        for (k, v) in all_keys.into_iter().zip(all_vals.into_iter()) {
            let h = hash_function(k);
            let target_slot = bucket_num(h, self.num_bits);
            let target_bucket = self.directory[target_slot];
            self.buckets[target_bucket].keys.push(k);
            self.buckets[target_bucket].vals.push(v);
        }
    }

    fn bucket_for(&mut self, key: i32, inserting: bool) -> usize {
        let h = hash_function(key);
        let mut slot = bucket_num(h, self.num_bits);
        let mut bucket_idx = self.directory[slot];

        if inserting && self.buckets[bucket_idx].is_full() {
            self.split_bucket(slot);
            slot = bucket_num(h, self.num_bits);
            bucket_idx = self.directory[slot];
        }

        bucket_idx
    }

    pub fn insert(&mut self, key: i32, val: i32) {
        let bucket_idx = self.bucket_for(key, true);
        self.buckets[bucket_idx].keys.push(key);
        self.buckets[bucket_idx].vals.push(val);
    }

    /// `probe(k, &n_out)`: all values whose key equals `k`.
    pub fn probe(&self, key: i32) -> Vec<i32> {
        let h = hash_function(key);
        let slot = bucket_num(h, self.num_bits);
        let bucket_idx = self.directory[slot];
        let bucket = &self.buckets[bucket_idx];
        bucket
            .keys
            .iter()
            .zip(bucket.vals.iter())
            .filter(|(&k, _)| k == key)
            .map(|(_, &v)| v)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.keys.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks the section-8 extendible-hash invariant: every directory
    /// entry's bucket contains only keys whose hash, masked to `num_bits`,
    /// equals that directory index.
    #[cfg(test)]
    fn check_invariants(&self) -> bool {
        for (slot, &bucket_idx) in self.directory.iter().enumerate() {
            for &k in &self.buckets[bucket_idx].keys {
                if bucket_num(hash_function(k), self.num_bits) != slot {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for ExtendibleHashTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_probe_single() {
        let mut t = ExtendibleHashTable::new();
        t.insert(42, 7);
        assert_eq!(t.probe(42), vec![7]);
        assert_eq!(t.probe(43), Vec::<i32>::new());
    }

    #[test]
    fn duplicate_keys_are_preserved() {
        let mut t = ExtendibleHashTable::new();
        t.insert(1, 10);
        t.insert(1, 20);
        let mut probed = t.probe(1);
        probed.sort();
        assert_eq!(probed, vec![10, 20]);
    }

    #[test]
    fn grows_beyond_initial_capacity_and_stays_consistent() {
        let mut t = ExtendibleHashTable::new();
        for i in 0..5000 {
            t.insert(i, i * 2);
        }
        assert!(t.check_invariants());
        for i in 0..5000 {
            assert_eq!(t.probe(i), vec![i * 2]);
        }
        assert_eq!(t.len(), 5000);
    }

    #[test]
    fn single_bucket_split_doubles_directory() {
        let mut t = ExtendibleHashTable::new();
        assert_eq!(t.directory.len(), 4);
        for i in 0..(crate::types::BUCKET_SIZE as i32 + 1) {
            t.insert(i, i);
        }
        assert!(t.directory.len() >= 4);
        assert!(t.check_invariants());
    }
}
